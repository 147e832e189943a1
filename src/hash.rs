use siphasher::sip::SipHasher;
use std::fmt::Display;
use std::hash::Hasher;

/// Maps a string to a position on the ring.
///
/// Implementations must be deterministic across processes and restarts, otherwise two
/// processes seeded with the same nodes disagree on the layout. Collision resistance is not
/// required, an even spread over the `u64` domain is.
///
/// Any `Fn(&str) -> u64` is a `KeyHasher`, which makes it easy to plug in a stub:
///
/// ```
/// use hashring_registry::{HashRing, Node};
///
/// let sum_of_bytes = |key: &str| key.bytes().map(u64::from).sum::<u64>() % 1000;
/// let mut ring = HashRing::with_hasher(10, sum_of_bytes);
/// ring.add_node(Node::new(1u64, "node1", "192.168.1.1")).unwrap();
///
/// assert_eq!(ring.get_node("data0").unwrap().id, 1);
/// ```
pub trait KeyHasher {
    fn hash_key(&self, key: &str) -> u64;
}

impl<F> KeyHasher for F
where
    F: Fn(&str) -> u64,
{
    fn hash_key(&self, key: &str) -> u64 {
        self(key)
    }
}

/// SipHash-2-4 over the raw bytes of the key.
///
/// The keys are fixed (`0, 0` unless set with [`DefaultKeyHasher::with_keys`]) so the ring
/// layout is reproducible between runs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DefaultKeyHasher {
    k0: u64,
    k1: u64,
}

impl DefaultKeyHasher {
    pub fn with_keys(k0: u64, k1: u64) -> DefaultKeyHasher {
        DefaultKeyHasher { k0, k1 }
    }
}

impl KeyHasher for DefaultKeyHasher {
    fn hash_key(&self, key: &str) -> u64 {
        let mut hasher = SipHasher::new_with_keys(self.k0, self.k1);
        hasher.write(key.as_bytes());
        hasher.finish()
    }
}

/// Label hashed to place replica `replica` of node `id` on the ring: `"{id}_{replica}"`.
///
/// Positions are never stored per node. Removing a node recomputes them from this label, so
/// the rendering of `id` must not change while the node is on the ring.
pub fn vnode_label<I: Display>(id: &I, replica: usize) -> String {
    format!("{id}_{replica}")
}
