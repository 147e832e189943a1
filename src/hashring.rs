use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use tracing::warn;

use crate::config::{DEFAULT_REPLICAS, RingConfig};
use crate::error::Error;
use crate::hash::{DefaultKeyHasher, KeyHasher, vnode_label};
use crate::node::Node;

mod crud;
mod iterator;
mod ranges;

pub use iterator::{Iter, VirtualNode};
pub use ranges::{Handoff, OwnedRange, Reassignment};

/// HashRing places every real node on a `u64` ring as `num_replicas` virtual nodes
/// HashRing provides methods to add and remove nodes and to find the node owning a key
/// HashRing can calculate which hash ranges each node owns, and which ranges change owner between two states of the ring
///
/// Replica `i` of a node sits at `hash("{id}_{i}")`. A key belongs to the first position at or
/// after its own hash, wrapping around to the smallest position.
///
/// HashRing is a plain owned structure; share it between threads through
/// [`NodeRegistry`](crate::NodeRegistry).
#[derive(Clone, PartialEq, Debug)]
pub struct HashRing<I, H = DefaultKeyHasher> {
    hasher: H,
    // position -> owner of the slot
    owners: HashMap<u64, Node<I>>,
    // ascending, exactly the keys of `owners`
    positions: Vec<u64>,
    nodes: BTreeMap<I, Node<I>>,
    num_replicas: usize,
}

impl<I> Default for HashRing<I> {
    fn default() -> Self {
        HashRing::new(DEFAULT_REPLICAS)
    }
}

impl<I> HashRing<I> {
    /// Create an empty `HashRing` using SipHash.
    ///
    /// # Arguments
    ///
    /// * `num_replicas` - number of virtual nodes per real node (higher number means more even distribution of keys across all nodes, but higher processing effort)
    pub fn new(num_replicas: usize) -> HashRing<I> {
        HashRing::with_hasher(num_replicas, DefaultKeyHasher::default())
    }

    pub fn from_config(config: &RingConfig) -> HashRing<I> {
        HashRing::with_hasher(config.num_replicas, config.hasher())
    }
}

impl<I> HashRing<I>
where
    I: Clone + Ord + Display,
{
    /// Create a `HashRing` seeded with `nodes`, added in order.
    ///
    /// Fails with [`Error::DuplicateNode`] on the first repeated id.
    ///
    /// ```
    /// use hashring_registry::{HashRing, Node};
    ///
    /// let ring = HashRing::with_nodes(
    ///     vec![
    ///         Node::new(1u64, "node1", "192.168.1.1"),
    ///         Node::new(2u64, "node2", "192.169.1.1"),
    ///         Node::new(3u64, "node3", "192.170.1.1"),
    ///     ],
    ///     100,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(ring.len(), 3);
    /// assert_eq!(ring.vlen(), 300);
    /// let owner = ring.get_node("data0").unwrap();
    /// assert!(ring.contains(&owner.id));
    /// ```
    pub fn with_nodes(nodes: Vec<Node<I>>, num_replicas: usize) -> Result<HashRing<I>, Error> {
        HashRing::with_nodes_and_hasher(nodes, num_replicas, DefaultKeyHasher::default())
    }
}

impl<I, H> HashRing<I, H> {
    /// Creates an empty `HashRing` which will use the given hasher.
    ///
    /// # Arguments
    ///
    /// * `num_replicas` - number of virtual nodes per real node, `0` is raised to `1`
    /// * `hasher` - implementation of [`KeyHasher`] placing virtual nodes and keys on the ring
    pub fn with_hasher(num_replicas: usize, hasher: H) -> HashRing<I, H> {
        if num_replicas == 0 {
            warn!("num_replicas must be positive, using 1");
        }

        HashRing {
            hasher,
            owners: HashMap::new(),
            positions: Vec::new(),
            nodes: BTreeMap::new(),
            num_replicas: num_replicas.max(1),
        }
    }

    /// Get the number of real nodes in the hash ring.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of distinct positions (virtual nodes) on the ring.
    ///
    /// Equals `len() * num_replicas()` unless positions collided.
    pub fn vlen(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if the ring has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_replicas(&self) -> usize {
        self.num_replicas
    }

    /// Registered nodes, ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<I>> {
        self.nodes.values()
    }

    /// Sorted positions currently on the ring.
    pub fn positions(&self) -> &[u64] {
        &self.positions
    }
}

impl<I, H> HashRing<I, H>
where
    I: Clone + Ord + Display,
    H: KeyHasher,
{
    pub fn with_nodes_and_hasher(
        nodes: Vec<Node<I>>,
        num_replicas: usize,
        hasher: H,
    ) -> Result<HashRing<I, H>, Error> {
        let mut ring = HashRing::with_hasher(num_replicas, hasher);
        for node in nodes {
            ring.add_node(node)?;
        }
        Ok(ring)
    }

    pub fn contains(&self, id: &I) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &I) -> Option<&Node<I>> {
        self.nodes.get(id)
    }

    /// Positions of every replica of `id`, in replica order, whether or not `id` is on the ring.
    pub fn virtual_positions(&self, id: &I) -> Vec<u64> {
        (0..self.num_replicas)
            .map(|replica| self.hash(&vnode_label(id, replica)))
            .collect()
    }

    /// Owner of the slot at `position`, if a virtual node sits there.
    pub fn owner_at(&self, position: u64) -> Option<&Node<I>> {
        self.owners.get(&position)
    }

    pub fn hash(&self, key: &str) -> u64 {
        self.hasher.hash_key(key)
    }
}
