//! Thread-safe registry of live nodes in front of a [`HashRing`].
//!
//! Lookups take a shared lock and run in parallel. Registering or deregistering a node takes
//! the exclusive lock for the whole splice, so a lookup never observes a half-applied node.

use std::fmt::Display;

use parking_lot::RwLock;
use tracing::info;

use crate::config::RingConfig;
use crate::error::Error;
use crate::hash::{DefaultKeyHasher, KeyHasher};
use crate::hashring::HashRing;
use crate::node::Node;

/// Live node identities and the ring built from them.
///
/// All methods take `&self`; share the registry as `Arc<NodeRegistry<_>>`. Results are cloned
/// out of the lock so no guard outlives a call.
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use hashring_registry::{Node, NodeRegistry};
///
/// let registry = Arc::new(
///     NodeRegistry::new(
///         vec![
///             Node::new(1u64, "node1", "192.168.1.1"),
///             Node::new(2u64, "node2", "192.169.1.1"),
///         ],
///         100,
///     )
///     .unwrap(),
/// );
///
/// let router = Arc::clone(&registry);
/// let owner = thread::spawn(move || router.get_node("data0").unwrap())
///     .join()
///     .unwrap();
///
/// assert!(registry.contains(&owner.id));
/// ```
#[derive(Debug)]
pub struct NodeRegistry<I, H = DefaultKeyHasher> {
    ring: RwLock<HashRing<I, H>>,
}

impl<I> Default for NodeRegistry<I> {
    fn default() -> Self {
        NodeRegistry::from_ring(HashRing::default())
    }
}

impl<I> NodeRegistry<I>
where
    I: Clone + Ord + Display,
{
    /// Registers `nodes` in order on a ring with `num_replicas` virtual nodes per node.
    pub fn new(nodes: Vec<Node<I>>, num_replicas: usize) -> Result<NodeRegistry<I>, Error> {
        HashRing::with_nodes(nodes, num_replicas).map(NodeRegistry::from_ring)
    }

    pub fn from_config(nodes: Vec<Node<I>>, config: &RingConfig) -> Result<NodeRegistry<I>, Error> {
        let mut ring = HashRing::from_config(config);
        ring.batch_add(nodes)?;
        Ok(NodeRegistry::from_ring(ring))
    }
}

impl<I, H> NodeRegistry<I, H> {
    pub fn from_ring(ring: HashRing<I, H>) -> NodeRegistry<I, H> {
        NodeRegistry {
            ring: RwLock::new(ring),
        }
    }

    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.read().is_empty()
    }

    pub fn num_replicas(&self) -> usize {
        self.ring.read().num_replicas()
    }

    pub fn into_ring(self) -> HashRing<I, H> {
        self.ring.into_inner()
    }
}

impl<I, H> NodeRegistry<I, H>
where
    I: Clone + Ord + Display,
    H: KeyHasher,
{
    pub fn with_hasher(
        nodes: Vec<Node<I>>,
        num_replicas: usize,
        hasher: H,
    ) -> Result<NodeRegistry<I, H>, Error> {
        HashRing::with_nodes_and_hasher(nodes, num_replicas, hasher).map(NodeRegistry::from_ring)
    }

    /// Adds `node` to the ring.
    ///
    /// Fails with [`Error::DuplicateNode`] if its id is already registered; the ring is left
    /// untouched in that case.
    pub fn register(&self, node: Node<I>) -> Result<(), Error> {
        let mut ring = self.ring.write();
        let id = node.id.clone();
        let collisions = ring.add_node(node)?;

        info!(%id, nodes = ring.len(), collisions = collisions.len(), "node registered");
        Ok(())
    }

    /// Removes the node with `id` from the ring and returns it.
    ///
    /// Fails with [`Error::UnknownNode`] if no such node is registered.
    pub fn deregister(&self, id: &I) -> Result<Node<I>, Error> {
        let mut ring = self.ring.write();
        let node = ring.remove_node(id)?;

        info!(%id, nodes = ring.len(), "node deregistered");
        Ok(node)
    }

    /// Node owning `key`, see [`HashRing::get_node`].
    pub fn get_node(&self, key: &str) -> Result<Node<I>, Error> {
        self.ring.read().get_node(key).cloned()
    }

    /// Up to `count` distinct nodes for `key`, see [`HashRing::get_nodes`].
    pub fn get_nodes(&self, key: &str, count: usize) -> Vec<Node<I>> {
        self.ring
            .read()
            .get_nodes(key, count)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &I) -> bool {
        self.ring.read().contains(id)
    }

    pub fn node(&self, id: &I) -> Option<Node<I>> {
        self.ring.read().node(id).cloned()
    }

    /// Registered nodes ordered by id.
    pub fn nodes(&self) -> Vec<Node<I>> {
        self.ring.read().nodes().cloned().collect()
    }
}

impl<I, H> NodeRegistry<I, H>
where
    I: Clone,
    H: Clone,
{
    /// A copy of the ring as it is right now.
    ///
    /// Keep one before a membership change and pass it to [`HashRing::handoffs`] afterwards to
    /// learn which ranges moved.
    pub fn snapshot(&self) -> HashRing<I, H> {
        self.ring.read().clone()
    }
}
