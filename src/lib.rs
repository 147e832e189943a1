//! Consistent hashing ring with virtual nodes, and a thread-safe registry of the nodes on it
//!
//! Keys are mapped to nodes so that adding or removing a node only remaps the keys in the arcs
//! of the ring that node gains or loses, instead of rehashing the whole keyspace.
//!
//! Every node is placed on a `u64` ring `num_replicas` times: replica `i` of the node with id
//! `id` sits at `hash("{id}_{i}")`. A key belongs to the node owning the first position at or
//! after `hash(key)`, wrapping around to the smallest position.
//!
//! [`HashRing`] is the plain data structure. [`NodeRegistry`] wraps it behind a read-write lock
//! for many concurrent readers and occasional membership changes.
//! Both can tell which hash ranges change owner between two states of the ring, which is what
//! a caller needs to move data after a membership change. Moving the data is up to the caller.
//!
//! ```
//! use hashring_registry::{Node, NodeRegistry};
//!
//! let registry = NodeRegistry::new(
//!     vec![
//!         Node::new(1u64, "node1", "192.168.1.1"),
//!         Node::new(2u64, "node2", "192.169.1.1"),
//!         Node::new(3u64, "node3", "192.170.1.1"),
//!     ],
//!     100,
//! )
//! .unwrap();
//!
//! let before = registry.get_node("data0").unwrap();
//! registry.register(Node::new(4u64, "node4", "192.171.1.1")).unwrap();
//! let after = registry.get_node("data0").unwrap();
//!
//! // data0 either stays or moves to the new node
//! assert!(after == before || after.id == 4);
//! ```

mod config;
mod error;
mod hash;
mod hashring;
mod node;
mod registry;

pub use config::{DEFAULT_REPLICAS, RingConfig};
pub use error::{Error, PositionCollision};
pub use hash::{DefaultKeyHasher, KeyHasher, vnode_label};
pub use hashring::{Handoff, HashRing, Iter, OwnedRange, Reassignment, VirtualNode};
pub use node::Node;
pub use registry::NodeRegistry;
