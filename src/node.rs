use std::cmp::Ordering;
use std::fmt::{self, Display};

#[cfg(feature = "derive")]
use serde::{Deserialize, Serialize};

/// A real node of the cluster.
///
/// Identity is the `id` alone: two nodes with the same id are equal even if name or address
/// differ. `name` and `address` are opaque to the ring and handed back as they were given.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
pub struct Node<I> {
    pub id: I,
    pub name: String,
    pub address: String,
}

impl<I> Node<I> {
    pub fn new(id: I, name: impl Into<String>, address: impl Into<String>) -> Node<I> {
        Node {
            id,
            name: name.into(),
            address: address.into(),
        }
    }
}

// Implement `PartialEq`, `Eq`, `PartialOrd` and `Ord` on the id only
impl<I: PartialEq> PartialEq for Node<I> {
    fn eq(&self, other: &Node<I>) -> bool {
        self.id == other.id
    }
}

impl<I: Eq> Eq for Node<I> {}

impl<I: Ord> PartialOrd for Node<I> {
    fn partial_cmp(&self, other: &Node<I>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: Ord> Ord for Node<I> {
    fn cmp(&self, other: &Node<I>) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<I: Display> Display for Node<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, {}, {})", self.id, self.name, self.address)
    }
}
