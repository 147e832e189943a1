use crate::node::Node;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("node {id} is already on the ring")]
    DuplicateNode { id: String },

    #[error("node {id} is not on the ring")]
    UnknownNode { id: String },

    #[error("the ring has no nodes")]
    EmptyRing,
}

/// Two virtual nodes hashed to the same position while adding a node.
///
/// Not an error: the node being added takes the slot (last write wins) and `previous` loses
/// it. Removing `previous` later leaves the slot alone.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionCollision<I> {
    pub position: u64,
    /// replica index of the added node that landed on `position`
    pub replica: usize,
    /// owner of the slot before the add, possibly the added node itself
    pub previous: Node<I>,
}
