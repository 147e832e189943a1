use std::collections::HashMap;

use super::HashRing;
use crate::node::Node;

/// A virtual node: one slot on the ring and the real node owning it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VirtualNode<'a, I> {
    pub position: u64,
    pub node: &'a Node<I>,
}

/// Iterates over the virtual nodes of a [`HashRing`] in ascending position order.
pub struct Iter<'a, I> {
    positions: std::slice::Iter<'a, u64>,
    owners: &'a HashMap<u64, Node<I>>,
}

impl<'a, I> Iterator for Iter<'a, I> {
    type Item = VirtualNode<'a, I>;

    fn next(&mut self) -> Option<Self::Item> {
        let position = *self.positions.next()?;
        let node = self.owners.get(&position)?;
        Some(VirtualNode { position, node })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<I, H> HashRing<I, H> {
    pub fn iter(&self) -> Iter<'_, I> {
        Iter {
            positions: self.positions.iter(),
            owners: &self.owners,
        }
    }
}

impl<'a, I, H> IntoIterator for &'a HashRing<I, H> {
    type Item = VirtualNode<'a, I>;

    type IntoIter = Iter<'a, I>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
