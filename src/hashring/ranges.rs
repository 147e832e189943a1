use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::RangeInclusive;

#[cfg(feature = "derive")]
use serde::{Deserialize, Serialize};

use super::HashRing;
use crate::hash::KeyHasher;
use crate::node::Node;

/// A range of key hashes and the node owning every key inside it.
///
/// Careful: every node owns many ranges, one per virtual node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
pub struct OwnedRange<I> {
    pub hash_range: RangeInclusive<u64>,
    pub node: Node<I>,
}

/// Keys with a hash in `hash_range` were owned by `from` and are now owned by `to`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
pub struct Handoff<I> {
    pub hash_range: RangeInclusive<u64>,
    pub from: Node<I>,
    pub to: Node<I>,
}

/// `key` changed owner between two states of the ring.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
pub struct Reassignment<I> {
    pub key: String,
    pub from: Node<I>,
    pub to: Node<I>,
}

impl<I, H> HashRing<I, H>
where
    I: Clone + Ord + Display,
    H: KeyHasher,
{
    /// One range per virtual node, sorted by start, covering `0..=u64::MAX` together.
    ///
    /// The position `p` owns every hash after its predecessor up to and including `p`. The arc
    /// wrapping past `u64::MAX` is split in two, both owned by the node at the smallest
    /// position. Returns an empty list for an empty ring.
    pub fn ranges(&self) -> Vec<OwnedRange<I>> {
        let (Some(first), Some(last)) = (self.positions.first(), self.positions.last()) else {
            return vec![];
        };

        let owner = |position: &u64| self.owners[position].clone();

        if self.positions.len() == 1 {
            return vec![OwnedRange {
                hash_range: 0..=u64::MAX,
                node: owner(first),
            }];
        }

        let mut ranges = Vec::with_capacity(self.positions.len() + 1);

        ranges.push(OwnedRange {
            hash_range: 0..=*first,
            node: owner(first),
        });

        for pair in self.positions.windows(2) {
            ranges.push(OwnedRange {
                hash_range: pair[0] + 1..=pair[1],
                node: owner(&pair[1]),
            });
        }

        if *last < u64::MAX {
            ranges.push(OwnedRange {
                hash_range: last + 1..=u64::MAX,
                node: owner(first),
            });
        }

        ranges
    }

    /// [`HashRing::ranges`] with neighbouring ranges of the same node joined.
    pub fn merged_ranges(&self) -> Vec<OwnedRange<I>> {
        let mut merged: Vec<OwnedRange<I>> = vec![];

        for range in self.ranges() {
            match merged.last_mut() {
                Some(current) if current.node == range.node => {
                    current.hash_range = *current.hash_range.start()..=*range.hash_range.end();
                }
                _ => merged.push(range),
            }
        }

        merged
    }

    /// Share of the hash space owned by each registered node, between 0 and 1.
    ///
    /// A node that lost every slot to collisions is listed with 0.
    pub fn load(&self) -> BTreeMap<I, f64> {
        let mut widths: BTreeMap<I, u128> = self.nodes.keys().map(|id| (id.clone(), 0)).collect();

        for range in self.ranges() {
            let width = u128::from(range.hash_range.end() - range.hash_range.start()) + 1;
            *widths.entry(range.node.id).or_default() += width;
        }

        let space = u128::from(u64::MAX) + 1;
        widths
            .into_iter()
            .map(|(id, width)| (id, width as f64 / space as f64))
            .collect()
    }

    /// Hash ranges whose owner differs between `previous` and this ring.
    ///
    /// Keys in each returned range have to move from `from` to `to`. Neighbouring ranges with
    /// the same pair of nodes are joined. Returns an empty list if either ring is empty, since
    /// there is no owner to move keys from or to.
    ///
    /// ```
    /// use hashring_registry::{HashRing, Node};
    ///
    /// let nodes = vec![
    ///     Node::new(1u64, "node1", "192.168.1.1"),
    ///     Node::new(2u64, "node2", "192.169.1.1"),
    /// ];
    /// let previous = HashRing::with_nodes(nodes, 10).unwrap();
    ///
    /// let mut ring = previous.clone();
    /// ring.add_node(Node::new(3u64, "node3", "192.170.1.1")).unwrap();
    ///
    /// // only ranges now owned by the new node are handed off
    /// let handoffs = ring.handoffs(&previous);
    /// assert!(!handoffs.is_empty());
    /// assert!(handoffs.iter().all(|h| h.to.id == 3));
    /// ```
    pub fn handoffs(&self, previous: &HashRing<I, H>) -> Vec<Handoff<I>> {
        let before = previous.ranges();
        let after = self.ranges();

        let mut handoffs = vec![];
        let (mut i, mut j) = (0, 0);

        // both lists are sorted and cover the whole hash space
        while i < before.len() && j < after.len() {
            let old = &before[i];
            let new = &after[j];

            if old.node != new.node {
                if let Some(hash_range) = intersect(&old.hash_range, &new.hash_range) {
                    handoffs.push(Handoff {
                        hash_range,
                        from: old.node.clone(),
                        to: new.node.clone(),
                    });
                }
            }

            let (old_end, new_end) = (*old.hash_range.end(), *new.hash_range.end());
            if old_end <= new_end {
                i += 1;
            }
            if new_end <= old_end {
                j += 1;
            }
        }

        merge_handoffs(handoffs)
    }

    /// Keys out of `keys` whose owner differs between `previous` and this ring.
    pub fn reassignments<K: AsRef<str>>(
        &self,
        previous: &HashRing<I, H>,
        keys: &[K],
    ) -> Vec<Reassignment<I>> {
        keys.iter()
            .filter_map(|key| {
                let key = key.as_ref();
                let from = previous.get_node(key).ok()?;
                let to = self.get_node(key).ok()?;

                (from != to).then(|| Reassignment {
                    key: key.to_string(),
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }
}

fn merge_handoffs<I: PartialEq>(handoffs: Vec<Handoff<I>>) -> Vec<Handoff<I>> {
    let mut merged: Vec<Handoff<I>> = vec![];

    for handoff in handoffs {
        match merged.last_mut() {
            Some(current)
                if current.from == handoff.from
                    && current.to == handoff.to
                    && *current.hash_range.end() < u64::MAX
                    && *handoff.hash_range.start() == current.hash_range.end() + 1 =>
            {
                current.hash_range = *current.hash_range.start()..=*handoff.hash_range.end();
            }
            _ => merged.push(handoff),
        }
    }

    merged
}

fn intersect<T: Ord + Copy>(
    a: &RangeInclusive<T>,
    b: &RangeInclusive<T>,
) -> Option<RangeInclusive<T>> {
    let start = *a.start().max(b.start());
    let end = *a.end().min(b.end());

    if start <= end {
        Some(start..=end)
    } else {
        None
    }
}
