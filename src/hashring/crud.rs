use std::fmt::Display;

use tracing::{debug, warn};

use super::HashRing;
use crate::error::{Error, PositionCollision};
use crate::hash::KeyHasher;
use crate::node::Node;

impl<I, H> HashRing<I, H>
where
    I: Clone + Ord + Display,
    H: KeyHasher,
{
    /// Add `node` to the hash ring as `num_replicas` virtual nodes.
    ///
    /// A position already taken by another virtual node is handed to `node` and reported in the
    /// returned list; the call still succeeds.
    ///
    /// Fails with [`Error::DuplicateNode`] if a node with the same id is on the ring.
    pub fn add_node(&mut self, node: Node<I>) -> Result<Vec<PositionCollision<I>>, Error> {
        if self.nodes.contains_key(&node.id) {
            return Err(Error::DuplicateNode {
                id: node.id.to_string(),
            });
        }

        // hash every replica before the ring is touched
        let placed = self.virtual_positions(&node.id);
        self.owners.reserve(placed.len());
        self.positions.reserve(placed.len());

        let mut collisions = vec![];
        let mut fresh = Vec::with_capacity(placed.len());

        for (replica, position) in placed.into_iter().enumerate() {
            match self.owners.insert(position, node.clone()) {
                None => fresh.push(position),
                Some(previous) => {
                    warn!(
                        position,
                        replica,
                        id = %node.id,
                        previous = %previous.id,
                        "virtual node position collision, slot taken over"
                    );
                    collisions.push(PositionCollision {
                        position,
                        replica,
                        previous,
                    });
                }
            }
        }

        self.merge_positions(fresh);

        debug!(
            id = %node.id,
            replicas = self.num_replicas,
            collisions = collisions.len(),
            "added node to ring"
        );
        self.nodes.insert(node.id.clone(), node);

        Ok(collisions)
    }

    /// Add all `nodes` in order, stopping at the first duplicate.
    pub fn batch_add(&mut self, nodes: Vec<Node<I>>) -> Result<Vec<PositionCollision<I>>, Error> {
        let mut collisions = vec![];
        for node in nodes {
            collisions.extend(self.add_node(node)?);
        }
        Ok(collisions)
    }

    /// Remove the node with `id` and every slot it still owns.
    ///
    /// Positions are recomputed from the id. A slot that another node took over through a
    /// collision is left alone.
    ///
    /// Fails with [`Error::UnknownNode`] if no node with `id` is on the ring.
    pub fn remove_node(&mut self, id: &I) -> Result<Node<I>, Error> {
        let Some(node) = self.nodes.remove(id) else {
            return Err(Error::UnknownNode { id: id.to_string() });
        };

        let mut vacated = vec![];
        for position in self.virtual_positions(id) {
            if self.owners.get(&position).is_some_and(|owner| owner.id == *id) {
                self.owners.remove(&position);
                vacated.push(position);
            }
        }

        vacated.sort_unstable();
        self.positions
            .retain(|position| vacated.binary_search(position).is_err());

        debug!(
            %id,
            vacated = vacated.len(),
            lost = self.num_replicas - vacated.len(),
            "removed node from ring"
        );

        Ok(node)
    }

    /// Returns the node owning `key`: the owner of the first position `>= hash(key)`,
    /// wrapping around to the smallest position.
    ///
    /// Fails with [`Error::EmptyRing`] if no virtual node is on the ring.
    pub fn get_node(&self, key: &str) -> Result<&Node<I>, Error> {
        self.get_node_by_hash(self.hash(key))
    }

    /// Same as [`HashRing::get_node`] for an already hashed key.
    pub fn get_node_by_hash(&self, hash: u64) -> Result<&Node<I>, Error> {
        let index = self.slot_for(hash).ok_or(Error::EmptyRing)?;
        Ok(&self.owners[&self.positions[index]])
    }

    /// Returns up to `count` distinct nodes for `key`, walking clockwise from its position.
    ///
    /// The first node is the one [`HashRing::get_node`] returns. Returns an empty list if the
    /// ring is empty; asking for more nodes than the ring holds returns all of them.
    pub fn get_nodes(&self, key: &str, count: usize) -> Vec<&Node<I>> {
        let limit = count.min(self.nodes.len());
        let Some(start) = self.slot_for(self.hash(key)) else {
            return vec![];
        };
        if limit == 0 {
            return vec![];
        }

        let (before, after) = self.positions.split_at(start);
        let mut found: Vec<&Node<I>> = Vec::with_capacity(limit);

        for position in after.iter().chain(before) {
            let owner = &self.owners[position];
            if !found.contains(&owner) {
                found.push(owner);

                if found.len() == limit {
                    break;
                }
            }
        }

        found
    }

    // index into `positions` of the slot owning `hash`
    fn slot_for(&self, hash: u64) -> Option<usize> {
        if self.positions.is_empty() {
            return None;
        }

        match self.positions.partition_point(|position| *position < hash) {
            n if n == self.positions.len() => Some(0),
            n => Some(n),
        }
    }

    // `fresh` holds positions absent from the ring
    fn merge_positions(&mut self, mut fresh: Vec<u64>) {
        fresh.sort_unstable();

        let mut merged = Vec::with_capacity(self.positions.len() + fresh.len());
        let mut fresh = fresh.into_iter().peekable();

        for position in self.positions.drain(..) {
            while let Some(next) = fresh.next_if(|next| *next < position) {
                merged.push(next);
            }
            merged.push(position);
        }
        merged.extend(fresh);

        self.positions = merged;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::HashRing;
    use crate::error::Error;
    use crate::node::Node;

    fn node(id: u64) -> Node<u64> {
        Node::new(id, format!("node{id}"), format!("192.168.1.{id}"))
    }

    fn sum_of_bytes(key: &str) -> u64 {
        key.bytes().map(u64::from).sum::<u64>() % 1000
    }

    // one replica per node: node1 @100, node2 @200, numeric keys hash to themselves
    fn fixed(key: &str) -> u64 {
        match key {
            "1_0" => 100,
            "2_0" => 200,
            other => other.parse().unwrap_or(0),
        }
    }

    type StubRing = HashRing<u64, fn(&str) -> u64>;

    // node k places replica i at 191+k+i (i < 10) and 239+k+a+b (i = 10a+b), so with
    // last-write-wins the ring is 192:A 193:B 194..=203:C 241:A 242:B 243..=260:C
    fn abc_ring() -> StubRing {
        HashRing::with_nodes_and_hasher(
            vec![node(1), node(2), node(3)],
            100,
            sum_of_bytes as fn(&str) -> u64,
        )
        .unwrap()
    }

    fn random_keys(seed: u64, count: usize) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| format!("key_{}", rng.random::<u64>()))
            .collect()
    }

    fn owners(ring: &HashRing<u64>, keys: &[String]) -> Vec<u64> {
        keys.iter()
            .map(|key| ring.get_node(key).unwrap().id)
            .collect()
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut ring: HashRing<u64> = HashRing::new(10);

        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());

        ring.add_node(node(1)).unwrap();
        ring.add_node(node(2)).unwrap();
        ring.add_node(node(3)).unwrap();
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.vlen(), 30);
        assert!(!ring.is_empty());

        let removed = ring.remove_node(&2).unwrap();
        assert_eq!(removed.name, "node2");
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.vlen(), 20);
        assert!(!ring.contains(&2));

        ring.batch_add(vec![node(4), node(5), node(6)]).unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.vlen(), 50);

        let ids: Vec<u64> = ring.nodes().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 5, 6]);
    }

    #[test]
    fn positions_stay_sorted_and_match_owners() {
        let mut ring: HashRing<u64> = HashRing::new(50);
        for id in 0..20 {
            ring.add_node(node(id)).unwrap();
        }
        for id in (0..20).step_by(3) {
            ring.remove_node(&id).unwrap();
        }

        let positions = ring.positions();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(positions.len(), ring.owners.len());
        assert!(positions.iter().all(|p| ring.owner_at(*p).is_some()));
        assert!(ring.iter().all(|vnode| ring.contains(&vnode.node.id)));
    }

    #[test]
    fn duplicate_and_unknown_nodes_are_rejected() {
        let mut ring: HashRing<u64> = HashRing::new(10);
        ring.add_node(node(1)).unwrap();

        let renamed = Node::new(1, "other", "10.0.0.1");
        assert_eq!(
            ring.add_node(renamed),
            Err(Error::DuplicateNode { id: "1".into() })
        );
        assert_eq!(ring.vlen(), 10);
        assert_eq!(ring.node(&1).unwrap().address, "192.168.1.1");

        assert_eq!(
            ring.remove_node(&9),
            Err(Error::UnknownNode { id: "9".into() })
        );
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn with_nodes_stops_at_duplicate() {
        let result = HashRing::with_nodes(vec![node(1), node(2), node(1)], 10);

        assert_eq!(result.unwrap_err(), Error::DuplicateNode { id: "1".into() });
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring: HashRing<u64> = HashRing::with_nodes(vec![], 100).unwrap();

        assert_eq!(ring.get_node("data0"), Err(Error::EmptyRing));
        assert!(ring.get_nodes("data0", 3).is_empty());

        let mut ring = ring;
        ring.add_node(node(1)).unwrap();
        ring.remove_node(&1).unwrap();
        assert_eq!(ring.get_node("data0"), Err(Error::EmptyRing));
    }

    #[test]
    fn zero_replicas_is_raised_to_one() {
        let mut ring: HashRing<u64> = HashRing::new(0);
        ring.add_node(node(1)).unwrap();

        assert_eq!(ring.num_replicas(), 1);
        assert_eq!(ring.vlen(), 1);
        assert_eq!(ring.get_node("anything").unwrap().id, 1);
    }

    #[test]
    fn key_on_a_position_belongs_to_that_position() {
        let ring: StubRing =
            HashRing::with_nodes_and_hasher(vec![node(1), node(2)], 1, fixed as fn(&str) -> u64)
                .unwrap();

        assert_eq!(ring.positions(), &[100, 200]);

        assert_eq!(ring.get_node("0").unwrap().id, 1);
        assert_eq!(ring.get_node("99").unwrap().id, 1);
        assert_eq!(ring.get_node("100").unwrap().id, 1);
        assert_eq!(ring.get_node("101").unwrap().id, 2);
        assert_eq!(ring.get_node("200").unwrap().id, 2);
    }

    #[test]
    fn keys_past_the_last_position_wrap_around() {
        let ring: StubRing =
            HashRing::with_nodes_and_hasher(vec![node(1), node(2)], 1, fixed as fn(&str) -> u64)
                .unwrap();

        assert_eq!(ring.get_node("201").unwrap().id, 1);
        assert_eq!(ring.get_node(&u64::MAX.to_string()).unwrap().id, 1);
        assert_eq!(ring.get_node_by_hash(u64::MAX).unwrap().id, 1);
    }

    #[test]
    fn sum_of_bytes_layout() {
        let ring = abc_ring();

        let expected: Vec<u64> = (192..=203).chain(241..=260).collect();
        assert_eq!(ring.positions(), expected.as_slice());
        assert_eq!(ring.vlen(), 32);

        assert_eq!(ring.owner_at(192).unwrap().id, 1);
        assert_eq!(ring.owner_at(193).unwrap().id, 2);
        assert_eq!(ring.owner_at(200).unwrap().id, 3);
        assert_eq!(ring.owner_at(241).unwrap().id, 1);
        assert_eq!(ring.owner_at(242).unwrap().id, 2);
        assert_eq!(ring.owner_at(260).unwrap().id, 3);

        assert_eq!(ring.get_node("data0").unwrap().id, 1); // 458, wraps to 192
        assert_eq!(ring.get_node("``").unwrap().id, 1); // 192
        assert_eq!(ring.get_node("a`").unwrap().id, 2); // 193
        assert_eq!(ring.get_node("dd").unwrap().id, 3); // 200
        assert_eq!(ring.get_node("ff").unwrap().id, 1); // 204, next is 241
        assert_eq!(ring.get_node("yy").unwrap().id, 2); // 242
        assert_eq!(ring.get_node("WWW").unwrap().id, 1); // 261, wraps to 192
    }

    #[test]
    fn identical_inputs_build_identical_rings() {
        let first = abc_ring();
        let second = abc_ring();

        assert_eq!(first.positions(), second.positions());
        assert_eq!(
            first.get_node("data0").unwrap(),
            second.get_node("data0").unwrap()
        );

        let a: HashRing<u64> = HashRing::with_nodes(vec![node(1), node(2), node(3)], 100).unwrap();
        let b: HashRing<u64> = HashRing::with_nodes(vec![node(1), node(2), node(3)], 100).unwrap();
        assert_eq!(a, b);
        for key in random_keys(7, 1000) {
            assert_eq!(a.get_node(&key).unwrap(), b.get_node(&key).unwrap());
        }
    }

    #[test]
    fn collisions_are_reported_and_last_write_wins() {
        let mut ring: StubRing = HashRing::with_hasher(100, sum_of_bytes as fn(&str) -> u64);

        // 100 labels of node1 fall on 28 distinct positions
        let collisions = ring.add_node(node(1)).unwrap();
        assert_eq!(collisions.len(), 72);
        assert!(collisions.iter().all(|c| c.previous.id == 1));

        // node2 only brings 202 and 259
        let collisions = ring.add_node(node(2)).unwrap();
        assert_eq!(collisions.len(), 98);
        assert_eq!(collisions[1].position, 194);
        assert_eq!(collisions[1].replica, 1);
        assert_eq!(collisions[1].previous.id, 1);
        assert_eq!(ring.owner_at(194).unwrap().id, 2);

        let collisions = ring.add_node(node(3)).unwrap();
        assert_eq!(collisions.len(), 98);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn removing_a_node_leaves_slots_it_lost_alone() {
        let mut ring = abc_ring();

        ring.remove_node(&3).unwrap();
        assert_eq!(ring.positions(), &[192, 193, 241, 242]);
        assert_eq!(ring.get_node("dd").unwrap().id, 1); // 200, next is 241

        ring.remove_node(&2).unwrap();
        assert_eq!(ring.positions(), &[192, 241]);
        assert!(ring.iter().all(|vnode| vnode.node.id == 1));

        ring.remove_node(&1).unwrap();
        assert!(ring.positions().is_empty());
        assert!(ring.is_empty());
    }

    #[test]
    fn add_then_remove_restores_the_ring() {
        let mut ring: HashRing<u64> = HashRing::with_nodes(vec![node(1), node(2), node(3)], 100).unwrap();
        let before = ring.clone();
        let keys = random_keys(1, 2000);
        let owners_before = owners(&ring, &keys);

        ring.add_node(node(4)).unwrap();
        assert_ne!(ring, before);

        ring.remove_node(&4).unwrap();
        assert_eq!(ring, before);
        assert_eq!(owners(&ring, &keys), owners_before);
    }

    #[test]
    fn lookups_are_deterministic_and_hit_registered_nodes() {
        let mut ring: HashRing<u64> = HashRing::with_nodes((1..=5).map(node).collect(), 100).unwrap();
        ring.remove_node(&3).unwrap();

        for key in random_keys(3, 5000) {
            let owner = ring.get_node(&key).unwrap();
            assert!(ring.contains(&owner.id), "{key} mapped to removed {owner}");
            assert_eq!(ring.get_node(&key).unwrap(), owner);
        }
    }

    #[test]
    fn every_node_gets_keys() {
        let ring: HashRing<u64> = HashRing::with_nodes((1..=6).map(node).collect(), 100).unwrap();

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for key in random_keys(11, 60_000) {
            *counts.entry(ring.get_node(&key).unwrap().id).or_default() += 1;
        }

        println!("{counts:?}");
        assert_eq!(counts.len(), 6);
        // 10_000 per node on average
        assert!(counts.values().all(|c| *c > 5_000 && *c < 15_000));
    }

    #[test]
    fn adding_a_node_moves_about_one_share_of_keys() {
        let key_count = 10_000;
        let mut total_moved = 0;

        for seed in 0..5u64 {
            let ids: Vec<u64> = (0..10).map(|n| seed * 100 + n).collect();
            let mut ring: HashRing<u64> =
                HashRing::with_nodes(ids.into_iter().map(node).collect(), 100).unwrap();
            let keys = random_keys(seed, key_count);
            let before = owners(&ring, &keys);

            let joined = seed * 100 + 50;
            ring.add_node(node(joined)).unwrap();
            let after = owners(&ring, &keys);

            let moved: Vec<(u64, u64)> = before
                .into_iter()
                .zip(after)
                .filter(|(old, new)| old != new)
                .collect();

            // only the new node gains keys
            assert!(moved.iter().all(|(_, new)| *new == joined));
            // about key_count / 11, never the whole keyspace
            assert!(moved.len() > 400 && moved.len() < 1_600, "{}", moved.len());
            total_moved += moved.len();
        }

        let expected = 5 * key_count / 11;
        assert!(total_moved > expected * 7 / 10 && total_moved < expected * 13 / 10);
    }

    #[test]
    fn removing_a_node_only_moves_its_keys() {
        let mut ring: HashRing<u64> = HashRing::with_nodes((1..=8).map(node).collect(), 100).unwrap();
        let keys = random_keys(5, 5000);
        let before = owners(&ring, &keys);

        ring.remove_node(&4).unwrap();
        let after = owners(&ring, &keys);

        for (old, new) in before.iter().zip(after.iter()) {
            if old != new {
                assert_eq!(*old, 4);
            }
            assert_ne!(*new, 4);
        }
    }

    #[test]
    fn get_nodes_returns_distinct_nodes_clockwise() {
        let ring: StubRing = HashRing::with_nodes_and_hasher(
            vec![node(1), node(2)],
            1,
            fixed as fn(&str) -> u64,
        )
        .unwrap();

        let ids = |key: &str, count: usize| -> Vec<u64> {
            ring.get_nodes(key, count).iter().map(|n| n.id).collect()
        };

        assert_eq!(ids("150", 1), vec![2]);
        assert_eq!(ids("150", 2), vec![2, 1]);
        assert_eq!(ids("250", 2), vec![1, 2]);
        assert_eq!(ids("250", 20), vec![1, 2], "count shrinks to ring length");
        assert!(ids("250", 0).is_empty());
    }

    #[test]
    fn get_nodes_starts_with_get_node() {
        let ring: HashRing<u64> = HashRing::with_nodes((1..=6).map(node).collect(), 100).unwrap();

        for key in random_keys(2, 500) {
            let nodes = ring.get_nodes(&key, 3);
            assert_eq!(nodes.len(), 3);
            assert_eq!(nodes[0], ring.get_node(&key).unwrap());
            assert_ne!(nodes[0], nodes[1]);
            assert_ne!(nodes[1], nodes[2]);
            assert_ne!(nodes[0], nodes[2]);
        }
    }
}
