//! brief example how NodeRegistry can be used to route requests within a cluster while
//! - nodes are added to the cluster
//! - nodes are removed from the cluster
//!
//! and how handoffs tell which keys have to be copied to their new owner

extern crate hashring_registry;

use hashring_registry::{HashRing, Node, NodeRegistry};
use rand::{Rng, distr::Alphanumeric};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::thread;

fn main() {
    tracing_subscriber::fmt::init();

    // amount of virtual nodes per node in the hashring
    // Higher number achieves a more evenly distribution of all keys on the hashring
    let num_replicas = 50;

    let mut cluster = Cluster::new(
        num_replicas,
        vec![
            node(1, "10.0.0.1:7000"),
            node(2, "10.0.0.2:7000"),
            node(3, "10.0.0.3:7000"),
            node(4, "10.0.0.4:7000"),
        ],
    );

    // store some random values in our cluster
    let mut known_keys = vec![];
    for _ in 0..10_000 {
        let value = random_string();
        let key = format!("key_{value}");
        known_keys.push(key.clone());
        cluster.post(key, value);
    }

    // route lookups from several threads at once, the registry is shared behind an Arc
    let routed = route_in_parallel(Arc::clone(&cluster.registry), &known_keys);
    println!("# routed {routed} lookups from 4 threads");

    println!("\n# distribution of keys across cluster");
    cluster.print_utilization();

    // keep a copy of the ring to learn which ranges move
    let previous = cluster.registry.snapshot();
    cluster.add_node(node(5, "10.0.0.5:7000"));
    println!(
        "\n# {} keys cannot be found until node5 is synchronized",
        cluster.missing(&known_keys)
    );

    cluster.rebalance(&previous);
    println!("\n# distribution of keys across cluster, after node5 was synchronized");
    cluster.print_utilization();
    assert_eq!(cluster.missing(&known_keys), 0);

    // handoffs are computed before the leaving node is dropped, so it can still serve its keys
    let previous = cluster.registry.snapshot();
    cluster.remove_node(2);
    cluster.rebalance(&previous);
    cluster.nodes.remove(&2);

    println!("\n# distribution of keys across cluster, after node2 left");
    cluster.print_utilization();
    assert_eq!(cluster.missing(&known_keys), 0);
}

fn node(id: u32, address: &str) -> Node<u32> {
    Node::new(id, format!("node{id}"), address)
}

fn route_in_parallel(registry: Arc<NodeRegistry<u32>>, keys: &[String]) -> usize {
    thread::scope(|scope| {
        let handles: Vec<_> = keys
            .chunks(keys.len().div_ceil(4))
            .map(|chunk| {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    chunk
                        .iter()
                        .filter(|key| registry.get_node(key).is_ok())
                        .count()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(0))
            .sum()
    })
}

/// struct Store represents a real server of our cluster. It will store and deliver key/value pairs
struct Store {
    data: HashMap<String, String>,
}

impl Store {
    fn new() -> Self {
        Store {
            data: HashMap::new(),
        }
    }

    /// returns all (key, value) pairs where hash(key) is included in hash_range
    fn fetch_range(
        &self,
        hash_range: &RangeInclusive<u64>,
        ring: &HashRing<u32>,
    ) -> Vec<(String, String)> {
        self.data
            .iter()
            .filter(|(key, _)| hash_range.contains(&ring.hash(key)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// struct Cluster routes post and get calls to the node owning a key
///
/// * `registry` - all live nodes and the ring built from them
/// * `nodes` - the actual servers of our cluster, these store all values
struct Cluster {
    registry: Arc<NodeRegistry<u32>>,
    nodes: HashMap<u32, Store>,
}

impl Cluster {
    fn new(num_replicas: usize, nodes: Vec<Node<u32>>) -> Self {
        let stores = nodes.iter().map(|node| (node.id, Store::new())).collect();
        let registry = NodeRegistry::new(nodes, num_replicas).expect("node ids are unique");

        Cluster {
            registry: Arc::new(registry),
            nodes: stores,
        }
    }

    fn add_node(&mut self, node: Node<u32>) {
        self.nodes.insert(node.id, Store::new());
        if let Err(err) = self.registry.register(node) {
            println!("error: {err}");
        }
    }

    fn remove_node(&mut self, id: u32) {
        if let Err(err) = self.registry.deregister(&id) {
            println!("error: {err}");
        }
    }

    /// simulate a http POST call to store a given key/value pair
    fn post(&mut self, key: String, value: String) {
        match self.registry.get_node(&key) {
            Ok(owner) => {
                self.nodes
                    .entry(owner.id)
                    .and_modify(|store| {
                        store.data.insert(key, value);
                    });
            }
            Err(err) => println!("error: {err}"),
        }
    }

    /// simulate a http GET call to retrieve the value for given key
    fn get(&self, key: &str) -> Option<&String> {
        let owner = self.registry.get_node(key).ok()?;
        self.nodes.get(&owner.id)?.data.get(key)
    }

    /// amount of keys their current owner cannot deliver
    fn missing(&self, keys: &[String]) -> usize {
        keys.iter().filter(|key| self.get(key).is_none()).count()
    }

    /// copy every key whose owner changed since `previous` to its new owner
    fn rebalance(&mut self, previous: &HashRing<u32>) {
        let ring = self.registry.snapshot();

        for handoff in ring.handoffs(previous) {
            let values = match self.nodes.get(&handoff.from.id) {
                Some(source) => source.fetch_range(&handoff.hash_range, &ring),
                None => continue,
            };

            if let Some(target) = self.nodes.get_mut(&handoff.to.id) {
                target.data.extend(values);
            }
        }
    }

    /// print for each node how many values are currently stored
    fn print_utilization(&self) {
        for node in self.registry.nodes() {
            let stored = self.nodes.get(&node.id).map_or(0, |store| store.data.len());
            println!("{} ({}) contains {stored} values", node.name, node.address);
        }
    }
}

/// generate a random String to test that our values are stored and moved correctly
fn random_string() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}
