//! basic example to showcase the main functions of HashRing

extern crate hashring_registry;

use hashring_registry::{HashRing, Node};

fn main() {
    tracing_subscriber::fmt::init();

    let nodes = vec![
        Node::new(1u64, "node1", "192.168.1.1"),
        Node::new(2u64, "node2", "192.169.1.1"),
        Node::new(3u64, "node3", "192.170.1.1"),
    ];

    // a ring with 100 virtual nodes per node
    let mut ring = HashRing::with_nodes(nodes, 100).expect("node ids are unique");

    let data_points: Vec<String> = (0..10).map(|i| format!("data{i}")).collect();

    println!("Initial mapping of data points to nodes");
    let mut initial_mapping = vec![];
    for data_point in &data_points {
        let node = ring.get_node(data_point).expect("ring has nodes");
        println!("{data_point}: {node}");
        initial_mapping.push(node.clone());
    }

    // keep a copy of the ring to compare it with the ring after the change
    let previous = ring.clone();

    ring.add_node(Node::new(4, "node4", "192.171.1.1"))
        .expect("node4 is new");
    ring.add_node(Node::new(5, "node5", "192.172.1.1"))
        .expect("node5 is new");

    println!("\nMapping of data points to nodes after adding 2 new nodes");
    for data_point in &data_points {
        println!("{data_point}: {}", ring.get_node(data_point).expect("ring has nodes"));
    }

    let remapped = ring.reassignments(&previous, data_points.as_slice());
    println!(
        "\nNumber of data points remapped to a different node: {}",
        remapped.len()
    );

    // return up to 3 distinct nodes that should store the key 'foo'
    let replicas: Vec<String> = ring
        .get_nodes("foo", 3)
        .iter()
        .map(|node| node.name.clone())
        .collect();
    println!("\nnodes for key foo: {replicas:?}");

    println!("\nshare of the hash space per node:");
    for (id, share) in ring.load() {
        println!("node{id}: {:.1}%", share * 100.0);
    }
}
