use std::collections::HashSet;

use xrpc::wire::RpcRequest;
use xrpc_routing::{
    ConsistentHashBalancer, LoadBalancer, RandomBalancer, RoundRobinBalancer, RoutingError,
};

fn request(method: &str, param: &[u8]) -> RpcRequest {
    RpcRequest {
        request_id: "req-1".to_string(),
        service_name: "demo.Service".to_string(),
        service_version: "1.0".to_string(),
        method_name: method.to_string(),
        param_types: vec!["bytes".to_string()],
        params: vec![param.to_vec()],
    }
}

fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("10.0.0.{i}:7000")).collect()
}

#[test]
fn empty_candidates_are_rejected_by_every_strategy() {
    let req = request("m", b"p");
    let strategies: Vec<Box<dyn LoadBalancer>> = vec![
        Box::new(RandomBalancer),
        Box::new(RoundRobinBalancer::new()),
        Box::new(ConsistentHashBalancer::new()),
    ];
    for strategy in &strategies {
        assert_eq!(
            strategy.select(&[], &req),
            Err(RoutingError::EmptyCandidates)
        );
    }
}

#[test]
fn single_candidate_fast_path_for_every_strategy() {
    let req = request("m", b"p");
    let only = vec!["10.0.0.1:7000".to_string()];
    let strategies: Vec<Box<dyn LoadBalancer>> = vec![
        Box::new(RandomBalancer),
        Box::new(RoundRobinBalancer::new()),
        Box::new(ConsistentHashBalancer::new()),
    ];
    for strategy in &strategies {
        assert_eq!(
            strategy.select(&only, &req).expect("select failed"),
            "10.0.0.1:7000"
        );
    }
}

#[test]
fn random_stays_within_candidates() {
    let req = request("m", b"p");
    let candidates = addresses(5);
    let balancer = RandomBalancer;
    for _ in 0..100 {
        let picked = balancer.select(&candidates, &req).expect("select failed");
        assert!(candidates.contains(&picked));
    }
}

#[test]
fn round_robin_cycles_in_order() {
    let req = request("m", b"p");
    let candidates = addresses(3);
    let balancer = RoundRobinBalancer::new();

    let picks: Vec<String> = (0..6)
        .map(|_| balancer.select(&candidates, &req).expect("select failed"))
        .collect();
    assert_eq!(
        picks,
        vec![
            "10.0.0.0:7000",
            "10.0.0.1:7000",
            "10.0.0.2:7000",
            "10.0.0.0:7000",
            "10.0.0.1:7000",
            "10.0.0.2:7000",
        ]
    );
}

#[test]
fn round_robin_survives_a_shrinking_list() {
    let req = request("m", b"p");
    let balancer = RoundRobinBalancer::new();

    let five = addresses(5);
    for _ in 0..4 {
        balancer.select(&five, &req).expect("select failed");
    }
    // The cursor is past the end of the shrunken list; the pick must still
    // land inside it.
    let two = addresses(2);
    for _ in 0..5 {
        let picked = balancer.select(&two, &req).expect("select failed");
        assert!(two.contains(&picked));
    }
}

#[test]
fn consistent_hash_is_stable_for_a_fixed_topology() {
    let candidates = addresses(4);
    let balancer = ConsistentHashBalancer::new();

    for key in 0..50u8 {
        let req = request("m", &[key]);
        let first = balancer.select(&candidates, &req).expect("select failed");
        for _ in 0..10 {
            let again = balancer.select(&candidates, &req).expect("select failed");
            assert_eq!(again, first, "key {key} moved under a fixed topology");
        }
    }
}

#[test]
fn consistent_hash_routes_different_methods_independently() {
    let candidates = addresses(8);
    let balancer = ConsistentHashBalancer::new();

    let picked: HashSet<String> = (0..200u32)
        .map(|i| {
            let req = request("m", &i.to_be_bytes());
            balancer.select(&candidates, &req).expect("select failed")
        })
        .collect();
    // 200 distinct keys across 8 nodes with 160 virtual nodes each should
    // reach most of the cluster.
    assert!(picked.len() > 4, "only {} nodes reached", picked.len());
}

#[test]
fn removing_a_node_only_moves_its_own_keys() {
    let full = addresses(5);
    let balancer = ConsistentHashBalancer::new();

    let keys: Vec<Vec<u8>> = (0..300u32).map(|i| i.to_be_bytes().to_vec()).collect();
    let before: Vec<String> = keys
        .iter()
        .map(|k| {
            balancer
                .select(&full, &request("m", k))
                .expect("select failed")
        })
        .collect();

    let removed = "10.0.0.2:7000".to_string();
    let reduced: Vec<String> = full.iter().filter(|a| **a != removed).cloned().collect();

    for (key, old) in keys.iter().zip(&before) {
        let new = balancer
            .select(&reduced, &request("m", key))
            .expect("select failed");
        if *old != removed {
            assert_eq!(new, *old, "key not owned by the removed node moved");
        } else {
            assert_ne!(new, removed);
        }
    }
}
