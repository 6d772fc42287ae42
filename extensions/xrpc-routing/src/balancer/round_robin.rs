use std::sync::atomic::{AtomicUsize, Ordering};

use xrpc::wire::RpcRequest;

use crate::balancer::LoadBalancer;

/// Incrementing cursor modulo the candidate count, shared across every call
/// routed through this balancer instance (not per service).
///
/// The cursor is reduced modulo the list length on each pick, so a list
/// that shrank between calls can never be indexed out of bounds.
pub struct RoundRobinBalancer {
    cursor: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        RoundRobinBalancer {
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn do_select(&self, candidates: &[String], _request: &RpcRequest) -> String {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates[index].clone()
    }
}
