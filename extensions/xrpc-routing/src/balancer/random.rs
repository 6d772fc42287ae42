use rand::Rng;
use xrpc::wire::RpcRequest;

use crate::balancer::LoadBalancer;

/// Uniform random pick over the candidate list.
pub struct RandomBalancer;

impl LoadBalancer for RandomBalancer {
    fn do_select(&self, candidates: &[String], _request: &RpcRequest) -> String {
        let index = rand::rng().random_range(0..candidates.len());
        candidates[index].clone()
    }
}
