mod consistent_hash;
mod random;
mod round_robin;

pub use consistent_hash::ConsistentHashBalancer;
pub use random::RandomBalancer;
pub use round_robin::RoundRobinBalancer;

use xrpc::wire::RpcRequest;

use crate::RoutingError;

/// Selects one address from the candidate list returned by discovery.
///
/// `select` is the entry point: it rejects empty lists and short-circuits
/// single-candidate lists without consulting the strategy, which both
/// avoids needless work and keeps consistent hashing deterministic under
/// trivial topologies. Strategies only ever see lists of two or more.
pub trait LoadBalancer: Send + Sync {
    fn do_select(&self, candidates: &[String], request: &RpcRequest) -> String;

    fn select(&self, candidates: &[String], request: &RpcRequest) -> Result<String, RoutingError> {
        match candidates {
            [] => Err(RoutingError::EmptyCandidates),
            [only] => Ok(only.clone()),
            _ => Ok(self.do_select(candidates, request)),
        }
    }
}
