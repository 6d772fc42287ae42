use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing::debug;
use xrpc::wire::RpcRequest;
use xxhash_rust::xxh3::{xxh3_64, xxh3_128};

use crate::balancer::LoadBalancer;

/// Virtual nodes placed on the ring for each real address. 160 positions
/// per address, generated four at a time from 128-bit digests.
const REPLICA_COUNT: usize = 160;

/// Consistent hashing with virtual nodes.
///
/// One selector (ring) is cached per service key and rebuilt only when the
/// candidate list changes, detected through a cheap 64-bit fingerprint of
/// the list rather than deep comparison on every call. Rebuilding per call
/// would cost O(replicas x nodes) per request instead of amortized O(1).
///
/// A replaced selector is built off to the side and swapped in whole, so
/// concurrent readers never observe a partially-updated ring.
pub struct ConsistentHashBalancer {
    selectors: Mutex<HashMap<String, Arc<Selector>>>,
}

struct Selector {
    /// Ring position -> owning address.
    ring: BTreeMap<u32, String>,
    /// Fingerprint of the candidate list this ring was built from.
    fingerprint: u64,
}

impl Selector {
    fn build(candidates: &[String], fingerprint: u64) -> Self {
        let mut ring = BTreeMap::new();
        for address in candidates {
            for replica in 0..REPLICA_COUNT / 4 {
                // One 128-bit digest yields four 32-bit ring positions.
                let digest = xxh3_128(format!("{address}{replica}").as_bytes());
                for part in 0..4 {
                    let position = (digest >> (32 * part)) as u32;
                    ring.insert(position, address.clone());
                }
            }
        }
        Selector { ring, fingerprint }
    }

    /// Smallest ring position >= `hash`, wrapping to the smallest position
    /// overall when none is. The ring is never empty for the non-empty
    /// candidate lists `select` admits.
    fn select(&self, hash: u32) -> String {
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, address)| address.clone())
            .unwrap_or_default()
    }
}

impl ConsistentHashBalancer {
    pub fn new() -> Self {
        ConsistentHashBalancer {
            selectors: Mutex::new(HashMap::new()),
        }
    }

    fn fingerprint(candidates: &[String]) -> u64 {
        let mut joined = Vec::new();
        for address in candidates {
            joined.extend_from_slice(address.as_bytes());
            joined.push(0);
        }
        xxh3_64(&joined)
    }

    fn call_key(request: &RpcRequest) -> Vec<u8> {
        let mut key = Vec::new();
        key.extend_from_slice(request.service_key().as_bytes());
        key.extend_from_slice(request.method_name.as_bytes());
        for param in &request.params {
            key.extend_from_slice(param);
        }
        key
    }

    fn selector_for(&self, service_key: &str, candidates: &[String]) -> Arc<Selector> {
        let fingerprint = Self::fingerprint(candidates);
        let mut selectors = self.selectors.lock().unwrap_or_else(|e| e.into_inner());
        match selectors.get(service_key) {
            Some(selector) if selector.fingerprint == fingerprint => selector.clone(),
            _ => {
                debug!(service_key, "rebuilding consistent hash ring");
                let selector = Arc::new(Selector::build(candidates, fingerprint));
                selectors.insert(service_key.to_string(), selector.clone());
                selector
            }
        }
    }
}

impl Default for ConsistentHashBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for ConsistentHashBalancer {
    fn do_select(&self, candidates: &[String], request: &RpcRequest) -> String {
        let selector = self.selector_for(&request.service_key(), candidates);
        let hash = xxh3_128(&Self::call_key(request)) as u32;
        selector.select(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{i}:7000")).collect()
    }

    #[test]
    fn selector_is_reused_while_candidates_are_unchanged() {
        let balancer = ConsistentHashBalancer::new();
        let candidates = addresses(3);

        let first = balancer.selector_for("svc#1.0", &candidates);
        for _ in 0..10 {
            let again = balancer.selector_for("svc#1.0", &candidates);
            assert!(Arc::ptr_eq(&first, &again), "ring rebuilt without a topology change");
        }
    }

    #[test]
    fn selector_is_rebuilt_when_candidates_change() {
        let balancer = ConsistentHashBalancer::new();
        let full = addresses(3);
        let reduced = addresses(2);

        let before = balancer.selector_for("svc#1.0", &full);
        let shrunk = balancer.selector_for("svc#1.0", &reduced);
        assert!(!Arc::ptr_eq(&before, &shrunk));

        let restored = balancer.selector_for("svc#1.0", &full);
        assert!(!Arc::ptr_eq(&shrunk, &restored));
        assert_eq!(restored.fingerprint, before.fingerprint);
    }

    #[test]
    fn selectors_are_cached_per_service_key() {
        let balancer = ConsistentHashBalancer::new();
        let candidates = addresses(3);

        let a = balancer.selector_for("svc-a#1.0", &candidates);
        let b = balancer.selector_for("svc-b#1.0", &candidates);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &balancer.selector_for("svc-a#1.0", &candidates)));
    }
}
