use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::info;

use crate::RoutingError;

/// The registry capability the transport consumes.
///
/// How addresses are published and watched belongs to the backend behind
/// this trait; the client engine only ever asks for the ordered candidate
/// list of a service key, and a server registers its own keys on startup.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Ordered `host:port` candidates currently providing `service_key`.
    /// An empty result is reported as [`RoutingError::ServiceNotFound`].
    async fn lookup(&self, service_key: &str) -> Result<Vec<String>, RoutingError>;

    async fn register(&self, service_key: &str, address: &str) -> Result<(), RoutingError>;

    /// Removes `address` from every service key it was registered under.
    async fn unregister(&self, address: &str) -> Result<(), RoutingError>;
}

/// In-memory discovery table. The reference implementation used by tests
/// and by deployments with a fixed topology.
pub struct StaticDiscovery {
    providers: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        StaticDiscovery {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Convenience constructor seeding one service key.
    pub fn with_service(service_key: impl Into<String>, addresses: Vec<String>) -> Self {
        let discovery = StaticDiscovery::new();
        discovery
            .providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(service_key.into(), addresses);
        discovery
    }
}

impl Default for StaticDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn lookup(&self, service_key: &str) -> Result<Vec<String>, RoutingError> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        match providers.get(service_key) {
            Some(addresses) if !addresses.is_empty() => Ok(addresses.clone()),
            _ => Err(RoutingError::ServiceNotFound {
                service_key: service_key.to_string(),
            }),
        }
    }

    async fn register(&self, service_key: &str, address: &str) -> Result<(), RoutingError> {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        let addresses = providers.entry(service_key.to_string()).or_default();
        if !addresses.iter().any(|a| a == address) {
            addresses.push(address.to_string());
        }
        info!(service_key, address, "registered service provider");
        Ok(())
    }

    async fn unregister(&self, address: &str) -> Result<(), RoutingError> {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        for addresses in providers.values_mut() {
            addresses.retain(|a| a != address);
        }
        providers.retain(|_, addresses| !addresses.is_empty());
        info!(address, "unregistered service provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_of_unknown_service_fails() {
        let discovery = StaticDiscovery::new();
        assert_eq!(
            discovery.lookup("missing").await,
            Err(RoutingError::ServiceNotFound {
                service_key: "missing".to_string()
            })
        );
    }

    #[tokio::test]
    async fn register_then_unregister_round_trip() {
        let discovery = StaticDiscovery::new();
        discovery
            .register("svc#1.0", "127.0.0.1:7001")
            .await
            .expect("register failed");
        discovery
            .register("svc#1.0", "127.0.0.1:7002")
            .await
            .expect("register failed");

        let found = discovery.lookup("svc#1.0").await.expect("lookup failed");
        assert_eq!(found, vec!["127.0.0.1:7001", "127.0.0.1:7002"]);

        discovery
            .unregister("127.0.0.1:7001")
            .await
            .expect("unregister failed");
        let found = discovery.lookup("svc#1.0").await.expect("lookup failed");
        assert_eq!(found, vec!["127.0.0.1:7002"]);
    }
}
