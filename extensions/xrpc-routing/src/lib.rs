mod balancer;
mod discovery;
mod error;

pub use balancer::{ConsistentHashBalancer, LoadBalancer, RandomBalancer, RoundRobinBalancer};
pub use discovery::{ServiceDiscovery, StaticDiscovery};
pub use error::RoutingError;
