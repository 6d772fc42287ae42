use std::fmt;

/// Errors surfaced by discovery lookup and address selection.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// Discovery returned no addresses for the requested service key.
    ServiceNotFound { service_key: String },
    /// A balancer was handed an empty candidate list.
    EmptyCandidates,
    /// A backend failure in the discovery implementation itself.
    Backend(String),
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::ServiceNotFound { service_key } => {
                write!(f, "no provider found for service: {service_key}")
            }
            RoutingError::EmptyCandidates => write!(f, "empty candidate address list"),
            RoutingError::Backend(reason) => write!(f, "discovery backend error: {reason}"),
        }
    }
}

impl std::error::Error for RoutingError {}
