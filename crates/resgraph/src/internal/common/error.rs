use thiserror::Error;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum RgError {
    #[error("No feasible match: {0}")]
    NoFeasibleMatch(String),
    #[error("Request can never be satisfied: {0}")]
    Unsatisfiable(String),
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("Inconsistent release: {0}")]
    InconsistentRelease(String),
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Graph error: {0}")]
    GraphError(String),
    #[error("Match was prepared against generation {prepared}, graph is at {current}")]
    StaleMatch { prepared: u64, current: u64 },
    #[error("Match was cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl RgError {
    /// Errors that are part of normal scheduling (the caller may retry later or with a
    /// different request), as opposed to caller bugs or broken invariants.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RgError::NoFeasibleMatch(_) | RgError::StaleMatch { .. })
    }
}

impl From<toml::de::Error> for RgError {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<String> for RgError {
    fn from(e: String) -> Self {
        Self::GenericError(e)
    }
}

impl From<&str> for RgError {
    fn from(e: &str) -> Self {
        Self::GenericError(e.to_string())
    }
}
