use thiserror::Error;

/// Recoverable deployment compilation failures.
///
/// The compiler reports the first violated rule; the caller decides whether
/// the message is shown or escalated to a [`FatalError::Deployment`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("Error parsing deployment file: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, DeployError>;

/// Outcomes that the node's startup sequence must turn into termination.
///
/// Nothing in this crate exits the process; the binary does that after
/// printing the diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("Cannot retrieve topology information: {0}")]
    Topology(String),

    #[error(
        "The cluster already has enough nodes to satisfy the requested k-safety factor of {replication_factor}.\nNo more nodes can join."
    )]
    Capacity { replication_factor: u32 },

    #[error("Deployment failed: {0}")]
    Deployment(String),
}

impl FatalError {
    /// Process exit code the startup sequence uses for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Topology(_) => 2,
            FatalError::Capacity { .. } => 3,
            FatalError::Deployment(_) => 4,
        }
    }
}

impl From<DeployError> for FatalError {
    fn from(err: DeployError) -> Self {
        FatalError::Deployment(err.to_string())
    }
}

/// Errors raised by external collaborators (coordination store, live authority).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Authority error: {0}")]
    Authority(String),
}

impl From<StoreError> for FatalError {
    fn from(err: StoreError) -> Self {
        FatalError::Topology(err.to_string())
    }
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_marker() {
        let err = DeployError::Parse("heartbeat timeout must be > 0".into());
        assert!(err.to_string().contains("Error parsing deployment file"));
    }

    #[test]
    fn test_capacity_names_replication_factor() {
        let err = FatalError::Capacity { replication_factor: 2 };
        assert!(err.to_string().contains("k-safety factor of 2"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_store_error_becomes_topology_fatal() {
        let fatal: FatalError = StoreError::Unavailable("zk down".into()).into();
        assert!(matches!(fatal, FatalError::Topology(_)));
    }
}
