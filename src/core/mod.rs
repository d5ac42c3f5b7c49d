pub mod error;
pub mod types;

pub use error::{DeployError, FatalError, Result, StoreError};
pub use types::{BuildInfo, HostId, PartitionId, PartitionSet};
