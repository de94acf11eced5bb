//! Record storage used by the service and the CLI.

mod memory;
mod snapshot;

pub use memory::{MemoryRepository, RepositoryState};
pub use snapshot::Snapshot;
