pub mod error;
pub mod types;

pub use error::{RegistryError, Result, StoreError, StoreResult};
pub use types::{Worker, WorkerLookupPage, WorkerRetrieval, WorkerStatus};
