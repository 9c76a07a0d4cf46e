pub mod command;
pub mod engine;
pub mod lookup;

pub use command::{RegistryCommand, RegistryFunction};
pub use engine::{WORKER_REGISTERED_EVENT, WorkerRegistry};
pub use lookup::LookupFilter;
