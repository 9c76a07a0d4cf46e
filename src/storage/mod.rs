pub mod composite_key;
pub mod ledger;
pub mod memory;
pub mod persistence;

pub use ledger::{LedgerEvent, LedgerStore, ScanPage};
pub use memory::MemoryLedger;
pub use persistence::{DurabilityMode, PersistenceManager, WalEntry};
