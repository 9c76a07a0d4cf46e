use crate::core::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of a prefix range scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Matching `(key, value)` pairs in ascending key order.
    pub entries: Vec<(String, Vec<u8>)>,
    /// Where the next page starts (inclusive); empty once the range is exhausted.
    pub bookmark: String,
    /// Number of entries visited for this page.
    pub fetched_count: usize,
}

impl ScanPage {
    pub fn is_exhausted(&self) -> bool {
        self.bookmark.is_empty()
    }
}

/// A notification emitted through the ledger's side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub name: String,
    pub payload: Vec<u8>,
    pub emitted_at: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Key-value ledger contract consumed by the registry engine.
///
/// Implementations must keep keys in ascending byte order for
/// [`range_scan_by_prefix`](LedgerStore::range_scan_by_prefix).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Point lookup. `Ok(None)` means the key is absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or replace a single value.
    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Write several values as one unit.
    ///
    /// The default falls back to sequential puts and is only atomic if the
    /// backend has no partial-failure modes; override it where the backend
    /// offers real batches.
    async fn put_batch(&self, writes: Vec<(String, Vec<u8>)>) -> StoreResult<()> {
        for (key, value) in writes {
            self.put(&key, value).await?;
        }
        Ok(())
    }

    /// Write `writes` as one unit unless `guard_key` already exists.
    ///
    /// Returns `false`, writing nothing, when the guard key is present. The
    /// default checks and writes in two steps; backends that can hold a lock
    /// across both should override it.
    async fn put_batch_if_absent(&self, guard_key: &str, writes: Vec<(String, Vec<u8>)>) -> StoreResult<bool> {
        if self.get(guard_key).await?.is_some() {
            return Ok(false);
        }
        self.put_batch(writes).await?;
        Ok(true)
    }

    /// Scan entries whose composite key starts with `namespace` followed by
    /// `attributes`, returning at most `page_size` of them starting at
    /// `bookmark` (empty means from the beginning).
    async fn range_scan_by_prefix(
        &self,
        namespace: &str,
        attributes: &[String],
        page_size: usize,
        bookmark: &str,
    ) -> StoreResult<ScanPage>;

    /// Best-effort notification.
    async fn emit_event(&self, name: &str, payload: Vec<u8>) -> StoreResult<()>;
}
