use super::composite_key::{create_composite_key, decode_bookmark, encode_bookmark};
use super::ledger::{LedgerEvent, LedgerStore, ScanPage};
use super::persistence::{DurabilityMode, PersistenceManager, WalEntry};
use crate::core::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct LedgerState {
    entries: BTreeMap<String, Vec<u8>>,
    events: Vec<LedgerEvent>,
    offline: bool,
}

struct LedgerInner {
    state: RwLock<LedgerState>,
    persistence: Option<Mutex<PersistenceManager>>,
    events_tx: broadcast::Sender<LedgerEvent>,
}

/// Ordered in-memory ledger, optionally backed by a WAL on disk.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Volatile ledger with nothing on disk.
    pub fn new() -> Self {
        Self::from_parts(LedgerState::default(), None)
    }

    /// Open (or create) a durable ledger in `data_dir`, replaying the snapshot
    /// and WAL found there.
    ///
    /// The WAL is folded into a snapshot after `checkpoint_threshold` records.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        durability: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> StoreResult<Self> {
        let mut persistence = PersistenceManager::new(data_dir, durability, checkpoint_threshold)?;
        let recovered = persistence.recover()?;
        log::debug!(
            "Recovered ledger with {} entries and {} events",
            recovered.entries.len(),
            recovered.events.len()
        );

        let state = LedgerState {
            entries: recovered.entries,
            events: recovered.events,
            offline: false,
        };
        Ok(Self::from_parts(state, Some(persistence)))
    }

    fn from_parts(state: LedgerState, persistence: Option<PersistenceManager>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(LedgerInner {
                state: RwLock::new(state),
                persistence: persistence.map(Mutex::new),
                events_tx,
            }),
        }
    }

    /// Take the ledger offline (or back online). While offline every call
    /// fails with [`StoreError::Unavailable`].
    pub async fn set_offline(&self, offline: bool) {
        self.inner.state.write().await.offline = offline;
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Events emitted so far, oldest first.
    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.inner.state.read().await.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Write a snapshot and truncate the WAL. A no-op for volatile ledgers.
    pub async fn checkpoint(&self) -> StoreResult<()> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };
        let state = self.inner.state.read().await;
        let mut pm = persistence.lock().await;
        pm.checkpoint(&state.entries, &state.events)
    }

    /// Log `entry` and then apply it, holding the state write lock throughout.
    async fn commit(&self, entry: WalEntry) -> StoreResult<()> {
        let mut state = self.inner.state.write().await;
        ensure_online(&state)?;
        self.commit_locked(&mut state, entry).await
    }

    async fn commit_locked(&self, state: &mut LedgerState, entry: WalEntry) -> StoreResult<()> {
        let mut persistence = match &self.inner.persistence {
            Some(persistence) => {
                let mut pm = persistence.lock().await;
                pm.log(&entry)?;
                Some(pm)
            }
            None => None,
        };

        match entry {
            WalEntry::Put { key, value } => {
                state.entries.insert(key, value);
            }
            WalEntry::Batch { writes } => state.entries.extend(writes),
            WalEntry::Event(event) => {
                state.events.push(event.clone());
                // no receivers is fine
                let _ = self.inner.events_tx.send(event);
            }
        }

        // The entry is already in the WAL, so a failed checkpoint loses nothing.
        if let Some(pm) = persistence.as_mut()
            && pm.needs_checkpoint()
            && let Err(err) = pm.checkpoint(&state.entries, &state.events)
        {
            log::warn!("Ledger checkpoint failed, keeping WAL: {}", err);
        }
        Ok(())
    }
}

fn ensure_online(state: &LedgerState) -> StoreResult<()> {
    if state.offline {
        return Err(StoreError::Unavailable("ledger is offline".into()));
    }
    Ok(())
}

fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::MalformedKey("key must not be empty".into()));
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        let state = self.inner.state.read().await;
        ensure_online(&state)?;
        Ok(state.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        check_key(key)?;
        self.commit(WalEntry::Put { key: key.to_string(), value }).await
    }

    async fn put_batch(&self, writes: Vec<(String, Vec<u8>)>) -> StoreResult<()> {
        for (key, _) in &writes {
            check_key(key)?;
        }
        if writes.is_empty() {
            return Ok(());
        }
        self.commit(WalEntry::Batch { writes }).await
    }

    async fn put_batch_if_absent(&self, guard_key: &str, writes: Vec<(String, Vec<u8>)>) -> StoreResult<bool> {
        check_key(guard_key)?;
        for (key, _) in &writes {
            check_key(key)?;
        }

        let mut state = self.inner.state.write().await;
        ensure_online(&state)?;
        if state.entries.contains_key(guard_key) {
            return Ok(false);
        }
        if !writes.is_empty() {
            self.commit_locked(&mut state, WalEntry::Batch { writes }).await?;
        }
        Ok(true)
    }

    async fn range_scan_by_prefix(
        &self,
        namespace: &str,
        attributes: &[String],
        page_size: usize,
        bookmark: &str,
    ) -> StoreResult<ScanPage> {
        let prefix = create_composite_key(namespace, attributes)?;
        let start = if bookmark.is_empty() {
            prefix.clone()
        } else {
            let key = decode_bookmark(bookmark)?;
            if !key.starts_with(&prefix) {
                return Err(StoreError::InvalidBookmark(
                    "bookmark lies outside the requested range".into(),
                ));
            }
            key
        };

        let state = self.inner.state.read().await;
        ensure_online(&state)?;

        let mut matching = state
            .entries
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&prefix));

        let entries: Vec<(String, Vec<u8>)> = matching
            .by_ref()
            .take(page_size)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let bookmark = matching
            .next()
            .map(|(key, _)| encode_bookmark(key))
            .unwrap_or_default();

        Ok(ScanPage {
            fetched_count: entries.len(),
            entries,
            bookmark,
        })
    }

    async fn emit_event(&self, name: &str, payload: Vec<u8>) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::MalformedKey("event name must not be empty".into()));
        }
        self.commit(WalEntry::Event(LedgerEvent::new(name, payload))).await
    }
}
