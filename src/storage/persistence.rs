//! Write-Ahead Logging (WAL) and snapshots for the ledger
//!
//! Every committed write is appended to `ledger.wal` as a little-endian `u32`
//! length followed by a MessagePack-encoded [`WalEntry`]. A checkpoint writes
//! the whole ledger to `ledger.snapshot` and empties the WAL. Recovery loads
//! the snapshot and replays the WAL over it.

use crate::core::{StoreError, StoreResult};
use crate::storage::ledger::LedgerEvent;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const WAL_FILE: &str = "ledger.wal";
pub const SNAPSHOT_FILE: &str = "ledger.snapshot";

/// WAL records between automatic checkpoints.
pub const DEFAULT_CHECKPOINT_THRESHOLD: usize = 1000;

const LEN_PREFIX: usize = 4;

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    Put { key: String, value: Vec<u8> },
    Batch { writes: Vec<(String, Vec<u8>)> },
    Event(LedgerEvent),
}

// ============================================================================
// Ledger Snapshot
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub entries: BTreeMap<String, Vec<u8>>,
    pub events: Vec<LedgerEvent>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: i64,
    pub entry_count: usize,
    pub event_count: usize,
}

impl LedgerSnapshot {
    pub fn new(entries: BTreeMap<String, Vec<u8>>, events: Vec<LedgerEvent>) -> Self {
        let metadata = SnapshotMetadata {
            created_at: Utc::now().timestamp_millis(),
            entry_count: entries.len(),
            event_count: events.len(),
        };
        Self {
            version: 1,
            entries,
            events,
            metadata,
        }
    }

    /// Apply a WAL entry on top of this state.
    pub fn apply(&mut self, entry: WalEntry) {
        match entry {
            WalEntry::Put { key, value } => {
                self.entries.insert(key, value);
            }
            WalEntry::Batch { writes } => self.entries.extend(writes),
            WalEntry::Event(event) => self.events.push(event),
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every append
    Sync,
    /// flush to the OS after every append
    #[default]
    Async,
    /// nothing reaches disk
    None,
}

impl DurabilityMode {
    fn writes_to_disk(self) -> bool {
        self != Self::None
    }
}

impl std::str::FromStr for DurabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" => Ok(Self::None),
            other => Err(format!("unknown durability mode '{}'", other)),
        }
    }
}

fn io_err(context: &str, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {}", context, e))
}

fn codec_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(format!("{}: {}", context, e))
}

// ============================================================================
// Ledger WAL
// ============================================================================

/// Records read back from a WAL file.
#[derive(Debug, Default)]
pub struct WalReplay {
    pub entries: Vec<WalEntry>,
    /// Length of the intact prefix of the file.
    pub valid_len: u64,
    /// Bytes after `valid_len` that do not form a whole record.
    pub torn_bytes: u64,
}

pub struct LedgerWal {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    durability: DurabilityMode,
    records_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl LedgerWal {
    pub fn open<P: AsRef<Path>>(
        path: P,
        durability: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err("Failed to create WAL directory", e))?;
        }

        let mut wal = Self {
            path,
            writer: None,
            durability,
            records_since_checkpoint: 0,
            checkpoint_threshold,
        };
        wal.reopen_writer()?;
        Ok(wal)
    }

    fn reopen_writer(&mut self) -> StoreResult<()> {
        if !self.durability.writes_to_disk() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err("Failed to open WAL file", e))?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn append(&mut self, entry: &WalEntry) -> StoreResult<()> {
        if !self.durability.writes_to_disk() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("WAL file not open".to_string()))?;

        let record = rmp_serde::to_vec(entry).map_err(|e| codec_err("Failed to encode WAL entry", e))?;
        let len = u32::try_from(record.len())
            .map_err(|_| codec_err("WAL entry too large", record.len()))?;
        writer
            .write_all(&len.to_le_bytes())
            .and_then(|_| writer.write_all(&record))
            .and_then(|_| writer.flush())
            .map_err(|e| io_err("Failed to write WAL", e))?;
        if self.durability == DurabilityMode::Sync {
            writer
                .get_mut()
                .sync_all()
                .map_err(|e| io_err("Failed to sync WAL", e))?;
        }

        self.records_since_checkpoint += 1;
        Ok(())
    }

    /// Decode every whole record in the file.
    ///
    /// A trailing record whose length prefix runs past the end of the file is
    /// an interrupted append and is reported in `torn_bytes`, not as an error.
    pub fn replay(&self) -> StoreResult<WalReplay> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalReplay::default()),
            Err(e) => return Err(io_err("Failed to read WAL", e)),
        };

        let mut entries = Vec::new();
        let mut offset = 0usize;
        while let Some(prefix) = data.get(offset..offset + LEN_PREFIX) {
            let mut len_bytes = [0u8; LEN_PREFIX];
            len_bytes.copy_from_slice(prefix);
            let start = offset + LEN_PREFIX;
            let end = start.saturating_add(u32::from_le_bytes(len_bytes) as usize);
            let Some(record) = data.get(start..end) else {
                break;
            };
            let entry: WalEntry = rmp_serde::from_slice(record)
                .map_err(|e| codec_err(&format!("Failed to decode WAL entry at byte {}", offset), e))?;
            entries.push(entry);
            offset = end;
        }

        Ok(WalReplay {
            entries,
            valid_len: offset as u64,
            torn_bytes: (data.len() - offset) as u64,
        })
    }

    /// Cut the file back to `len` bytes; later appends continue from there.
    pub fn truncate(&mut self, len: u64) -> StoreResult<()> {
        if !self.durability.writes_to_disk() {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| io_err("Failed to flush WAL", e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| io_err("Failed to open WAL for truncation", e))?;
        file.set_len(len).map_err(|e| io_err("Failed to truncate WAL", e))?;
        if self.durability == DurabilityMode::Sync {
            file.sync_all().map_err(|e| io_err("Failed to sync WAL", e))?;
        }
        self.reopen_writer()
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.records_since_checkpoint >= self.checkpoint_threshold
    }
}

// ============================================================================
// Ledger Snapshot File
// ============================================================================

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Replace the snapshot atomically via a temp file and rename.
    pub fn write(&self, snapshot: &LedgerSnapshot) -> StoreResult<()> {
        let encoded = rmp_serde::to_vec(snapshot).map_err(|e| codec_err("Failed to encode snapshot", e))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(|e| io_err("Failed to create snapshot temp file", e))?;
        file.write_all(&encoded)
            .and_then(|_| file.sync_all())
            .map_err(|e| io_err("Failed to write snapshot", e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| io_err("Failed to install snapshot", e))
    }

    pub fn read(&self) -> StoreResult<Option<LedgerSnapshot>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("Failed to read snapshot", e)),
        };
        rmp_serde::from_slice(&data)
            .map(Some)
            .map_err(|e| codec_err("Failed to decode snapshot", e))
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: LedgerWal,
    snapshot: SnapshotFile,
    durability: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(
        data_dir: P,
        durability: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        Ok(Self {
            wal: LedgerWal::open(data_dir.join(WAL_FILE), durability, checkpoint_threshold)?,
            snapshot: SnapshotFile::new(data_dir.join(SNAPSHOT_FILE)),
            durability,
        })
    }

    pub fn log(&mut self, entry: &WalEntry) -> StoreResult<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, entries: &BTreeMap<String, Vec<u8>>, events: &[LedgerEvent]) -> StoreResult<()> {
        if !self.durability.writes_to_disk() {
            return Ok(());
        }
        self.snapshot.write(&LedgerSnapshot::new(entries.clone(), events.to_vec()))?;
        self.wal.truncate(0)?;
        self.wal.records_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Rebuild ledger state from the last snapshot plus the WAL.
    ///
    /// A torn tail is cut off so that new appends follow the last whole record.
    pub fn recover(&mut self) -> StoreResult<LedgerSnapshot> {
        let mut state = self.snapshot.read()?.unwrap_or_default();
        let replay = self.wal.replay()?;

        if replay.torn_bytes > 0 {
            log::warn!(
                "Discarding {} bytes of incomplete WAL record at offset {}",
                replay.torn_bytes,
                replay.valid_len
            );
            self.wal.truncate(replay.valid_len)?;
        }

        self.wal.records_since_checkpoint = replay.entries.len();
        for entry in replay.entries {
            state.apply(entry);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn put(key: &str, value: &[u8]) -> WalEntry {
        WalEntry::Put {
            key: key.into(),
            value: value.to_vec(),
        }
    }

    fn append_raw(path: &Path, bytes: &[u8]) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn test_wal_append_and_replay() {
        let dir = TempDir::new().unwrap();
        let mut wal = LedgerWal::open(dir.path().join(WAL_FILE), DurabilityMode::Sync, 10).unwrap();

        wal.append(&put("k1", b"v1")).unwrap();
        wal.append(&WalEntry::Batch {
            writes: vec![("k2".into(), b"v2".to_vec()), ("k3".into(), b"v3".to_vec())],
        })
        .unwrap();

        let replay = wal.replay().unwrap();
        assert_eq!(replay.entries.len(), 2);
        assert_eq!(replay.torn_bytes, 0);
        assert!(replay.valid_len > 0);
    }

    #[test]
    fn test_recover_applies_wal_over_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut pm = PersistenceManager::new(dir.path(), DurabilityMode::Sync, 10).unwrap();

        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), b"1".to_vec());
        pm.checkpoint(&entries, &[]).unwrap();

        pm.log(&put("a", b"2")).unwrap();
        pm.log(&WalEntry::Event(LedgerEvent::new("evt", b"{}".to_vec()))).unwrap();

        let state = pm.recover().unwrap();
        assert_eq!(state.entries.get("a"), Some(&b"2".to_vec()));
        assert_eq!(state.events.len(), 1);
        assert_eq!(state.events[0].name, "evt");
    }

    #[test]
    fn test_none_durability_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut pm = PersistenceManager::new(dir.path(), DurabilityMode::None, 10).unwrap();
        pm.log(&put("a", &[1])).unwrap();

        assert!(!dir.path().join(WAL_FILE).exists());
        assert!(pm.recover().unwrap().entries.is_empty());
    }

    #[test]
    fn test_checkpoint_threshold_counts_replayed_records() {
        let dir = TempDir::new().unwrap();
        let mut pm = PersistenceManager::new(dir.path(), DurabilityMode::Sync, 2).unwrap();
        pm.log(&put("a", &[1])).unwrap();
        assert!(!pm.needs_checkpoint());
        pm.log(&put("b", &[2])).unwrap();
        assert!(pm.needs_checkpoint());

        let mut reopened = PersistenceManager::new(dir.path(), DurabilityMode::Sync, 2).unwrap();
        reopened.recover().unwrap();
        assert!(reopened.needs_checkpoint());

        reopened.checkpoint(&BTreeMap::new(), &[]).unwrap();
        assert!(!reopened.needs_checkpoint());
    }

    #[test]
    fn test_torn_tail_is_cut_and_later_appends_replay() {
        let dir = TempDir::new().unwrap();
        let wal_path = dir.path().join(WAL_FILE);
        {
            let mut pm = PersistenceManager::new(dir.path(), DurabilityMode::Sync, 100).unwrap();
            pm.log(&put("a", &[1])).unwrap();
        }
        // length prefix promising more bytes than follow
        append_raw(&wal_path, &64u32.to_le_bytes());
        append_raw(&wal_path, &[0xde, 0xad]);

        {
            let mut pm = PersistenceManager::new(dir.path(), DurabilityMode::Sync, 100).unwrap();
            assert_eq!(pm.recover().unwrap().entries.len(), 1);
            pm.log(&put("b", &[2])).unwrap();
        }

        let mut pm = PersistenceManager::new(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let state = pm.recover().unwrap();
        assert_eq!(state.entries.get("a"), Some(&vec![1]));
        assert_eq!(state.entries.get("b"), Some(&vec![2]));
    }

    #[test]
    fn test_oversized_length_prefix_is_treated_as_torn() {
        let dir = TempDir::new().unwrap();
        let wal_path = dir.path().join(WAL_FILE);
        let wal = LedgerWal::open(&wal_path, DurabilityMode::Sync, 10).unwrap();
        append_raw(&wal_path, &u32::MAX.to_le_bytes());

        let replay = wal.replay().unwrap();
        assert!(replay.entries.is_empty());
        assert_eq!(replay.valid_len, 0);
        assert_eq!(replay.torn_bytes, 4);
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join(SNAPSHOT_FILE));
        assert!(snapshot.read().unwrap().is_none());

        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), b"v".to_vec());
        snapshot.write(&LedgerSnapshot::new(entries, Vec::new())).unwrap();

        let loaded = snapshot.read().unwrap().unwrap();
        assert_eq!(loaded.metadata.entry_count, 1);
        assert_eq!(loaded.entries.get("k"), Some(&b"v".to_vec()));
    }

    #[test]
    fn test_durability_mode_parsing() {
        assert_eq!("SYNC".parse::<DurabilityMode>().unwrap(), DurabilityMode::Sync);
        assert_eq!("none".parse::<DurabilityMode>().unwrap(), DurabilityMode::None);
        assert!("eventual".parse::<DurabilityMode>().is_err());
    }
}
