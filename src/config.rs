use crate::core::{RegistryError, Result};
use crate::storage::DurabilityMode;
use crate::storage::persistence::DEFAULT_CHECKPOINT_THRESHOLD;
use std::path::PathBuf;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_INDEX_NAMESPACE: &str = "WorkerRegister";

/// Registry configuration
///
/// Built with [`RegistryConfig::default`] and adjusted with the builder
/// methods, or read from `WORKER_REGISTRY_*` environment variables.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of worker ids returned per lookup page
    pub page_size: usize,

    /// Namespace tag that prefixes every secondary-index key
    pub index_namespace: String,

    /// Directory for the durable ledger; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,

    /// WAL durability for the durable ledger
    pub durability: DurabilityMode,

    /// WAL records written before the ledger checkpoints itself
    pub checkpoint_threshold: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            index_namespace: DEFAULT_INDEX_NAMESPACE.to_string(),
            data_dir: None,
            durability: DurabilityMode::default(),
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the defaults and apply any `WORKER_REGISTRY_*` overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("WORKER_REGISTRY_PAGE_SIZE") {
            let page_size = value.parse::<usize>().map_err(|_| {
                RegistryError::Validation(format!("WORKER_REGISTRY_PAGE_SIZE must be an integer, got '{}'", value))
            })?;
            config = config.page_size(page_size);
        }
        if let Ok(value) = std::env::var("WORKER_REGISTRY_NAMESPACE") {
            config = config.index_namespace(&value);
        }
        if let Ok(value) = std::env::var("WORKER_REGISTRY_DATA_DIR") {
            config = config.data_dir(value);
        }
        if let Ok(value) = std::env::var("WORKER_REGISTRY_CHECKPOINT_THRESHOLD") {
            let threshold = value.parse::<usize>().map_err(|_| {
                RegistryError::Validation(format!(
                    "WORKER_REGISTRY_CHECKPOINT_THRESHOLD must be an integer, got '{}'",
                    value
                ))
            })?;
            config = config.checkpoint_threshold(threshold);
        }
        if let Ok(value) = std::env::var("WORKER_REGISTRY_DURABILITY") {
            let mode = value.parse::<DurabilityMode>().map_err(RegistryError::Validation)?;
            config = config.durability(mode);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the lookup page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the index namespace tag
    pub fn index_namespace(mut self, namespace: &str) -> Self {
        self.index_namespace = namespace.to_string();
        self
    }

    /// Set the ledger data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the WAL durability mode
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Set how many WAL records trigger an automatic checkpoint
    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(RegistryError::Validation("page size must be at least 1".into()));
        }
        if self.checkpoint_threshold == 0 {
            return Err(RegistryError::Validation("checkpoint threshold must be at least 1".into()));
        }
        if self.index_namespace.is_empty() || self.index_namespace.contains('\u{0}') {
            return Err(RegistryError::Validation(format!(
                "invalid index namespace {:?}",
                self.index_namespace
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.index_namespace, "WorkerRegister");
        assert!(config.data_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = RegistryConfig::new()
            .page_size(3)
            .index_namespace("Custom")
            .data_dir("/tmp/ledger")
            .durability(DurabilityMode::Sync);
        assert_eq!(config.page_size, 3);
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert!(config.validate().is_ok());

        assert!(RegistryConfig::new().page_size(0).validate().is_err());
        assert!(RegistryConfig::new().index_namespace("").validate().is_err());
        assert!(RegistryConfig::new().checkpoint_threshold(0).validate().is_err());
    }
}
