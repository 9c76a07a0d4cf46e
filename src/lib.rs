// ============================================================================
// Worker Registry Library
// ============================================================================

pub mod config;
pub mod core;
pub mod logging;
pub mod registry;
pub mod storage;

// Re-export main types for convenience
pub use config::RegistryConfig;
pub use core::{
    RegistryError, Result, StoreError, Worker, WorkerLookupPage, WorkerRetrieval, WorkerStatus,
};
pub use registry::{LookupFilter, RegistryCommand, RegistryFunction, WorkerRegistry};
pub use storage::{DurabilityMode, LedgerEvent, LedgerStore, MemoryLedger, ScanPage};

// ============================================================================
// High-level Client API
// ============================================================================

/// Registry engine bundled with its own ledger
///
/// This is the simplest way to run the registry in-process. Callers that
/// bring their own [`LedgerStore`] use [`WorkerRegistry`] directly.
///
/// # Examples
///
/// ```
/// use worker_registry::{LookupFilter, Registry, Worker};
///
/// # tokio_test::block_on(async {
/// let registry = Registry::in_memory();
///
/// registry
///     .register(Worker::new("worker-1", 1, "acme", vec!["inference".into()], "gpu node"))
///     .await
///     .unwrap();
///
/// let page = registry.lookup(&LookupFilter::new(1, "acme", "0")).await.unwrap();
/// assert_eq!(page.ids, vec!["worker-1"]);
/// # });
/// ```
pub struct Registry {
    engine: WorkerRegistry,
    ledger: MemoryLedger,
}

impl Registry {
    /// Volatile registry with default configuration.
    pub fn in_memory() -> Self {
        let span = logging::registry_span(config::DEFAULT_INDEX_NAMESPACE);
        Self {
            engine: WorkerRegistry::with_defaults(span),
            ledger: MemoryLedger::new(),
        }
    }

    /// Open a registry as described by `config`.
    ///
    /// With a `data_dir` the ledger is durable and recovered from disk;
    /// without one it lives in memory only.
    ///
    /// # Examples
    ///
    /// ```
    /// use worker_registry::{Registry, RegistryConfig};
    ///
    /// let registry = Registry::open(RegistryConfig::default().page_size(25)).unwrap();
    /// assert_eq!(registry.engine().config().page_size, 25);
    ///
    /// assert!(Registry::open(RegistryConfig::default().page_size(0)).is_err());
    /// ```
    pub fn open(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let ledger = match &config.data_dir {
            Some(dir) => MemoryLedger::open(dir, config.durability, config.checkpoint_threshold)?,
            None => MemoryLedger::new(),
        };
        Self::with_ledger(config, ledger)
    }

    /// Run the engine over an existing ledger, validating `config` first.
    pub fn with_ledger(config: RegistryConfig, ledger: MemoryLedger) -> Result<Self> {
        let span = logging::registry_span(&config.index_namespace);
        Ok(Self {
            engine: WorkerRegistry::new(config, span)?,
            ledger,
        })
    }

    pub fn engine(&self) -> &WorkerRegistry {
        &self.engine
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Call a registry function by name with positional string arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use worker_registry::Registry;
    ///
    /// # tokio_test::block_on(async {
    /// let registry = Registry::in_memory();
    /// let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    ///
    /// registry.invoke("workerRegister", &args(&["w1", "2", "org", "a,b", "{}"])).await.unwrap();
    /// let payload = registry.invoke("workerRetrieve", &args(&["w1"])).await.unwrap().unwrap();
    /// assert!(String::from_utf8(payload).unwrap().contains("\"status\":1"));
    /// # });
    /// ```
    pub async fn invoke(&self, function: &str, args: &[String]) -> Result<Option<Vec<u8>>> {
        self.engine.invoke(&self.ledger, function, args).await
    }

    pub async fn register(&self, worker: Worker) -> Result<()> {
        self.engine.register(&self.ledger, worker).await
    }

    pub async fn update(&self, worker_id: &str, details: &str) -> Result<Vec<u8>> {
        self.engine.update(&self.ledger, worker_id, details).await
    }

    pub async fn set_status(&self, worker_id: &str, status: WorkerStatus) -> Result<Vec<u8>> {
        self.engine.set_status(&self.ledger, worker_id, status.code()).await
    }

    pub async fn retrieve(&self, worker_id: &str) -> Result<WorkerRetrieval> {
        self.engine.retrieve(&self.ledger, worker_id).await
    }

    pub async fn lookup(&self, filter: &LookupFilter) -> Result<WorkerLookupPage> {
        self.engine.lookup(&self.ledger, filter).await
    }

    pub async fn lookup_next(&self, filter: &LookupFilter, lookup_tag: &str) -> Result<WorkerLookupPage> {
        self.engine.lookup_next(&self.ledger, filter, lookup_tag).await
    }

    /// Follow lookup tags until the result set is exhausted.
    pub async fn lookup_all(&self, filter: &LookupFilter) -> Result<Vec<String>> {
        let mut page = self.lookup(filter).await?;
        let mut ids = std::mem::take(&mut page.ids);
        while page.has_more() {
            page = self.lookup_next(filter, &page.lookup_tag).await?;
            ids.append(&mut page.ids);
        }
        Ok(ids)
    }

    pub async fn query(&self, key: &str) -> Result<Vec<u8>> {
        self.engine.query(&self.ledger, key).await
    }

    /// Persist a snapshot of a durable ledger and truncate its WAL.
    pub async fn checkpoint(&self) -> Result<()> {
        Ok(self.ledger.checkpoint().await?)
    }
}
