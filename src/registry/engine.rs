use super::command::RegistryCommand;
use super::lookup::{LookupFilter, collect_page, index_attributes};
use crate::config::RegistryConfig;
use crate::core::{
    RegistryError, Result, StoreError, Worker, WorkerLookupPage, WorkerRetrieval, WorkerStatus,
};
use crate::storage::LedgerStore;
use crate::storage::composite_key::create_composite_key;
use tracing::{Level, Span, event, instrument};

pub const WORKER_REGISTERED_EVENT: &str = "workerRegistered";

/// Worker registration, update, retrieval and lookup over a [`LedgerStore`].
///
/// The engine keeps no state between calls apart from its configuration; the
/// ledger is passed into every operation.
#[derive(Debug)]
pub struct WorkerRegistry {
    config: RegistryConfig,
    span: Span,
}

impl WorkerRegistry {
    /// `span` is the parent for every operation span this engine opens.
    ///
    /// Fails with a validation error if `config` does not pass
    /// [`RegistryConfig::validate`].
    pub fn new(config: RegistryConfig, span: Span) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, span })
    }

    /// Engine running on [`RegistryConfig::default`].
    pub fn with_defaults(span: Span) -> Self {
        Self {
            config: RegistryConfig::default(),
            span,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new worker as active and index it under every application
    /// type it declares.
    ///
    /// The primary record and its index entries go to the ledger in one batch,
    /// written only if the id is not registered yet.
    /// The `workerRegistered` event follows the batch, so an event failure is
    /// reported even though the worker is already stored.
    #[instrument(name = "registry.register", parent = &self.span, skip_all, fields(worker_id = %worker.worker_id))]
    pub async fn register<S: LedgerStore + ?Sized>(&self, store: &S, mut worker: Worker) -> Result<()> {
        worker.validate()?;

        worker.status = WorkerStatus::Active;
        let mut writes = vec![(worker.worker_id.clone(), worker.to_bytes()?)];
        for application_type_id in worker.distinct_application_types() {
            let attributes = index_attributes(&worker, application_type_id);
            let key = create_composite_key(&self.config.index_namespace, &attributes)?;
            event!(Level::DEBUG, application_type_id = %application_type_id, key_len = key.len(), "index entry prepared");
            writes.push((key, worker.worker_id.clone().into_bytes()));
        }
        let index_entries = writes.len() - 1;
        if !store.put_batch_if_absent(&worker.worker_id, writes).await? {
            return Err(RegistryError::Validation(format!(
                "Worker with ID '{}' is already registered",
                worker.worker_id
            )));
        }

        let payload = serde_json::to_vec(&serde_json::json!({ "workerID": worker.worker_id }))?;
        store.emit_event(WORKER_REGISTERED_EVENT, payload).await?;

        event!(Level::INFO, index_entries, "worker registered");
        Ok(())
    }

    /// Replace a worker's details and return the stored record bytes.
    #[instrument(name = "registry.update", parent = &self.span, skip_all, fields(worker_id = %worker_id))]
    pub async fn update<S: LedgerStore + ?Sized>(&self, store: &S, worker_id: &str, details: &str) -> Result<Vec<u8>> {
        let mut worker = self.load_worker(store, worker_id).await?;
        worker.details = details.to_string();
        let value = self.store_worker(store, &worker).await?;
        event!(Level::INFO, "worker details updated");
        Ok(value)
    }

    /// Set a worker's status from its integer code and return the stored record bytes.
    #[instrument(name = "registry.set_status", parent = &self.span, skip_all, fields(worker_id = %worker_id, status = status))]
    pub async fn set_status<S: LedgerStore + ?Sized>(&self, store: &S, worker_id: &str, status: u64) -> Result<Vec<u8>> {
        let Some(status) = WorkerStatus::from_code(status) else {
            event!(Level::WARN, "rejected unknown status code");
            return Err(RegistryError::Validation(format!(
                "Worker status must be one of 1 (active), 2 (offline), 3 (decommissioned), 4 (compromised); received {}",
                status
            )));
        };

        let mut worker = self.load_worker(store, worker_id).await?;
        worker.status = status;
        let value = self.store_worker(store, &worker).await?;
        event!(Level::INFO, status = %status, "worker status changed");
        Ok(value)
    }

    #[instrument(name = "registry.retrieve", parent = &self.span, skip_all, fields(worker_id = %worker_id))]
    pub async fn retrieve<S: LedgerStore + ?Sized>(&self, store: &S, worker_id: &str) -> Result<WorkerRetrieval> {
        Ok(self.load_worker(store, worker_id).await?.into())
    }

    /// First page of workers matching `filter`.
    pub async fn lookup<S: LedgerStore + ?Sized>(&self, store: &S, filter: &LookupFilter) -> Result<WorkerLookupPage> {
        self.lookup_next(store, filter, "").await
    }

    /// Page of workers matching `filter`, resuming at `lookup_tag`.
    ///
    /// An empty tag starts from the beginning. The returned tag is empty once
    /// there is nothing left to fetch.
    #[instrument(
        name = "registry.lookup",
        parent = &self.span,
        skip_all,
        fields(
            worker_type = filter.worker_type,
            organization_id = %filter.organization_id,
            application_type_id = %filter.application_type_id,
            resumed = !lookup_tag.is_empty()
        )
    )]
    pub async fn lookup_next<S: LedgerStore + ?Sized>(
        &self,
        store: &S,
        filter: &LookupFilter,
        lookup_tag: &str,
    ) -> Result<WorkerLookupPage> {
        let segments = filter.segments();
        event!(Level::DEBUG, segments = segments.len(), "lookup prefix built");

        let page_size = self.config.page_size;
        let scan = store
            .range_scan_by_prefix(&self.config.index_namespace, &segments, page_size.saturating_add(1), lookup_tag)
            .await
            .map_err(|err| match err {
                StoreError::InvalidBookmark(reason) => {
                    RegistryError::Validation(format!("Invalid lookup tag: {}", reason))
                }
                other => RegistryError::Store(other),
            })?;
        event!(Level::DEBUG, fetched = scan.fetched_count, "index scan returned");

        let page = collect_page(scan, page_size);
        event!(Level::INFO, returned = page.total_count, more = page.has_more(), "lookup page collected");
        Ok(page)
    }

    /// Raw stored bytes under any key.
    #[instrument(name = "registry.query", parent = &self.span, skip_all, fields(key = %key))]
    pub async fn query<S: LedgerStore + ?Sized>(&self, store: &S, key: &str) -> Result<Vec<u8>> {
        store
            .get(key)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("WorkerID '{}' does not exist", key)))
    }

    /// Run a parsed command and return its response payload, if any.
    pub async fn execute<S: LedgerStore + ?Sized>(&self, store: &S, command: RegistryCommand) -> Result<Option<Vec<u8>>> {
        event!(parent: &self.span, Level::DEBUG, function = %command.function(), "executing command");
        let payload = match command {
            RegistryCommand::Register(worker) => {
                self.register(store, worker).await?;
                None
            }
            RegistryCommand::Update { worker_id, details } => Some(self.update(store, &worker_id, &details).await?),
            RegistryCommand::SetStatus { worker_id, status } => {
                Some(self.set_status(store, &worker_id, status).await?)
            }
            RegistryCommand::LookUp(filter) => Some(serde_json::to_vec(&self.lookup(store, &filter).await?)?),
            RegistryCommand::LookUpNext { filter, lookup_tag } => {
                Some(serde_json::to_vec(&self.lookup_next(store, &filter, &lookup_tag).await?)?)
            }
            RegistryCommand::Retrieve { worker_id } => {
                Some(serde_json::to_vec(&self.retrieve(store, &worker_id).await?)?)
            }
            RegistryCommand::Query { key } => Some(self.query(store, &key).await?),
        };
        Ok(payload)
    }

    /// Parse `(function, args)` and run it.
    pub async fn invoke<S: LedgerStore + ?Sized>(
        &self,
        store: &S,
        function: &str,
        args: &[String],
    ) -> Result<Option<Vec<u8>>> {
        let command = RegistryCommand::parse(function, args).inspect_err(|err| {
            event!(parent: &self.span, Level::WARN, function = %function, error = %err, "rejected call");
        })?;
        self.execute(store, command).await
    }

    async fn load_worker<S: LedgerStore + ?Sized>(&self, store: &S, worker_id: &str) -> Result<Worker> {
        let bytes = store
            .get(worker_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("Worker with ID '{}' does not exist", worker_id)))?;
        Worker::from_bytes(&bytes).inspect_err(|err| {
            event!(Level::ERROR, error = %err, "stored worker could not be decoded");
        })
    }

    async fn store_worker<S: LedgerStore + ?Sized>(&self, store: &S, worker: &Worker) -> Result<Vec<u8>> {
        let value = worker.to_bytes()?;
        store.put(&worker.worker_id, value.clone()).await?;
        Ok(value)
    }
}
