/// Registry behaviour tests
///
/// Register / update / status / retrieve / query against the in-memory ledger.
/// Run with: cargo test --test registry_tests

use worker_registry::{LookupFilter, Registry, Worker, WorkerStatus};

fn worker(id: &str, worker_type: u64, org: &str, apps: &[&str], details: &str) -> Worker {
    Worker::new(id, worker_type, org, apps.iter().map(|a| a.to_string()).collect(), details)
}

#[tokio::test]
async fn test_register_then_retrieve_returns_registered_fields() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    registry
        .register(worker("w-1", 7, "acme", &["sgx", "tdx"], "endpoint=tcp://10.0.0.1"))
        .await?;

    let retrieved = registry.retrieve("w-1").await?;
    assert_eq!(retrieved.status, WorkerStatus::Active);
    assert_eq!(retrieved.worker_type, 7);
    assert_eq!(retrieved.organization_id, "acme");
    assert_eq!(retrieved.application_type_ids, vec!["sgx", "tdx"]);
    assert_eq!(retrieved.details, "endpoint=tcp://10.0.0.1");

    Ok(())
}

#[tokio::test]
async fn test_registered_worker_is_discoverable_by_each_application_type() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    registry.register(worker("w-1", 1, "org", &["A", "B"], "")).await?;

    let by_a = registry.lookup(&LookupFilter::new(1, "org", "A")).await?;
    assert_eq!(by_a.ids, vec!["w-1"]);

    let by_b = registry.lookup(&LookupFilter::new(1, "org", "B")).await?;
    assert_eq!(by_b.ids, vec!["w-1"]);

    let by_c = registry.lookup(&LookupFilter::new(1, "org", "C")).await?;
    assert!(by_c.ids.is_empty());
    assert_eq!(by_c.total_count, 0);
    assert!(!by_c.has_more());

    Ok(())
}

#[tokio::test]
async fn test_update_replaces_details_only() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    registry.register(worker("w-1", 2, "org", &["A"], "old details")).await?;

    let stored = registry.update("w-1", "new details").await?;
    let stored = Worker::from_bytes(&stored)?;
    assert_eq!(stored.worker_id, "w-1");
    assert_eq!(stored.details, "new details");

    let retrieved = registry.retrieve("w-1").await?;
    assert_eq!(retrieved.details, "new details");
    assert_eq!(retrieved.worker_type, 2);
    assert_eq!(retrieved.organization_id, "org");
    assert_eq!(retrieved.application_type_ids, vec!["A"]);
    assert_eq!(retrieved.status, WorkerStatus::Active);

    Ok(())
}

#[tokio::test]
async fn test_set_status_offline_is_visible_on_retrieve() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    registry.register(worker("w-1", 2, "org", &["A"], "")).await?;

    registry.set_status("w-1", WorkerStatus::Offline).await?;
    assert_eq!(registry.retrieve("w-1").await?.status, WorkerStatus::Offline);

    // index entries are not touched by status changes
    let page = registry.lookup(&LookupFilter::new(2, "org", "A")).await?;
    assert_eq!(page.ids, vec!["w-1"]);

    Ok(())
}

#[tokio::test]
async fn test_missing_worker_is_not_found_everywhere() {
    let registry = Registry::in_memory();

    assert!(registry.retrieve("ghost").await.unwrap_err().is_not_found());
    assert!(registry.query("ghost").await.unwrap_err().is_not_found());
    assert!(registry.update("ghost", "x").await.unwrap_err().is_not_found());
    assert!(
        registry
            .set_status("ghost", WorkerStatus::Offline)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_query_returns_raw_stored_bytes() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    registry.register(worker("w-1", 3, "org", &["A"], "d")).await?;

    let raw = registry.query("w-1").await?;
    let json: serde_json::Value = serde_json::from_slice(&raw)?;
    assert_eq!(json["workerID"], "w-1");
    assert_eq!(json["workerType"], 3);
    assert_eq!(json["status"], 1);

    Ok(())
}

#[tokio::test]
async fn test_register_emits_worker_registered_event() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    let mut events = registry.ledger().subscribe();

    registry.register(worker("w-9", 1, "org", &["A"], "")).await?;

    let event = events.recv().await?;
    assert_eq!(event.name, "workerRegistered");
    let payload: serde_json::Value = serde_json::from_slice(&event.payload)?;
    assert_eq!(payload, serde_json::json!({ "workerID": "w-9" }));

    Ok(())
}

#[tokio::test]
async fn test_invalid_registrations_write_nothing() {
    let registry = Registry::in_memory();

    let empty_id = registry.register(worker("", 1, "org", &["A"], "")).await.unwrap_err();
    assert!(empty_id.is_validation());

    let empty_app = registry.register(worker("w", 1, "org", &["A", ""], "")).await.unwrap_err();
    assert!(empty_app.is_validation());

    assert!(registry.ledger().is_empty().await);
    assert!(registry.ledger().events().await.is_empty());
}

#[tokio::test]
async fn test_ledger_outage_is_reported_as_store_error() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    registry.register(worker("w-1", 1, "org", &["A"], "")).await?;

    registry.ledger().set_offline(true).await;
    assert!(registry.retrieve("w-1").await.unwrap_err().is_store());
    assert!(registry.update("w-1", "x").await.unwrap_err().is_store());

    registry.ledger().set_offline(false).await;
    assert_eq!(registry.retrieve("w-1").await?.details, "");

    Ok(())
}
