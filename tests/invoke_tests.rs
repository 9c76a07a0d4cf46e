/// Invoke surface tests
///
/// Drives the registry through `(function name, string arguments)` calls the
/// way an external caller would, and checks the JSON payloads it returns.
/// Run with: cargo test --test invoke_tests

use serde_json::Value;
use worker_registry::Registry;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

async fn call(registry: &Registry, function: &str, values: &[&str]) -> worker_registry::Result<Option<Value>> {
    let payload = registry.invoke(function, &args(values)).await?;
    Ok(payload.map(|bytes| serde_json::from_slice(&bytes).unwrap()))
}

#[tokio::test]
async fn test_register_lookup_retrieve_round() -> anyhow::Result<()> {
    let registry = Registry::in_memory();

    let registered = call(&registry, "workerRegister", &["w-1", "2", "acme", "A,B", "{\"url\":\"x\"}"]).await?;
    assert!(registered.is_none());

    let page = call(&registry, "workerLookUp", &["2", "acme", "B"]).await?.unwrap();
    assert_eq!(page["totalCount"], 1);
    assert_eq!(page["ids"][0], "w-1");
    assert_eq!(page["lookupTag"], "");

    let retrieved = call(&registry, "workerRetrieve", &["w-1"]).await?.unwrap();
    assert_eq!(retrieved["status"], 1);
    assert_eq!(retrieved["workerType"], 2);
    assert_eq!(retrieved["organizationID"], "acme");
    assert_eq!(retrieved["applicationTypeId"], serde_json::json!(["A", "B"]));
    assert_eq!(retrieved["details"], "{\"url\":\"x\"}");

    Ok(())
}

#[tokio::test]
async fn test_aliases_reach_the_same_operations() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    call(&registry, "register", &["w-1", "1", "org", "A", ""]).await?;
    call(&registry, "update", &["w-1", "changed"]).await?;
    call(&registry, "setStatus", &["w-1", "4"]).await?;

    let retrieved = call(&registry, "retrieve", &["w-1"]).await?.unwrap();
    assert_eq!(retrieved["details"], "changed");
    assert_eq!(retrieved["status"], 4);

    let page = call(&registry, "lookup", &["0", "0", "0"]).await?.unwrap();
    assert_eq!(page["totalCount"], 1);

    Ok(())
}

#[tokio::test]
async fn test_update_and_set_status_return_stored_record() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    call(&registry, "workerRegister", &["w-1", "1", "org", "A", "d"]).await?;

    let updated = call(&registry, "workerUpdate", &["w-1", "d2"]).await?.unwrap();
    assert_eq!(updated["workerID"], "w-1");
    assert_eq!(updated["details"], "d2");

    let offline = call(&registry, "workerSetStatus", &["w-1", "2"]).await?.unwrap();
    assert_eq!(offline["status"], 2);

    let raw = call(&registry, "query", &["w-1"]).await?.unwrap();
    assert_eq!(raw, offline);

    Ok(())
}

#[tokio::test]
async fn test_lookup_next_follows_tags() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    for i in 0..12 {
        let id = format!("w-{:02}", i);
        call(&registry, "workerRegister", &[id.as_str(), "3", "org", "A", ""]).await?;
    }

    let first = call(&registry, "workerLookUp", &["3", "org", "A"]).await?.unwrap();
    assert_eq!(first["totalCount"], 10);
    let tag = first["lookupTag"].as_str().unwrap().to_string();
    assert!(!tag.is_empty());

    let second = call(&registry, "workerLookUpNext", &["3", "org", "A", tag.as_str()]).await?.unwrap();
    assert_eq!(second["totalCount"], 2);
    assert_eq!(second["ids"], serde_json::json!(["w-10", "w-11"]));
    assert_eq!(second["lookupTag"], "");

    Ok(())
}

#[tokio::test]
async fn test_register_without_application_types_is_stored_but_unindexed() -> anyhow::Result<()> {
    let registry = Registry::in_memory();
    call(&registry, "workerRegister", &["w-1", "1", "org", "", "d"]).await?;

    let retrieved = call(&registry, "workerRetrieve", &["w-1"]).await?.unwrap();
    assert_eq!(retrieved["details"], "d");
    assert!(retrieved.get("applicationTypeId").is_none());

    let page = call(&registry, "workerLookUp", &["0", "0", "0"]).await?.unwrap();
    assert_eq!(page["totalCount"], 0);
    assert_eq!(registry.ledger().len().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_bad_calls_are_validation_errors_and_write_nothing() {
    let registry = Registry::in_memory();

    let cases: &[(&str, &[&str])] = &[
        ("workerRegister", &["w-1", "two", "org", "A", ""]),
        ("workerRegister", &["w-1", "2", "org", "A"]),
        ("workerRegister", &["w-1", "2", "org", "A,,B", ""]),
        ("workerLookUp", &["x", "org", "A"]),
        ("workerLookUpNext", &["1", "org", "A", "zz"]),
        ("workerSetStatus", &["w-1", "active"]),
        ("noSuchFunction", &[]),
    ];

    for (function, values) in cases {
        let err = call(&registry, function, values).await.unwrap_err();
        assert!(err.is_validation(), "{} {:?} gave {:?}", function, values, err);
    }

    assert!(registry.ledger().is_empty().await);
}

#[tokio::test]
async fn test_missing_worker_calls_are_not_found() {
    let registry = Registry::in_memory();

    for (function, values) in [
        ("workerRetrieve", vec!["ghost"]),
        ("workerUpdate", vec!["ghost", "d"]),
        ("workerSetStatus", vec!["ghost", "2"]),
        ("query", vec!["ghost"]),
    ] {
        let err = call(&registry, function, &values).await.unwrap_err();
        assert!(err.is_not_found(), "{} gave {:?}", function, err);
    }
}
