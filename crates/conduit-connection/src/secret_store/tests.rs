use super::*;

#[tokio::test]
async fn test_store_get_delete() {
    let store = MemorySecretStore::new();
    let id = Uuid::new_v4();
    assert!(!store.has(id).await.unwrap());

    store
        .store(id, &Credential::password("s3cret").with_username("alice"))
        .await
        .unwrap();
    assert!(store.has(id).await.unwrap());

    let credential = store.get(id).await.unwrap().unwrap();
    assert_eq!(credential.password.as_deref(), Some("s3cret"));
    assert_eq!(credential.username.as_deref(), Some("alice"));

    store.delete(id).await.unwrap();
    assert!(store.get(id).await.unwrap().is_none());
    // absent ids delete cleanly
    store.delete(id).await.unwrap();
}

#[tokio::test]
async fn test_store_replaces_existing_entry() {
    let store = MemorySecretStore::new();
    let id = Uuid::new_v4();
    store.store(id, &Credential::password("old")).await.unwrap();
    store.store(id, &Credential::password("new")).await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get(id).await.unwrap().unwrap().password.as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn test_malformed_blob_reads_as_absent() {
    let store = MemorySecretStore::new();
    let id = Uuid::new_v4();
    store.insert_raw(id, "{not json");

    assert!(store.get(id).await.unwrap().is_none());
    // the entry still exists until it is overwritten or deleted
    assert!(store.has(id).await.unwrap());
}

#[test]
fn test_blob_round_trip_keeps_key_material() {
    let credential = Credential::private_key("-----BEGIN KEY-----", Some("pp".into()))
        .with_ssh_password("bastion");
    let blob = encode_blob(&credential).unwrap();
    let decoded = decode_blob(Uuid::new_v4(), &blob).unwrap();
    assert_eq!(decoded, credential);
}

fn failing_save(_: &HashMap<String, String>) -> Result<()> {
    Err(ConduitError::Secret("Failed to write keychain: locked".into()))
}

#[test]
fn test_failed_save_leaves_no_new_entry() {
    let mut map = HashMap::new();
    let err = commit_entry(&mut map, "a".into(), Some("blob".into()), failing_save).unwrap_err();
    assert!(matches!(err, ConduitError::Secret(_)));
    assert!(map.is_empty());
}

#[test]
fn test_failed_save_restores_replaced_entry() {
    let mut map = HashMap::from([("a".to_string(), "old".to_string())]);
    commit_entry(&mut map, "a".into(), Some("new".into()), failing_save).unwrap_err();
    assert_eq!(map.get("a").map(String::as_str), Some("old"));
}

#[test]
fn test_failed_save_restores_removed_entry() {
    let mut map = HashMap::from([("a".to_string(), "old".to_string())]);
    commit_entry(&mut map, "a".into(), None, failing_save).unwrap_err();
    assert_eq!(map.get("a").map(String::as_str), Some("old"));
}

#[test]
fn test_successful_save_sees_updated_map() {
    let mut map = HashMap::from([("a".to_string(), "old".to_string())]);
    let mut saved = Vec::new();
    commit_entry(&mut map, "b".into(), Some("new".into()), |m| {
        saved = m.keys().cloned().collect();
        Ok(())
    })
    .unwrap();
    saved.sort();
    assert_eq!(saved, ["a", "b"]);
    assert_eq!(map.len(), 2);
}
