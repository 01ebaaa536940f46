use storage::repository::{KeyValueRepository, Storage};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_roundtrip_overwrites_and_removes() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.get("assessment_state").await.unwrap().is_none());

    repo.put("assessment_state", r#"{"v":1}"#).await.unwrap();
    repo.put("assessment_state", r#"{"v":2}"#).await.unwrap();
    assert_eq!(
        repo.get("assessment_state").await.unwrap().as_deref(),
        Some(r#"{"v":2}"#)
    );

    repo.remove("assessment_state").await.unwrap();
    repo.remove("assessment_state").await.unwrap();
    assert!(repo.get("assessment_state").await.unwrap().is_none());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.put("client_uuid", "abc").await.unwrap();
    repo.migrate().await.expect("second migrate");

    assert_eq!(repo.get("client_uuid").await.unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn storage_sqlite_keeps_keys_independent() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_storage?mode=memory&cache=shared")
        .await
        .expect("storage");

    storage.client_store.put("a", "1").await.unwrap();
    storage.client_store.put("b", "2").await.unwrap();
    storage.client_store.remove("a").await.unwrap();

    assert!(storage.client_store.get("a").await.unwrap().is_none());
    assert_eq!(storage.client_store.get("b").await.unwrap().as_deref(), Some("2"));
}
