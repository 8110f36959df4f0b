use storage::kv::KeyValueStore;
use storage::sqlite::SqliteStore;

async fn connect(name: &str) -> SqliteStore {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let store = SqliteStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

#[tokio::test]
async fn sqlite_round_trips_values() {
    let store = connect("memdb_kv_roundtrip").await;

    assert_eq!(store.get("decayed_items").await.unwrap(), None);

    store.set("decayed_items", r#"["q-1","q-2"]"#).await.unwrap();
    assert_eq!(
        store.get("decayed_items").await.unwrap(),
        Some(r#"["q-1","q-2"]"#.to_string())
    );
}

#[tokio::test]
async fn sqlite_set_overwrites_in_place() {
    let store = connect("memdb_kv_overwrite").await;

    store.set("testProgress.v2", "{\"a\":1}").await.unwrap();
    store.set("testProgress.v2", "{\"a\":2}").await.unwrap();

    assert_eq!(
        store.get("testProgress.v2").await.unwrap(),
        Some("{\"a\":2}".to_string())
    );
}

#[tokio::test]
async fn sqlite_delete_is_idempotent() {
    let store = connect("memdb_kv_delete").await;

    store.set("repaso_done_202501", "true").await.unwrap();
    store.delete("repaso_done_202501").await.unwrap();
    assert_eq!(store.get("repaso_done_202501").await.unwrap(), None);

    store.delete("repaso_done_202501").await.unwrap();
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = connect("memdb_kv_migrate_twice").await;
    store.migrate().await.expect("second migrate");

    store.set("k", "v").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
}

#[tokio::test]
async fn keys_do_not_collide() {
    let store = connect("memdb_kv_keys").await;

    store.set("testProgress.v2", "snapshot").await.unwrap();
    store.set("decayed_items", "[]").await.unwrap();
    store.set("repaso_done_202502", "true").await.unwrap();

    store.delete("testProgress.v2").await.unwrap();

    assert_eq!(store.get("testProgress.v2").await.unwrap(), None);
    assert_eq!(store.get("decayed_items").await.unwrap(), Some("[]".to_string()));
    assert_eq!(
        store.get("repaso_done_202502").await.unwrap(),
        Some("true".to_string())
    );
}
