//! Integration tests for the SurrealDB history log.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

use permea_core::history::HistoryStore;
use permea_core::models::history::{ChangeType, EntitySnapshot, EntityType};
use permea_core::models::permission::Permission;
use permea_db::RetryPolicy;
use permea_db::repository::SurrealHistoryStore;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    permea_db::run_migrations(&db).await.unwrap();
    db
}

fn permission_snapshot(name: &str) -> EntitySnapshot {
    EntitySnapshot::Permission(Permission {
        name: name.into(),
        description: String::new(),
        is_default: false,
    })
}

#[tokio::test]
async fn recorded_entries_round_trip() {
    let store = SurrealHistoryStore::new(setup().await, RetryPolicy::default());

    let entry = store
        .record(
            ChangeType::Create,
            EntityType::Permission,
            "read",
            permission_snapshot("read"),
            Some("admin"),
            Some("bootstrap"),
        )
        .await
        .unwrap();
    assert_eq!(entry.entity_id, "read");
    assert_eq!(entry.principal.as_deref(), Some("admin"));

    let history = store.get_history(None, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, entry.id);
    assert_eq!(history[0].change_type, ChangeType::Create);
    assert_eq!(history[0].snapshot, permission_snapshot("read"));
    assert_eq!(history[0].reason.as_deref(), Some("bootstrap"));
}

#[tokio::test]
async fn tombstone_snapshot_round_trips() {
    let store = SurrealHistoryStore::new(setup().await, RetryPolicy::default());
    store
        .record(
            ChangeType::Delete,
            EntityType::Group,
            "editors",
            EntitySnapshot::Empty,
            None,
            None,
        )
        .await
        .unwrap();

    let history = store.get_history(None, None).await.unwrap();
    assert_eq!(history[0].snapshot, EntitySnapshot::Empty);
    assert!(history[0].principal.is_none());
}

#[tokio::test]
async fn history_is_newest_first_and_paginates() {
    let store = SurrealHistoryStore::new(setup().await, RetryPolicy::default());
    for i in 0..7 {
        store
            .record(
                ChangeType::Create,
                EntityType::Permission,
                &format!("perm-{i}"),
                permission_snapshot(&format!("perm-{i}")),
                None,
                None,
            )
            .await
            .unwrap();
    }

    let all = store.get_history(None, None).await.unwrap();
    assert_eq!(all.len(), 7);
    for window in all.windows(2) {
        assert!(window[0].timestamp_utc >= window[1].timestamp_utc);
    }

    let mut paged = Vec::new();
    let mut skip = 0;
    loop {
        let page = store.get_history(Some(skip), Some(3)).await.unwrap();
        if page.is_empty() {
            break;
        }
        skip += page.len();
        paged.extend(page);
    }
    let all_ids: Vec<_> = all.iter().map(|e| e.id).collect();
    let paged_ids: Vec<_> = paged.iter().map(|e| e.id).collect();
    assert_eq!(all_ids, paged_ids);
}

#[tokio::test]
async fn entity_history_filters_by_type_and_id() {
    let store = SurrealHistoryStore::new(setup().await, RetryPolicy::default());
    store
        .record(
            ChangeType::Create,
            EntityType::Permission,
            "read",
            permission_snapshot("read"),
            None,
            None,
        )
        .await
        .unwrap();
    store
        .record(
            ChangeType::Create,
            EntityType::Group,
            "read",
            EntitySnapshot::Empty,
            None,
            None,
        )
        .await
        .unwrap();

    let perm = store
        .get_entity_history(EntityType::Permission, "read")
        .await
        .unwrap();
    assert_eq!(perm.len(), 1);
    assert_eq!(perm[0].entity_type, EntityType::Permission);

    let group = store
        .get_entity_history(EntityType::Group, "read")
        .await
        .unwrap();
    assert_eq!(group.len(), 1);

    let none = store
        .get_entity_history(EntityType::User, "read")
        .await
        .unwrap();
    assert!(none.is_empty());
}
