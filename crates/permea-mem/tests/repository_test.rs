//! Facade-level CRUD tests over the in-process backend.

use permea_core::error::PermError;
use permea_core::models::access::Access;
use permea_core::models::history::Audit;
use permea_mem::new_service;

#[tokio::test]
async fn create_and_get_permission() {
    let svc = new_service();

    let created = svc
        .create_permission("read", "Read access", true, &Audit::default())
        .await
        .unwrap();
    assert_eq!(created.name, "read");
    assert!(created.is_default);

    let fetched = svc.get_permission("read").await.unwrap().unwrap();
    assert_eq!(fetched, created);

    assert!(svc.get_permission("write").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_permission_is_a_conflict() {
    let svc = new_service();
    svc.create_permission("read", "first", false, &Audit::default())
        .await
        .unwrap();

    let result = svc
        .create_permission("read", "second", false, &Audit::default())
        .await;
    assert!(matches!(result, Err(PermError::Conflict { .. })));
}

#[tokio::test]
async fn update_missing_permission_is_not_found_not_error() {
    let svc = new_service();
    let updated = svc
        .update_permission("ghost", "new text", &Audit::default())
        .await
        .unwrap();
    assert!(!updated);

    let flagged = svc
        .set_permission_default("ghost", true, &Audit::default())
        .await
        .unwrap();
    assert!(!flagged);
}

#[tokio::test]
async fn update_and_delete_permission() {
    let svc = new_service();
    svc.create_permission("write", "old", false, &Audit::default())
        .await
        .unwrap();

    assert!(
        svc.update_permission("write", "new", &Audit::default())
            .await
            .unwrap()
    );
    assert_eq!(
        svc.get_permission("write").await.unwrap().unwrap().description,
        "new"
    );

    assert!(
        svc.set_permission_default("write", true, &Audit::default())
            .await
            .unwrap()
    );
    assert!(svc.get_permission("write").await.unwrap().unwrap().is_default);

    assert!(svc.delete_permission("write", &Audit::default()).await.unwrap());
    assert!(svc.get_permission("write").await.unwrap().is_none());
    // Second delete removes nothing.
    assert!(!svc.delete_permission("write", &Audit::default()).await.unwrap());
}

#[tokio::test]
async fn group_lifecycle() {
    let svc = new_service();
    svc.create_permission("write", "", false, &Audit::default())
        .await
        .unwrap();

    let group = svc.create_group("editors", &Audit::default()).await.unwrap();
    assert!(group.permissions.is_empty());

    assert!(matches!(
        svc.create_group("editors", &Audit::default()).await,
        Err(PermError::Conflict { .. })
    ));

    assert!(
        svc.set_group_permission("editors", "write", Access::Allow, &Audit::default())
            .await
            .unwrap()
    );
    let group = svc.get_group("editors").await.unwrap().unwrap();
    assert_eq!(group.permissions.get("write"), Some(&Access::Allow));

    assert!(
        svc.remove_group_permission("editors", "write", &Audit::default())
            .await
            .unwrap()
    );
    let group = svc.get_group("editors").await.unwrap().unwrap();
    assert!(group.permissions.is_empty());

    assert!(svc.delete_group("editors", &Audit::default()).await.unwrap());
    assert!(svc.get_group("editors").await.unwrap().is_none());
}

#[tokio::test]
async fn setting_unknown_permission_is_rejected() {
    let svc = new_service();
    svc.create_group("editors", &Audit::default()).await.unwrap();
    svc.create_user("a@x.com", &[], &Audit::default()).await.unwrap();

    let err = svc
        .set_group_permission("editors", "missing", Access::Allow, &Audit::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PermError::UnknownPermission { .. }));

    let err = svc
        .set_user_permission("a@x.com", "missing", Access::Deny, &Audit::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PermError::UnknownPermission { .. }));

    let map = [("missing".to_string(), Access::Allow)].into_iter().collect();
    let err = svc
        .replace_user_permissions("a@x.com", &map, &Audit::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PermError::UnknownPermission { .. }));
}

#[tokio::test]
async fn set_permission_on_missing_group_or_user_is_not_found() {
    let svc = new_service();
    svc.create_permission("write", "", false, &Audit::default())
        .await
        .unwrap();

    assert!(
        !svc.set_group_permission("ghosts", "write", Access::Allow, &Audit::default())
            .await
            .unwrap()
    );
    assert!(
        !svc.set_user_permission("ghost@x.com", "write", Access::Allow, &Audit::default())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn replace_permissions_swaps_the_whole_map() {
    let svc = new_service();
    for name in ["read", "write", "delete"] {
        svc.create_permission(name, "", false, &Audit::default())
            .await
            .unwrap();
    }
    svc.create_group("editors", &Audit::default()).await.unwrap();
    svc.set_group_permission("editors", "read", Access::Allow, &Audit::default())
        .await
        .unwrap();

    let replacement = [
        ("write".to_string(), Access::Allow),
        ("delete".to_string(), Access::Deny),
    ]
    .into_iter()
    .collect();
    assert!(
        svc.replace_group_permissions("editors", &replacement, &Audit::default())
            .await
            .unwrap()
    );

    let group = svc.get_group("editors").await.unwrap().unwrap();
    assert_eq!(group.permissions, replacement);
    // The previous entry is gone, not merged.
    assert!(!group.permissions.contains_key("read"));
}

#[tokio::test]
async fn user_lifecycle() {
    let svc = new_service();
    svc.create_permission("write", "", false, &Audit::default())
        .await
        .unwrap();

    let user = svc
        .create_user("a@x.com", &["editors".to_string()], &Audit::default())
        .await
        .unwrap();
    assert_eq!(user.groups, vec!["editors"]);

    assert!(matches!(
        svc.create_user("a@x.com", &[], &Audit::default()).await,
        Err(PermError::Conflict { .. })
    ));

    assert!(
        svc.set_user_permission("a@x.com", "write", Access::Deny, &Audit::default())
            .await
            .unwrap()
    );
    let user = svc.get_user("a@x.com").await.unwrap().unwrap();
    assert_eq!(user.permissions.get("write"), Some(&Access::Deny));

    assert!(
        svc.remove_user_permission("a@x.com", "write", &Audit::default())
            .await
            .unwrap()
    );

    assert!(svc.delete_user("a@x.com", &Audit::default()).await.unwrap());
    assert!(svc.get_user("a@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn list_operations_return_everything() {
    let svc = new_service();
    for name in ["a", "b", "c"] {
        svc.create_permission(name, "", false, &Audit::default())
            .await
            .unwrap();
    }
    svc.create_group("g1", &Audit::default()).await.unwrap();
    svc.create_group("g2", &Audit::default()).await.unwrap();
    svc.create_user("u@x.com", &[], &Audit::default()).await.unwrap();

    assert_eq!(svc.list_permissions().await.unwrap().len(), 3);
    assert_eq!(svc.list_groups().await.unwrap().len(), 2);
    assert_eq!(svc.list_users().await.unwrap().len(), 1);
}
