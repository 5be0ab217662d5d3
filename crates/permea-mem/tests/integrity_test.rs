//! Deletion guards and dependency views.

use permea_core::integrity::IntegrityChecker;
use permea_core::models::access::Access;
use permea_core::models::history::Audit;
use permea_core::store::{GroupStore, UserStore};
use permea_mem::{MemoryGroupStore, MemoryUserStore, new_service};

#[tokio::test]
async fn unreferenced_permission_is_deletable() {
    let svc = new_service();
    svc.create_permission("orphan", "", false, &Audit::default())
        .await
        .unwrap();

    let check = svc.can_delete_permission("orphan").await.unwrap();
    assert!(check.is_valid);
    assert!(check.reason.is_none());
}

#[tokio::test]
async fn group_references_block_permission_deletion() {
    let svc = new_service();
    let audit = Audit::default();
    svc.create_permission("write", "", false, &audit).await.unwrap();
    for name in ["zeta", "alpha"] {
        svc.create_group(name, &audit).await.unwrap();
        svc.set_group_permission(name, "write", Access::Allow, &audit)
            .await
            .unwrap();
    }
    svc.create_user("u@x.com", &[], &audit).await.unwrap();
    svc.set_user_permission("u@x.com", "write", Access::Deny, &audit)
        .await
        .unwrap();

    // Groups take priority and are listed sorted; user references are
    // not mentioned while any group still maps the permission.
    let check = svc.can_delete_permission("write").await.unwrap();
    assert!(!check.is_valid);
    assert_eq!(
        check.reason.as_deref(),
        Some("Permission is used by groups: alpha, zeta")
    );
}

#[tokio::test]
async fn user_references_block_permission_deletion() {
    let svc = new_service();
    let audit = Audit::default();
    svc.create_permission("write", "", false, &audit).await.unwrap();
    for email in ["b@x.com", "a@x.com"] {
        svc.create_user(email, &[], &audit).await.unwrap();
        svc.set_user_permission(email, "write", Access::Allow, &audit)
            .await
            .unwrap();
    }

    let check = svc.can_delete_permission("write").await.unwrap();
    assert!(!check.is_valid);
    assert_eq!(
        check.reason.as_deref(),
        Some("Permission is used by users: a@x.com, b@x.com")
    );
}

#[tokio::test]
async fn permission_becomes_deletable_after_references_are_removed() {
    let svc = new_service();
    let audit = Audit::default();
    svc.create_permission("write", "", false, &audit).await.unwrap();
    svc.create_group("editors", &audit).await.unwrap();
    svc.set_group_permission("editors", "write", Access::Allow, &audit)
        .await
        .unwrap();
    svc.create_user("a@x.com", &[], &audit).await.unwrap();
    svc.set_user_permission("a@x.com", "write", Access::Deny, &audit)
        .await
        .unwrap();

    assert!(!svc.can_delete_permission("write").await.unwrap().is_valid);

    svc.remove_group_permission("editors", "write", &audit)
        .await
        .unwrap();
    // Still blocked: a user maps it.
    let check = svc.can_delete_permission("write").await.unwrap();
    assert!(!check.is_valid);
    assert_eq!(
        check.reason.as_deref(),
        Some("Permission is used by users: a@x.com")
    );

    svc.remove_user_permission("a@x.com", "write", &audit)
        .await
        .unwrap();
    assert!(svc.can_delete_permission("write").await.unwrap().is_valid);
}

#[tokio::test]
async fn membership_blocks_group_deletion() {
    let svc = new_service();
    let audit = Audit::default();
    svc.create_group("editors", &audit).await.unwrap();
    svc.create_user("b@x.com", &["editors".to_string()], &audit)
        .await
        .unwrap();
    svc.create_user("a@x.com", &["editors".to_string()], &audit)
        .await
        .unwrap();

    let check = svc.can_delete_group("editors").await.unwrap();
    assert!(!check.is_valid);
    assert_eq!(
        check.reason.as_deref(),
        Some("Group is assigned to users: a@x.com, b@x.com")
    );

    svc.delete_user("a@x.com", &audit).await.unwrap();
    svc.delete_user("b@x.com", &audit).await.unwrap();
    assert!(svc.can_delete_group("editors").await.unwrap().is_valid);
}

#[tokio::test]
async fn dependency_views_list_sorted_references() {
    let svc = new_service();
    let audit = Audit::default();
    svc.create_permission("write", "", false, &audit).await.unwrap();
    for name in ["zeta", "alpha"] {
        svc.create_group(name, &audit).await.unwrap();
        svc.set_group_permission(name, "write", Access::Allow, &audit)
            .await
            .unwrap();
    }
    svc.create_user("b@x.com", &["zeta".to_string()], &audit)
        .await
        .unwrap();
    svc.set_user_permission("b@x.com", "write", Access::Deny, &audit)
        .await
        .unwrap();
    svc.create_user("a@x.com", &["zeta".to_string()], &audit)
        .await
        .unwrap();

    let deps = svc.permission_dependencies("write").await.unwrap();
    assert_eq!(deps.permission, "write");
    assert_eq!(deps.groups, vec!["alpha", "zeta"]);
    assert_eq!(deps.users, vec!["b@x.com"]);

    let deps = svc.group_dependencies("zeta").await.unwrap();
    assert_eq!(deps.group, "zeta");
    assert_eq!(deps.users, vec!["a@x.com", "b@x.com"]);

    // Unknown names yield empty views, not errors.
    let deps = svc.permission_dependencies("ghost").await.unwrap();
    assert!(deps.groups.is_empty() && deps.users.is_empty());
}

#[tokio::test]
async fn standalone_checker_reads_the_stores_directly() {
    let groups = MemoryGroupStore::new();
    let users = MemoryUserStore::new();
    groups.create("editors").await.unwrap();
    groups
        .set_permission("editors", "write", Access::Allow, None)
        .await
        .unwrap();
    users
        .create("a@x.com", &["editors".to_string()], None)
        .await
        .unwrap();

    let checker = IntegrityChecker::new(groups, users);

    let check = checker.can_delete_permission("write").await.unwrap();
    assert!(!check.is_valid);
    assert_eq!(
        check.reason.as_deref(),
        Some("Permission is used by groups: editors")
    );

    let deps = checker.group_dependencies("editors").await.unwrap();
    assert_eq!(deps.users, vec!["a@x.com"]);
}
