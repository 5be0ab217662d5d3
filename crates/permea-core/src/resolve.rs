//! Permission resolution engine.
//!
//! Merges three precedence levels into one effective allow/deny
//! decision per permission: system defaults, then group rules, then the
//! user's own overrides. Groups are applied in alphabetical order of
//! their name — this is a deterministic, load-bearing tie-break: when
//! two groups disagree about a permission, the alphabetically later
//! group wins. The user's own entries overwrite everything.
//!
//! Both entry points are pure functions over snapshots already read
//! from the store; defaults are recomputed from the `is_default` flags
//! on every call, never cached, since defaults can change at runtime.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::access::Access;
use crate::models::group::Group;
use crate::models::permission::Permission;
use crate::models::trace::{TraceAction, TraceItem, TraceLevel, TraceStep};
use crate::models::user::User;

/// Sort the groups a user actually resolves to, alphabetically by name.
///
/// The caller has already dropped references to groups that no longer
/// exist (they are silently skipped, not errors).
fn sorted<'a>(groups: &'a [Group]) -> Vec<&'a Group> {
    let mut sorted: Vec<&Group> = groups.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

/// Compute the effective permission map for a user.
///
/// The result contains one entry per permission flagged default (seeded
/// `true`) plus every permission named by a resolved group or by the
/// user directly. Permissions absent from the map are implicitly
/// denied.
pub fn resolve(user: &User, groups: &[Group], permissions: &[Permission]) -> BTreeMap<String, bool> {
    let mut result: BTreeMap<String, bool> = permissions
        .iter()
        .filter(|p| p.is_default)
        .map(|p| (p.name.clone(), true))
        .collect();

    for group in sorted(groups) {
        for (name, access) in &group.permissions {
            result.insert(name.clone(), access.is_allow());
        }
    }

    for (name, access) in &user.permissions {
        result.insert(name.clone(), access.is_allow());
    }

    result
}

/// Compute the step-by-step resolution chain for every permission that
/// participates in this user's resolution.
///
/// Items cover the union of default-flagged permissions, permissions
/// named by any resolved group, and the user's own entries, in
/// alphabetical order. Each chain is Default → Group(s) → User; the
/// Default step carries action `NONE` when the permission is not
/// flagged default, and `final_result` is the value after the last
/// applied step.
pub fn resolve_trace(user: &User, groups: &[Group], permissions: &[Permission]) -> Vec<TraceItem> {
    let sorted_groups = sorted(groups);

    let mut names: BTreeSet<&str> = permissions
        .iter()
        .filter(|p| p.is_default)
        .map(|p| p.name.as_str())
        .collect();
    for group in &sorted_groups {
        names.extend(group.permissions.keys().map(String::as_str));
    }
    names.extend(user.permissions.keys().map(String::as_str));

    names
        .into_iter()
        .map(|name| {
            let mut chain = Vec::new();
            let mut final_result = false;

            let is_default = permissions.iter().any(|p| p.is_default && p.name == name);
            chain.push(TraceStep {
                level: TraceLevel::Default,
                source: "system".into(),
                action: if is_default {
                    TraceAction::Allow
                } else {
                    TraceAction::None
                },
            });
            if is_default {
                final_result = true;
            }

            for group in &sorted_groups {
                if let Some(access) = group.permissions.get(name) {
                    chain.push(TraceStep {
                        level: TraceLevel::Group,
                        source: group.name.clone(),
                        action: (*access).into(),
                    });
                    final_result = access.is_allow();
                }
            }

            if let Some(access) = user.permissions.get(name) {
                chain.push(TraceStep {
                    level: TraceLevel::User,
                    source: user.email.clone(),
                    action: (*access).into(),
                });
                final_result = access.is_allow();
            }

            TraceItem {
                permission: name.to_owned(),
                final_result: Access::from_bool(final_result),
                chain,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(name: &str, is_default: bool) -> Permission {
        Permission {
            name: name.into(),
            description: String::new(),
            is_default,
        }
    }

    fn group(name: &str, entries: &[(&str, Access)]) -> Group {
        Group {
            name: name.into(),
            permissions: entries
                .iter()
                .map(|(n, a)| (n.to_string(), *a))
                .collect(),
        }
    }

    fn user(email: &str, groups: &[&str], entries: &[(&str, Access)]) -> User {
        User {
            email: email.into(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            permissions: entries
                .iter()
                .map(|(n, a)| (n.to_string(), *a))
                .collect(),
        }
    }

    #[test]
    fn defaults_seed_the_result() {
        let perms = [perm("read", true), perm("write", false)];
        let u = user("a@x.com", &[], &[]);
        let result = resolve(&u, &[], &perms);

        assert_eq!(result.get("read"), Some(&true));
        // Non-default permissions are absent, not present-as-false.
        assert!(!result.contains_key("write"));
    }

    #[test]
    fn alphabetically_later_group_wins() {
        let perms = [perm("x", false)];
        let alpha = group("alpha", &[("x", Access::Allow)]);
        let beta = group("beta", &[("x", Access::Deny)]);
        let u = user("a@x.com", &["alpha", "beta"], &[]);

        // beta sorts after alpha, so beta's DENY wins regardless of the
        // membership list order.
        let result = resolve(&u, &[beta.clone(), alpha.clone()], &perms);
        assert_eq!(result.get("x"), Some(&false));

        // Swap the names and the winner flips.
        let a2 = group("zeta", &[("x", Access::Allow)]);
        let b2 = group("beta", &[("x", Access::Deny)]);
        let result = resolve(&u, &[a2, b2], &perms);
        assert_eq!(result.get("x"), Some(&true));
    }

    #[test]
    fn user_override_beats_groups_and_defaults() {
        let perms = [perm("read", true), perm("write", false)];
        let editors = group("editors", &[("write", Access::Allow)]);
        let u = user("a@x.com", &["editors"], &[("write", Access::Deny)]);

        let result = resolve(&u, &[editors], &perms);
        assert_eq!(result.get("read"), Some(&true));
        assert_eq!(result.get("write"), Some(&false));
    }

    #[test]
    fn group_can_deny_a_default() {
        let perms = [perm("read", true)];
        let restricted = group("restricted", &[("read", Access::Deny)]);
        let u = user("a@x.com", &["restricted"], &[]);

        let result = resolve(&u, &[restricted], &perms);
        assert_eq!(result.get("read"), Some(&false));
    }

    #[test]
    fn trace_chain_is_default_then_groups_then_user() {
        let perms = [perm("write", false)];
        let alpha = group("alpha", &[("write", Access::Allow)]);
        let beta = group("beta", &[("write", Access::Deny)]);
        let u = user("a@x.com", &["beta", "alpha"], &[("write", Access::Allow)]);

        let items = resolve_trace(&u, &[beta, alpha], &perms);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.permission, "write");
        assert_eq!(item.final_result, Access::Allow);

        let levels: Vec<TraceLevel> = item.chain.iter().map(|s| s.level).collect();
        assert_eq!(
            levels,
            vec![
                TraceLevel::Default,
                TraceLevel::Group,
                TraceLevel::Group,
                TraceLevel::User
            ]
        );
        assert_eq!(item.chain[0].source, "system");
        assert_eq!(item.chain[0].action, TraceAction::None);
        // Group steps in alphabetical order.
        assert_eq!(item.chain[1].source, "alpha");
        assert_eq!(item.chain[2].source, "beta");
        assert_eq!(item.chain[3].source, "a@x.com");
    }

    #[test]
    fn trace_default_step_allows_for_default_permissions() {
        let perms = [perm("read", true)];
        let u = user("a@x.com", &[], &[]);

        let items = resolve_trace(&u, &[], &perms);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].chain.len(), 1);
        assert_eq!(items[0].chain[0].action, TraceAction::Allow);
        assert_eq!(items[0].final_result, Access::Allow);
    }

    #[test]
    fn trace_items_are_alphabetical_and_match_flat_result() {
        let perms = [perm("read", true), perm("write", false), perm("zip", false)];
        let editors = group("editors", &[("write", Access::Allow), ("zip", Access::Deny)]);
        let u = user("a@x.com", &["editors"], &[("write", Access::Deny)]);

        let flat = resolve(&u, std::slice::from_ref(&editors), &perms);
        let items = resolve_trace(&u, std::slice::from_ref(&editors), &perms);

        let names: Vec<&str> = items.iter().map(|i| i.permission.as_str()).collect();
        assert_eq!(names, vec!["read", "write", "zip"]);

        for item in &items {
            assert_eq!(
                item.final_result.is_allow(),
                flat[&item.permission],
                "trace and flat results disagree for {}",
                item.permission
            );
        }
    }

    #[test]
    fn worked_example_read_write_editors() {
        // read is default; editors allows write; the user denies write.
        let perms = [perm("read", true), perm("write", false)];
        let editors = group("editors", &[("write", Access::Allow)]);
        let u = user("a@x.com", &["editors"], &[("write", Access::Deny)]);

        let result = resolve(&u, &[editors], &perms);
        assert_eq!(result.len(), 2);
        assert_eq!(result["read"], true);
        assert_eq!(result["write"], false);
    }
}
