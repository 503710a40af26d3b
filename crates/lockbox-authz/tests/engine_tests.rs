//! End-to-end engine scenarios against the in-memory store.
//!
//! These cross the module seams the unit tests stay inside: principal
//! resolution feeding access checks, folder grants reaching items, and
//! scope resolution next to point checks.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use lockbox_authz::{
    AccessDecision, AccessEngine, ActionGate, DenyReason, NoDirectory, Permission, Principal,
    PrincipalResolver, ScopeEntity, ScopeMode, ScopeResolver, ScopeVerb, Subject,
};
use lockbox_store::models::{
    AclEntry, Folder, Item, PrincipalKind, ResourceKind, Vault, VaultKind,
};
use lockbox_store::MemoryStore;

fn subject() -> Subject {
    Subject {
        user_id: Uuid::new_v4(),
        email: "owner@example.com".to_owned(),
        roles: Vec::new(),
    }
}

fn vault(owner: Uuid, kind: VaultKind) -> Vault {
    Vault {
        id: Uuid::new_v4(),
        name: "vault".to_owned(),
        owner_id: owner,
        kind,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn folder(vault_id: Uuid, parent: Option<&Folder>) -> Folder {
    let id = Uuid::new_v4();
    let path = match parent {
        Some(p) => format!("{}/{id}", p.path),
        None => id.to_string(),
    };
    Folder {
        id,
        vault_id,
        parent_id: parent.map(|p| p.id),
        name: "folder".to_owned(),
        path,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn item(vault_id: Uuid, folder_id: Option<Uuid>) -> Item {
    Item {
        id: Uuid::new_v4(),
        vault_id,
        folder_id,
        name: "login".to_owned(),
        username: Some("root".to_owned()),
        url: None,
        notes: None,
        secret: b"ciphertext".to_vec(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn grant(kind: ResourceKind, resource_id: Uuid, principal_id: &str, tokens: &[&str]) -> AclEntry {
    AclEntry {
        id: Uuid::new_v4(),
        resource_kind: kind,
        resource_id,
        principal_kind: PrincipalKind::User,
        principal_id: principal_id.to_owned(),
        permissions: tokens.iter().map(|t| (*t).to_owned()).collect(),
        inherit: false,
        created_by: None,
        created_at: Utc::now(),
    }
}

async fn resolve(store: &MemoryStore, subject: &Subject) -> Principal {
    PrincipalResolver::new(Arc::new(store.clone()), Arc::new(NoDirectory))
        .resolve(subject)
        .await
}

#[tokio::test]
async fn owner_reaches_nested_item_and_stranger_does_not() {
    let store = MemoryStore::new();
    let owner_subject = subject();
    let stranger_subject = subject();

    // Personal vault V1 owned by U, folder F1 in V1, item I1 in F1.
    let v1 = store
        .add_vault(vault(owner_subject.user_id, VaultKind::Personal))
        .await;
    let f1 = folder(v1, None);
    let f1_id = store.add_folder(f1).await;
    let i1 = store.add_item(item(v1, Some(f1_id))).await;

    let engine = AccessEngine::new(Arc::new(store.clone()));
    let owner = resolve(&store, &owner_subject).await;
    let stranger = resolve(&store, &stranger_subject).await;

    assert!(engine.check_item(&owner, i1, &[]).await.unwrap().allowed());

    let decision = engine.check_item(&stranger, i1, &[]).await.unwrap();
    assert_eq!(
        decision,
        AccessDecision::Denied(DenyReason::NoAclPermissionsFound)
    );
}

#[tokio::test]
async fn group_grant_on_root_folder_reaches_deep_item() {
    let store = MemoryStore::new();
    let member_subject = subject();

    let shared = store.add_vault(vault(Uuid::new_v4(), VaultKind::Shared)).await;
    let root = folder(shared, None);
    let nested = folder(shared, Some(&root));
    let root_id = root.id;
    let nested_id = nested.id;
    store.add_folder(root).await;
    store.add_folder(nested).await;
    let deep_item = store.add_item(item(shared, Some(nested_id))).await;

    store
        .add_membership(lockbox_store::models::GroupMembership {
            id: Uuid::new_v4(),
            group_id: "eng".to_owned(),
            user_id: None,
            email: Some(member_subject.email.clone()),
            created_at: Utc::now(),
        })
        .await;
    store
        .add_acl(grant(ResourceKind::Folder, root_id, "eng", &["READ_ONLY"]))
        .await;

    let engine = AccessEngine::new(Arc::new(store.clone()));
    let member = resolve(&store, &member_subject).await;

    // The grant flows: group membership (by email) → root folder row →
    // nested folder → item.
    assert!(engine
        .check_item(&member, deep_item, &[Permission::ReadOnly])
        .await
        .unwrap()
        .allowed());
    assert_eq!(
        engine
            .check_item(&member, deep_item, &[Permission::ReadWrite])
            .await
            .unwrap(),
        AccessDecision::Denied(DenyReason::MissingPermissions)
    );
}

#[tokio::test]
async fn point_check_and_listing_agree_on_ancestor_grants() {
    let store = MemoryStore::new();
    let member_subject = subject();

    let shared = store.add_vault(vault(Uuid::new_v4(), VaultKind::Shared)).await;
    let root = folder(shared, None);
    let nested = folder(shared, Some(&root));
    let root_id = root.id;
    let nested_id = nested.id;
    store.add_folder(root).await;
    store.add_folder(nested).await;
    store
        .add_acl(grant(
            ResourceKind::Folder,
            root_id,
            &member_subject.user_id.to_string(),
            &["READ_ONLY"],
        ))
        .await;

    let member = resolve(&store, &member_subject).await;

    // Listing path: descendant expansion puts the nested folder in the
    // visible set.
    struct OpenGate;
    impl ActionGate for OpenGate {
        fn granted(&self, _p: &Principal, action: &str) -> bool {
            action == "folders.read.scope.any"
        }
    }
    let scopes = ScopeResolver::new(Arc::new(store.clone()), Arc::new(OpenGate));
    let mode = scopes.resolve(&member, ScopeEntity::Folders, ScopeVerb::Read);
    assert_eq!(mode, ScopeMode::Any);
    let lockbox_authz::VisibleSet::Ids { folder_ids, .. } =
        scopes.visible_set(&member, mode).await.unwrap()
    else {
        panic!("expected ids");
    };
    assert!(folder_ids.contains(&nested_id));

    // Point check: the same nested folder is accessible through its root
    // ancestor's grant.
    let engine = AccessEngine::new(Arc::new(store.clone()));
    assert!(engine
        .check_folder(&member, nested_id, &[Permission::ReadOnly])
        .await
        .unwrap()
        .allowed());
}

#[tokio::test]
async fn fan_out_capability_flags_are_independent() {
    let store = MemoryStore::new();
    let member_subject = subject();

    let shared = store.add_vault(vault(Uuid::new_v4(), VaultKind::Shared)).await;
    let items: Vec<Uuid> = {
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(store.add_item(item(shared, None)).await);
        }
        ids
    };
    let me = member_subject.user_id.to_string();
    // Write on the first two items, read on the rest.
    store
        .add_acl(grant(ResourceKind::Item, items[0], &me, &["READ_WRITE"]))
        .await;
    store
        .add_acl(grant(ResourceKind::Item, items[1], &me, &["DELETE"]))
        .await;
    store
        .add_acl(grant(ResourceKind::Item, items[2], &me, &["READ_ONLY"]))
        .await;
    store
        .add_acl(grant(ResourceKind::Item, items[3], &me, &["READ_ONLY"]))
        .await;

    let engine = AccessEngine::new(Arc::new(store.clone()));
    let member = resolve(&store, &member_subject).await;

    // Per-row flags computed concurrently, the way a listing handler
    // fans out.
    let mut set = tokio::task::JoinSet::new();
    for id in items.clone() {
        let engine = engine.clone();
        let member = member.clone();
        set.spawn(async move {
            let can_write = engine
                .check_item(&member, id, &[Permission::ReadWrite])
                .await
                .unwrap()
                .allowed();
            let can_delete = engine
                .check_item(&member, id, &[Permission::Delete])
                .await
                .unwrap()
                .allowed();
            (id, can_write, can_delete)
        });
    }

    let mut flags = std::collections::HashMap::new();
    while let Some(res) = set.join_next().await {
        let (id, w, d) = res.unwrap();
        flags.insert(id, (w, d));
    }

    assert_eq!(flags[&items[0]], (true, false));
    assert_eq!(flags[&items[1]], (true, true));
    assert_eq!(flags[&items[2]], (false, false));
    assert_eq!(flags[&items[3]], (false, false));
}

#[tokio::test]
async fn revoked_grant_is_gone_on_the_next_check() {
    // No decision caching: the same engine over the same store sees a
    // freshly inserted grant immediately, and its absence after removal
    // would equally be immediate.
    let store = MemoryStore::new();
    let member_subject = subject();
    let shared = store.add_vault(vault(Uuid::new_v4(), VaultKind::Shared)).await;

    let engine = AccessEngine::new(Arc::new(store.clone()));
    let member = resolve(&store, &member_subject).await;

    assert_eq!(
        engine
            .check_vault(&member, shared, &[Permission::ReadOnly])
            .await
            .unwrap(),
        AccessDecision::Denied(DenyReason::NoAclPermissionsFound)
    );

    store
        .add_acl(grant(
            ResourceKind::Vault,
            shared,
            &member_subject.user_id.to_string(),
            &["READ_ONLY"],
        ))
        .await;

    assert!(engine
        .check_vault(&member, shared, &[Permission::ReadOnly])
        .await
        .unwrap()
        .allowed());
}

#[tokio::test]
async fn expansion_covers_branching_subtree() {
    // expand({A}) where A -> {B, C}, B -> {D} returns {A, B, C, D}.
    let store = MemoryStore::new();
    let v = store.add_vault(vault(Uuid::new_v4(), VaultKind::Shared)).await;
    let a = folder(v, None);
    let b = folder(v, Some(&a));
    let c = folder(v, Some(&a));
    let d = folder(v, Some(&b));
    let ids = [a.id, b.id, c.id, d.id];
    for f in [a, b, c, d] {
        store.add_folder(f).await;
    }

    let out = lockbox_authz::hierarchy::expand_descendants(&store, &HashSet::from([ids[0]]))
        .await
        .unwrap();
    assert_eq!(out, HashSet::from(ids));
}
