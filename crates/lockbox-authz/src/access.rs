//! Access check engine.
//!
//! Three entry points — [`AccessEngine::check_vault`],
//! [`AccessEngine::check_folder`], [`AccessEngine::check_item`] — share
//! one decision tree:
//!
//! 1. The resource must exist and join through to its vault.
//! 2. The owner of a personal vault has full access, no ACL needed.
//! 3. An admin sees shared vaults without ACL rows — but only sees:
//!    with no rows, any *specific* permission requirement is denied
//!    (`MissingPermissionsForAdmin`). This asymmetry is preserved from
//!    the product's history; see DESIGN.md before relying on it.
//! 4. Otherwise ACL rows visible to the principal are collected —
//!    vault rows for vaults; direct + root-ancestor + vault rows for
//!    folders; direct + same-vault folder rows for items — merged, and
//!    checked against the required set.
//!
//! A denial is a value, never an error. Only store failures surface as
//! [`AuthzError`], so "unreachable" and "unauthorized" cannot be
//! conflated. The engine holds no state and performs no writes; every
//! check recomputes from current store data.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use lockbox_store::models::{AclEntry, Folder, ResourceKind, Vault, VaultKind};
use lockbox_store::AuthzStore;

use crate::error::AuthzError;
use crate::hierarchy::root_ancestor_id;
use crate::permission::{self, Permission};
use crate::principal::Principal;

/// Why an access check denied.
///
/// Diagnostic only — callers must branch on the decision, never on the
/// reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DenyReason {
    /// The resource (or its vault) does not exist.
    ResourceNotFound,
    /// No ACL row anywhere grants this principal anything on the resource.
    NoAclPermissionsFound,
    /// ACL rows exist but their merged set does not cover the requirement.
    MissingPermissions,
    /// An admin asked for specific permissions on a shared vault that has
    /// no ACL rows for them — visibility alone does not grant permissions.
    MissingPermissionsForAdmin,
}

impl DenyReason {
    /// Stable string form, used in diagnostics and HTTP error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceNotFound => "ResourceNotFound",
            Self::NoAclPermissionsFound => "NoAclPermissionsFound",
            Self::MissingPermissions => "MissingPermissions",
            Self::MissingPermissionsForAdmin => "MissingPermissionsForAdmin",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenyReason),
}

impl AccessDecision {
    /// Whether access was granted.
    #[must_use]
    pub const fn allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// The deny reason, if denied.
    #[must_use]
    pub const fn reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(*reason),
        }
    }
}

/// The access check engine. Stateless — shares only the store handle.
pub struct AccessEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for AccessEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for AccessEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEngine").finish_non_exhaustive()
    }
}

impl<S: AuthzStore> AccessEngine<S> {
    /// Create an engine over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Check the principal's access to a vault.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Store`] if the store fails. Denials are
    /// returned as [`AccessDecision::Denied`], never as errors.
    pub async fn check_vault(
        &self,
        principal: &Principal,
        vault_id: Uuid,
        required: &[Permission],
    ) -> Result<AccessDecision, AuthzError> {
        let Some(vault) = self.store.vault(vault_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::ResourceNotFound));
        };

        let required: BTreeSet<Permission> = required.iter().copied().collect();
        if let Some(decision) = bypass(principal, &vault, &required) {
            return Ok(decision);
        }

        let principal_ids = principal.acl_match_ids();
        let rows = self
            .store
            .acl_entries(ResourceKind::Vault, &[vault.id], &principal_ids)
            .await?;

        Ok(decide(principal, &vault, rows, &required, "vault", vault_id))
    }

    /// Check the principal's access to a folder.
    ///
    /// Folder grants live on root folders; a nested folder is covered by
    /// its root ancestor's rows. Vault-level grants flow down to every
    /// folder in the vault.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Store`] if the store fails.
    pub async fn check_folder(
        &self,
        principal: &Principal,
        folder_id: Uuid,
        required: &[Permission],
    ) -> Result<AccessDecision, AuthzError> {
        let Some(folder) = self.store.folder(folder_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::ResourceNotFound));
        };
        let Some(vault) = self.store.vault(folder.vault_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::ResourceNotFound));
        };

        let required: BTreeSet<Permission> = required.iter().copied().collect();
        if let Some(decision) = bypass(principal, &vault, &required) {
            return Ok(decision);
        }

        let principal_ids = principal.acl_match_ids();
        let rows = self.folder_acl_rows(&folder, &principal_ids).await?;

        Ok(decide(principal, &vault, rows, &required, "folder", folder_id))
    }

    /// Check the principal's access to an item.
    ///
    /// An item is covered by its own rows plus — when it sits in a folder
    /// of the *same* vault — that folder's effective rows. A folder
    /// reference into a different vault is a data-integrity fault and
    /// grants nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Store`] if the store fails.
    pub async fn check_item(
        &self,
        principal: &Principal,
        item_id: Uuid,
        required: &[Permission],
    ) -> Result<AccessDecision, AuthzError> {
        let Some(item) = self.store.item(item_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::ResourceNotFound));
        };
        let Some(vault) = self.store.vault(item.vault_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::ResourceNotFound));
        };

        let required: BTreeSet<Permission> = required.iter().copied().collect();
        if let Some(decision) = bypass(principal, &vault, &required) {
            return Ok(decision);
        }

        let principal_ids = principal.acl_match_ids();
        let mut rows = self
            .store
            .acl_entries(ResourceKind::Item, &[item.id], &principal_ids)
            .await?;

        if let Some(folder_id) = item.folder_id {
            if let Some(folder) = self.store.folder(folder_id).await? {
                if folder.vault_id == item.vault_id {
                    rows.extend(self.folder_acl_rows(&folder, &principal_ids).await?);
                } else {
                    debug!(
                        item_id = %item.id,
                        folder_id = %folder.id,
                        "item and folder vault mismatch, folder grants ignored"
                    );
                }
            }
        }

        Ok(decide(principal, &vault, rows, &required, "item", item_id))
    }

    /// All ACL rows that cover a folder: direct rows, the root ancestor's
    /// rows (grants live on roots and propagate down), and the owning
    /// vault's rows.
    async fn folder_acl_rows(
        &self,
        folder: &Folder,
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, AuthzError> {
        let mut folder_ids = vec![folder.id];
        if let Some(root) = root_ancestor_id(folder) {
            if root != folder.id {
                folder_ids.push(root);
            }
        }

        let mut rows = self
            .store
            .acl_entries(ResourceKind::Folder, &folder_ids, principal_ids)
            .await?;
        rows.extend(
            self.store
                .acl_entries(ResourceKind::Vault, &[folder.vault_id], principal_ids)
                .await?,
        );
        Ok(rows)
    }
}

/// Ownership and admin short-circuits, evaluated before any ACL query.
fn bypass(
    principal: &Principal,
    vault: &Vault,
    required: &BTreeSet<Permission>,
) -> Option<AccessDecision> {
    // Personal-vault ownership is full access, whatever was required.
    if vault.kind == VaultKind::Personal && vault.owner_id == principal.user_id {
        return Some(AccessDecision::Allowed);
    }

    // Admins always see shared vaults. Visibility only — a specific
    // permission requirement still needs ACL rows (or denies below).
    if vault.kind == VaultKind::Shared && principal.is_admin() && required.is_empty() {
        return Some(AccessDecision::Allowed);
    }

    None
}

/// Evaluate collected ACL rows against the requirement.
fn decide(
    principal: &Principal,
    vault: &Vault,
    rows: Vec<AclEntry>,
    required: &BTreeSet<Permission>,
    resource_kind: &'static str,
    resource_id: Uuid,
) -> AccessDecision {
    if rows.is_empty() {
        let reason = if vault.kind == VaultKind::Shared && principal.is_admin() {
            DenyReason::MissingPermissionsForAdmin
        } else {
            DenyReason::NoAclPermissionsFound
        };
        debug!(kind = resource_kind, id = %resource_id, %reason, "access denied, no acl rows");
        return AccessDecision::Denied(reason);
    }

    let sets: Vec<&[String]> = rows.iter().map(|r| r.permissions.as_slice()).collect();
    let effective = permission::merge(&sets);

    if permission::satisfies(&effective, required) {
        AccessDecision::Allowed
    } else {
        debug!(
            kind = resource_kind,
            id = %resource_id,
            rows = rows.len(),
            "access denied, merged permissions insufficient"
        );
        AccessDecision::Denied(DenyReason::MissingPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use lockbox_store::models::{Item, PrincipalKind};
    use lockbox_store::MemoryStore;

    use crate::principal::ADMIN_ROLE;

    fn make_principal(roles: &[&str]) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            user_email: "p@example.com".to_owned(),
            roles: roles.iter().map(|r| (*r).to_owned()).collect(),
            group_ids: BTreeSet::new(),
        }
    }

    fn make_vault(owner: Uuid, kind: VaultKind) -> Vault {
        Vault {
            id: Uuid::new_v4(),
            name: "v".to_owned(),
            owner_id: owner,
            kind,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_folder(vault_id: Uuid, parent: Option<&Folder>) -> Folder {
        let id = Uuid::new_v4();
        let path = match parent {
            Some(p) => format!("{}/{id}", p.path),
            None => id.to_string(),
        };
        Folder {
            id,
            vault_id,
            parent_id: parent.map(|p| p.id),
            name: "f".to_owned(),
            path,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_item(vault_id: Uuid, folder_id: Option<Uuid>) -> Item {
        Item {
            id: Uuid::new_v4(),
            vault_id,
            folder_id,
            name: "login".to_owned(),
            username: None,
            url: None,
            notes: None,
            secret: Vec::new(),
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

    fn engine(store: &MemoryStore) -> AccessEngine<MemoryStore> {
        AccessEngine::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn missing_resource_denies_not_found() {
        let store = MemoryStore::new();
        let eng = engine(&store);
        let p = make_principal(&[]);

        for decision in [
            eng.check_vault(&p, Uuid::new_v4(), &[]).await.unwrap(),
            eng.check_folder(&p, Uuid::new_v4(), &[]).await.unwrap(),
            eng.check_item(&p, Uuid::new_v4(), &[]).await.unwrap(),
        ] {
            assert_eq!(decision, AccessDecision::Denied(DenyReason::ResourceNotFound));
        }
    }

    #[tokio::test]
    async fn vault_missing_behind_item_denies_not_found() {
        let store = MemoryStore::new();
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        let item_id = store.add_item(make_item(vault_id, None)).await;
        store.remove_vault(vault_id).await;

        let eng = engine(&store);
        let decision = eng
            .check_item(&make_principal(&[]), item_id, &[])
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Denied(DenyReason::ResourceNotFound));
    }

    #[tokio::test]
    async fn personal_owner_has_full_access_without_acl() {
        let store = MemoryStore::new();
        let owner = make_principal(&[]);
        let vault = make_vault(owner.user_id, VaultKind::Personal);
        let vault_id = store.add_vault(vault).await;
        let folder = make_folder(vault_id, None);
        let folder_id = store.add_folder(folder).await;
        let item_id = store.add_item(make_item(vault_id, Some(folder_id))).await;

        let eng = engine(&store);
        let all = [Permission::ReadOnly, Permission::ReadWrite, Permission::Delete, Permission::ManageAcl];

        assert!(eng.check_vault(&owner, vault_id, &all).await.unwrap().allowed());
        assert!(eng.check_folder(&owner, folder_id, &all).await.unwrap().allowed());
        assert!(eng.check_item(&owner, item_id, &all).await.unwrap().allowed());
    }

    #[tokio::test]
    async fn shared_vault_owner_is_not_bypassed() {
        let store = MemoryStore::new();
        let owner = make_principal(&[]);
        let vault_id = store
            .add_vault(make_vault(owner.user_id, VaultKind::Shared))
            .await;

        let eng = engine(&store);
        let decision = eng.check_vault(&owner, vault_id, &[]).await.unwrap();
        assert_eq!(
            decision,
            AccessDecision::Denied(DenyReason::NoAclPermissionsFound)
        );
    }

    #[tokio::test]
    async fn admin_sees_shared_vault_but_gets_no_permissions() {
        let store = MemoryStore::new();
        let admin = make_principal(&[ADMIN_ROLE]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;

        let eng = engine(&store);

        // Bare visibility: allowed with no ACL rows at all.
        assert!(eng.check_vault(&admin, vault_id, &[]).await.unwrap().allowed());

        // Any specific requirement without rows: the admin-specific denial.
        let decision = eng
            .check_vault(&admin, vault_id, &[Permission::ReadWrite])
            .await
            .unwrap();
        assert_eq!(
            decision,
            AccessDecision::Denied(DenyReason::MissingPermissionsForAdmin)
        );
    }

    #[tokio::test]
    async fn admin_gets_no_bypass_on_foreign_personal_vault() {
        let store = MemoryStore::new();
        let admin = make_principal(&[ADMIN_ROLE]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Personal))
            .await;

        let eng = engine(&store);
        let decision = eng.check_vault(&admin, vault_id, &[]).await.unwrap();
        assert_eq!(
            decision,
            AccessDecision::Denied(DenyReason::NoAclPermissionsFound)
        );
    }

    #[tokio::test]
    async fn admin_with_role_acl_row_gets_permissions() {
        let store = MemoryStore::new();
        let admin = make_principal(&[ADMIN_ROLE]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        store
            .add_acl(grant(ResourceKind::Vault, vault_id, ADMIN_ROLE, &["READ_WRITE"]))
            .await;

        let eng = engine(&store);
        assert!(eng
            .check_vault(&admin, vault_id, &[Permission::ReadWrite])
            .await
            .unwrap()
            .allowed());
        // The ladder does not reach DELETE.
        assert_eq!(
            eng.check_vault(&admin, vault_id, &[Permission::Delete])
                .await
                .unwrap(),
            AccessDecision::Denied(DenyReason::MissingPermissions)
        );
    }

    #[tokio::test]
    async fn vault_grant_flows_down_to_folders() {
        let store = MemoryStore::new();
        let p = make_principal(&[]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        let root = make_folder(vault_id, None);
        let child = make_folder(vault_id, Some(&root));
        let child_id = child.id;
        store.add_folder(root).await;
        store.add_folder(child).await;
        store
            .add_acl(grant(
                ResourceKind::Vault,
                vault_id,
                &p.user_id.to_string(),
                &["READ_ONLY"],
            ))
            .await;

        let eng = engine(&store);
        assert!(eng
            .check_folder(&p, child_id, &[Permission::ReadOnly])
            .await
            .unwrap()
            .allowed());
        assert_eq!(
            eng.check_folder(&p, child_id, &[Permission::ReadWrite])
                .await
                .unwrap(),
            AccessDecision::Denied(DenyReason::MissingPermissions)
        );
    }

    #[tokio::test]
    async fn root_folder_grant_covers_nested_point_check() {
        let store = MemoryStore::new();
        let p = make_principal(&[]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        let root = make_folder(vault_id, None);
        let child = make_folder(vault_id, Some(&root));
        let grandchild = make_folder(vault_id, Some(&child));
        let (root_id, grandchild_id) = (root.id, grandchild.id);
        store.add_folder(root).await;
        store.add_folder(child).await;
        store.add_folder(grandchild).await;
        store
            .add_acl(grant(
                ResourceKind::Folder,
                root_id,
                &p.user_id.to_string(),
                &["EDIT"],
            ))
            .await;

        let eng = engine(&store);
        // The legacy EDIT alias normalizes to READ_WRITE and propagates
        // from the root down to the grandchild.
        assert!(eng
            .check_folder(&p, grandchild_id, &[Permission::ReadWrite])
            .await
            .unwrap()
            .allowed());
    }

    #[tokio::test]
    async fn item_inherits_folder_grant_from_same_vault() {
        let store = MemoryStore::new();
        let p = make_principal(&[]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        let folder = make_folder(vault_id, None);
        let folder_id = store.add_folder(folder).await;
        let item_id = store.add_item(make_item(vault_id, Some(folder_id))).await;
        store
            .add_acl(grant(
                ResourceKind::Folder,
                folder_id,
                &p.user_id.to_string(),
                &["READ_ONLY"],
            ))
            .await;

        let eng = engine(&store);
        assert!(eng
            .check_item(&p, item_id, &[Permission::ReadOnly])
            .await
            .unwrap()
            .allowed());
        assert_eq!(
            eng.check_item(&p, item_id, &[Permission::ReadWrite])
                .await
                .unwrap(),
            AccessDecision::Denied(DenyReason::MissingPermissions)
        );
    }

    #[tokio::test]
    async fn vault_mismatch_blocks_folder_inheritance() {
        let store = MemoryStore::new();
        let p = make_principal(&[]);
        let vault_a = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        let vault_b = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;

        // Folder lives in vault B; the item claims it but lives in vault A.
        let folder = make_folder(vault_b, None);
        let folder_id = store.add_folder(folder).await;
        let item_id = store.add_item(make_item(vault_a, Some(folder_id))).await;
        store
            .add_acl(grant(
                ResourceKind::Folder,
                folder_id,
                &p.user_id.to_string(),
                &["DELETE"],
            ))
            .await;

        let eng = engine(&store);
        let decision = eng
            .check_item(&p, item_id, &[Permission::ReadOnly])
            .await
            .unwrap();
        assert_eq!(
            decision,
            AccessDecision::Denied(DenyReason::NoAclPermissionsFound)
        );
    }

    #[tokio::test]
    async fn rows_from_multiple_principals_merge() {
        let store = MemoryStore::new();
        let mut p = make_principal(&[]);
        p.group_ids.insert("eng".to_owned());
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        store
            .add_acl(grant(ResourceKind::Vault, vault_id, "eng", &["READ_ONLY"]))
            .await;
        store
            .add_acl(grant(
                ResourceKind::Vault,
                vault_id,
                &p.user_id.to_string(),
                &["DELETE"],
            ))
            .await;

        let eng = engine(&store);
        // DELETE expands the whole ladder once both rows merge.
        assert!(eng
            .check_vault(
                &p,
                vault_id,
                &[Permission::ReadOnly, Permission::ReadWrite, Permission::Delete]
            )
            .await
            .unwrap()
            .allowed());
    }

    #[tokio::test]
    async fn email_matched_rows_count() {
        let store = MemoryStore::new();
        let p = make_principal(&[]);
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;
        store
            .add_acl(grant(
                ResourceKind::Vault,
                vault_id,
                "p@example.com",
                &["READ_ONLY"],
            ))
            .await;

        let eng = engine(&store);
        assert!(eng
            .check_vault(&p, vault_id, &[Permission::ReadOnly])
            .await
            .unwrap()
            .allowed());
    }
}
