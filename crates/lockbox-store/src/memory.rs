//! In-memory store backend for testing.
//!
//! All data lives in `HashMap`s behind a `RwLock` — nothing persists. Use
//! this for unit and integration tests where the engine needs a real
//! [`AuthzStore`] without a database. The `add_*` builders insert fixture
//! rows directly, bypassing the validation the HTTP layer performs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AclEntry, ApiToken, Folder, GroupMembership, Item, ResourceKind, Vault};
use crate::{AuthzStore, StoreError};

/// An in-memory [`AuthzStore`] backed by `HashMap`s.
///
/// Thread-safe and async-compatible. Cloning is cheap — clones share the
/// same underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    vaults: HashMap<Uuid, Vault>,
    folders: HashMap<Uuid, Folder>,
    items: HashMap<Uuid, Item>,
    acl: Vec<AclEntry>,
    memberships: Vec<GroupMembership>,
    tokens: Vec<ApiToken>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vault fixture and return its ID.
    pub async fn add_vault(&self, vault: Vault) -> Uuid {
        let id = vault.id;
        self.inner.write().await.vaults.insert(id, vault);
        id
    }

    /// Insert a folder fixture and return its ID.
    pub async fn add_folder(&self, folder: Folder) -> Uuid {
        let id = folder.id;
        self.inner.write().await.folders.insert(id, folder);
        id
    }

    /// Insert an item fixture and return its ID.
    pub async fn add_item(&self, item: Item) -> Uuid {
        let id = item.id;
        self.inner.write().await.items.insert(id, item);
        id
    }

    /// Insert an ACL entry fixture.
    pub async fn add_acl(&self, entry: AclEntry) {
        self.inner.write().await.acl.push(entry);
    }

    /// Insert a static group membership fixture.
    pub async fn add_membership(&self, membership: GroupMembership) {
        self.inner.write().await.memberships.push(membership);
    }

    /// Insert an API token fixture.
    pub async fn add_token(&self, token: ApiToken) {
        self.inner.write().await.tokens.push(token);
    }

    /// Remove a vault fixture.
    pub async fn remove_vault(&self, id: Uuid) {
        self.inner.write().await.vaults.remove(&id);
    }
}

#[async_trait::async_trait]
impl AuthzStore for MemoryStore {
    async fn vault(&self, id: Uuid) -> Result<Option<Vault>, StoreError> {
        Ok(self.inner.read().await.vaults.get(&id).cloned())
    }

    async fn folder(&self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        Ok(self.inner.read().await.folders.get(&id).cloned())
    }

    async fn item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        Ok(self.inner.read().await.items.get(&id).cloned())
    }

    async fn folders_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Folder>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.folders.get(id))
            .cloned()
            .collect())
    }

    async fn folders_by_parent(&self, parent_ids: &[Uuid]) -> Result<Vec<Folder>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .folders
            .values()
            .filter(|f| f.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .cloned()
            .collect())
    }

    async fn acl_entries(
        &self,
        kind: ResourceKind,
        resource_ids: &[Uuid],
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .acl
            .iter()
            .filter(|e| {
                e.resource_kind == kind
                    && resource_ids.contains(&e.resource_id)
                    && principal_ids.contains(&e.principal_id)
            })
            .cloned()
            .collect())
    }

    async fn acl_entries_for_principals(
        &self,
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .acl
            .iter()
            .filter(|e| principal_ids.contains(&e.principal_id))
            .cloned()
            .collect())
    }

    async fn static_group_ids(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner
            .memberships
            .iter()
            .filter(|m| {
                m.user_id == Some(user_id) || m.email.as_deref() == Some(email)
            })
            .map(|m| m.group_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn owned_personal_vault_ids(&self, owner_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .vaults
            .values()
            .filter(|v| v.owner_id == owner_id && v.kind == crate::models::VaultKind::Personal)
            .map(|v| v.id)
            .collect())
    }

    async fn api_token_by_hash(&self, token_hash: &str) -> Result<Option<ApiToken>, StoreError> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        Ok(inner
            .tokens
            .iter()
            .find(|t| {
                t.token_hash == token_hash
                    && t.revoked_at.is_none()
                    && t.expires_at.is_none_or(|exp| exp > now)
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrincipalKind, VaultKind};

    fn make_vault(owner: Uuid, kind: VaultKind) -> Vault {
        Vault {
            id: Uuid::new_v4(),
            name: "test".to_owned(),
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
            name: "folder".to_owned(),
            path,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn vault_roundtrip() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let id = store.add_vault(make_vault(owner, VaultKind::Personal)).await;

        let vault = store.vault(id).await.unwrap().unwrap();
        assert_eq!(vault.owner_id, owner);
        assert!(store.vault(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn folders_by_parent_matches_level() {
        let store = MemoryStore::new();
        let vault_id = store
            .add_vault(make_vault(Uuid::new_v4(), VaultKind::Shared))
            .await;

        let root = make_folder(vault_id, None);
        let child_a = make_folder(vault_id, Some(&root));
        let child_b = make_folder(vault_id, Some(&root));
        let root_id = store.add_folder(root).await;
        store.add_folder(child_a).await;
        store.add_folder(child_b).await;

        let children = store.folders_by_parent(&[root_id]).await.unwrap();
        assert_eq!(children.len(), 2);

        let none = store.folders_by_parent(&[Uuid::new_v4()]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn acl_entries_filter_on_kind_resource_and_principal() {
        let store = MemoryStore::new();
        let resource = Uuid::new_v4();
        store
            .add_acl(AclEntry {
                id: Uuid::new_v4(),
                resource_kind: ResourceKind::Vault,
                resource_id: resource,
                principal_kind: PrincipalKind::Group,
                principal_id: "eng".to_owned(),
                permissions: vec!["READ_ONLY".to_owned()],
                inherit: false,
                created_by: None,
                created_at: Utc::now(),
            })
            .await;

        let hit = store
            .acl_entries(ResourceKind::Vault, &[resource], &["eng".to_owned()])
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);

        let wrong_kind = store
            .acl_entries(ResourceKind::Folder, &[resource], &["eng".to_owned()])
            .await
            .unwrap();
        assert!(wrong_kind.is_empty());

        let wrong_principal = store
            .acl_entries(ResourceKind::Vault, &[resource], &["ops".to_owned()])
            .await
            .unwrap();
        assert!(wrong_principal.is_empty());
    }

    #[tokio::test]
    async fn static_group_ids_match_id_or_email() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store
            .add_membership(GroupMembership {
                id: Uuid::new_v4(),
                group_id: "by-id".to_owned(),
                user_id: Some(user),
                email: None,
                created_at: Utc::now(),
            })
            .await;
        store
            .add_membership(GroupMembership {
                id: Uuid::new_v4(),
                group_id: "by-email".to_owned(),
                user_id: None,
                email: Some("a@example.com".to_owned()),
                created_at: Utc::now(),
            })
            .await;

        let ids = store.static_group_ids(user, "a@example.com").await.unwrap();
        assert_eq!(ids, vec!["by-email".to_owned(), "by-id".to_owned()]);

        let none = store
            .static_group_ids(Uuid::new_v4(), "b@example.com")
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
