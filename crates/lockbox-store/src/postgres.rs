//! PostgreSQL store backend.
//!
//! [`PgStore`] implements the read-side [`AuthzStore`] trait for the
//! authorization engine and carries the CRUD repository methods the HTTP
//! layer consumes. Every query is a parameterized statement — no SQL
//! injection risk. ID-set matching uses `= ANY($n)` so that a whole level
//! or visible set resolves in one round trip.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{AclEntry, ApiToken, Folder, Item, PrincipalKind, ResourceKind, Vault, VaultKind};
use crate::{AuthzStore, StoreError};

/// A PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to PostgreSQL and return a store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the database is unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection {
                reason: e.to_string(),
            })?;

        info!("connected to PostgreSQL store");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests with a prepared database).
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    // ── Vaults ───────────────────────────────────────────────────────

    /// Create a vault.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn create_vault(
        &self,
        name: &str,
        owner_id: Uuid,
        kind: VaultKind,
    ) -> Result<Vault, StoreError> {
        let vault = sqlx::query_as::<_, Vault>(
            r"INSERT INTO vaults (name, owner_id, kind)
              VALUES ($1, $2, $3)
              RETURNING *",
        )
        .bind(name)
        .bind(owner_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(vault)
    }

    /// Rename a vault.
    ///
    /// Returns `None` if the vault does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn rename_vault(&self, id: Uuid, name: &str) -> Result<Option<Vault>, StoreError> {
        let vault = sqlx::query_as::<_, Vault>(
            r"UPDATE vaults SET name = $2, updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vault)
    }

    /// Delete a vault and everything in it. Returns `false` if it did not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn delete_vault(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM vaults WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch vaults whose IDs are in the given set, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn vaults_in(&self, ids: &[Uuid]) -> Result<Vec<Vault>, StoreError> {
        let vaults = sqlx::query_as::<_, Vault>(
            "SELECT * FROM vaults WHERE id = ANY($1) ORDER BY name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(vaults)
    }

    // ── Folders ──────────────────────────────────────────────────────

    /// Create a folder. The caller supplies the materialized `path`
    /// (parent path + own ID, or own ID for roots).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn create_folder(
        &self,
        id: Uuid,
        vault_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        path: &str,
    ) -> Result<Folder, StoreError> {
        let folder = sqlx::query_as::<_, Folder>(
            r"INSERT INTO folders (id, vault_id, parent_id, name, path)
              VALUES ($1, $2, $3, $4, $5)
              RETURNING *",
        )
        .bind(id)
        .bind(vault_id)
        .bind(parent_id)
        .bind(name)
        .bind(path)
        .fetch_one(&self.pool)
        .await?;

        Ok(folder)
    }

    /// Rename a folder. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn rename_folder(&self, id: Uuid, name: &str) -> Result<Option<Folder>, StoreError> {
        let folder = sqlx::query_as::<_, Folder>(
            r"UPDATE folders SET name = $2, updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(folder)
    }

    /// Move a folder subtree.
    ///
    /// Reassigns the folder's parent, vault, and materialized path, then
    /// rewrites the path prefix (and vault, for a cross-vault move) of
    /// every descendant in one statement. Both updates run in a single
    /// transaction so the subtree is never half-moved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn move_folder(
        &self,
        id: Uuid,
        new_vault_id: Uuid,
        new_parent_id: Option<Uuid>,
        old_path: &str,
        new_path: &str,
    ) -> Result<Option<Folder>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let folder = sqlx::query_as::<_, Folder>(
            r"UPDATE folders
              SET vault_id = $2, parent_id = $3, path = $4, updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id)
        .bind(new_vault_id)
        .bind(new_parent_id)
        .bind(new_path)
        .fetch_optional(&mut *tx)
        .await?;

        if folder.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            r"UPDATE folders
              SET vault_id = $1,
                  path = $2 || substr(path, length($3) + 1),
                  updated_at = now()
              WHERE path LIKE $3 || '/%'",
        )
        .bind(new_vault_id)
        .bind(new_path)
        .bind(old_path)
        .execute(&mut *tx)
        .await?;

        // Items keep their folder but must follow the subtree's vault.
        sqlx::query(
            r"UPDATE items SET vault_id = $1, updated_at = now()
              WHERE folder_id IN (
                  SELECT id FROM folders WHERE path = $2 OR path LIKE $2 || '/%'
              )",
        )
        .bind(new_vault_id)
        .bind(new_path)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(folder)
    }

    /// Delete a folder subtree (descendant folders cascade through the
    /// parent FK; contained items cascade through the folder FK). Returns
    /// `false` if the folder did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn delete_folder(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch all folders in the given vaults plus the given extra folder
    /// IDs, ordered by path. This is the `any`-scope folder listing in one
    /// query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn folders_visible(
        &self,
        vault_ids: &[Uuid],
        folder_ids: &[Uuid],
    ) -> Result<Vec<Folder>, StoreError> {
        let folders = sqlx::query_as::<_, Folder>(
            r"SELECT * FROM folders
              WHERE vault_id = ANY($1) OR id = ANY($2)
              ORDER BY path",
        )
        .bind(vault_ids)
        .bind(folder_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(folders)
    }

    // ── Items ────────────────────────────────────────────────────────

    /// Create an item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_item(
        &self,
        vault_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
        username: Option<&str>,
        url: Option<&str>,
        notes: Option<&str>,
        secret: &[u8],
    ) -> Result<Item, StoreError> {
        let item = sqlx::query_as::<_, Item>(
            r"INSERT INTO items (vault_id, folder_id, name, username, url, notes, secret)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              RETURNING *",
        )
        .bind(vault_id)
        .bind(folder_id)
        .bind(name)
        .bind(username)
        .bind(url)
        .bind(notes)
        .bind(secret)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    /// Update an item's metadata and (optionally) its secret. `None`
    /// secret means "leave unchanged". Returns `None` if the item does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_item(
        &self,
        id: Uuid,
        name: &str,
        username: Option<&str>,
        url: Option<&str>,
        notes: Option<&str>,
        secret: Option<&[u8]>,
    ) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>(
            r"UPDATE items
              SET name = $2,
                  username = $3,
                  url = $4,
                  notes = $5,
                  secret = COALESCE($6, secret),
                  updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(username)
        .bind(url)
        .bind(notes)
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Delete an item. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn delete_item(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch items visible through the given vaults or folders, ordered
    /// by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn items_visible(
        &self,
        vault_ids: &[Uuid],
        folder_ids: &[Uuid],
    ) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(
            r"SELECT * FROM items
              WHERE vault_id = ANY($1) OR folder_id = ANY($2)
              ORDER BY name",
        )
        .bind(vault_ids)
        .bind(folder_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    // ── ACL entries ──────────────────────────────────────────────────

    /// Create an ACL entry. Token validation and the root-folder-only
    /// rule are the caller's responsibility — this is a plain insert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_acl_entry(
        &self,
        resource_kind: ResourceKind,
        resource_id: Uuid,
        principal_kind: PrincipalKind,
        principal_id: &str,
        permissions: &[String],
        inherit: bool,
        created_by: Option<Uuid>,
    ) -> Result<AclEntry, StoreError> {
        let entry = sqlx::query_as::<_, AclEntry>(
            r"INSERT INTO acl_entries
                  (resource_kind, resource_id, principal_kind, principal_id, permissions, inherit, created_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              RETURNING *",
        )
        .bind(resource_kind)
        .bind(resource_id)
        .bind(principal_kind)
        .bind(principal_id)
        .bind(permissions)
        .bind(inherit)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Fetch an ACL entry by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn acl_entry(&self, id: Uuid) -> Result<Option<AclEntry>, StoreError> {
        let entry = sqlx::query_as::<_, AclEntry>("SELECT * FROM acl_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Delete an ACL entry. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn delete_acl_entry(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM acl_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List every ACL entry on a resource (no principal filter — this is
    /// the management view, not an evaluation query).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn acl_entries_for_resource(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> Result<Vec<AclEntry>, StoreError> {
        let entries = sqlx::query_as::<_, AclEntry>(
            r"SELECT * FROM acl_entries
              WHERE resource_kind = $1 AND resource_id = $2
              ORDER BY created_at",
        )
        .bind(kind)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    // ── API tokens ───────────────────────────────────────────────────

    /// Update `last_used_at` for an API token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn touch_api_token(&self, token_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_tokens SET last_used_at = now() WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthzStore for PgStore {
    async fn vault(&self, id: Uuid) -> Result<Option<Vault>, StoreError> {
        let vault = sqlx::query_as::<_, Vault>("SELECT * FROM vaults WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vault)
    }

    async fn folder(&self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(folder)
    }

    async fn item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    async fn folders_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Folder>, StoreError> {
        let folders = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(folders)
    }

    async fn folders_by_parent(&self, parent_ids: &[Uuid]) -> Result<Vec<Folder>, StoreError> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE parent_id = ANY($1)",
        )
        .bind(parent_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(folders)
    }

    async fn acl_entries(
        &self,
        kind: ResourceKind,
        resource_ids: &[Uuid],
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, StoreError> {
        let entries = sqlx::query_as::<_, AclEntry>(
            r"SELECT * FROM acl_entries
              WHERE resource_kind = $1
                AND resource_id = ANY($2)
                AND principal_id = ANY($3)",
        )
        .bind(kind)
        .bind(resource_ids)
        .bind(principal_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn acl_entries_for_principals(
        &self,
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, StoreError> {
        let entries = sqlx::query_as::<_, AclEntry>(
            "SELECT * FROM acl_entries WHERE principal_id = ANY($1)",
        )
        .bind(principal_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn static_group_ids(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<String>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r"SELECT DISTINCT group_id FROM group_members
              WHERE user_id = $1 OR email = $2
              ORDER BY group_id",
        )
        .bind(user_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn owned_personal_vault_ids(&self, owner_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM vaults WHERE owner_id = $1 AND kind = 'personal'",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn api_token_by_hash(&self, token_hash: &str) -> Result<Option<ApiToken>, StoreError> {
        let token = sqlx::query_as::<_, ApiToken>(
            r"SELECT * FROM api_tokens
              WHERE token_hash = $1
                AND revoked_at IS NULL
                AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }
}
