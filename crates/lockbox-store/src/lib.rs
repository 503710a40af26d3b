//! Store layer for Lockbox.
//!
//! This crate defines the [`AuthzStore`] trait — the resource-store
//! collaborator the authorization engine in `lockbox-authz` is written
//! against — together with the domain models and two implementations:
//!
//! - [`MemoryStore`] — in-memory, for tests
//! - [`PgStore`] — PostgreSQL via sqlx (feature `postgres`), which also
//!   carries the CRUD repository methods the HTTP layer consumes
//!
//! The trait is read-only: the engine never writes. Mutations live on the
//! concrete backends.

mod error;
mod memory;
pub mod models;
#[cfg(feature = "postgres")]
mod postgres;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use uuid::Uuid;

use models::{AclEntry, ApiToken, Folder, Item, ResourceKind, Vault};

/// Read-side store interface consumed by the authorization engine.
///
/// Implementations must be safe to share across async tasks
/// (`Send + Sync`). Point reads return `Ok(None)` for missing rows;
/// errors always mean the store itself failed.
#[async_trait::async_trait]
pub trait AuthzStore: Send + Sync + 'static {
    /// Fetch a vault by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn vault(&self, id: Uuid) -> Result<Option<Vault>, StoreError>;

    /// Fetch a folder by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn folder(&self, id: Uuid) -> Result<Option<Folder>, StoreError>;

    /// Fetch an item by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn item(&self, id: Uuid) -> Result<Option<Item>, StoreError>;

    /// Fetch every folder whose ID is in `ids`. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn folders_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Folder>, StoreError>;

    /// Fetch every folder whose `parent_id` is in `parent_ids`.
    ///
    /// One call resolves a whole level of the folder tree — descendant
    /// expansion issues one of these per depth, not per node.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn folders_by_parent(&self, parent_ids: &[Uuid]) -> Result<Vec<Folder>, StoreError>;

    /// Fetch ACL entries for the given resources visible to the given
    /// principal identifiers.
    ///
    /// Matches rows where `resource_kind` equals `kind`, `resource_id` is
    /// in `resource_ids`, and `principal_id` is in `principal_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn acl_entries(
        &self,
        kind: ResourceKind,
        resource_ids: &[Uuid],
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, StoreError>;

    /// Fetch every ACL entry whose `principal_id` is in `principal_ids`,
    /// regardless of resource. Used by the scope resolver to discover the
    /// caller's reachable vaults and folders.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn acl_entries_for_principals(
        &self,
        principal_ids: &[String],
    ) -> Result<Vec<AclEntry>, StoreError>;

    /// Group IDs from static membership rows matching the user's ID or
    /// email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails — the
    /// principal resolver degrades this to an empty group list.
    async fn static_group_ids(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// IDs of personal vaults owned by the given user. The `own` scope
    /// filter is exactly this set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn owned_personal_vault_ids(&self, owner_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Look up a live (not revoked, not expired) API token by its SHA-256
    /// hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying store fails.
    async fn api_token_by_hash(&self, token_hash: &str) -> Result<Option<ApiToken>, StoreError>;
}
