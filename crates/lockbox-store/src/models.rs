//! Domain models for Lockbox.
//!
//! Vaults, folders, items, ACL entries, group memberships, and API tokens.
//! All IDs are UUIDs. Item secrets are opaque ciphertext supplied by the
//! client — this layer never encrypts, decrypts, or logs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Vaults ───────────────────────────────────────────────────────────

/// The kind of a vault.
///
/// Personal vaults belong to exactly one user, who has full access with no
/// ACL rows needed. Shared vaults are reachable only through ACL grants
/// (plus the admin visibility rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum VaultKind {
    Personal,
    Shared,
}

impl std::fmt::Display for VaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Personal => write!(f, "personal"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

impl std::str::FromStr for VaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown vault kind: {other}")),
        }
    }
}

/// A vault — the top-level container for folders and items.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Vault {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub kind: VaultKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Folders ──────────────────────────────────────────────────────────

/// A folder within a vault.
///
/// `path` is the materialized ancestor chain: `'/'`-joined folder IDs from
/// the root down to and including this folder. A root folder's path is its
/// own ID. The path is maintained on every create/move so that hierarchy
/// questions (root ancestor, subtree membership) never need a parent-chain
/// walk.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Folder {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    /// Whether this folder is a vault root (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

// ── Items ────────────────────────────────────────────────────────────

/// A secret item (login, note, card, ...) stored in a vault.
///
/// The `secret` column holds client-encrypted bytes. It is skipped during
/// serialization — handlers return it only through explicit reveal
/// responses, never as part of listings.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Item {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    #[serde(skip)]
    pub secret: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── ACL entries ──────────────────────────────────────────────────────

/// The kind of resource an ACL entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Vault,
    Folder,
    Item,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault => write!(f, "vault"),
            Self::Folder => write!(f, "folder"),
            Self::Item => write!(f, "item"),
        }
    }
}

/// The kind of principal an ACL entry grants to.
///
/// Only metadata — evaluation matches on `principal_id` alone, against
/// every identifier the caller's principal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Group,
    Role,
    Email,
}

/// A persisted grant of a permission set to one principal over one resource.
///
/// `permissions` holds raw tokens as stored (`text[]`) — canonical names or
/// legacy aliases. The authorization engine normalizes them into its closed
/// permission enum at evaluation time; the ACL write endpoint rejects
/// tokens outside the known set.
///
/// `inherit` is a legacy flag kept for compatibility with old rows. Nothing
/// reads it — folder grants propagate downward by descendant expansion.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct AclEntry {
    pub id: Uuid,
    pub resource_kind: ResourceKind,
    pub resource_id: Uuid,
    pub principal_kind: PrincipalKind,
    pub principal_id: String,
    pub permissions: Vec<String>,
    pub inherit: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ── Group memberships ────────────────────────────────────────────────

/// A static group membership row, matched by user ID or email.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct GroupMembership {
    pub id: Uuid,
    pub group_id: String,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── API tokens ───────────────────────────────────────────────────────

/// An opaque API token for non-interactive callers.
///
/// Tokens are SHA-256 hashed before storage — only the hash and a short
/// display prefix are persisted.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub token_hash: String,
    pub token_prefix: String,
    pub roles: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}
