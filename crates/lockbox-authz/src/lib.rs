//! Authorization engine for Lockbox.
//!
//! Decides who may do what to vaults, folders, and items. The engine is
//! a library with no I/O of its own — it reads through the injected
//! [`AuthzStore`](lockbox_store::AuthzStore) and returns decisions as
//! plain values. It holds no mutable state, caches nothing, and performs
//! no writes; every check recomputes from current store data.
//!
//! The pieces, leaves first:
//!
//! - [`permission`] — the closed permission enum, legacy-alias
//!   normalization, and set merging along the
//!   `DELETE ⟹ READ_WRITE ⟹ READ_ONLY` ladder
//! - [`principal`] — resolving the caller into the identifier set ACL
//!   rows are matched against
//! - [`hierarchy`] — descendant expansion of folder grants
//! - [`access`] — the vault/folder/item decision tree
//! - [`scope`] — scope modes bounding collection operations

pub mod access;
pub mod error;
pub mod hierarchy;
pub mod permission;
pub mod principal;
pub mod scope;

pub use access::{AccessDecision, AccessEngine, DenyReason};
pub use error::AuthzError;
pub use permission::Permission;
pub use principal::{GroupDirectory, NoDirectory, Principal, PrincipalResolver, Subject, ADMIN_ROLE};
pub use scope::{
    ActionGate, ScopeEntity, ScopeMode, ScopeResolver, ScopeVerb, StaticActionGate, VisibleSet,
};
