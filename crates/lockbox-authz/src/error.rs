//! Error types for `lockbox-authz`.
//!
//! The engine has exactly one failure mode: the store is unreachable.
//! Authorization denials are ordinary return values
//! ([`AccessDecision::Denied`](crate::access::AccessDecision)), never
//! errors, so callers can never conflate "unreachable" with
//! "unauthorized".

use lockbox_store::StoreError;

/// Infrastructure errors from authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The resource store failed.
    #[error("authorization store error: {0}")]
    Store(#[from] StoreError),
}
