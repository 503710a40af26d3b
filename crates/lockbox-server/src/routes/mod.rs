//! API route handlers.
//!
//! All routes are nested under `/v1/` and require authentication (session
//! JWT or `lbt_` API token via `Authorization: Bearer` header).
//!
//! Handlers follow one shape: resolve the caller's [`Principal`] once,
//! then bound collection operations through the scope resolver and gate
//! single-resource operations through the access engine. Denials come
//! back as values and map to HTTP in [`crate::error`].

pub mod acl;
pub mod folders;
pub mod items;
pub mod vaults;

use std::sync::Arc;

use axum::middleware as axum_mw;
use axum::Router;

use lockbox_authz::AccessDecision;

use crate::auth::auth_middleware;
use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete API router with authentication applied.
///
/// Returns a router with its state fully applied, so it can be merged
/// into any parent router regardless of the parent's state type.
pub fn api_router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .merge(vaults::router())
        .merge(folders::router())
        .merge(items::router())
        .merge(acl::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .with_state(state);

    Router::new().nest("/v1", authenticated)
}

/// Turn an access decision into `Ok(())` or its HTTP error.
pub(crate) fn require(decision: AccessDecision) -> Result<(), ApiError> {
    match decision {
        AccessDecision::Allowed => Ok(()),
        AccessDecision::Denied(reason) => Err(ApiError::from_denial(reason)),
    }
}
