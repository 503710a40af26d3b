//! Vault management routes.
//!
//! Listing is bounded by the caller's resolved scope mode; single-vault
//! operations go through the access engine. Creating a shared vault seeds
//! a grant for the creator — without it the vault would be unreachable by
//! everyone except admins' bare visibility.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use lockbox_authz::{Permission, ScopeEntity, ScopeMode, ScopeVerb, Subject, VisibleSet};
use lockbox_store::models::{PrincipalKind, ResourceKind, Vault, VaultKind};
use lockbox_store::AuthzStore;

use crate::error::ApiError;
use crate::routes::require;
use crate::state::AppState;

/// Request body for creating a vault.
#[derive(Debug, Deserialize)]
pub struct CreateVaultRequest {
    pub name: String,
    pub kind: VaultKind,
}

/// Request body for renaming a vault.
#[derive(Debug, Deserialize)]
pub struct RenameVaultRequest {
    pub name: String,
}

/// Response for vault listing.
#[derive(Debug, Serialize)]
pub struct VaultListResponse {
    pub vaults: Vec<Vault>,
}

/// Build the vaults router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vaults", post(create_vault).get(list_vaults))
        .route(
            "/vaults/{vault_id}",
            get(get_vault).patch(rename_vault).delete(delete_vault),
        )
}

/// `GET /v1/vaults` — list vaults within the caller's read scope.
async fn list_vaults(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<VaultListResponse>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    let mode = state
        .scopes
        .resolve(&principal, ScopeEntity::Vaults, ScopeVerb::Read);

    let vaults = match state.scopes.visible_set(&principal, mode).await? {
        VisibleSet::Empty => Vec::new(),
        VisibleSet::Ids { vault_ids, .. } => state.store.vaults_in(&vault_ids).await?,
    };

    Ok(Json(VaultListResponse { vaults }))
}

/// `POST /v1/vaults` — create a vault owned by the caller.
async fn create_vault(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateVaultRequest>,
) -> Result<Json<Vault>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    let mode = state
        .scopes
        .resolve(&principal, ScopeEntity::Vaults, ScopeVerb::Write);
    if mode == ScopeMode::None {
        return Err(ApiError::Forbidden("vault creation not permitted".to_owned()));
    }

    if body.name.is_empty() || body.name.len() > 128 {
        return Err(ApiError::BadRequest("name must be 1-128 characters".to_owned()));
    }

    let vault = state
        .store
        .create_vault(&body.name, principal.user_id, body.kind)
        .await?;

    // A fresh shared vault has no ACL rows, which would make it invisible
    // even to its creator. Seed the creator with the full ladder plus ACL
    // management.
    if vault.kind == VaultKind::Shared {
        state
            .store
            .create_acl_entry(
                ResourceKind::Vault,
                vault.id,
                PrincipalKind::User,
                &principal.user_id.to_string(),
                &[
                    Permission::Delete.as_str().to_owned(),
                    Permission::ManageAcl.as_str().to_owned(),
                ],
                false,
                Some(principal.user_id),
            )
            .await?;
    }

    info!(vault_id = %vault.id, kind = %vault.kind, "vault created");

    Ok(Json(vault))
}

/// `GET /v1/vaults/{vault_id}` — get vault details.
async fn get_vault(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(vault_id): Path<Uuid>,
) -> Result<Json<Vault>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(state.engine.check_vault(&principal, vault_id, &[]).await?)?;

    let vault = state
        .store
        .vault(vault_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("vault not found".to_owned()))?;

    Ok(Json(vault))
}

/// `PATCH /v1/vaults/{vault_id}` — rename a vault.
async fn rename_vault(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(vault_id): Path<Uuid>,
    Json(body): Json<RenameVaultRequest>,
) -> Result<Json<Vault>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_vault(&principal, vault_id, &[Permission::ReadWrite])
            .await?,
    )?;

    if body.name.is_empty() || body.name.len() > 128 {
        return Err(ApiError::BadRequest("name must be 1-128 characters".to_owned()));
    }

    let vault = state
        .store
        .rename_vault(vault_id, &body.name)
        .await?
        .ok_or_else(|| ApiError::NotFound("vault not found".to_owned()))?;

    Ok(Json(vault))
}

/// `DELETE /v1/vaults/{vault_id}` — delete a vault and its contents.
async fn delete_vault(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(vault_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_vault(&principal, vault_id, &[Permission::Delete])
            .await?,
    )?;

    if !state.store.delete_vault(vault_id).await? {
        return Err(ApiError::NotFound("vault not found".to_owned()));
    }

    info!(vault_id = %vault_id, "vault deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
