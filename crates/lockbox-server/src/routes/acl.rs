//! ACL entry management routes.
//!
//! Grants are created and deleted whole — entries are otherwise
//! immutable. Write-side validation enforces what the evaluation engine
//! assumes: permission tokens come from the closed set (canonical or
//! legacy alias), and folder entries target root folders only.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use lockbox_authz::{permission, Permission, Principal, Subject};
use lockbox_store::models::{AclEntry, PrincipalKind, ResourceKind};
use lockbox_store::AuthzStore;

use crate::error::ApiError;
use crate::routes::require;
use crate::state::AppState;

/// Request body for creating an ACL entry.
#[derive(Debug, Deserialize)]
pub struct CreateAclRequest {
    pub resource_kind: ResourceKind,
    pub resource_id: Uuid,
    pub principal_kind: PrincipalKind,
    pub principal_id: String,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub inherit: bool,
}

/// Query for listing a resource's ACL entries.
#[derive(Debug, Deserialize)]
pub struct AclListQuery {
    pub resource_kind: ResourceKind,
    pub resource_id: Uuid,
}

/// Response for ACL listing.
#[derive(Debug, Serialize)]
pub struct AclListResponse {
    pub entries: Vec<AclEntry>,
}

/// Build the ACL router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/acl", post(create_entry).get(list_entries))
        .route("/acl/{entry_id}", delete(delete_entry))
}

/// Managing a resource's ACL requires `MANAGE_ACL` on that resource
/// (personal-vault owners pass through the ownership bypass).
async fn require_manage(
    state: &AppState,
    principal: &Principal,
    kind: ResourceKind,
    resource_id: Uuid,
) -> Result<(), ApiError> {
    let required = [Permission::ManageAcl];
    let decision = match kind {
        ResourceKind::Vault => state.engine.check_vault(principal, resource_id, &required).await?,
        ResourceKind::Folder => {
            state
                .engine
                .check_folder(principal, resource_id, &required)
                .await?
        }
        ResourceKind::Item => state.engine.check_item(principal, resource_id, &required).await?,
    };
    require(decision)
}

/// `POST /v1/acl` — create an ACL entry.
async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateAclRequest>,
) -> Result<Json<AclEntry>, ApiError> {
    let principal = state.principals.resolve(&subject).await;

    if body.principal_id.is_empty() {
        return Err(ApiError::BadRequest("principal_id is required".to_owned()));
    }
    if body.permissions.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one permission is required".to_owned(),
        ));
    }
    // Unknown tokens are rejected here, not silently dropped later.
    let unknown: Vec<&str> = body
        .permissions
        .iter()
        .map(String::as_str)
        .filter(|t| !permission::known_token(t))
        .collect();
    if !unknown.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "unknown permission tokens: {}",
            unknown.join(", ")
        )));
    }

    // Folder grants may only target root folders.
    if body.resource_kind == ResourceKind::Folder {
        let folder = state
            .store
            .folder(body.resource_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("folder not found".to_owned()))?;
        if !folder.is_root() {
            return Err(ApiError::BadRequest(
                "ACL entries may only target root folders".to_owned(),
            ));
        }
    }

    require_manage(&state, &principal, body.resource_kind, body.resource_id).await?;

    let entry = state
        .store
        .create_acl_entry(
            body.resource_kind,
            body.resource_id,
            body.principal_kind,
            &body.principal_id,
            &body.permissions,
            body.inherit,
            Some(principal.user_id),
        )
        .await?;

    info!(
        entry_id = %entry.id,
        resource_kind = %entry.resource_kind,
        resource_id = %entry.resource_id,
        "acl entry created"
    );

    Ok(Json(entry))
}

/// `GET /v1/acl` — list a resource's ACL entries.
async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<AclListQuery>,
) -> Result<Json<AclListResponse>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require_manage(&state, &principal, query.resource_kind, query.resource_id).await?;

    let entries = state
        .store
        .acl_entries_for_resource(query.resource_kind, query.resource_id)
        .await?;

    Ok(Json(AclListResponse { entries }))
}

/// `DELETE /v1/acl/{entry_id}` — delete an ACL entry.
async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = state.principals.resolve(&subject).await;

    let entry = state
        .store
        .acl_entry(entry_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("acl entry not found".to_owned()))?;

    require_manage(&state, &principal, entry.resource_kind, entry.resource_id).await?;

    if !state.store.delete_acl_entry(entry_id).await? {
        return Err(ApiError::NotFound("acl entry not found".to_owned()));
    }

    info!(entry_id = %entry_id, "acl entry deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
