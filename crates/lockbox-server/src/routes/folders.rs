//! Folder management routes.
//!
//! Folders form a tree per vault, tracked by a materialized path of
//! ancestor IDs. Moves rewrite the whole subtree's paths (and vault, for
//! a cross-vault move) in one transaction. The hardened ACL model is
//! enforced here at write time: a folder holding direct grants must stay
//! a root folder.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use lockbox_authz::{Permission, ScopeEntity, ScopeMode, ScopeVerb, Subject, VisibleSet};
use lockbox_store::models::{Folder, ResourceKind};
use lockbox_store::AuthzStore;

use crate::error::ApiError;
use crate::routes::require;
use crate::state::AppState;

/// Request body for creating a folder.
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub vault_id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub name: String,
}

/// Request body for renaming a folder.
#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

/// Request body for moving a folder.
///
/// `parent_id = None` moves the folder to the root of `vault_id` (or its
/// current vault if `vault_id` is also absent). A `vault_id` differing
/// from the folder's current vault is the explicit cross-vault move.
#[derive(Debug, Deserialize)]
pub struct MoveFolderRequest {
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub vault_id: Option<Uuid>,
}

/// Response for folder listing.
#[derive(Debug, Serialize)]
pub struct FolderListResponse {
    pub folders: Vec<Folder>,
}

/// Build the folders router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/folders", post(create_folder).get(list_folders))
        .route(
            "/folders/{folder_id}",
            get(get_folder).patch(rename_folder).delete(delete_folder),
        )
        .route("/folders/{folder_id}/move", post(move_folder))
}

/// `GET /v1/folders` — list folders within the caller's read scope.
async fn list_folders(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<FolderListResponse>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    let mode = state
        .scopes
        .resolve(&principal, ScopeEntity::Folders, ScopeVerb::Read);

    let folders = match state.scopes.visible_set(&principal, mode).await? {
        VisibleSet::Empty => Vec::new(),
        VisibleSet::Ids {
            vault_ids,
            folder_ids,
        } => state.store.folders_visible(&vault_ids, &folder_ids).await?,
    };

    Ok(Json(FolderListResponse { folders }))
}

/// `POST /v1/folders` — create a folder.
async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateFolderRequest>,
) -> Result<Json<Folder>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    let mode = state
        .scopes
        .resolve(&principal, ScopeEntity::Folders, ScopeVerb::Write);
    if mode == ScopeMode::None {
        return Err(ApiError::Forbidden("folder creation not permitted".to_owned()));
    }

    if body.name.is_empty() || body.name.len() > 128 {
        return Err(ApiError::BadRequest("name must be 1-128 characters".to_owned()));
    }

    let id = Uuid::new_v4();
    let path = match body.parent_id {
        Some(parent_id) => {
            let parent = state
                .store
                .folder(parent_id)
                .await?
                .ok_or_else(|| ApiError::BadRequest("parent folder not found".to_owned()))?;
            // Parent edges never cross vaults.
            if parent.vault_id != body.vault_id {
                return Err(ApiError::BadRequest(
                    "parent folder belongs to a different vault".to_owned(),
                ));
            }
            require(
                state
                    .engine
                    .check_folder(&principal, parent_id, &[Permission::ReadWrite])
                    .await?,
            )?;
            format!("{}/{id}", parent.path)
        }
        None => {
            require(
                state
                    .engine
                    .check_vault(&principal, body.vault_id, &[Permission::ReadWrite])
                    .await?,
            )?;
            id.to_string()
        }
    };

    let folder = state
        .store
        .create_folder(id, body.vault_id, body.parent_id, &body.name, &path)
        .await?;

    info!(folder_id = %folder.id, vault_id = %folder.vault_id, "folder created");

    Ok(Json(folder))
}

/// `GET /v1/folders/{folder_id}` — get folder details.
async fn get_folder(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(folder_id): Path<Uuid>,
) -> Result<Json<Folder>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(state.engine.check_folder(&principal, folder_id, &[]).await?)?;

    let folder = state
        .store
        .folder(folder_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("folder not found".to_owned()))?;

    Ok(Json(folder))
}

/// `PATCH /v1/folders/{folder_id}` — rename a folder.
async fn rename_folder(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(folder_id): Path<Uuid>,
    Json(body): Json<RenameFolderRequest>,
) -> Result<Json<Folder>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_folder(&principal, folder_id, &[Permission::ReadWrite])
            .await?,
    )?;

    if body.name.is_empty() || body.name.len() > 128 {
        return Err(ApiError::BadRequest("name must be 1-128 characters".to_owned()));
    }

    let folder = state
        .store
        .rename_folder(folder_id, &body.name)
        .await?
        .ok_or_else(|| ApiError::NotFound("folder not found".to_owned()))?;

    Ok(Json(folder))
}

/// `POST /v1/folders/{folder_id}/move` — move a folder subtree.
async fn move_folder(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(folder_id): Path<Uuid>,
    Json(body): Json<MoveFolderRequest>,
) -> Result<Json<Folder>, ApiError> {
    let principal = state.principals.resolve(&subject).await;

    let folder = state
        .store
        .folder(folder_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("folder not found".to_owned()))?;

    require(
        state
            .engine
            .check_folder(&principal, folder_id, &[Permission::ReadWrite])
            .await?,
    )?;

    // Resolve the destination parent and vault.
    let (dest_parent, dest_vault_id) = match body.parent_id {
        Some(parent_id) => {
            let parent = state
                .store
                .folder(parent_id)
                .await?
                .ok_or_else(|| ApiError::BadRequest("target parent not found".to_owned()))?;
            if body.vault_id.is_some_and(|v| v != parent.vault_id) {
                return Err(ApiError::BadRequest(
                    "target parent belongs to a different vault".to_owned(),
                ));
            }
            let vault_id = parent.vault_id;
            (Some(parent), vault_id)
        }
        None => (None, body.vault_id.unwrap_or(folder.vault_id)),
    };

    // Covers both moving into itself and into a descendant.
    if let Some(parent) = &dest_parent {
        if parent.path.starts_with(&folder.path) {
            return Err(ApiError::BadRequest(
                "cannot move a folder into its own subtree".to_owned(),
            ));
        }
    }

    // Cross-vault move needs write access on the destination vault too.
    if dest_vault_id != folder.vault_id {
        require(
            state
                .engine
                .check_vault(&principal, dest_vault_id, &[Permission::ReadWrite])
                .await?,
        )?;
    }

    // Hardened ACL model: grants live only on root folders, so a folder
    // with direct grants cannot be nested under a parent.
    if dest_parent.is_some() {
        let direct_grants = state
            .store
            .acl_entries_for_resource(ResourceKind::Folder, folder_id)
            .await?;
        if !direct_grants.is_empty() {
            return Err(ApiError::BadRequest(
                "a folder with direct ACL entries must remain a root folder".to_owned(),
            ));
        }
    }

    let new_path = match &dest_parent {
        Some(parent) => format!("{}/{folder_id}", parent.path),
        None => folder_id.to_string(),
    };

    let moved = state
        .store
        .move_folder(
            folder_id,
            dest_vault_id,
            dest_parent.map(|p| p.id),
            &folder.path,
            &new_path,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("folder not found".to_owned()))?;

    info!(
        folder_id = %folder_id,
        vault_id = %dest_vault_id,
        cross_vault = dest_vault_id != folder.vault_id,
        "folder moved"
    );

    Ok(Json(moved))
}

/// `DELETE /v1/folders/{folder_id}` — delete a folder subtree.
async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(folder_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_folder(&principal, folder_id, &[Permission::Delete])
            .await?,
    )?;

    if !state.store.delete_folder(folder_id).await? {
        return Err(ApiError::NotFound("folder not found".to_owned()));
    }

    info!(folder_id = %folder_id, "folder deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
