//! Item management routes.
//!
//! Item secrets are opaque ciphertext — transported base64-encoded,
//! stored as bytes, never logged. Metadata reads need only visibility;
//! revealing the secret requires `READ_ONLY`, mirroring the legacy
//! `REVEAL_PASSWORD` grant.
//!
//! Listing computes per-row capability flags with concurrent fan-out
//! checks — each flag is an independent pure read, so cross-row
//! consistency under concurrent ACL mutation is not promised.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::info;
use uuid::Uuid;

use lockbox_authz::{Permission, ScopeEntity, ScopeMode, ScopeVerb, Subject, VisibleSet};
use lockbox_store::models::Item;
use lockbox_store::AuthzStore;

use crate::error::ApiError;
use crate::routes::require;
use crate::state::AppState;

/// Request body for creating an item.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub vault_id: Uuid,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Base64-encoded client-side ciphertext.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Request body for updating an item.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Base64-encoded ciphertext; absent leaves the secret unchanged.
    #[serde(default)]
    pub secret: Option<String>,
}

/// An item row with the caller's capability flags.
#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub can_write: bool,
    pub can_delete: bool,
}

impl ItemView {
    fn new(item: Item, can_write: bool, can_delete: bool) -> Self {
        Self {
            id: item.id,
            vault_id: item.vault_id,
            folder_id: item.folder_id,
            name: item.name,
            username: item.username,
            url: item.url,
            notes: item.notes,
            created_at: item.created_at,
            updated_at: item.updated_at,
            can_write,
            can_delete,
        }
    }
}

/// Response for item listing.
#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<ItemView>,
}

/// Response for revealing an item secret.
#[derive(Debug, Serialize)]
pub struct SecretResponse {
    /// Base64-encoded ciphertext.
    pub secret: String,
}

/// Build the items router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/{item_id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/items/{item_id}/secret", get(reveal_secret))
}

fn decode_secret(encoded: Option<&str>) -> Result<Option<Vec<u8>>, ApiError> {
    encoded
        .map(|s| {
            base64::engine::general_purpose::STANDARD
                .decode(s)
                .map_err(|_| ApiError::BadRequest("secret must be valid base64".to_owned()))
        })
        .transpose()
}

/// `GET /v1/items` — list items within the caller's read scope, with
/// per-row capability flags.
async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<ItemListResponse>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    let mode = state
        .scopes
        .resolve(&principal, ScopeEntity::Items, ScopeVerb::Read);

    let items = match state.scopes.visible_set(&principal, mode).await? {
        VisibleSet::Empty => Vec::new(),
        VisibleSet::Ids {
            vault_ids,
            folder_ids,
        } => state.store.items_visible(&vault_ids, &folder_ids).await?,
    };

    // Fan out the per-row capability checks; each is an independent read.
    let mut checks = JoinSet::new();
    for item in &items {
        let engine = state.engine.clone();
        let principal = principal.clone();
        let id = item.id;
        checks.spawn(async move {
            let can_write = engine
                .check_item(&principal, id, &[Permission::ReadWrite])
                .await?
                .allowed();
            let can_delete = engine
                .check_item(&principal, id, &[Permission::Delete])
                .await?
                .allowed();
            Ok::<_, lockbox_authz::AuthzError>((id, can_write, can_delete))
        });
    }

    let mut flags: HashMap<Uuid, (bool, bool)> = HashMap::with_capacity(items.len());
    while let Some(joined) = checks.join_next().await {
        let (id, can_write, can_delete) = joined
            .map_err(|e| ApiError::Internal(format!("capability check task failed: {e}")))??;
        flags.insert(id, (can_write, can_delete));
    }

    let items = items
        .into_iter()
        .map(|item| {
            let (can_write, can_delete) = flags.get(&item.id).copied().unwrap_or((false, false));
            ItemView::new(item, can_write, can_delete)
        })
        .collect();

    Ok(Json(ItemListResponse { items }))
}

/// `POST /v1/items` — create an item.
async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateItemRequest>,
) -> Result<Json<ItemView>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    let mode = state
        .scopes
        .resolve(&principal, ScopeEntity::Items, ScopeVerb::Write);
    if mode == ScopeMode::None {
        return Err(ApiError::Forbidden("item creation not permitted".to_owned()));
    }

    if body.name.is_empty() || body.name.len() > 256 {
        return Err(ApiError::BadRequest("name must be 1-256 characters".to_owned()));
    }

    // An item's vault must equal its folder's vault.
    if let Some(folder_id) = body.folder_id {
        let folder = state
            .store
            .folder(folder_id)
            .await?
            .ok_or_else(|| ApiError::BadRequest("folder not found".to_owned()))?;
        if folder.vault_id != body.vault_id {
            return Err(ApiError::BadRequest(
                "folder belongs to a different vault".to_owned(),
            ));
        }
        require(
            state
                .engine
                .check_folder(&principal, folder_id, &[Permission::ReadWrite])
                .await?,
        )?;
    } else {
        require(
            state
                .engine
                .check_vault(&principal, body.vault_id, &[Permission::ReadWrite])
                .await?,
        )?;
    }

    let secret = decode_secret(body.secret.as_deref())?.unwrap_or_default();

    let item = state
        .store
        .create_item(
            body.vault_id,
            body.folder_id,
            &body.name,
            body.username.as_deref(),
            body.url.as_deref(),
            body.notes.as_deref(),
            &secret,
        )
        .await?;

    info!(item_id = %item.id, vault_id = %item.vault_id, "item created");

    let delete_check = state
        .engine
        .check_item(&principal, item.id, &[Permission::Delete])
        .await?;

    Ok(Json(ItemView::new(item, true, delete_check.allowed())))
}

/// `GET /v1/items/{item_id}` — item metadata with capability flags.
async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ItemView>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(state.engine.check_item(&principal, item_id, &[]).await?)?;

    let item = state
        .store
        .item(item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("item not found".to_owned()))?;

    let (write_check, delete_check) = tokio::join!(
        state
            .engine
            .check_item(&principal, item_id, &[Permission::ReadWrite]),
        state
            .engine
            .check_item(&principal, item_id, &[Permission::Delete]),
    );

    Ok(Json(ItemView::new(
        item,
        write_check?.allowed(),
        delete_check?.allowed(),
    )))
}

/// `GET /v1/items/{item_id}/secret` — reveal the stored ciphertext.
async fn reveal_secret(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<SecretResponse>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_item(&principal, item_id, &[Permission::ReadOnly])
            .await?,
    )?;

    let item = state
        .store
        .item(item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("item not found".to_owned()))?;

    Ok(Json(SecretResponse {
        secret: base64::engine::general_purpose::STANDARD.encode(item.secret),
    }))
}

/// `PATCH /v1/items/{item_id}` — update an item.
async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<ItemView>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_item(&principal, item_id, &[Permission::ReadWrite])
            .await?,
    )?;

    if body.name.is_empty() || body.name.len() > 256 {
        return Err(ApiError::BadRequest("name must be 1-256 characters".to_owned()));
    }

    let secret = decode_secret(body.secret.as_deref())?;

    let item = state
        .store
        .update_item(
            item_id,
            &body.name,
            body.username.as_deref(),
            body.url.as_deref(),
            body.notes.as_deref(),
            secret.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("item not found".to_owned()))?;

    let delete_check = state
        .engine
        .check_item(&principal, item_id, &[Permission::Delete])
        .await?;

    Ok(Json(ItemView::new(item, true, delete_check.allowed())))
}

/// `DELETE /v1/items/{item_id}` — delete an item.
async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = state.principals.resolve(&subject).await;
    require(
        state
            .engine
            .check_item(&principal, item_id, &[Permission::Delete])
            .await?,
    )?;

    if !state.store.delete_item(item_id).await? {
        return Err(ApiError::NotFound("item not found".to_owned()));
    }

    info!(item_id = %item_id, "item deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
