//! Scope mode resolution.
//!
//! Before a collection handler touches the store it asks: how much of the
//! world may this caller see for this (entity, verb)? The answer is a
//! [`ScopeMode`], resolved by probing an [`ActionGate`] with fixed action
//! keys — entity-specific first, then resource-wide — always testing the
//! most restrictive mode first. A caller granted both `own` and `any`
//! gets `own`.
//!
//! [`ScopeResolver::visible_set`] then translates the mode into the
//! concrete working-set bound: nothing, the caller's own personal
//! vaults, or those plus everything reachable through ACL rows (with
//! folder grants expanded to their subtrees).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use lockbox_store::models::ResourceKind;
use lockbox_store::AuthzStore;

use crate::error::AuthzError;
use crate::hierarchy::expand_descendants;
use crate::principal::Principal;

/// Coarse visibility/mutation bound for collection operations.
///
/// Ephemeral — resolved per (request, entity, verb), never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Nothing visible. The store is never queried.
    None,
    /// The caller's own personal vaults.
    Own,
    /// Limited delegated data — bounded like `own`.
    Ldd,
    /// Own vaults plus everything reachable via ACL grants.
    Any,
}

impl std::fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Own => write!(f, "own"),
            Self::Ldd => write!(f, "ldd"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Most restrictive first — the probe order is the precedence order.
const MODE_ORDER: [ScopeMode; 4] = [ScopeMode::None, ScopeMode::Own, ScopeMode::Ldd, ScopeMode::Any];

/// The entity axis of a scope probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntity {
    Vaults,
    Folders,
    Items,
}

impl std::fmt::Display for ScopeEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vaults => write!(f, "vaults"),
            Self::Folders => write!(f, "folders"),
            Self::Items => write!(f, "items"),
        }
    }
}

/// The verb axis of a scope probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeVerb {
    Read,
    Write,
    Delete,
}

impl std::fmt::Display for ScopeVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Action-permission predicate probed by the scope resolver.
///
/// Keys are flat strings (`"items.read.scope.own"`, `"read.scope.any"`);
/// there is deliberately no pattern language.
pub trait ActionGate: Send + Sync + 'static {
    /// Whether the principal is granted the action key.
    fn granted(&self, principal: &Principal, action: &str) -> bool;
}

/// A static role-to-actions gate.
///
/// Grants an action when any of the principal's roles carries it. The
/// default wiring when no external permission service is attached.
#[derive(Debug, Clone, Default)]
pub struct StaticActionGate {
    role_actions: HashMap<String, HashSet<String>>,
}

impl StaticActionGate {
    /// Create an empty gate (every probe fails, so every scope resolves
    /// to the `own` default).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role a set of action keys.
    #[must_use]
    pub fn allow_role<I, A>(mut self, role: &str, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.role_actions
            .entry(role.to_owned())
            .or_default()
            .extend(actions.into_iter().map(Into::into));
        self
    }
}

impl ActionGate for StaticActionGate {
    fn granted(&self, principal: &Principal, action: &str) -> bool {
        principal.roles.iter().any(|role| {
            self.role_actions
                .get(role)
                .is_some_and(|actions| actions.contains(action))
        })
    }
}

/// The concrete working-set bound a resolved scope mode translates into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleSet {
    /// Return an empty result immediately; never touch the store.
    Empty,
    /// Everything inside these vaults, plus these folders' contents.
    Ids {
        vault_ids: Vec<Uuid>,
        folder_ids: Vec<Uuid>,
    },
}

/// Resolves scope modes and their visible sets.
pub struct ScopeResolver<S> {
    store: Arc<S>,
    gate: Arc<dyn ActionGate>,
}

impl<S> std::fmt::Debug for ScopeResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver").finish_non_exhaustive()
    }
}

impl<S: AuthzStore> ScopeResolver<S> {
    /// Create a resolver over the given store and action gate.
    #[must_use]
    pub fn new(store: Arc<S>, gate: Arc<dyn ActionGate>) -> Self {
        Self { store, gate }
    }

    /// Resolve the scope mode for an (entity, verb) pair.
    ///
    /// Probes entity-specific keys first, then resource-wide keys, each
    /// in `[none, own, ldd, any]` order; the first grant wins. With no
    /// grant at all the mode defaults to `own`.
    pub fn resolve(
        &self,
        principal: &Principal,
        entity: ScopeEntity,
        verb: ScopeVerb,
    ) -> ScopeMode {
        for mode in MODE_ORDER {
            if self
                .gate
                .granted(principal, &format!("{entity}.{verb}.scope.{mode}"))
            {
                return mode;
            }
        }
        for mode in MODE_ORDER {
            if self.gate.granted(principal, &format!("{verb}.scope.{mode}")) {
                return mode;
            }
        }
        debug!(%entity, %verb, "no scope grant matched, defaulting to own");
        ScopeMode::Own
    }

    /// Translate a resolved mode into the concrete visible set.
    ///
    /// For `any`, vault reachability comes from vault-level ACL rows
    /// only; folder-level rows contribute their subtrees (expanded
    /// downward, each kept only inside the vault its granting root
    /// belongs to) and never widen the vault set.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Store`] if the store fails.
    pub async fn visible_set(
        &self,
        principal: &Principal,
        mode: ScopeMode,
    ) -> Result<VisibleSet, AuthzError> {
        match mode {
            ScopeMode::None => Ok(VisibleSet::Empty),
            ScopeMode::Own | ScopeMode::Ldd => {
                let vault_ids = self
                    .store
                    .owned_personal_vault_ids(principal.user_id)
                    .await?;
                Ok(VisibleSet::Ids {
                    vault_ids,
                    folder_ids: Vec::new(),
                })
            }
            ScopeMode::Any => self.acl_visible_set(principal).await,
        }
    }

    async fn acl_visible_set(&self, principal: &Principal) -> Result<VisibleSet, AuthzError> {
        let mut vault_ids: HashSet<Uuid> = self
            .store
            .owned_personal_vault_ids(principal.user_id)
            .await?
            .into_iter()
            .collect();

        let rows = self
            .store
            .acl_entries_for_principals(&principal.acl_match_ids())
            .await?;

        let mut granted_folder_ids: HashSet<Uuid> = HashSet::new();
        for row in &rows {
            match row.resource_kind {
                ResourceKind::Vault => {
                    vault_ids.insert(row.resource_id);
                }
                ResourceKind::Folder => {
                    granted_folder_ids.insert(row.resource_id);
                }
                // Item grants do not widen collection visibility.
                ResourceKind::Item => {}
            }
        }

        // Expand folder grants per vault so a grant can never follow a
        // corrupted cross-vault parent edge into another vault's data.
        let roots = self
            .store
            .folders_by_ids(&granted_folder_ids.into_iter().collect::<Vec<_>>())
            .await?;
        let mut roots_by_vault: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for root in roots {
            roots_by_vault
                .entry(root.vault_id)
                .or_default()
                .insert(root.id);
        }

        let mut folder_ids: HashSet<Uuid> = HashSet::new();
        for (vault_id, group) in roots_by_vault {
            let expanded = expand_descendants(self.store.as_ref(), &group).await?;
            let folders = self
                .store
                .folders_by_ids(&expanded.into_iter().collect::<Vec<_>>())
                .await?;
            folder_ids.extend(
                folders
                    .into_iter()
                    .filter(|f| f.vault_id == vault_id)
                    .map(|f| f.id),
            );
        }

        let mut vault_ids: Vec<Uuid> = vault_ids.into_iter().collect();
        let mut folder_ids: Vec<Uuid> = folder_ids.into_iter().collect();
        vault_ids.sort_unstable();
        folder_ids.sort_unstable();

        Ok(VisibleSet::Ids {
            vault_ids,
            folder_ids,
        })
    }
}
