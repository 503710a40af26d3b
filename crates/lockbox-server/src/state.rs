//! Shared application state for the Lockbox server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. It holds the store and the three engine
//! façades — access checks, scope resolution, principal resolution — all
//! of which are stateless and share the same store handle.

use std::sync::Arc;

use lockbox_authz::{
    AccessEngine, GroupDirectory, PrincipalResolver, ScopeResolver, StaticActionGate,
};
use lockbox_store::PgStore;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// The PostgreSQL store (reads for the engine, CRUD for handlers).
    pub store: Arc<PgStore>,
    /// Vault/folder/item access checks.
    pub engine: AccessEngine<PgStore>,
    /// Scope mode resolution and visible-set computation.
    pub scopes: ScopeResolver<PgStore>,
    /// Principal resolution from authenticated subjects.
    pub principals: PrincipalResolver<PgStore>,
}

impl AppState {
    /// Assemble state from a connected store and configuration.
    #[must_use]
    pub fn new(
        store: Arc<PgStore>,
        config: &ServerConfig,
        directory: Arc<dyn GroupDirectory>,
    ) -> Self {
        let mut gate = StaticActionGate::new();
        for role in &config.any_scope_roles {
            gate = gate.allow_role(
                role,
                ["read.scope.any", "write.scope.any", "delete.scope.any"],
            );
        }

        Self {
            engine: AccessEngine::new(Arc::clone(&store)),
            scopes: ScopeResolver::new(Arc::clone(&store), Arc::new(gate)),
            principals: PrincipalResolver::new(Arc::clone(&store), directory),
            store,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
