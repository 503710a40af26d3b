//! Principal resolution.
//!
//! A [`Principal`] is the full set of identifiers an authorization check
//! matches ACL rows against: user ID, email, roles, and group IDs. It is
//! computed fresh for every request from the authenticated [`Subject`]
//! and never persisted or cached.
//!
//! Group IDs come from two sources: a best-effort external
//! [`GroupDirectory`] (dynamic groups) and static membership rows in the
//! store, matched by user ID or email. Resolution never fails — a store
//! fault degrades to an empty group list, which is the correct behavior
//! under partial failure: an identity with fewer groups than expected,
//! not a request-killing error.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use lockbox_store::AuthzStore;

/// The role that activates the shared-vault admin rules.
pub const ADMIN_ROLE: &str = "admin";

/// The authenticated subject, as produced by the authentication layer.
///
/// Identity only — no group or permission data.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

/// The set of identifiers an access check matches ACL rows against.
///
/// Ephemeral — computed per request, discarded after use.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub user_email: String,
    pub roles: BTreeSet<String>,
    pub group_ids: BTreeSet<String>,
}

impl Principal {
    /// Whether this principal carries the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE)
    }

    /// Every identifier that may appear as an ACL row's `principal_id`:
    /// the user ID, the email, each role, and each group ID.
    #[must_use]
    pub fn acl_match_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(2 + self.roles.len() + self.group_ids.len());
        ids.push(self.user_id.to_string());
        ids.push(self.user_email.clone());
        ids.extend(self.roles.iter().cloned());
        ids.extend(self.group_ids.iter().cloned());
        ids
    }
}

/// External identity collaborator supplying dynamically resolved groups.
///
/// Best-effort by contract: implementations return an empty list on
/// failure rather than erroring.
#[async_trait::async_trait]
pub trait GroupDirectory: Send + Sync + 'static {
    /// Dynamic group IDs for the subject. Empty on failure.
    async fn dynamic_group_ids(&self, subject: &Subject) -> Vec<String>;
}

/// A directory that resolves no dynamic groups. The default when no
/// external identity provider is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

#[async_trait::async_trait]
impl GroupDirectory for NoDirectory {
    async fn dynamic_group_ids(&self, _subject: &Subject) -> Vec<String> {
        Vec::new()
    }
}

/// Builds [`Principal`]s from authenticated subjects.
pub struct PrincipalResolver<S> {
    store: Arc<S>,
    directory: Arc<dyn GroupDirectory>,
}

impl<S: AuthzStore> PrincipalResolver<S> {
    /// Create a resolver over the given store and group directory.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<dyn GroupDirectory>) -> Self {
        Self { store, directory }
    }

    /// Resolve the subject into a full principal.
    ///
    /// Never fails. A static-membership lookup fault is logged and
    /// degrades to the dynamic groups alone (possibly none).
    pub async fn resolve(&self, subject: &Subject) -> Principal {
        let mut group_ids: BTreeSet<String> = self
            .directory
            .dynamic_group_ids(subject)
            .await
            .into_iter()
            .collect();

        match self
            .store
            .static_group_ids(subject.user_id, &subject.email)
            .await
        {
            Ok(static_ids) => group_ids.extend(static_ids),
            Err(e) => {
                warn!(
                    user_id = %subject.user_id,
                    error = %e,
                    "static group lookup failed, resolving principal with dynamic groups only"
                );
            }
        }

        Principal {
            user_id: subject.user_id,
            user_email: subject.email.clone(),
            roles: subject.roles.iter().cloned().collect(),
            group_ids,
        }
    }
}

impl<S> std::fmt::Debug for PrincipalResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalResolver").finish_non_exhaustive()
    }
}
