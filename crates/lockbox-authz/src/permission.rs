//! Permission model.
//!
//! Permissions are a small closed enumeration, not a policy language.
//! Persisted ACL rows carry raw string tokens — canonical names or legacy
//! aliases accumulated over the product's history — which are normalized
//! here before any evaluation.
//!
//! Three operations, all pure:
//!
//! - [`normalize`] — map tokens to canonical [`Permission`]s, dropping
//!   anything unknown
//! - [`merge`] — union a list of token sets and expand the ladder
//!   `DELETE ⟹ READ_WRITE ⟹ READ_ONLY`
//! - [`satisfies`] — containment check of required against effective
//!
//! `MANAGE_ACL` sits outside the ladder: it implies nothing and nothing
//! implies it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A canonical permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Read resource data.
    ReadOnly,
    /// Create and modify resource data.
    ReadWrite,
    /// Remove resources.
    Delete,
    /// Administer the resource's ACL entries. Orthogonal to the ladder.
    ManageAcl,
}

impl Permission {
    /// The canonical token string for this permission.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::ReadWrite => "READ_WRITE",
            Self::Delete => "DELETE",
            Self::ManageAcl => "MANAGE_ACL",
        }
    }

    /// Map a raw token — canonical or legacy alias — to its canonical
    /// permission. Returns `None` for unknown tokens.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "READ_ONLY" | "VIEW_METADATA" | "REVEAL_PASSWORD" | "COPY_PASSWORD"
            | "REVEAL_TOTP_SECRET" | "READ_SMS" => Some(Self::ReadOnly),
            "READ_WRITE" | "EDIT" | "SHARE" | "GENERATE_TOTP" | "MANAGE_SMS" | "IMPORT" => {
                Some(Self::ReadWrite)
            }
            "DELETE" => Some(Self::Delete),
            "MANAGE_ACL" => Some(Self::ManageAcl),
            _ => None,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a raw token is a member of the closed token set (canonical or
/// alias). Write endpoints use this to reject unknown tokens at the
/// boundary; [`normalize`] drops them silently during evaluation.
#[must_use]
pub fn known_token(token: &str) -> bool {
    Permission::from_token(token).is_some()
}

/// Normalize raw tokens into a canonical permission set.
///
/// Legacy aliases map to their canonical target; unknown tokens are
/// silently dropped. No ladder expansion happens here.
pub fn normalize<S: AsRef<str>>(tokens: &[S]) -> BTreeSet<Permission> {
    tokens
        .iter()
        .filter_map(|t| Permission::from_token(t.as_ref()))
        .collect()
}

/// Merge a list of raw token sets into one effective permission set.
///
/// Each input set is normalized, the results are unioned, and the union
/// is expanded along the ladder: `DELETE` yields all three ladder
/// permissions, `READ_WRITE` yields itself plus `READ_ONLY`. `MANAGE_ACL`
/// passes through untouched. Order of inputs never affects the result.
pub fn merge<S: AsRef<str>, T: AsRef<[S]>>(sets: &[T]) -> BTreeSet<Permission> {
    let mut union: BTreeSet<Permission> = BTreeSet::new();
    for set in sets {
        union.extend(normalize(set.as_ref()));
    }

    if union.contains(&Permission::Delete) {
        union.insert(Permission::ReadWrite);
        union.insert(Permission::ReadOnly);
    } else if union.contains(&Permission::ReadWrite) {
        union.insert(Permission::ReadOnly);
    }

    union
}

/// Whether `effective` grants everything in `required`.
#[must_use]
pub fn satisfies(effective: &BTreeSet<Permission>, required: &BTreeSet<Permission>) -> bool {
    required.is_subset(effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(perms: &[Permission]) -> BTreeSet<Permission> {
        perms.iter().copied().collect()
    }

    #[test]
    fn canonical_tokens_map_to_themselves() {
        for p in [
            Permission::ReadOnly,
            Permission::ReadWrite,
            Permission::Delete,
            Permission::ManageAcl,
        ] {
            assert_eq!(Permission::from_token(p.as_str()), Some(p));
        }
    }

    #[test]
    fn alias_table_is_complete() {
        let cases = [
            ("EDIT", Permission::ReadWrite),
            ("SHARE", Permission::ReadWrite),
            ("VIEW_METADATA", Permission::ReadOnly),
            ("REVEAL_PASSWORD", Permission::ReadOnly),
            ("COPY_PASSWORD", Permission::ReadOnly),
            ("GENERATE_TOTP", Permission::ReadWrite),
            ("REVEAL_TOTP_SECRET", Permission::ReadOnly),
            ("READ_SMS", Permission::ReadOnly),
            ("MANAGE_SMS", Permission::ReadWrite),
            ("IMPORT", Permission::ReadWrite),
        ];
        for (alias, target) in cases {
            assert_eq!(normalize(&[alias]), set(&[target]), "alias {alias}");
        }
    }

    #[test]
    fn unknown_tokens_are_dropped() {
        assert!(normalize(&["FROBNICATE"]).is_empty());
        assert_eq!(
            normalize(&["FROBNICATE", "READ_ONLY", ""]),
            set(&[Permission::ReadOnly])
        );
        assert!(known_token("EDIT"));
        assert!(!known_token("FROBNICATE"));
        // Tokens are case-sensitive — lowercase is not in the closed set.
        assert!(!known_token("read_only"));
    }

    #[test]
    fn delete_expands_full_ladder() {
        assert_eq!(
            merge(&[vec!["DELETE"]]),
            set(&[Permission::ReadOnly, Permission::ReadWrite, Permission::Delete])
        );
    }

    #[test]
    fn read_write_implies_read_only() {
        assert_eq!(
            merge(&[vec!["READ_WRITE"]]),
            set(&[Permission::ReadOnly, Permission::ReadWrite])
        );
    }

    #[test]
    fn read_only_stays_read_only() {
        assert_eq!(merge(&[vec!["READ_ONLY"]]), set(&[Permission::ReadOnly]));
    }

    #[test]
    fn ladder_is_monotone() {
        let d = merge(&[vec!["DELETE"]]);
        let rw = merge(&[vec!["READ_WRITE"]]);
        let ro = merge(&[vec!["READ_ONLY"]]);
        assert!(rw.is_subset(&d));
        assert!(ro.is_subset(&rw));
    }

    #[test]
    fn manage_acl_is_orthogonal() {
        assert_eq!(merge(&[vec!["MANAGE_ACL"]]), set(&[Permission::ManageAcl]));
        // Ladder tokens never imply MANAGE_ACL.
        assert!(!merge(&[vec!["DELETE"]]).contains(&Permission::ManageAcl));
        // MANAGE_ACL next to ladder tokens leaves both intact.
        assert_eq!(
            merge(&[vec!["MANAGE_ACL", "READ_WRITE"]]),
            set(&[Permission::ReadOnly, Permission::ReadWrite, Permission::ManageAcl])
        );
    }

    #[test]
    fn merge_is_commutative_and_idempotent() {
        let a = vec!["READ_WRITE".to_owned()];
        let b = vec!["MANAGE_ACL".to_owned()];
        let c = vec!["REVEAL_PASSWORD".to_owned()];

        let fwd = merge(&[a.clone(), b.clone(), c.clone()]);
        let rev = merge(&[c.clone(), b.clone(), a.clone()]);
        assert_eq!(fwd, rev);

        let doubled = merge(&[a.clone(), a.clone(), b.clone(), b, c.clone(), c]);
        assert_eq!(fwd, doubled);
    }

    #[test]
    fn aliases_merge_through_their_targets() {
        // EDIT and SHARE both land on READ_WRITE, which pulls in READ_ONLY.
        assert_eq!(
            merge(&[vec!["EDIT"], vec!["SHARE"]]),
            set(&[Permission::ReadOnly, Permission::ReadWrite])
        );
    }

    #[test]
    fn satisfies_is_containment() {
        let effective = merge(&[vec!["READ_WRITE"]]);
        assert!(satisfies(&effective, &set(&[Permission::ReadOnly])));
        assert!(satisfies(&effective, &set(&[Permission::ReadWrite, Permission::ReadOnly])));
        assert!(!satisfies(&effective, &set(&[Permission::Delete])));
        assert!(!satisfies(&effective, &set(&[Permission::ManageAcl])));
        // Empty requirement is always satisfied.
        assert!(satisfies(&effective, &BTreeSet::new()));
        assert!(satisfies(&BTreeSet::new(), &BTreeSet::new()));
    }
}
