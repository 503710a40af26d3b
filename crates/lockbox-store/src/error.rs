//! Store error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger. These are infrastructure failures only — a missing
//! row is `Ok(None)` at the trait level, never an error, so that callers
//! can distinguish "not found" from "store unreachable".

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to connect to the backing database.
    #[error("failed to connect to store: {reason}")]
    Connection { reason: String },

    /// A query against the backing database failed.
    #[error("store query failed: {reason}")]
    Query { reason: String },

    /// A write violated a database constraint (duplicate key, bad FK).
    #[error("store constraint violated: {reason}")]
    Constraint { reason: String },

    /// A stored row could not be decoded into its domain type.
    #[error("failed to decode stored row: {reason}")]
    Decode { reason: String },
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique (23505) and foreign key (23503) violations.
                if matches!(db_err.code().as_deref(), Some("23505" | "23503")) {
                    Self::Constraint {
                        reason: db_err.to_string(),
                    }
                } else {
                    Self::Query {
                        reason: db_err.to_string(),
                    }
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Decode {
                reason: err.to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection {
                    reason: err.to_string(),
                }
            }
            _ => Self::Query {
                reason: err.to_string(),
            },
        }
    }
}
