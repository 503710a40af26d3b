//! Server configuration for Lockbox.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `LOCKBOX_*` environment variables.

use std::net::SocketAddr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Roles granted the `any` scope on every entity and verb.
    pub any_scope_roles: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `LOCKBOX_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `DATABASE_URL` — PostgreSQL connection string (default: `postgres://localhost/lockbox`)
    /// - `LOCKBOX_LOG_LEVEL` — log filter (default: `info`)
    /// - `LOCKBOX_ANY_SCOPE_ROLES` — comma-separated roles given the `any`
    ///   scope on all entities (default: `admin`)
    #[must_use]
    pub fn from_env() -> Self {
        // Priority: LOCKBOX_BIND_ADDR > PORT > default 127.0.0.1:8300
        let bind_addr = if let Ok(addr) = std::env::var("LOCKBOX_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8300)))
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8300);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8300))
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/lockbox".to_owned());

        let log_level =
            std::env::var("LOCKBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        let any_scope_roles = std::env::var("LOCKBOX_ANY_SCOPE_ROLES")
            .unwrap_or_else(|_| "admin".to_owned())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Self {
            bind_addr,
            database_url,
            log_level,
            any_scope_roles,
        }
    }
}
