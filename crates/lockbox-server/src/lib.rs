//! Lockbox HTTP server.
//!
//! Wires the store, the authorization engine, and the HTTP routes into a
//! running Axum server. Every route resolves the caller's principal
//! once, then either bounds its working set through the scope resolver
//! (collection operations) or runs the matching access check
//! (single-resource operations).

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
