//! Multi-tenant financial dashboard.
//!
//! Each tenant is reached through its own domain and stores its data in a
//! dedicated PostgreSQL schema. Users sign in with a password and a second
//! factor (TOTP, a recovery code, or a remembered device), then browse
//! account KPIs and transactions and export them as CSV. Every
//! security-relevant action is written to the tenant's audit log; an action
//! whose audit entry cannot be written fails.
//!
//! # Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `sqlx_postgres` | PostgreSQL repositories and migrations (default) |
//! | `axum_api` | HTTP router (default) |
//! | `mocks` | In-memory repositories for tests |
//! | `tracing` | `tracing` spans on actions |

pub mod actions;
pub mod api;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod email;
mod error;
pub mod mfa;
pub mod permission;
#[cfg(feature = "sqlx_postgres")]
pub mod postgres;
pub mod query;
pub mod rate_limit;
pub mod repository;
mod secret;
pub mod session;
pub mod tenant;
pub mod validators;

pub use error::DashboardError;
pub use secret::SecretString;
