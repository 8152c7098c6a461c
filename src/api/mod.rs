//! HTTP interface.
//!
//! Request and response DTOs live here; the axum router is behind the
//! `axum_api` feature.

mod types;

pub use types::*;

#[cfg(feature = "axum_api")]
pub mod axum;
