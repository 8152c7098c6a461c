//! Tenant directory: maps request hosts to isolated data partitions.
//!
//! Each tenant owns exactly one PostgreSQL schema (its [`Partition`]).
//! Requests whose host maps to no active tenant resolve to
//! [`TenantResolution::Public`] and only ever see the landing page.

mod directory;
mod provision;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validators::ValidationError;

pub use directory::{InMemoryTenantDirectory, TenantDirectory};
pub use provision::{ProvisionTenantAction, ProvisionTenantRequest, ProvisionedTenant, TenantProvisioner};

#[cfg(any(test, feature = "mocks"))]
pub use provision::MockTenantProvisioner;

const RESERVED_SCHEMAS: &[&str] = &["public", "information_schema", "analytics"];

/// Name of the schema holding one tenant's tables.
///
/// Construction validates the identifier, so a `Partition` can be placed in
/// `search_path` without quoting concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Partition(String);

impl Partition {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !valid_start
            || !valid_rest
            || name.len() > 63
            || name.starts_with("pg_")
            || RESERVED_SCHEMAS.contains(&name.as_str())
        {
            return Err(ValidationError::InvalidSlug);
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Partition {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Partition> for String {
    fn from(p: Partition) -> Self {
        p.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub partition: Partition,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    /// Stored lowercase without port.
    pub domain: String,
    pub tenant_id: Uuid,
    pub is_primary: bool,
}

/// Outcome of resolving a request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantResolution {
    Tenant(Tenant),
    /// No active tenant owns the host. Serve the landing page only.
    Public,
}

impl TenantResolution {
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            Self::Tenant(t) => Some(t),
            Self::Public => None,
        }
    }
}

/// Lowercases a `Host` header value and strips the port and trailing dot.
///
/// Bracketed IPv6 literals keep their brackets.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if host.starts_with('[') {
        host.split_once(']')
            .map_or(host, |(addr, _)| addr)
            .trim_start_matches('[')
    } else {
        host.rsplit_once(':').map_or(host, |(h, _)| h)
    };

    let normalized = without_port.trim_end_matches('.').to_ascii_lowercase();
    if host.starts_with('[') {
        format!("[{normalized}]")
    } else {
        normalized
    }
}

#[cfg(any(test, feature = "mocks"))]
impl Tenant {
    pub fn mock(slug: &str) -> Self {
        #[allow(clippy::unwrap_used)]
        let partition = Partition::new(slug).unwrap();
        Self {
            id: Uuid::new_v4(),
            name: format!("{slug} org"),
            slug: slug.to_owned(),
            partition,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
