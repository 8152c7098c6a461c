//! Configuration for the dashboard service.
//!
//! Every setting has a default matching the production deployment. The
//! server binary fills these structs from environment variables (see
//! `main.rs`); tests construct them directly.
//!
//! # Example
//!
//! ```rust
//! use ledgerdash::config::{DashboardConfig, MfaConfig};
//!
//! let config = DashboardConfig {
//!     mfa: MfaConfig {
//!         remember_device_days: 14,
//!         ..Default::default()
//!     },
//!     ..DashboardConfig::development()
//! };
//! assert_eq!(config.export.max_rows, 250_000);
//! ```

use std::net::IpAddr;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::SecretString;
use crate::session::SessionConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub mfa: MfaConfig,
    pub rate_limit: RateLimitConfig,
    pub tokens: TokenConfig,
    pub export: ExportConfig,
    pub pagination: PaginationConfig,
    pub smtp: SmtpConfig,
}

impl DashboardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local development: debug on, cookies without `Secure`, localhost allowed.
    pub fn development() -> Self {
        let mut session = SessionConfig::default();
        session.cookie_secure = false;
        session.secret_key = SecretString::new("development-only-secret-key-0123456789abcdef");

        Self {
            security: SecurityConfig {
                debug: true,
                allowed_hosts: vec!["localhost".to_owned(), ".localhost".to_owned()],
                csrf_trusted_origins: vec!["http://localhost:8000".to_owned()],
                trusted_proxies: Vec::new(),
            },
            session,
            ..Self::default()
        }
    }

    /// Checks settings that must hold before the server starts.
    pub fn validate(&self) -> Result<(), String> {
        if !self.security.debug {
            self.session.validate().map_err(str::to_owned)?;
            if !self.session.cookie_secure {
                return Err("session cookies must be Secure outside debug mode".to_owned());
            }
        }
        if self.security.allowed_hosts.is_empty() {
            return Err("at least one allowed host is required".to_owned());
        }
        if self.mfa.remember_device_days < 1 {
            return Err("MFA_REMEMBER_DEVICE_DAYS must be at least 1".to_owned());
        }
        if self.export.max_rows == 0 {
            return Err("export row cap must be positive".to_owned());
        }
        Ok(())
    }
}

/// Host and origin checks applied before any tenant lookup.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub debug: bool,
    /// Exact hostnames, or suffixes starting with `.` that match the bare
    /// domain and any subdomain.
    pub allowed_hosts: Vec<String>,
    /// Origins such as `https://*.example.com` accepted on unsafe requests.
    pub csrf_trusted_origins: Vec<String>,
    /// Reverse proxies whose `X-Forwarded-For` / `X-Real-IP` headers are
    /// believed when keying per-IP rate limits. Empty means the TCP peer
    /// address is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            allowed_hosts: vec!["localhost".to_owned()],
            csrf_trusted_origins: Vec::new(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl SecurityConfig {
    /// `host` must already be normalized (lowercase, no port).
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            if pattern == "*" {
                return true;
            }
            match pattern.strip_prefix('.') {
                Some(suffix) => host == suffix || host.ends_with(&pattern),
                None => host == pattern,
            }
        })
    }

    pub fn is_trusted_proxy(&self, addr: IpAddr) -> bool {
        self.trusted_proxies.contains(&addr)
    }

    /// Matches an `Origin` header against the trusted list. A `*.` label in
    /// a trusted origin matches any subdomain.
    pub fn is_origin_trusted(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/').to_ascii_lowercase();
        let Some((scheme, host)) = origin.split_once("://") else {
            return false;
        };

        self.csrf_trusted_origins.iter().any(|trusted| {
            let trusted = trusted.trim_end_matches('/').to_ascii_lowercase();
            let Some((t_scheme, t_host)) = trusted.split_once("://") else {
                return false;
            };
            if t_scheme != scheme {
                return false;
            }
            match t_host.strip_prefix("*.") {
                Some(suffix) => host.ends_with(&format!(".{suffix}")),
                None => t_host == host,
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct MfaConfig {
    /// Issuer shown in authenticator apps.
    pub issuer: String,
    /// Days a remembered device skips the second factor. Default: 7
    pub remember_device_days: i64,
    /// Recovery codes issued per setup or regeneration. Default: 10
    pub recovery_code_count: usize,
    pub device_cookie_name: String,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            issuer: "LedgerDash".to_owned(),
            remember_device_days: 7,
            recovery_code_count: 10,
            device_cookie_name: "ledgerdash_device".to_owned(),
        }
    }
}

impl MfaConfig {
    pub fn remember_device_for(&self) -> Duration {
        Duration::days(self.remember_device_days)
    }
}

/// Per-endpoint request budgets, each counted per minute.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Keyed by client IP. Default: 10
    pub login_per_minute: u32,
    /// Keyed by user id. Default: 10
    pub mfa_verify_per_minute: u32,
    /// Keyed by client IP. Default: 5
    pub password_reset_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_minute: 10,
            mfa_verify_per_minute: 10,
            password_reset_per_minute: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Default: 1 hour
    pub password_reset_expiry: Duration,
    pub session_token_length: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            password_reset_expiry: Duration::hours(1),
            session_token_length: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Hard cap on exported rows. Default: 250 000
    pub max_rows: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { max_rows: 250_000 }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// STARTTLS on connect.
    pub use_tls: bool,
    pub from_email: String,
    /// Upper bound on a single delivery attempt.
    pub timeout: StdDuration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 587,
            username: String::new(),
            password: SecretString::default(),
            use_tls: true,
            from_email: "noreply@localhost".to_owned(),
            timeout: StdDuration::from_secs(10),
        }
    }
}
