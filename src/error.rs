use thiserror::Error;

use crate::validators::ValidationError;

/// Errors produced by dashboard operations.
///
/// Every variant carries a message that is safe to show the caller. Variants
/// that wrap infrastructure failures (`Database`, `Email`, `Configuration`,
/// `Internal`) keep their detail for server-side logs only; see
/// [`DashboardError::public_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("No organization is configured for this host")]
    TenantNotFound,
    #[error("Invalid email or password")]
    AuthenticationFailed,
    #[error("This account has been disabled")]
    AccountDisabled,
    #[error("Multi-factor verification is required")]
    MfaRequired,
    #[error("Multi-factor authentication must be set up before continuing")]
    MfaSetupRequired,
    #[error("Invalid verification code")]
    MfaVerificationFailed,
    #[error("Too many attempts. Please try again in {retry_after} seconds")]
    RateLimited { retry_after: i64 },
    #[error(
        "Export limited to {max_rows} rows; this filter matches {matched}. Narrow the date range or filters"
    )]
    ExportRowCapExceeded { max_rows: u64, matched: u64 },
    #[error("{0}")]
    Forbidden(String),
    #[error("Not found")]
    NotFound,
    #[error("This link is invalid or has expired")]
    TokenInvalid,
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid session state: cannot {0}")]
    InvalidTransition(&'static str),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Email delivery failed: {0}")]
    Email(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    /// Stable machine-readable code, used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TenantNotFound => "tenant_not_found",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AccountDisabled => "account_disabled",
            Self::MfaRequired => "mfa_required",
            Self::MfaSetupRequired => "mfa_setup_required",
            Self::MfaVerificationFailed => "mfa_verification_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::ExportRowCapExceeded { .. } => "export_row_cap_exceeded",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound => "not_found",
            Self::TokenInvalid => "token_invalid",
            Self::Validation(_) => "validation_error",
            Self::InvalidTransition(_) => "invalid_session_state",
            Self::Database(_) | Self::Email(_) | Self::Configuration(_) | Self::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// Returns true for failures whose detail must stay server-side.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Email(_) | Self::Configuration(_) | Self::Internal(_)
        )
    }

    /// Message suitable for the end user.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "An unexpected error occurred. Please try again later.".to_owned()
        } else {
            self.to_string()
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }
}

#[cfg(feature = "sqlx_postgres")]
impl From<sqlx::Error> for DashboardError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}
