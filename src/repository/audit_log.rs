use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailure,
    Logout,
    MfaSetupComplete,
    MfaVerifySuccess,
    MfaVerifyFailure,
    MfaReset,
    RecoveryCodesRegenerated,
    PasswordResetRequested,
    PasswordResetEmailFailed,
    PasswordResetComplete,
    RateLimited,
    UserCreated,
    UserUpdated,
    ClientCreated,
    ClientUpdated,
    ClientAccountsAdded,
    ClientAccountRemoved,
    CsvExportInitiated,
    CsvExportCompleted,
    CsvExportDenied,
}

impl AuditEventType {
    pub const ALL: [Self; 21] = [
        Self::LoginSuccess,
        Self::LoginFailure,
        Self::Logout,
        Self::MfaSetupComplete,
        Self::MfaVerifySuccess,
        Self::MfaVerifyFailure,
        Self::MfaReset,
        Self::RecoveryCodesRegenerated,
        Self::PasswordResetRequested,
        Self::PasswordResetEmailFailed,
        Self::PasswordResetComplete,
        Self::RateLimited,
        Self::UserCreated,
        Self::UserUpdated,
        Self::ClientCreated,
        Self::ClientUpdated,
        Self::ClientAccountsAdded,
        Self::ClientAccountRemoved,
        Self::CsvExportInitiated,
        Self::CsvExportCompleted,
        Self::CsvExportDenied,
    ];

    /// Column value stored in `audit_log.event_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailure => "login_failure",
            Self::Logout => "logout",
            Self::MfaSetupComplete => "mfa_setup_complete",
            Self::MfaVerifySuccess => "mfa_verify_success",
            Self::MfaVerifyFailure => "mfa_verify_failure",
            Self::MfaReset => "mfa_reset",
            Self::RecoveryCodesRegenerated => "recovery_codes_regenerated",
            Self::PasswordResetRequested => "password_reset_requested",
            Self::PasswordResetEmailFailed => "password_reset_email_failed",
            Self::PasswordResetComplete => "password_reset_complete",
            Self::RateLimited => "rate_limited",
            Self::UserCreated => "user_created",
            Self::UserUpdated => "user_updated",
            Self::ClientCreated => "client_created",
            Self::ClientUpdated => "client_updated",
            Self::ClientAccountsAdded => "client_accounts_added",
            Self::ClientAccountRemoved => "client_account_removed",
            Self::CsvExportInitiated => "csv_export_initiated",
            Self::CsvExportCompleted => "csv_export_completed",
            Self::CsvExportDenied => "csv_export_denied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == value)
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit trail row.
///
/// `user_id` is `None` for events without an authenticated actor, such as a
/// failed login for an unknown email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub event_type: AuditEventType,
    pub detail: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub event_type: AuditEventType,
    pub detail: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

/// Insert-only store. There is deliberately no update or delete.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(
        &self,
        partition: &Partition,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, DashboardError>;

    /// Most recent entries first.
    async fn recent(
        &self,
        partition: &Partition,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, DashboardError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names_roundtrip() {
        for event in AuditEventType::ALL {
            assert_eq!(AuditEventType::parse(event.as_str()), Some(event));
        }
        assert_eq!(AuditEventType::parse("unknown_event"), None);
    }

    #[test]
    fn test_event_type_serde_matches_column_value() {
        let json = serde_json::to_string(&AuditEventType::CsvExportDenied).unwrap();
        assert_eq!(json, "\"csv_export_denied\"");
    }
}
