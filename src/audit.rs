//! Append-only audit trail for security-relevant actions.
//!
//! [`AuditLogger::record`] returns the repository error unchanged, so the
//! calling action fails when its audit entry cannot be written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::repository::{AuditEntry, AuditEventType, AuditLogRepository, NewAuditEntry};
use crate::tenant::Partition;
use crate::DashboardError;

/// Longest user agent kept in an audit entry.
pub const MAX_USER_AGENT_LEN: usize = 500;

/// Entries shown on the management audit page.
pub const AUDIT_VIEW_LIMIT: u32 = 500;

/// Who made the request, as far as the server can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Address written to the audit trail. May come from forwarding
    /// headers the client controls.
    pub ip_address: Option<String>,
    /// Address per-IP rate limits count against: the TCP peer, or the
    /// forwarded client when the peer is a trusted proxy.
    pub client_addr: Option<String>,
    pub user_agent: String,
    /// Normalized request host.
    pub host: String,
    /// Whether the request arrived over HTTPS.
    pub secure: bool,
}

impl RequestContext {
    pub fn new(ip_address: Option<String>, user_agent: &str, host: &str) -> Self {
        Self {
            client_addr: ip_address.clone(),
            ip_address,
            user_agent: truncate_chars(user_agent, MAX_USER_AGENT_LEN),
            host: host.to_owned(),
            secure: true,
        }
    }

    #[must_use]
    pub fn with_client_addr(mut self, client_addr: Option<String>) -> Self {
        self.client_addr = client_addr;
        self
    }

    /// Identity used for IP-keyed rate limits. Requests with no known
    /// address share one bucket.
    pub fn ip_key(&self) -> &str {
        self.client_addr.as_deref().unwrap_or("unknown")
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_owned(),
        None => value.to_owned(),
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditLogger {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    pub async fn record(
        &self,
        partition: &Partition,
        ctx: &RequestContext,
        event_type: AuditEventType,
        user_id: Option<Uuid>,
        detail: impl Into<String>,
    ) -> Result<AuditEntry, DashboardError> {
        self.record_at(partition, ctx, event_type, user_id, detail, Utc::now())
            .await
    }

    pub async fn record_at(
        &self,
        partition: &Partition,
        ctx: &RequestContext,
        event_type: AuditEventType,
        user_id: Option<Uuid>,
        detail: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<AuditEntry, DashboardError> {
        let entry = NewAuditEntry {
            timestamp,
            user_id,
            event_type,
            detail: detail.into(),
            ip_address: ctx.ip_address.clone(),
            user_agent: truncate_chars(&ctx.user_agent, MAX_USER_AGENT_LEN),
        };

        self.repository.append(partition, entry).await.inspect_err(|e| {
            log::error!(
                target: "ledgerdash",
                "msg=\"audit write failed\", partition=\"{partition}\", event=\"{event_type}\", error=\"{e}\""
            );
        })
    }

    /// Newest entries first.
    pub async fn recent(
        &self,
        partition: &Partition,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, DashboardError> {
        self.repository.recent(partition, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockAuditLogRepository;

    fn acme() -> Partition {
        Partition::new("acme").unwrap()
    }

    #[test]
    fn test_user_agent_is_truncated() {
        let ctx = RequestContext::new(None, &"é".repeat(600), "acme.example.com");
        assert_eq!(ctx.user_agent.chars().count(), MAX_USER_AGENT_LEN);
        assert_eq!(ctx.ip_key(), "unknown");
    }

    #[test]
    fn test_limit_key_ignores_audit_address() {
        let ctx = RequestContext::new(Some("10.9.9.1".to_owned()), "curl/8", "acme.example.com")
            .with_client_addr(Some("203.0.113.50".to_owned()));
        assert_eq!(ctx.ip_address.as_deref(), Some("10.9.9.1"));
        assert_eq!(ctx.ip_key(), "203.0.113.50");
    }

    #[tokio::test]
    async fn test_record_appends_entry() {
        let repo = MockAuditLogRepository::new();
        let logger = AuditLogger::new(Arc::new(repo.clone()));
        let ctx = RequestContext::new(Some("203.0.113.9".to_owned()), "curl/8", "acme.example.com");
        let user_id = Uuid::new_v4();

        let entry = logger
            .record(&acme(), &ctx, AuditEventType::LoginSuccess, Some(user_id), "")
            .await
            .unwrap();

        assert_eq!(entry.user_id, Some(user_id));
        assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(repo.events(&acme()), vec![AuditEventType::LoginSuccess]);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let repo = MockAuditLogRepository::new();
        repo.fail_writes(true);
        let logger = AuditLogger::new(Arc::new(repo.clone()));

        let result = logger
            .record(
                &acme(),
                &RequestContext::default(),
                AuditEventType::CsvExportInitiated,
                None,
                "10 rows",
            )
            .await;

        assert!(matches!(result, Err(DashboardError::Database(_))));
        assert!(repo.events(&acme()).is_empty());
    }
}
