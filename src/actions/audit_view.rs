use super::Actor;
use crate::audit::{AUDIT_VIEW_LIMIT, AuditLogger};
use crate::permission::{Action, Resource, authorize};
use crate::repository::AuditEntry;
use crate::DashboardError;

/// Read-only audit trail for tenant administrators.
pub struct AuditLogViewAction {
    audit: AuditLogger,
}

impl AuditLogViewAction {
    pub fn new(audit: AuditLogger) -> Self {
        Self { audit }
    }

    /// The most recent entries of the actor's tenant, newest first.
    pub async fn execute(&self, actor: &Actor) -> Result<Vec<AuditEntry>, DashboardError> {
        authorize(actor.role, Resource::AuditLog, Action::Read)?;
        self.audit.recent(&actor.partition, AUDIT_VIEW_LIMIT).await
    }
}
