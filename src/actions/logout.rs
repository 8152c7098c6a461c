use std::sync::Arc;

use crate::audit::{AuditLogger, RequestContext};
use crate::repository::AuditEventType;
use crate::session::{Session, SessionRepository};
use crate::DashboardError;

pub struct LogoutAction {
    sessions: Arc<dyn SessionRepository>,
    audit: AuditLogger,
}

impl LogoutAction {
    pub fn new(sessions: Arc<dyn SessionRepository>, audit: AuditLogger) -> Self {
        Self { sessions, audit }
    }

    /// Destroys the session server-side. Works at any MFA stage.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "logout", skip_all, err)
    )]
    pub async fn execute(&self, session: &Session, ctx: &RequestContext) -> Result<(), DashboardError> {
        self.audit
            .record(
                &session.data.partition,
                ctx,
                AuditEventType::Logout,
                Some(session.data.user_id),
                "",
            )
            .await?;

        self.sessions.destroy(&session.id).await?;

        log::info!(
            target: "ledgerdash::session",
            "msg=\"logout success\", partition=\"{}\"",
            session.data.partition
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::mfa::MfaState;
    use crate::permission::Role;
    use crate::repository::{MockAuditLogRepository, MockUserRepository};
    use crate::session::{InMemorySessionRepository, SessionData};

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let users = MockUserRepository::new();
        let user = seed_user(&users, &acme(), "ada@acme.example", Role::User);
        let sessions = InMemorySessionRepository::new();
        let audit_repo = MockAuditLogRepository::new();

        let data = SessionData::mock(&acme(), user.id, Role::User, MfaState::MfaRequired);
        let id = sessions.create(data).await.unwrap();
        let session = sessions.find(&id).await.unwrap().unwrap();

        let action = LogoutAction::new(Arc::new(sessions.clone()), audit(&audit_repo));
        action.execute(&session, &ctx()).await.unwrap();

        assert!(sessions.find(&id).await.unwrap().is_none());
        assert_eq!(audit_repo.events(&acme()), vec![AuditEventType::Logout]);
    }
}
