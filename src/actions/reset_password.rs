use std::sync::Arc;

use chrono::Utc;

use crate::audit::{AuditLogger, RequestContext};
use crate::crypto::{PasswordHasher, hash_token};
use crate::repository::{AuditEventType, PasswordResetRepository, UserRepository};
use crate::session::SessionRepository;
use crate::tenant::Partition;
use crate::validators::{PasswordPolicy, validate_password_pair};
use crate::DashboardError;

/// Completes a password reset with the emailed token.
pub struct ResetPasswordAction {
    users: Arc<dyn UserRepository>,
    resets: Arc<dyn PasswordResetRepository>,
    sessions: Arc<dyn SessionRepository>,
    audit: AuditLogger,
    hasher: Arc<dyn PasswordHasher>,
    policy: PasswordPolicy,
}

impl ResetPasswordAction {
    pub fn new(
        users: Arc<dyn UserRepository>,
        resets: Arc<dyn PasswordResetRepository>,
        sessions: Arc<dyn SessionRepository>,
        audit: AuditLogger,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            resets,
            sessions,
            audit,
            hasher,
            policy: PasswordPolicy::default(),
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validates the token without consuming it.
    pub async fn check_token(&self, partition: &Partition, token: &str) -> Result<(), DashboardError> {
        let found = self
            .resets
            .find_reset_token(partition, &hash_token(token))
            .await?;
        match found {
            Some(t) if t.is_valid_at(Utc::now()) => Ok(()),
            _ => Err(DashboardError::TokenInvalid),
        }
    }

    /// Sets the new password and signs the user out everywhere.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "reset_password", skip_all, err)
    )]
    pub async fn execute(
        &self,
        partition: &Partition,
        ctx: &RequestContext,
        token: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), DashboardError> {
        self.check_token(partition, token).await?;
        validate_password_pair(&self.policy, password, confirmation)?;
        let hashed = self.hasher.hash(password)?;

        let user_id = self
            .resets
            .consume_reset_token(partition, &hash_token(token), Utc::now())
            .await?
            .ok_or(DashboardError::TokenInvalid)?;

        self.users.update_password(partition, user_id, &hashed).await?;
        self.sessions.destroy_user_sessions(partition, user_id).await?;

        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::PasswordResetComplete,
                Some(user_id),
                "",
            )
            .await?;

        log::info!(
            target: "ledgerdash",
            "msg=\"password reset\", partition=\"{partition}\", user_id=\"{user_id}\""
        );

        Ok(())
    }
}
