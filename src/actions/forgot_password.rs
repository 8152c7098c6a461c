use std::sync::Arc;

use chrono::{Duration, Utc};

use super::enforce_limit;
use crate::audit::{AuditLogger, RequestContext};
use crate::crypto::{RESET_TOKEN_LENGTH, generate_token, hash_token};
use crate::email::{EmailMessage, Mailer};
use crate::rate_limit::{PASSWORD_RESET, RateLimiter};
use crate::repository::{AuditEventType, PasswordResetRepository, UserRepository};
use crate::tenant::Partition;
use crate::validators::email::normalize_email;
use crate::validators::validate_email;
use crate::DashboardError;

/// Starts a password reset by email.
///
/// The result is the same whether or not the address belongs to a user, so
/// callers always show the same confirmation.
pub struct ForgotPasswordAction {
    users: Arc<dyn UserRepository>,
    resets: Arc<dyn PasswordResetRepository>,
    mailer: Arc<dyn Mailer>,
    limiter: Arc<RateLimiter>,
    audit: AuditLogger,
    token_expiry: Duration,
}

impl ForgotPasswordAction {
    pub fn new(
        users: Arc<dyn UserRepository>,
        resets: Arc<dyn PasswordResetRepository>,
        mailer: Arc<dyn Mailer>,
        limiter: Arc<RateLimiter>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            users,
            resets,
            mailer,
            limiter,
            audit,
            token_expiry: Duration::hours(1),
        }
    }

    #[must_use]
    pub fn token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// # Returns
    ///
    /// - `Ok(())` - for known, unknown and inactive addresses alike
    /// - `Err(RateLimited)` - too many requests from this IP
    /// - `Err(Validation)` - the address is not an email
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "forgot_password", skip_all, err)
    )]
    pub async fn execute(
        &self,
        partition: &Partition,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<(), DashboardError> {
        enforce_limit(
            &self.limiter,
            &self.audit,
            partition,
            ctx,
            PASSWORD_RESET,
            None,
        )
        .await?;

        let email = normalize_email(email);
        validate_email(&email)?;

        let Some(user) = self
            .users
            .find_user_by_email(partition, &email)
            .await?
            .filter(|u| u.is_active)
        else {
            log::debug!(
                target: "ledgerdash",
                "msg=\"password reset for unknown or inactive address\", partition=\"{partition}\""
            );
            return Ok(());
        };

        let token = generate_token(RESET_TOKEN_LENGTH);
        let expires_at = Utc::now() + self.token_expiry;
        self.resets
            .create_reset_token(partition, user.id, &hash_token(&token), expires_at)
            .await?;

        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::PasswordResetRequested,
                Some(user.id),
                "",
            )
            .await?;

        let scheme = if ctx.secure { "https" } else { "http" };
        let link = format!(
            "{scheme}://{}/auth/password-reset/confirm/{token}/",
            ctx.host
        );
        let message =
            EmailMessage::password_reset(&user.email, &link, self.token_expiry.num_minutes());

        if let Err(e) = self.mailer.send(message).await {
            log::error!(
                target: "ledgerdash",
                "msg=\"password reset email failed\", partition=\"{partition}\", user_id=\"{}\", error=\"{e}\"",
                user.id
            );
            self.audit
                .record(
                    partition,
                    ctx,
                    AuditEventType::PasswordResetEmailFailed,
                    Some(user.id),
                    e.to_string(),
                )
                .await?;
        }

        Ok(())
    }
}
