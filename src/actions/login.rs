use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::audit::{AuditLogger, RequestContext};
use crate::crypto::PasswordHasher;
use crate::mfa::{MfaEvent, MfaState, device_fingerprint};
use crate::rate_limit::{LOGIN, RateLimiter};
use crate::repository::{AuditEventType, TrustedDeviceRepository, User, UserRepository};
use crate::session::{SessionData, SessionRepository};
use crate::tenant::Partition;
use crate::validators::email::normalize_email;
use crate::DashboardError;

use super::enforce_limit;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Value of the device trust cookie, if the browser sent one.
    pub device_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session_id: String,
    pub user: User,
    /// `MfaSetupRequired`, `MfaRequired` or `MfaVerified(TrustedDevice)`.
    pub state: MfaState,
}

/// Checks a password and opens a session at the right MFA stage.
pub struct LoginAction {
    users: Arc<dyn UserRepository>,
    devices: Arc<dyn TrustedDeviceRepository>,
    sessions: Arc<dyn SessionRepository>,
    limiter: Arc<RateLimiter>,
    audit: AuditLogger,
    hasher: Arc<dyn PasswordHasher>,
    session_lifetime: Duration,
}

impl LoginAction {
    pub fn new(
        users: Arc<dyn UserRepository>,
        devices: Arc<dyn TrustedDeviceRepository>,
        sessions: Arc<dyn SessionRepository>,
        limiter: Arc<RateLimiter>,
        audit: AuditLogger,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            devices,
            sessions,
            limiter,
            audit,
            hasher,
            session_lifetime: Duration::hours(8),
        }
    }

    #[must_use]
    pub fn session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// # Returns
    ///
    /// - `Ok(outcome)` - a new session; its stage says what the client must do next
    /// - `Err(RateLimited)` - more than the login budget from this IP
    /// - `Err(AuthenticationFailed)` - unknown email or wrong password
    /// - `Err(AccountDisabled)` - correct password for a deactivated user
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "login", skip_all, err)
    )]
    pub async fn execute(
        &self,
        partition: &Partition,
        ctx: &RequestContext,
        request: LoginRequest,
    ) -> Result<LoginOutcome, DashboardError> {
        enforce_limit(&self.limiter, &self.audit, partition, ctx, LOGIN, None)
            .await?;

        let email = normalize_email(&request.email);
        let user = self.users.find_user_by_email(partition, &email).await?;

        let Some(user) = user else {
            // keeps response time independent of whether the email exists
            let _ = self.hasher.hash(&request.password);
            return self.reject(partition, ctx, None, &email).await;
        };

        if !self.hasher.verify(&request.password, &user.hashed_password)? {
            return self.reject(partition, ctx, Some(&user), &email).await;
        }

        if !user.is_active {
            self.audit
                .record(
                    partition,
                    ctx,
                    AuditEventType::LoginFailure,
                    Some(user.id),
                    format!("Inactive account {email}"),
                )
                .await?;
            return Err(DashboardError::AccountDisabled);
        }

        let now = Utc::now();
        let trusted_device = match (&request.device_token, user.mfa_enabled) {
            (Some(token), true) => self
                .devices
                .find_valid_device(partition, user.id, &device_fingerprint(user.id, token), now)
                .await?
                .is_some(),
            _ => false,
        };

        let state = MfaState::Unauthenticated
            .apply(MfaEvent::PasswordAccepted)?
            .apply(MfaEvent::EnrollmentChecked {
                mfa_enabled: user.mfa_enabled,
                trusted_device,
            })?;

        self.audit
            .record(partition, ctx, AuditEventType::LoginSuccess, Some(user.id), "")
            .await?;

        let session_id = self
            .sessions
            .create(SessionData {
                partition: partition.clone(),
                user_id: user.id,
                email: user.email.clone(),
                role: user.role,
                state,
                created_at: now,
                expires_at: now + self.session_lifetime,
            })
            .await?;

        log::info!(
            target: "ledgerdash::session",
            "msg=\"login success\", partition=\"{partition}\", user_id=\"{}\", next=\"{}\"",
            user.id,
            state.next_step()
        );

        Ok(LoginOutcome {
            session_id,
            user,
            state,
        })
    }

    async fn reject(
        &self,
        partition: &Partition,
        ctx: &RequestContext,
        user: Option<&User>,
        email: &str,
    ) -> Result<LoginOutcome, DashboardError> {
        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::LoginFailure,
                user.map(|u| u.id),
                format!("Failed login for {email}"),
            )
            .await?;

        log::info!(
            target: "ledgerdash::session",
            "msg=\"login failed\", partition=\"{partition}\""
        );

        Err(DashboardError::AuthenticationFailed)
    }
}
