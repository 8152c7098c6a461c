use std::sync::Arc;

use chrono::Utc;

use super::{enforce_limit, remember_device};
use crate::audit::{AuditLogger, RequestContext};
use crate::config::MfaConfig;
use crate::mfa::{MfaEvent, MfaState, VerificationMethod, hash_recovery_code, looks_like_totp, totp};
use crate::rate_limit::{MFA_VERIFY, RateLimiter};
use crate::repository::{
    AuditEventType, RecoveryCodeRepository, TrustedDeviceRepository, UserRepository,
};
use crate::session::{Session, SessionRepository};
use crate::validators::ValidationError;
use crate::DashboardError;

#[derive(Debug, Clone)]
pub struct VerifyMfaOutcome {
    pub state: MfaState,
    pub method: VerificationMethod,
    /// Set when the device should be remembered.
    pub device_token: Option<String>,
}

/// Second-factor check for a session in `MfaRequired`.
///
/// Six digits are tried as a TOTP code; any other input is treated as a
/// recovery code and consumed on success.
pub struct VerifyMfaAction {
    users: Arc<dyn UserRepository>,
    recovery_codes: Arc<dyn RecoveryCodeRepository>,
    devices: Arc<dyn TrustedDeviceRepository>,
    sessions: Arc<dyn SessionRepository>,
    limiter: Arc<RateLimiter>,
    audit: AuditLogger,
    config: MfaConfig,
}

impl VerifyMfaAction {
    pub fn new(
        users: Arc<dyn UserRepository>,
        recovery_codes: Arc<dyn RecoveryCodeRepository>,
        devices: Arc<dyn TrustedDeviceRepository>,
        sessions: Arc<dyn SessionRepository>,
        limiter: Arc<RateLimiter>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            users,
            recovery_codes,
            devices,
            sessions,
            limiter,
            audit,
            config: MfaConfig::default(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: MfaConfig) -> Self {
        self.config = config;
        self
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "verify_mfa", skip_all, err)
    )]
    pub async fn execute(
        &self,
        session: &Session,
        ctx: &RequestContext,
        code: &str,
        remember: bool,
    ) -> Result<VerifyMfaOutcome, DashboardError> {
        let state = session.data.state;
        if state != MfaState::MfaRequired {
            return Err(DashboardError::InvalidTransition("verify a second factor"));
        }

        let partition = &session.data.partition;
        let user_id = session.data.user_id;
        enforce_limit(
            &self.limiter,
            &self.audit,
            partition,
            ctx,
            MFA_VERIFY,
            Some(user_id),
        )
        .await?;

        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::MfaCodeEmpty.into());
        }

        let user = self
            .users
            .find_user_by_id(partition, user_id)
            .await?
            .filter(|u| u.is_active && u.mfa_enabled)
            .ok_or(DashboardError::AuthenticationFailed)?;

        let now = Utc::now();
        let accepted = if looks_like_totp(code) {
            let secret = user.mfa_secret.as_deref().unwrap_or_default();
            (!secret.is_empty() && totp::verify_at(secret, code, now)?)
                .then_some(MfaEvent::TotpAccepted)
        } else {
            self.recovery_codes
                .consume_code(partition, user_id, &hash_recovery_code(code), now)
                .await?
                .then_some(MfaEvent::RecoveryCodeAccepted)
        };

        let Some(event) = accepted else {
            self.audit
                .record(partition, ctx, AuditEventType::MfaVerifyFailure, Some(user_id), "")
                .await?;
            return Err(DashboardError::MfaVerificationFailed);
        };

        let next = state.apply(event)?;
        let method = next.require_verified()?;
        self.sessions.update_state(&session.id, next).await?;

        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::MfaVerifySuccess,
                Some(user_id),
                method.as_str(),
            )
            .await?;

        let device_token = if remember {
            Some(
                remember_device(
                    self.devices.as_ref(),
                    partition,
                    user_id,
                    self.config.remember_device_for(),
                    now,
                )
                .await?,
            )
        } else {
            None
        };

        log::info!(
            target: "ledgerdash::session",
            "msg=\"mfa verified\", partition=\"{partition}\", user_id=\"{user_id}\", method=\"{}\"",
            method.as_str()
        );

        Ok(VerifyMfaOutcome {
            state: next,
            method,
            device_token,
        })
    }
}
