use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::remember_device;
use crate::audit::{AuditLogger, RequestContext};
use crate::config::MfaConfig;
use crate::mfa::{MfaEvent, MfaState, generate_recovery_codes, totp};
use crate::repository::{
    AuditEventType, RecoveryCodeRepository, TrustedDeviceRepository, User, UserRepository,
};
use crate::session::{Session, SessionRepository};
use crate::validators::ValidationError;
use crate::DashboardError;

/// What an authenticator app needs to enroll.
#[derive(Debug, Clone, Serialize)]
pub struct MfaSetupInfo {
    /// Base32 secret for manual entry.
    pub secret: String,
    pub provisioning_uri: String,
}

#[derive(Debug, Clone)]
pub struct MfaSetupComplete {
    /// Shown once; only hashes are stored.
    pub recovery_codes: Vec<String>,
    pub state: MfaState,
    pub device_token: Option<String>,
}

/// First-time TOTP enrollment for a session in `MfaSetupRequired`.
pub struct MfaSetupAction {
    users: Arc<dyn UserRepository>,
    recovery_codes: Arc<dyn RecoveryCodeRepository>,
    devices: Arc<dyn TrustedDeviceRepository>,
    sessions: Arc<dyn SessionRepository>,
    audit: AuditLogger,
    config: MfaConfig,
}

impl MfaSetupAction {
    pub fn new(
        users: Arc<dyn UserRepository>,
        recovery_codes: Arc<dyn RecoveryCodeRepository>,
        devices: Arc<dyn TrustedDeviceRepository>,
        sessions: Arc<dyn SessionRepository>,
        audit: AuditLogger,
    ) -> Self {
        Self::with_config(users, recovery_codes, devices, sessions, audit, MfaConfig::default())
    }

    pub fn with_config(
        users: Arc<dyn UserRepository>,
        recovery_codes: Arc<dyn RecoveryCodeRepository>,
        devices: Arc<dyn TrustedDeviceRepository>,
        sessions: Arc<dyn SessionRepository>,
        audit: AuditLogger,
        config: MfaConfig,
    ) -> Self {
        Self {
            users,
            recovery_codes,
            devices,
            sessions,
            audit,
            config,
        }
    }

    async fn setup_user(&self, session: &Session) -> Result<User, DashboardError> {
        if session.data.state != MfaState::MfaSetupRequired {
            return Err(DashboardError::InvalidTransition("set up MFA"));
        }

        self.users
            .find_user_by_id(&session.data.partition, session.data.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(DashboardError::AuthenticationFailed)
    }

    /// Returns the enrollment secret, generating it on first call. Later
    /// calls return the same secret until an admin resets MFA.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "mfa_setup_begin", skip_all, err)
    )]
    pub async fn begin(&self, session: &Session) -> Result<MfaSetupInfo, DashboardError> {
        let user = self.setup_user(session).await?;

        let secret = match user.mfa_secret {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                let secret = totp::generate_secret();
                self.users
                    .set_mfa_secret(&session.data.partition, user.id, &secret)
                    .await?;
                secret
            }
        };

        let provisioning_uri = totp::provisioning_uri(&secret, &self.config.issuer, &user.email)?;
        Ok(MfaSetupInfo {
            secret,
            provisioning_uri,
        })
    }

    /// Confirms enrollment with a code from the app, issues recovery codes
    /// and marks the session verified.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "mfa_setup_confirm", skip_all, err)
    )]
    pub async fn confirm(
        &self,
        session: &Session,
        ctx: &RequestContext,
        code: &str,
        remember: bool,
    ) -> Result<MfaSetupComplete, DashboardError> {
        let next = session.data.state.apply(MfaEvent::SetupConfirmed)?;
        let user = self.setup_user(session).await?;
        let partition = &session.data.partition;

        if code.trim().is_empty() {
            return Err(ValidationError::MfaCodeEmpty.into());
        }

        let Some(secret) = user.mfa_secret.as_deref().filter(|s| !s.is_empty()) else {
            return Err(DashboardError::InvalidTransition("confirm MFA setup"));
        };

        let now = Utc::now();
        if !totp::verify_at(secret, code, now)? {
            return Err(DashboardError::MfaVerificationFailed);
        }

        let codes = generate_recovery_codes(self.config.recovery_code_count);
        self.users.enable_mfa(partition, user.id).await?;
        self.recovery_codes
            .replace_codes(partition, user.id, &codes.hashes)
            .await?;
        self.sessions.update_state(&session.id, next).await?;

        self.audit
            .record(partition, ctx, AuditEventType::MfaSetupComplete, Some(user.id), "")
            .await?;

        let device_token = if remember {
            Some(
                remember_device(
                    self.devices.as_ref(),
                    partition,
                    user.id,
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
            "msg=\"mfa setup complete\", partition=\"{partition}\", user_id=\"{}\"",
            user.id
        );

        Ok(MfaSetupComplete {
            recovery_codes: codes.plaintext,
            state: next,
            device_token,
        })
    }
}
