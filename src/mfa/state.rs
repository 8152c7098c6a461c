use serde::{Deserialize, Serialize};

use crate::DashboardError;

/// How a session satisfied the second factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Totp,
    RecoveryCode,
    TrustedDevice,
}

impl VerificationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::RecoveryCode => "recovery_code",
            Self::TrustedDevice => "trusted_device",
        }
    }
}

/// Authentication progress of one browser session.
///
/// ```text
/// Unauthenticated -> PasswordVerified -> MfaSetupRequired -> MfaVerified(Totp)
///                                     -> MfaRequired      -> MfaVerified(Totp | RecoveryCode)
///                                     -> MfaVerified(TrustedDevice)
/// ```
///
/// Only [`MfaState::MfaVerified`] grants access to tenant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "method", rename_all = "snake_case")]
pub enum MfaState {
    Unauthenticated,
    PasswordVerified,
    MfaSetupRequired,
    MfaRequired,
    MfaVerified(VerificationMethod),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaEvent {
    PasswordAccepted,
    /// Outcome of looking at the user's enrollment after the password check.
    EnrollmentChecked {
        mfa_enabled: bool,
        trusted_device: bool,
    },
    SetupConfirmed,
    TotpAccepted,
    RecoveryCodeAccepted,
    SignedOut,
}

impl MfaEvent {
    fn attempted(self) -> &'static str {
        match self {
            Self::PasswordAccepted => "verify a password",
            Self::EnrollmentChecked { .. } => "check MFA enrollment",
            Self::SetupConfirmed => "confirm MFA setup",
            Self::TotpAccepted => "verify an authenticator code",
            Self::RecoveryCodeAccepted => "use a recovery code",
            Self::SignedOut => "sign out",
        }
    }
}

impl MfaState {
    /// Applies `event`, or fails with `InvalidTransition` if the event is not
    /// allowed in the current state.
    pub fn apply(self, event: MfaEvent) -> Result<Self, DashboardError> {
        use MfaEvent as E;

        let next = match (self, event) {
            (_, E::SignedOut) => Self::Unauthenticated,
            (Self::Unauthenticated, E::PasswordAccepted) => Self::PasswordVerified,
            (
                Self::PasswordVerified,
                E::EnrollmentChecked {
                    mfa_enabled,
                    trusted_device,
                },
            ) => match (mfa_enabled, trusted_device) {
                (false, _) => Self::MfaSetupRequired,
                (true, true) => Self::MfaVerified(VerificationMethod::TrustedDevice),
                (true, false) => Self::MfaRequired,
            },
            (Self::MfaSetupRequired, E::SetupConfirmed) => {
                Self::MfaVerified(VerificationMethod::Totp)
            }
            (Self::MfaRequired, E::TotpAccepted) => Self::MfaVerified(VerificationMethod::Totp),
            (Self::MfaRequired, E::RecoveryCodeAccepted) => {
                Self::MfaVerified(VerificationMethod::RecoveryCode)
            }
            _ => return Err(DashboardError::InvalidTransition(event.attempted())),
        };

        Ok(next)
    }

    pub fn grants_full_access(self) -> bool {
        matches!(self, Self::MfaVerified(_))
    }

    /// Succeeds only for a verified session; otherwise returns the error that
    /// tells the client which step is missing.
    pub fn require_verified(self) -> Result<VerificationMethod, DashboardError> {
        match self {
            Self::MfaVerified(method) => Ok(method),
            Self::MfaSetupRequired => Err(DashboardError::MfaSetupRequired),
            Self::MfaRequired => Err(DashboardError::MfaRequired),
            Self::Unauthenticated | Self::PasswordVerified => {
                Err(DashboardError::AuthenticationFailed)
            }
        }
    }

    /// Where a client in this state should go next.
    pub fn next_step(self) -> &'static str {
        match self {
            Self::Unauthenticated | Self::PasswordVerified => "/auth/login/",
            Self::MfaSetupRequired => "/auth/mfa/setup/",
            Self::MfaRequired => "/auth/mfa/verify/",
            Self::MfaVerified(_) => "/dashboard/",
        }
    }
}
