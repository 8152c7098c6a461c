use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mfa::{MfaState, VerificationMethod};
use crate::permission::Role;
use crate::repository::{User, UserUpdate};
use crate::DashboardError;

// Request DTOs

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct MfaCodeRequest {
    pub code: String,
    /// Trust this browser for the configured number of days.
    #[serde(default)]
    pub remember_device: bool,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirmation: String,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl From<CreateUserRequest> for crate::actions::CreateUserRequest {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password: req.password,
            role: req.role,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Account ids, one per line.
#[derive(Debug, Deserialize)]
pub struct AddAccountsRequest {
    pub account_ids: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountOptionsQuery {
    pub client_id: Option<String>,
}

// Response DTOs

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: user.is_active,
            mfa_enabled: user.mfa_enabled,
            created_at: user.created_at,
        }
    }
}

/// Where the browser goes after a step of the sign-in flow.
#[derive(Debug, Serialize)]
pub struct AuthStepResponse {
    pub state: MfaState,
    pub next: String,
}

impl From<MfaState> for AuthStepResponse {
    fn from(state: MfaState) -> Self {
        Self {
            state,
            next: state.next_step().to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub step: AuthStepResponse,
}

#[derive(Debug, Serialize)]
pub struct MfaVerifiedResponse {
    pub method: VerificationMethod,
    #[serde(flatten)]
    pub step: AuthStepResponse,
}

/// Recovery codes are returned once and never again.
#[derive(Serialize)]
pub struct RecoveryCodesResponse {
    pub recovery_codes: Vec<String>,
    #[serde(flatten)]
    pub step: Option<AuthStepResponse>,
}

impl std::fmt::Debug for RecoveryCodesResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryCodesResponse")
            .field("recovery_codes", &"[REDACTED]")
            .field("step", &self.step)
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct AddAccountsResponse {
    pub created: u64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&DashboardError> for ErrorResponse {
    fn from(err: &DashboardError) -> Self {
        ErrorResponse {
            error: err.public_message(),
            code: err.code().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_masks_internal_detail() {
        let body = ErrorResponse::from(&DashboardError::Database("connection refused".to_owned()));
        assert_eq!(body.code, "internal_error");
        assert!(!body.error.contains("connection refused"));

        let body = ErrorResponse::from(&DashboardError::MfaRequired);
        assert_eq!(body.code, "mfa_required");
    }

    #[test]
    fn test_auth_step_points_to_next_page() {
        let step = AuthStepResponse::from(MfaState::MfaRequired);
        assert_eq!(step.next, "/auth/mfa/verify/");

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["state"]["stage"], "mfa_required");
    }

    #[test]
    fn test_create_user_defaults_active() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email":"a@acme.test","password":"long-enough-pass","role":"user"}"#,
        )
        .unwrap();
        assert!(req.is_active);
        assert_eq!(req.role, Role::User);
    }
}
