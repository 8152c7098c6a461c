//! Tenant administration: users, clients and the audit log.
//!
//! Every handler requires a verified session; the actions refuse non-admin
//! roles with `Forbidden`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::error::ApiError;
use super::middleware::{Ctx, VerifiedUser};
use super::routes::AppState;
use crate::actions::{AuditLogViewAction, ManageClientsAction, ManageUsersAction};
use crate::api::{
    AddAccountsRequest, AddAccountsResponse, ClientRequest, CreateUserRequest, MessageResponse,
    RecoveryCodesResponse, UpdateUserRequest, UserResponse,
};

fn users_action(state: &AppState) -> ManageUsersAction {
    ManageUsersAction::new(
        state.users.clone(),
        state.recovery_codes.clone(),
        state.devices.clone(),
        state.sessions.clone(),
        state.audit.clone(),
        state.hasher.clone(),
    )
    .recovery_code_count(state.config.mfa.recovery_code_count)
}

fn clients_action(state: &AppState) -> ManageClientsAction {
    ManageClientsAction::new(state.clients.clone(), state.audit.clone())
}

/// GET /manage/users/
pub async fn list_users(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = users_action(&state).list(&actor).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /manage/users/
pub async fn create_user(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    let user = users_action(&state)
        .create(&actor, &ctx, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))).into_response())
}

/// GET /manage/users/{id}/
pub async fn get_user(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = users_action(&state).get(&actor, id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// POST /manage/users/{id}/
pub async fn update_user(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = users_action(&state)
        .update(&actor, &ctx, id, body.into())
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// Clears the user's TOTP secret, recovery codes and trusted devices.
///
/// POST /manage/users/{id}/reset-mfa/
pub async fn reset_mfa(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    users_action(&state).reset_mfa(&actor, &ctx, id).await?;
    Ok(Json(MessageResponse::new(
        "MFA has been reset. The user will enroll again at next sign-in.",
    )))
}

/// POST /manage/users/{id}/recovery-codes/
pub async fn regenerate_recovery_codes(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Path(id): Path<Uuid>,
) -> Result<Json<RecoveryCodesResponse>, ApiError> {
    let recovery_codes = users_action(&state)
        .regenerate_recovery_codes(&actor, &ctx, id)
        .await?;
    Ok(Json(RecoveryCodesResponse {
        recovery_codes,
        step: None,
    }))
}

/// GET /manage/clients/
pub async fn list_clients(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
) -> Result<Response, ApiError> {
    let clients = clients_action(&state).list(&actor).await?;
    Ok(Json(clients).into_response())
}

/// POST /manage/clients/
pub async fn create_client(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Json(body): Json<ClientRequest>,
) -> Result<Response, ApiError> {
    let client = clients_action(&state)
        .create(&actor, &ctx, &body.name, body.active)
        .await?;
    Ok((StatusCode::CREATED, Json(client)).into_response())
}

/// The client and its account mappings.
///
/// GET /manage/clients/{id}/
pub async fn get_client(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detail = clients_action(&state).get(&actor, id).await?;
    Ok(Json(detail).into_response())
}

/// POST /manage/clients/{id}/
pub async fn update_client(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Path(id): Path<Uuid>,
    Json(body): Json<ClientRequest>,
) -> Result<Response, ApiError> {
    let client = clients_action(&state)
        .update(&actor, &ctx, id, &body.name, body.active)
        .await?;
    Ok(Json(client).into_response())
}

/// POST /manage/clients/{id}/accounts/
pub async fn add_accounts(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Path(id): Path<Uuid>,
    Json(body): Json<AddAccountsRequest>,
) -> Result<Json<AddAccountsResponse>, ApiError> {
    let created = clients_action(&state)
        .add_accounts(&actor, &ctx, id, &body.account_ids)
        .await?;
    Ok(Json(AddAccountsResponse { created }))
}

/// DELETE /manage/clients/{id}/accounts/{mapping_id}/
pub async fn remove_account(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Path((id, mapping_id)): Path<(Uuid, i64)>,
) -> Result<Response, ApiError> {
    let removed = clients_action(&state)
        .remove_account(&actor, &ctx, id, mapping_id)
        .await?;
    Ok(Json(removed).into_response())
}

/// Newest entries first.
///
/// GET /manage/audit/
pub async fn audit_log(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
) -> Result<Response, ApiError> {
    let entries = AuditLogViewAction::new(state.audit.clone())
        .execute(&actor)
        .await?;
    Ok(Json(entries).into_response())
}
