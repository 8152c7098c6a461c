//! HTTP handlers for sign-in and the dashboard pages.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use super::error::ApiError;
use super::middleware::{CurrentSession, CurrentTenant, Ctx, VerifiedUser, signed_cookie};
use super::routes::AppState;
use crate::actions::{
    AccountQuery, DashboardAction, ExportTransactionsAction, ForgotPasswordAction, LoginAction,
    LogoutAction, MfaSetupAction, ResetPasswordAction, TransactionQuery, VerifyMfaAction,
};
use crate::api::{
    AccountOptionsQuery, AuthStepResponse, ForgotPasswordRequest, LoginRequest, LoginResponse,
    MessageResponse, MfaCodeRequest, MfaVerifiedResponse, RecoveryCodesResponse,
    ResetPasswordRequest, UserResponse,
};
use crate::session::{clear_cookie, set_cookie, sign_session_id};
use crate::DashboardError;

/// Appends `Set-Cookie` headers to a response.
fn with_cookies(response: impl IntoResponse, cookies: &[String]) -> Result<Response, ApiError> {
    let mut response = response.into_response();
    for cookie in cookies {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| DashboardError::Internal(format!("cookie header: {e}")))?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

fn session_cookie(state: &AppState, session_id: &str) -> String {
    let config = &state.config.session;
    set_cookie(
        config,
        &config.cookie_name,
        &sign_session_id(session_id, &config.secret_key),
        Some(config.session_lifetime.num_seconds()),
    )
}

fn device_cookie(state: &AppState, token: &str) -> String {
    let mfa = &state.config.mfa;
    set_cookie(
        &state.config.session,
        &mfa.device_cookie_name,
        &sign_session_id(token, &state.config.session.secret_key),
        Some(mfa.remember_device_for().num_seconds()),
    )
}

fn device_cookies(state: &AppState, token: Option<&str>) -> Vec<String> {
    token.map(|t| device_cookie(state, t)).into_iter().collect()
}

/// GET /
pub async fn index() -> Redirect {
    Redirect::to("/dashboard/")
}

/// Check the password and start a session.
///
/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Ctx(ctx): Ctx,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let action = LoginAction::new(
        state.users.clone(),
        state.devices.clone(),
        state.sessions.clone(),
        state.limiter.clone(),
        state.audit.clone(),
        state.hasher.clone(),
    )
    .session_lifetime(state.config.session.session_lifetime);

    let request = crate::actions::LoginRequest {
        email: body.email,
        password: body.password,
        device_token: signed_cookie(&headers, &state, &state.config.mfa.device_cookie_name),
    };
    let outcome = action.execute(&tenant.partition, &ctx, request).await?;

    let response = Json(LoginResponse {
        user: UserResponse::from(outcome.user),
        step: AuthStepResponse::from(outcome.state),
    });
    with_cookies(response, &[session_cookie(&state, &outcome.session_id)])
}

/// POST /auth/logout/
pub async fn logout(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ApiError> {
    LogoutAction::new(state.sessions.clone(), state.audit.clone())
        .execute(&session, &ctx)
        .await?;

    let config = &state.config.session;
    with_cookies(
        Json(MessageResponse::new("You have been signed out.")),
        &[clear_cookie(config, &config.cookie_name)],
    )
}

fn mfa_setup_action(state: &AppState) -> MfaSetupAction {
    MfaSetupAction::with_config(
        state.users.clone(),
        state.recovery_codes.clone(),
        state.devices.clone(),
        state.sessions.clone(),
        state.audit.clone(),
        state.config.mfa.clone(),
    )
}

/// Secret and provisioning URI for the authenticator app.
///
/// GET /auth/mfa/setup/
pub async fn mfa_setup_begin(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ApiError> {
    let info = mfa_setup_action(&state).begin(&session).await?;
    Ok(Json(info).into_response())
}

/// Confirm enrollment with a first code; returns the recovery codes once.
///
/// POST /auth/mfa/setup/
pub async fn mfa_setup_confirm(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    CurrentSession(session): CurrentSession,
    Json(body): Json<MfaCodeRequest>,
) -> Result<Response, ApiError> {
    let complete = mfa_setup_action(&state)
        .confirm(&session, &ctx, &body.code, body.remember_device)
        .await?;

    let response = Json(RecoveryCodesResponse {
        recovery_codes: complete.recovery_codes,
        step: Some(AuthStepResponse::from(complete.state)),
    });
    with_cookies(response, &device_cookies(&state, complete.device_token.as_deref()))
}

/// Accepts an authenticator code or a recovery code.
///
/// POST /auth/mfa/verify/
pub async fn mfa_verify(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    CurrentSession(session): CurrentSession,
    Json(body): Json<MfaCodeRequest>,
) -> Result<Response, ApiError> {
    let outcome = VerifyMfaAction::new(
        state.users.clone(),
        state.recovery_codes.clone(),
        state.devices.clone(),
        state.sessions.clone(),
        state.limiter.clone(),
        state.audit.clone(),
    )
    .config(state.config.mfa.clone())
    .execute(&session, &ctx, &body.code, body.remember_device)
    .await?;

    let response = Json(MfaVerifiedResponse {
        method: outcome.method,
        step: AuthStepResponse::from(outcome.state),
    });
    with_cookies(response, &device_cookies(&state, outcome.device_token.as_deref()))
}

/// Always answers the same way, whether or not the address has an account.
///
/// POST /auth/password-reset/
pub async fn forgot_password(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Ctx(ctx): Ctx,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    ForgotPasswordAction::new(
        state.users.clone(),
        state.password_resets.clone(),
        state.mailer.clone(),
        state.limiter.clone(),
        state.audit.clone(),
    )
    .token_expiry(state.config.tokens.password_reset_expiry)
    .execute(&tenant.partition, &ctx, &body.email)
    .await?;

    Ok(Json(MessageResponse::new(
        "If an account exists for that address, a reset link has been sent.",
    )))
}

fn reset_password_action(state: &AppState) -> ResetPasswordAction {
    ResetPasswordAction::new(
        state.users.clone(),
        state.password_resets.clone(),
        state.sessions.clone(),
        state.audit.clone(),
        state.hasher.clone(),
    )
}

/// GET /auth/password-reset/confirm/{token}/
pub async fn check_reset_token(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    reset_password_action(&state)
        .check_token(&tenant.partition, &token)
        .await?;
    Ok(Json(MessageResponse::new("Choose a new password.")))
}

/// POST /auth/password-reset/confirm/{token}/
pub async fn reset_password(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Ctx(ctx): Ctx,
    Path(token): Path<String>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    reset_password_action(&state)
        .execute(
            &tenant.partition,
            &ctx,
            &token,
            &body.password,
            &body.password_confirmation,
        )
        .await?;
    Ok(Json(MessageResponse::new(
        "Your password has been reset. You can now sign in.",
    )))
}

fn dashboard_action(state: &AppState) -> DashboardAction {
    DashboardAction::new(state.analytics.clone(), state.clients.clone())
        .pagination(state.config.pagination.clone())
}

/// KPIs and the paginated account table.
///
/// GET /dashboard/
pub async fn dashboard(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Query(query): Query<AccountQuery>,
) -> Result<Response, ApiError> {
    let summary = dashboard_action(&state).summary(&actor, &query).await?;
    Ok(Json(summary).into_response())
}

/// GET /dashboard/transactions/
pub async fn transactions(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Query(query): Query<TransactionQuery>,
) -> Result<Response, ApiError> {
    let view = dashboard_action(&state).transactions(&actor, &query).await?;
    Ok(Json(view).into_response())
}

/// CSV download of the filtered transactions.
///
/// GET /dashboard/transactions/export/
pub async fn export_transactions(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Ctx(ctx): Ctx,
    Query(query): Query<TransactionQuery>,
) -> Result<Response, ApiError> {
    let export = ExportTransactionsAction::with_config(
        state.analytics.clone(),
        state.clients.clone(),
        state.audit.clone(),
        state.config.export.clone(),
    )
    .execute(&actor, &ctx, &query)
    .await?;

    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}

/// GET /dashboard/api/account-options/
pub async fn account_options(
    State(state): State<AppState>,
    VerifiedUser(actor): VerifiedUser,
    Query(query): Query<AccountOptionsQuery>,
) -> Result<Response, ApiError> {
    let options = dashboard_action(&state)
        .account_options(&actor, query.client_id.as_deref())
        .await?;
    Ok(Json(options).into_response())
}
