use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};

use super::{handlers, manage_handlers, middleware};
use crate::audit::AuditLogger;
use crate::config::DashboardConfig;
use crate::crypto::PasswordHasher;
use crate::email::Mailer;
use crate::rate_limit::RateLimiter;
use crate::repository::{
    AnalyticsRepository, ClientRepository, PasswordResetRepository, RecoveryCodeRepository,
    TrustedDeviceRepository, UserRepository,
};
use crate::session::SessionRepository;
use crate::tenant::TenantDirectory;

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub sessions: Arc<dyn SessionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub devices: Arc<dyn TrustedDeviceRepository>,
    pub recovery_codes: Arc<dyn RecoveryCodeRepository>,
    pub password_resets: Arc<dyn PasswordResetRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
    pub audit: AuditLogger,
    pub limiter: Arc<RateLimiter>,
    pub mailer: Arc<dyn Mailer>,
    pub hasher: Arc<dyn PasswordHasher>,
}

/// The full application: every route behind tenant resolution.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .merge(auth_routes())
        .merge(dashboard_routes())
        .merge(manage_routes())
        .layer(from_fn_with_state(state.clone(), middleware::resolve_tenant))
        .with_state(state)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login/", post(handlers::login))
        .route("/auth/logout/", post(handlers::logout))
        .route(
            "/auth/mfa/setup/",
            get(handlers::mfa_setup_begin).post(handlers::mfa_setup_confirm),
        )
        .route("/auth/mfa/verify/", post(handlers::mfa_verify))
        .route("/auth/password-reset/", post(handlers::forgot_password))
        .route(
            "/auth/password-reset/confirm/{token}/",
            get(handlers::check_reset_token).post(handlers::reset_password),
        )
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/", get(handlers::dashboard))
        .route("/dashboard/transactions/", get(handlers::transactions))
        .route("/dashboard/transactions/export/", get(handlers::export_transactions))
        .route("/dashboard/api/account-options/", get(handlers::account_options))
}

pub fn manage_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/manage/users/",
            get(manage_handlers::list_users).post(manage_handlers::create_user),
        )
        .route(
            "/manage/users/{id}/",
            get(manage_handlers::get_user).post(manage_handlers::update_user),
        )
        .route("/manage/users/{id}/reset-mfa/", post(manage_handlers::reset_mfa))
        .route(
            "/manage/users/{id}/recovery-codes/",
            post(manage_handlers::regenerate_recovery_codes),
        )
        .route(
            "/manage/clients/",
            get(manage_handlers::list_clients).post(manage_handlers::create_client),
        )
        .route(
            "/manage/clients/{id}/",
            get(manage_handlers::get_client).post(manage_handlers::update_client),
        )
        .route("/manage/clients/{id}/accounts/", post(manage_handlers::add_accounts))
        .route(
            "/manage/clients/{id}/accounts/{mapping_id}/",
            delete(manage_handlers::remove_account),
        )
        .route("/manage/audit/", get(manage_handlers::audit_log))
}
