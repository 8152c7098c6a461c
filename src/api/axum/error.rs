use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::DashboardError;
use crate::api::ErrorResponse;

/// converts `DashboardError` into appropriate HTTP responses
#[derive(Debug)]
pub struct ApiError(pub DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DashboardError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DashboardError::ExportRowCapExceeded { .. }
            | DashboardError::Validation(_)
            | DashboardError::TokenInvalid => StatusCode::BAD_REQUEST,
            DashboardError::Forbidden(_) => StatusCode::FORBIDDEN,
            DashboardError::AuthenticationFailed
            | DashboardError::AccountDisabled
            | DashboardError::MfaRequired
            | DashboardError::MfaSetupRequired
            | DashboardError::MfaVerificationFailed => StatusCode::UNAUTHORIZED,
            DashboardError::NotFound | DashboardError::TenantNotFound => StatusCode::NOT_FOUND,
            DashboardError::InvalidTransition(_) => StatusCode::CONFLICT,
            DashboardError::Database(_)
            | DashboardError::Email(_)
            | DashboardError::Configuration(_)
            | DashboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_internal() {
            log::error!(target: "ledgerdash", "msg=\"request failed\", error=\"{}\"", self.0);
        }

        let status = self.status();
        let mut response = (status, Json(ErrorResponse::from(&self.0))).into_response();
        if let DashboardError::RateLimited { retry_after } = self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after.max(1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
