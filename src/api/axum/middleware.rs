use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::{COOKIE, HOST, ORIGIN, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use super::error::ApiError;
use super::routes::AppState;
use crate::actions::Actor;
use crate::api::ErrorResponse;
use crate::audit::RequestContext;
use crate::config::SecurityConfig;
use crate::session::{Session, read_cookie, verify_signed_cookie};
use crate::tenant::{Tenant, TenantResolution, normalize_host};
use crate::DashboardError;

const LANDING_PAGE: &str = "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>LedgerDash</title></head>\n<body><h1>LedgerDash</h1><p>Sign in through your organization's dashboard address.</p></body></html>\n";

const NOT_FOUND_PAGE: &str = "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Not found</title></head>\n<body><h1>Not found</h1></body></html>\n";

fn reject(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_owned(),
            code: code.to_owned(),
        }),
    )
        .into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl axum::http::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Address recorded in the audit trail: first `X-Forwarded-For` entry,
/// then `X-Real-IP`, then the peer address. Never used as a limit key.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip").map(str::trim))
        .map(ToOwned::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Address per-IP rate limits are keyed on.
///
/// Forwarding headers are read only when the peer is a trusted proxy. The
/// client is then the rightmost `X-Forwarded-For` hop that is not itself a
/// trusted proxy, else `X-Real-IP`, else the peer.
pub fn limit_addr(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    security: &SecurityConfig,
) -> Option<String> {
    let peer = peer?.ip();
    let client = if security.is_trusted_proxy(peer) {
        forwarded_client(headers, security).unwrap_or(peer)
    } else {
        peer
    };
    Some(client.to_string())
}

fn forwarded_client(headers: &HeaderMap, security: &SecurityConfig) -> Option<IpAddr> {
    let from_chain = header_str(headers, "x-forwarded-for").and_then(|chain| {
        chain
            .rsplit(',')
            .map(|hop| hop.trim().parse::<IpAddr>().ok())
            .take_while(Option::is_some)
            .flatten()
            .find(|ip| !security.is_trusted_proxy(*ip))
    });
    from_chain.or_else(|| header_str(headers, "x-real-ip").and_then(|v| v.trim().parse().ok()))
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// An unsafe request passes when it carries no `Origin`, an `Origin` on the
/// request host, or a trusted `Origin`.
fn origin_allowed(state: &AppState, origin: Option<&str>, host: &str) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    let same_host = origin
        .split_once("://")
        .is_some_and(|(_, authority)| normalize_host(authority.trim_end_matches('/')) == host);
    same_host || state.config.security.is_origin_trusted(origin)
}

/// Host validation, CSRF origin check and tenant resolution for every request.
///
/// On a tenant host the resolved [`Tenant`] and a [`RequestContext`] are
/// placed in the request extensions. Hosts with no active tenant only see
/// the landing page.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let raw_host = header_str(headers, HOST)
        .map(ToOwned::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_owned()))
        .unwrap_or_default();
    let host = normalize_host(&raw_host);

    if !state.config.security.is_host_allowed(&host) {
        log::warn!(target: "ledgerdash::tenant", "msg=\"disallowed host\", host=\"{host}\"");
        return reject(StatusCode::BAD_REQUEST, "invalid_host", "Invalid Host header");
    }

    if !is_safe_method(request.method()) && !origin_allowed(&state, header_str(headers, ORIGIN), &host) {
        log::warn!(target: "ledgerdash", "msg=\"csrf origin rejected\", host=\"{host}\"");
        return reject(StatusCode::FORBIDDEN, "csrf_failed", "Origin checking failed");
    }

    let tenant = match state.tenants.resolve(&host).await {
        Ok(TenantResolution::Tenant(tenant)) => tenant,
        Ok(TenantResolution::Public) => {
            return if request.uri().path() == "/" {
                Html(LANDING_PAGE).into_response()
            } else {
                (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
            };
        }
        Err(e) => return ApiError(e).into_response(),
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let mut ctx = RequestContext::new(
        client_ip(headers, peer),
        header_str(headers, USER_AGENT).unwrap_or_default(),
        &host,
    )
    .with_client_addr(limit_addr(headers, peer, &state.config.security));
    ctx.secure = state.config.session.cookie_secure;

    request.extensions_mut().insert(CurrentTenant(tenant));
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

/// The tenant that owns the request host.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

impl<S: Send + Sync> FromRequestParts<S> for CurrentTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentTenant>()
            .cloned()
            .ok_or(ApiError(DashboardError::TenantNotFound))
    }
}

/// Client address and user agent of the request.
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

impl<S: Send + Sync> FromRequestParts<S> for Ctx {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Ctx)
            .ok_or(ApiError(DashboardError::TenantNotFound))
    }
}

/// Reads a signed cookie and returns its verified payload.
pub fn signed_cookie(headers: &HeaderMap, state: &AppState, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| read_cookie(header, name))
        .and_then(|value| verify_signed_cookie(value, &state.config.session.secret_key))
}

/// A live session issued on this tenant's host, in any MFA stage.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentTenant(tenant) = CurrentTenant::from_request_parts(parts, state).await?;
        let session_id = signed_cookie(&parts.headers, state, &state.config.session.cookie_name)
            .ok_or(ApiError(DashboardError::AuthenticationFailed))?;

        let session = state
            .sessions
            .find(&session_id)
            .await?
            .ok_or(ApiError(DashboardError::AuthenticationFailed))?;

        if session.is_expired() {
            state.sessions.destroy(&session.id).await?;
            return Err(ApiError(DashboardError::AuthenticationFailed));
        }

        if !session.belongs_to(&tenant.partition) {
            log::warn!(
                target: "ledgerdash::session",
                "msg=\"session used on another tenant\", session_partition=\"{}\", host_partition=\"{}\"",
                session.data.partition,
                tenant.partition
            );
            return Err(ApiError(DashboardError::AuthenticationFailed));
        }

        Ok(Self(session))
    }
}

/// A session that has completed the second factor.
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub Actor);

impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        Ok(Self(Actor::from_session(&session)?))
    }
}
