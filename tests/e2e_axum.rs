//! End-to-end tests for the Axum HTTP API layer.
//!
//! These tests use mock repositories - no database required.
//! Run with: `cargo test --features "axum_api mocks" --test e2e_axum`

#![cfg(all(feature = "axum_api", feature = "mocks"))]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

use ledgerdash::api::axum::{AppState, router};
use ledgerdash::audit::AuditLogger;
use ledgerdash::config::DashboardConfig;
use ledgerdash::crypto::{Argon2Hasher, PasswordHasher};
use ledgerdash::email::MockMailer;
use ledgerdash::mfa::{MfaState, VerificationMethod, totp};
use ledgerdash::permission::Role;
use ledgerdash::rate_limit::{InMemoryStore, RateLimiter};
use ledgerdash::repository::{
    AuditEventType, MockAnalyticsRepository, MockAuditLogRepository, MockClientRepository,
    MockPasswordResetRepository, MockRecoveryCodeRepository, MockTrustedDeviceRepository,
    MockUserRepository, User,
};
use ledgerdash::session::{
    InMemorySessionRepository, SessionData, SessionRepository, sign_session_id,
};
use ledgerdash::tenant::{InMemoryTenantDirectory, Partition, Tenant};

const ACME: &str = "acme.example.com";
const GLOBEX: &str = "globex.example.com";
const PASSWORD: &str = "ledger-balance-7";

struct Harness {
    app: Router,
    config: DashboardConfig,
    acme: Tenant,
    users: MockUserRepository,
    sessions: InMemorySessionRepository,
    audit: MockAuditLogRepository,
    analytics: MockAnalyticsRepository,
    mailer: MockMailer,
}

fn config() -> DashboardConfig {
    let mut config = DashboardConfig::development();
    config.security.allowed_hosts = vec![".example.com".to_owned()];
    config.security.csrf_trusted_origins = vec!["https://*.example.com".to_owned()];
    config
}

fn harness() -> Harness {
    harness_with(config())
}

fn harness_with(config: DashboardConfig) -> Harness {
    let tenants = InMemoryTenantDirectory::new();
    let acme = Tenant::mock("acme");
    tenants.insert(ACME, acme.clone()).unwrap();
    tenants.insert(GLOBEX, Tenant::mock("globex")).unwrap();

    let users = MockUserRepository::new();
    let sessions = InMemorySessionRepository::new();
    let audit = MockAuditLogRepository::new();
    let analytics = MockAnalyticsRepository::new();
    let mailer = MockMailer::new();

    let state = AppState {
        config: Arc::new(config.clone()),
        tenants: Arc::new(tenants),
        sessions: Arc::new(sessions.clone()),
        users: Arc::new(users.clone()),
        devices: Arc::new(MockTrustedDeviceRepository::new()),
        recovery_codes: Arc::new(MockRecoveryCodeRepository::new()),
        password_resets: Arc::new(MockPasswordResetRepository::new()),
        clients: Arc::new(MockClientRepository::new()),
        analytics: Arc::new(analytics.clone()),
        audit: AuditLogger::new(Arc::new(audit.clone())),
        limiter: Arc::new(RateLimiter::from_config(
            Arc::new(InMemoryStore::new()),
            &config.rate_limit,
        )),
        mailer: Arc::new(mailer.clone()),
        hasher: Arc::new(Argon2Hasher::fast()),
    };

    Harness {
        app: router(state),
        config,
        acme,
        users,
        sessions,
        audit,
        analytics,
        mailer,
    }
}

impl Harness {
    fn seed_user(&self, email: &str, role: Role) -> User {
        let hash = Argon2Hasher::fast().hash(PASSWORD).unwrap();
        let user = User::mock(email, &hash, role);
        self.users.insert(&self.acme.partition, user.clone());
        user
    }

    /// Stores a session for `user` and returns the signed cookie header.
    async fn cookie_for(&self, user: &User, partition: &Partition, state: MfaState) -> String {
        let mut data = SessionData::mock(partition, user.id, user.role, state);
        data.email = user.email.clone();
        let id = self.sessions.create(data).await.unwrap();
        format!(
            "{}={}",
            self.config.session.cookie_name,
            sign_session_id(&id, &self.config.session.secret_key)
        )
    }

    async fn verified_cookie(&self, user: &User) -> String {
        self.cookie_for(
            user,
            &self.acme.partition,
            MfaState::MfaVerified(VerificationMethod::Totp),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

fn get(host: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri).header("host", host);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(host: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("host", host)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Attaches the TCP peer address `serve` would record for the connection.
fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

fn forwarded_for(mut request: Request<Body>, client: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-forwarded-for", client.parse().unwrap());
    request
}

async fn body_to_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of the first `Set-Cookie` header for `name`.
fn set_cookie_pair(response: &axum::response::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .and_then(|v| v.split(';').next())
        .map(ToOwned::to_owned)
}

#[tokio::test]
async fn test_public_host_shows_landing_page_only() {
    let h = harness();

    let response = h.send(get("example.com", "/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_to_string(response.into_body()).await.contains("LedgerDash"));

    let response = h.send(get("unknown.example.com", "/dashboard/", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disallowed_host_rejected() {
    let h = harness();
    let response = h.send(get("evil.test", "/", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["code"], "invalid_host");
}

#[tokio::test]
async fn test_tenant_root_redirects_to_dashboard() {
    let h = harness();
    let response = h.send(get(ACME, "/", None)).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()["location"], "/dashboard/");
}

#[tokio::test]
async fn test_untrusted_origin_rejected() {
    let h = harness();
    h.seed_user("ada@acme.example", Role::User);

    let mut request = post_json(
        ACME,
        "/auth/login/",
        None,
        serde_json::json!({ "email": "ada@acme.example", "password": PASSWORD }),
    );
    request
        .headers_mut()
        .insert("origin", "https://evil.test".parse().unwrap());

    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(response.into_body()).await["code"], "csrf_failed");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let h = harness();
    h.seed_user("ada@acme.example", Role::User);

    let response = h
        .send(post_json(
            ACME,
            "/auth/login/",
            None,
            serde_json::json!({ "email": "ada@acme.example", "password": "wrong-password-1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["code"], "authentication_failed");
    assert!(
        h.audit
            .events(&h.acme.partition)
            .contains(&AuditEventType::LoginFailure)
    );
}

#[tokio::test]
async fn test_login_setup_and_dashboard_flow() {
    let h = harness();
    h.seed_user("ada@acme.example", Role::User);

    let response = h
        .send(post_json(
            ACME,
            "/auth/login/",
            Some("ignored=1"),
            serde_json::json!({ "email": "ADA@acme.example", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie_pair(&response, &h.config.session.cookie_name).unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["state"]["stage"], "mfa_setup_required");
    assert_eq!(body["next"], "/auth/mfa/setup/");

    // not yet verified
    let response = h.send(get(ACME, "/dashboard/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_to_json(response.into_body()).await["code"],
        "mfa_setup_required"
    );

    let response = h.send(get(ACME, "/auth/mfa/setup/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    let secret = body["secret"].as_str().unwrap().to_owned();
    assert!(body["provisioning_uri"].as_str().unwrap().starts_with("otpauth://totp/"));

    let code = totp::generate_at(&secret, Utc::now()).unwrap();
    let response = h
        .send(post_json(
            ACME,
            "/auth/mfa/setup/",
            Some(&cookie),
            serde_json::json!({ "code": code, "remember_device": true }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_pair(&response, &h.config.mfa.device_cookie_name).is_some());
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["recovery_codes"].as_array().unwrap().len(), 10);
    assert_eq!(body["next"], "/dashboard/");

    let response = h.send(get(ACME, "/dashboard/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["accounts"]["total_pages"], 1);
}

#[tokio::test]
async fn test_session_not_valid_on_other_tenant() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h.verified_cookie(&user).await;

    let response = h.send(get(ACME, "/dashboard/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = h.send(get(GLOBEX, "/dashboard/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_cookie_rejected() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h.verified_cookie(&user).await;
    let tampered = format!("{}00", cookie.trim_end_matches(char::is_alphanumeric));

    let response = h.send(get(ACME, "/dashboard/", Some(&tampered))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mfa_required_session_cannot_read_data() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h
        .cookie_for(&user, &h.acme.partition, MfaState::MfaRequired)
        .await;

    let response = h
        .send(get(ACME, "/dashboard/transactions/", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_to_json(response.into_body()).await["code"], "mfa_required");
}

#[tokio::test]
async fn test_management_requires_admin() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let admin = h.seed_user("root@acme.example", Role::Admin);

    let cookie = h.verified_cookie(&user).await;
    let response = h.send(get(ACME, "/manage/users/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let cookie = h.verified_cookie(&admin).await;
    let response = h.send(get(ACME, "/manage/users/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert!(body[0].get("hashed_password").is_none());
}

#[tokio::test]
async fn test_admin_creates_client_and_maps_accounts() {
    let h = harness();
    let admin = h.seed_user("root@acme.example", Role::Admin);
    let cookie = h.verified_cookie(&admin).await;

    let response = h
        .send(post_json(
            ACME,
            "/manage/clients/",
            Some(&cookie),
            serde_json::json!({ "name": "Northwind" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let client_id = body_to_json(response.into_body()).await["client_id"]
        .as_str()
        .unwrap()
        .to_owned();

    let response = h
        .send(post_json(
            ACME,
            &format!("/manage/clients/{client_id}/accounts/"),
            Some(&cookie),
            serde_json::json!({ "account_ids": "acc_1\nacc_2\n\nacc_1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["created"], 2);

    let response = h
        .send(get(ACME, &format!("/manage/clients/{client_id}/"), Some(&cookie)))
        .await;
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["mappings"].as_array().unwrap().len(), 2);

    let response = h.send(get(ACME, "/manage/audit/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body[0]["event_type"], "client_accounts_added");
}

#[tokio::test]
async fn test_export_over_cap_is_denied_and_audited() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h.verified_cookie(&user).await;
    h.analytics
        .set_transaction_count(&h.acme.partition, Some(250_001));

    let response = h
        .send(get(ACME, "/dashboard/transactions/export/", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_to_json(response.into_body()).await["code"],
        "export_row_cap_exceeded"
    );
    assert_eq!(
        h.audit
            .entries_of(&h.acme.partition, AuditEventType::CsvExportDenied)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_export_returns_csv_attachment() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h.verified_cookie(&user).await;

    let response = h
        .send(get(
            ACME,
            "/dashboard/transactions/export/?date_from=2024-01-01&date_to=2024-01-31",
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"transactions_2024-01-01_2024-01-31.csv\""
    );
    let body = body_to_string(response.into_body()).await;
    assert!(body.starts_with("transaction_date,transaction_name"));
}

#[tokio::test]
async fn test_export_refused_on_mobile() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h.verified_cookie(&user).await;

    let mut request = get(ACME, "/dashboard/transactions/export/", Some(&cookie));
    request.headers_mut().insert(
        "user-agent",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".parse().unwrap(),
    );
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_rate_limited_after_ten_attempts() {
    let h = harness();
    h.seed_user("ada@acme.example", Role::User);

    for _ in 0..10 {
        let response = h
            .send(post_json(
                ACME,
                "/auth/login/",
                None,
                serde_json::json!({ "email": "ada@acme.example", "password": "wrong-password-1" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = h
        .send(post_json(
            ACME,
            "/auth/login/",
            None,
            serde_json::json!({ "email": "ada@acme.example", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

fn wrong_login() -> Request<Body> {
    post_json(
        ACME,
        "/auth/login/",
        None,
        serde_json::json!({ "email": "ada@acme.example", "password": "wrong-password-1" }),
    )
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_login_limit() {
    let h = harness();
    h.seed_user("ada@acme.example", Role::User);

    for i in 0..10 {
        let request = forwarded_for(
            from_peer(wrong_login(), "203.0.113.50:41000"),
            &format!("10.9.9.{i}"),
        );
        assert_eq!(h.send(request).await.status(), StatusCode::UNAUTHORIZED);
    }

    let request = forwarded_for(from_peer(wrong_login(), "203.0.113.50:41001"), "10.9.9.200");
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    // the audit trail still records the forwarded address
    let failures = h
        .audit
        .entries_of(&h.acme.partition, AuditEventType::LoginFailure);
    assert!(
        failures
            .iter()
            .any(|e| e.ip_address.as_deref() == Some("10.9.9.0"))
    );

    // a different connection keeps its own budget
    let response = h.send(from_peer(wrong_login(), "198.51.100.20:52000")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_password_reset_limit() {
    let h = harness();

    for i in 0..5 {
        let request = post_json(
            ACME,
            "/auth/password-reset/",
            None,
            serde_json::json!({ "email": "nobody@acme.example" }),
        );
        let request = forwarded_for(
            from_peer(request, "203.0.113.50:41000"),
            &format!("10.9.8.{i}"),
        );
        assert_eq!(h.send(request).await.status(), StatusCode::OK);
    }

    let request = post_json(
        ACME,
        "/auth/password-reset/",
        None,
        serde_json::json!({ "email": "nobody@acme.example" }),
    );
    let request = forwarded_for(from_peer(request, "203.0.113.50:41000"), "10.9.8.200");
    assert_eq!(h.send(request).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_trusted_proxy_forwards_client_address() {
    let mut config = config();
    config.security.trusted_proxies = vec!["10.0.0.2".parse().unwrap()];
    let h = harness_with(config);
    h.seed_user("ada@acme.example", Role::User);

    for _ in 0..10 {
        let request = forwarded_for(from_peer(wrong_login(), "10.0.0.2:443"), "203.0.113.7");
        assert_eq!(h.send(request).await.status(), StatusCode::UNAUTHORIZED);
    }
    let request = forwarded_for(from_peer(wrong_login(), "10.0.0.2:443"), "203.0.113.7");
    assert_eq!(h.send(request).await.status(), StatusCode::TOO_MANY_REQUESTS);

    // another client behind the same proxy is counted separately
    let request = forwarded_for(from_peer(wrong_login(), "10.0.0.2:443"), "203.0.113.8");
    assert_eq!(h.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_does_not_reveal_accounts() {
    let h = harness();
    h.seed_user("ada@acme.example", Role::User);

    for email in ["ada@acme.example", "nobody@acme.example"] {
        let response = h
            .send(post_json(
                ACME,
                "/auth/password-reset/",
                None,
                serde_json::json!({ "email": email }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(
        sent[0]
            .body
            .contains("https://acme.example.com/auth/password-reset/confirm/")
    );
}

#[tokio::test]
async fn test_logout_clears_session() {
    let h = harness();
    let user = h.seed_user("ada@acme.example", Role::User);
    let cookie = h.verified_cookie(&user).await;

    let response = h
        .send(post_json(ACME, "/auth/logout/", Some(&cookie), serde_json::json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie_pair(&response, &h.config.session.cookie_name).unwrap();
    assert_eq!(cleared, format!("{}=", h.config.session.cookie_name));

    let response = h.send(get(ACME, "/dashboard/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
