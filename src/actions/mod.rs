//! Use cases behind the HTTP handlers.
//!
//! Every action takes the tenant [`Partition`] it operates on, either
//! directly or through an [`Actor`], and records its audit entries through
//! [`AuditLogger`]. An action whose audit write fails returns that error.

mod audit_view;
mod dashboard;
mod export;
mod forgot_password;
mod login;
mod logout;
mod manage_clients;
mod manage_users;
mod mfa_setup;
mod prune_expired;
mod reset_password;
mod verify_mfa;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub use audit_view::AuditLogViewAction;
pub use dashboard::{
    AccountQuery, DashboardAction, DashboardSummary, TransactionQuery, TransactionsView,
};
pub use export::{CsvExport, ExportTransactionsAction};
pub use forgot_password::ForgotPasswordAction;
pub use login::{LoginAction, LoginOutcome, LoginRequest};
pub use logout::LogoutAction;
pub use manage_clients::{ClientDetail, ManageClientsAction, parse_account_ids};
pub use manage_users::{CreateUserRequest, ManageUsersAction};
pub use mfa_setup::{MfaSetupAction, MfaSetupComplete, MfaSetupInfo};
pub use prune_expired::{PruneExpiredAction, PruneResult};
pub use reset_password::ResetPasswordAction;
pub use verify_mfa::{VerifyMfaAction, VerifyMfaOutcome};

use crate::audit::{AuditLogger, RequestContext};
use crate::mfa::{device_expiry, device_fingerprint, new_device_token};
use crate::permission::Role;
use crate::rate_limit::{Caller, RateLimiter};
use crate::repository::{AuditEventType, TrustedDeviceRepository};
use crate::session::Session;
use crate::tenant::Partition;
use crate::DashboardError;

/// A user whose session has completed the second factor.
///
/// Only [`Actor::from_session`] builds one, and it refuses sessions that
/// are not `MfaVerified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub partition: Partition,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn from_session(session: &Session) -> Result<Self, DashboardError> {
        session.data.state.require_verified()?;
        Ok(Self {
            partition: session.data.partition.clone(),
            user_id: session.data.user_id,
            email: session.data.email.clone(),
            role: session.data.role,
        })
    }
}

/// Applies `limit` to the request; a blocked request is audited as
/// `rate_limited`. IP-keyed limits count against
/// [`RequestContext::ip_key`], user-keyed ones against the partition and
/// `user_id`.
pub(crate) async fn enforce_limit(
    limiter: &RateLimiter,
    audit: &AuditLogger,
    partition: &Partition,
    ctx: &RequestContext,
    limit: &str,
    user_id: Option<Uuid>,
) -> Result<(), DashboardError> {
    let user_key = user_id.map(|id| format!("{partition}:{id}"));
    let caller = match &user_key {
        Some(user) => Caller::user(ctx.ip_key(), user),
        None => Caller::anonymous(ctx.ip_key()),
    };
    match limiter.check(limit, &caller).await {
        Err(DashboardError::RateLimited { retry_after }) => {
            audit
                .record(
                    partition,
                    ctx,
                    AuditEventType::RateLimited,
                    user_id,
                    format!("{limit} limit exceeded"),
                )
                .await?;
            Err(DashboardError::RateLimited { retry_after })
        }
        other => other,
    }
}

/// Stores a new trusted device and returns the token for the device cookie.
pub(crate) async fn remember_device(
    devices: &dyn TrustedDeviceRepository,
    partition: &Partition,
    user_id: Uuid,
    remember_for: Duration,
    now: DateTime<Utc>,
) -> Result<String, DashboardError> {
    let token = new_device_token();
    devices
        .create_device(
            partition,
            user_id,
            &device_fingerprint(user_id, &token),
            now,
            device_expiry(now, remember_for),
        )
        .await?;
    Ok(token)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for action tests.

    use std::sync::Arc;

    use super::*;
    use crate::config::RateLimitConfig;
    use crate::crypto::{Argon2Hasher, PasswordHasher};
    use crate::mfa::{MfaState, VerificationMethod};
    use crate::rate_limit::InMemoryStore;
    use crate::repository::{MockAuditLogRepository, MockUserRepository, User};
    use crate::session::SessionData;

    pub const PASSWORD: &str = "ledger-balance-7";

    pub fn acme() -> Partition {
        Partition::new("acme").unwrap()
    }

    pub fn globex() -> Partition {
        Partition::new("globex").unwrap()
    }

    pub fn ctx() -> RequestContext {
        RequestContext::new(
            Some("198.51.100.7".to_owned()),
            "Mozilla/5.0 (X11; Linux x86_64)",
            "acme.example.com",
        )
    }

    pub fn limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::from_config(
            Arc::new(InMemoryStore::new()),
            &RateLimitConfig::default(),
        ))
    }

    pub fn audit(repo: &MockAuditLogRepository) -> AuditLogger {
        AuditLogger::new(Arc::new(repo.clone()))
    }

    /// Inserts an active user with [`PASSWORD`] and returns it.
    pub fn seed_user(users: &MockUserRepository, partition: &Partition, email: &str, role: Role) -> User {
        let hash = Argon2Hasher::fast().hash(PASSWORD).unwrap();
        let user = User::mock(email, &hash, role);
        users.insert(partition, user.clone());
        user
    }

    /// Replaces the stored copy of `user`.
    pub fn store_user(users: &MockUserRepository, partition: &Partition, user: &User) {
        let mut all = users.users.lock().unwrap();
        let list = all.entry(partition.clone()).or_default();
        list.retain(|u| u.id != user.id);
        list.push(user.clone());
    }

    pub fn session_for(user: &User, partition: &Partition, state: MfaState) -> Session {
        let mut data = SessionData::mock(partition, user.id, user.role, state);
        data.email = user.email.clone();
        Session::new("sid".to_owned(), data)
    }

    pub fn actor_for(user: &User, partition: &Partition) -> Actor {
        let session = session_for(user, partition, MfaState::MfaVerified(VerificationMethod::Totp));
        Actor::from_session(&session).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::mfa::{MfaState, VerificationMethod};
    use crate::repository::MockUserRepository;

    #[test]
    fn test_actor_requires_verified_session() {
        let users = MockUserRepository::new();
        let user = seed_user(&users, &acme(), "ada@acme.example", Role::User);

        for (state, expected) in [
            (MfaState::MfaRequired, DashboardError::MfaRequired),
            (MfaState::MfaSetupRequired, DashboardError::MfaSetupRequired),
            (MfaState::PasswordVerified, DashboardError::AuthenticationFailed),
        ] {
            let session = session_for(&user, &acme(), state);
            assert_eq!(Actor::from_session(&session), Err(expected));
        }

        let session = session_for(
            &user,
            &acme(),
            MfaState::MfaVerified(VerificationMethod::RecoveryCode),
        );
        let actor = Actor::from_session(&session).unwrap();
        assert_eq!(actor.partition, acme());
        assert_eq!(actor.user_id, user.id);
    }
}
