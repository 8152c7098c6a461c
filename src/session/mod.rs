//! Server-side sessions bound to one tenant partition.
//!
//! The browser holds only a signed, random session id. Everything else,
//! including the MFA stage, lives in a [`SessionRepository`].

mod config;
mod cookie;
mod memory_store;
mod repository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use config::{SameSite, SessionConfig};
pub use cookie::{clear_cookie, read_cookie, set_cookie, sign_session_id, verify_signed_cookie};
pub use memory_store::InMemorySessionRepository;
pub use repository::SessionRepository;

use crate::mfa::MfaState;
use crate::permission::Role;
use crate::tenant::Partition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// The only partition this session may touch.
    pub partition: Partition,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub state: MfaState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
}

impl Session {
    pub fn new(id: String, data: SessionData) -> Self {
        Self { id, data }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.data.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True if the session was issued for `partition`.
    pub fn belongs_to(&self, partition: &Partition) -> bool {
        &self.data.partition == partition
    }
}

#[cfg(any(test, feature = "mocks"))]
impl SessionData {
    pub fn mock(partition: &Partition, user_id: Uuid, role: Role, state: MfaState) -> Self {
        let now = Utc::now();
        Self {
            partition: partition.clone(),
            user_id,
            email: format!("{user_id}@example.com"),
            role,
            state,
            created_at: now,
            expires_at: now + chrono::Duration::hours(8),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::mfa::VerificationMethod;

    fn partition(name: &str) -> Partition {
        Partition::new(name).unwrap()
    }

    #[test]
    fn test_session_expiry_boundary() {
        let mut data = SessionData::mock(
            &partition("acme"),
            Uuid::new_v4(),
            Role::User,
            MfaState::MfaRequired,
        );
        let now = Utc::now();
        data.expires_at = now + Duration::seconds(1);
        let session = Session::new("sid".to_owned(), data);

        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_session_is_bound_to_partition() {
        let data = SessionData::mock(
            &partition("acme"),
            Uuid::new_v4(),
            Role::Admin,
            MfaState::MfaVerified(VerificationMethod::Totp),
        );
        let session = Session::new("sid".to_owned(), data);

        assert!(session.belongs_to(&partition("acme")));
        assert!(!session.belongs_to(&partition("globex")));
    }
}
