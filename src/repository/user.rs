use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::Role;
use crate::tenant::Partition;
use crate::DashboardError;

/// A user inside one tenant partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
    /// Base32 TOTP secret. Present from the start of setup until an admin reset.
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() {
            self.email.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name).trim().to_owned()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
}

/// Fields an admin may change on an existing user.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
}

#[cfg(any(test, feature = "mocks"))]
impl User {
    pub fn mock(email: &str, hashed_password: &str, role: Role) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
            hashed_password: hashed_password.to_owned(),
            role,
            is_active: true,
            mfa_secret: None,
            mfa_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_id(
        &self,
        partition: &Partition,
        id: Uuid,
    ) -> Result<Option<User>, DashboardError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(
        &self,
        partition: &Partition,
        email: &str,
    ) -> Result<Option<User>, DashboardError>;

    /// Users ordered by email.
    async fn list_users(&self, partition: &Partition) -> Result<Vec<User>, DashboardError>;

    /// Fails with `ValidationError::DuplicateEmail` if the email is taken.
    async fn create_user(
        &self,
        partition: &Partition,
        user: NewUser,
    ) -> Result<User, DashboardError>;

    async fn update_user(
        &self,
        partition: &Partition,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<User, DashboardError>;

    async fn update_password(
        &self,
        partition: &Partition,
        id: Uuid,
        hashed_password: &str,
    ) -> Result<(), DashboardError>;

    /// Stores a TOTP secret without enabling MFA.
    async fn set_mfa_secret(
        &self,
        partition: &Partition,
        id: Uuid,
        secret: &str,
    ) -> Result<(), DashboardError>;

    async fn enable_mfa(&self, partition: &Partition, id: Uuid) -> Result<(), DashboardError>;

    /// Clears the secret and disables MFA.
    async fn reset_mfa(&self, partition: &Partition, id: Uuid) -> Result<(), DashboardError>;
}
