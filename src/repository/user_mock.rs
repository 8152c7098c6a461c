#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::user::{NewUser, User, UserRepository, UserUpdate};
use crate::tenant::Partition;
use crate::validators::ValidationError;
use crate::DashboardError;

#[derive(Clone, Default)]
pub struct MockUserRepository {
    pub users: Arc<Mutex<HashMap<Partition, Vec<User>>>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, partition: &Partition, user: User) {
        self.users
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .push(user);
    }

    fn with_user<T>(
        &self,
        partition: &Partition,
        id: Uuid,
        f: impl FnOnce(&mut User) -> T,
    ) -> Result<T, DashboardError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(partition)
            .and_then(|list| list.iter_mut().find(|u| u.id == id))
            .ok_or(DashboardError::NotFound)?;
        user.updated_at = Utc::now();
        Ok(f(user))
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_user_by_id(
        &self,
        partition: &Partition,
        id: Uuid,
    ) -> Result<Option<User>, DashboardError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(partition)
            .and_then(|list| list.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_user_by_email(
        &self,
        partition: &Partition,
        email: &str,
    ) -> Result<Option<User>, DashboardError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(partition)
            .and_then(|list| list.iter().find(|u| u.email == email).cloned()))
    }

    async fn list_users(&self, partition: &Partition) -> Result<Vec<User>, DashboardError> {
        let users = self.users.lock().unwrap();
        let mut list = users.get(partition).cloned().unwrap_or_default();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(list)
    }

    async fn create_user(
        &self,
        partition: &Partition,
        new_user: NewUser,
    ) -> Result<User, DashboardError> {
        let mut users = self.users.lock().unwrap();
        let list = users.entry(partition.clone()).or_default();
        if list.iter().any(|u| u.email == new_user.email) {
            return Err(ValidationError::DuplicateEmail.into());
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            hashed_password: new_user.hashed_password,
            role: new_user.role,
            is_active: new_user.is_active,
            mfa_secret: None,
            mfa_enabled: false,
            created_at: now,
            updated_at: now,
        };
        list.push(user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        partition: &Partition,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<User, DashboardError> {
        self.with_user(partition, id, |user| {
            user.first_name = update.first_name;
            user.last_name = update.last_name;
            user.role = update.role;
            user.is_active = update.is_active;
            user.clone()
        })
    }

    async fn update_password(
        &self,
        partition: &Partition,
        id: Uuid,
        hashed_password: &str,
    ) -> Result<(), DashboardError> {
        self.with_user(partition, id, |user| {
            hashed_password.clone_into(&mut user.hashed_password);
        })
    }

    async fn set_mfa_secret(
        &self,
        partition: &Partition,
        id: Uuid,
        secret: &str,
    ) -> Result<(), DashboardError> {
        self.with_user(partition, id, |user| {
            user.mfa_secret = Some(secret.to_owned());
        })
    }

    async fn enable_mfa(&self, partition: &Partition, id: Uuid) -> Result<(), DashboardError> {
        self.with_user(partition, id, |user| {
            user.mfa_enabled = true;
        })
    }

    async fn reset_mfa(&self, partition: &Partition, id: Uuid) -> Result<(), DashboardError> {
        self.with_user(partition, id, |user| {
            user.mfa_enabled = false;
            user.mfa_secret = None;
        })
    }
}
