#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::password_reset::{PasswordResetRepository, PasswordResetToken};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone, Default)]
pub struct MockPasswordResetRepository {
    pub tokens: Arc<Mutex<HashMap<Partition, Vec<PasswordResetToken>>>>,
}

impl MockPasswordResetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasswordResetRepository for MockPasswordResetRepository {
    async fn create_reset_token(
        &self,
        partition: &Partition,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, DashboardError> {
        let token = PasswordResetToken {
            token_hash: token_hash.to_owned(),
            user_id,
            created_at: Utc::now(),
            expires_at,
            used_at: None,
        };
        self.tokens
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .push(token.clone());
        Ok(token)
    }

    async fn find_reset_token(
        &self,
        partition: &Partition,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, DashboardError> {
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens
            .get(partition)
            .and_then(|list| list.iter().find(|t| t.token_hash == token_hash).cloned()))
    }

    async fn consume_reset_token(
        &self,
        partition: &Partition,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, DashboardError> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens.get_mut(partition).and_then(|list| {
            list.iter_mut()
                .find(|t| t.token_hash == token_hash && t.is_valid_at(now))
        });

        Ok(token.map(|t| {
            t.used_at = Some(now);
            t.user_id
        }))
    }

    async fn prune_expired(
        &self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, DashboardError> {
        let mut tokens = self.tokens.lock().unwrap();
        let Some(list) = tokens.get_mut(partition) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|t| t.expires_at > now);
        Ok((before - list.len()) as u64)
    }
}
