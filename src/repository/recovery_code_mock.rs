#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::recovery_code::RecoveryCodeRepository;
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Debug, Clone)]
pub struct StoredRecoveryCode {
    pub user_id: Uuid,
    pub code_hash: String,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct MockRecoveryCodeRepository {
    pub codes: Arc<Mutex<HashMap<Partition, Vec<StoredRecoveryCode>>>>,
}

impl MockRecoveryCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecoveryCodeRepository for MockRecoveryCodeRepository {
    async fn replace_codes(
        &self,
        partition: &Partition,
        user_id: Uuid,
        code_hashes: &[String],
    ) -> Result<(), DashboardError> {
        let mut codes = self.codes.lock().unwrap();
        let list = codes.entry(partition.clone()).or_default();
        list.retain(|c| c.user_id != user_id);
        list.extend(code_hashes.iter().map(|hash| StoredRecoveryCode {
            user_id,
            code_hash: hash.clone(),
            used_at: None,
        }));
        Ok(())
    }

    async fn consume_code(
        &self,
        partition: &Partition,
        user_id: Uuid,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DashboardError> {
        let mut codes = self.codes.lock().unwrap();
        let code = codes.get_mut(partition).and_then(|list| {
            list.iter_mut().find(|c| {
                c.user_id == user_id && c.code_hash == code_hash && c.used_at.is_none()
            })
        });

        match code {
            Some(c) => {
                c.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_unused(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError> {
        let codes = self.codes.lock().unwrap();
        Ok(codes.get(partition).map_or(0, |list| {
            list.iter()
                .filter(|c| c.user_id == user_id && c.used_at.is_none())
                .count() as u64
        }))
    }

    async fn delete_user_codes(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<(), DashboardError> {
        if let Some(list) = self.codes.lock().unwrap().get_mut(partition) {
            list.retain(|c| c.user_id != user_id);
        }
        Ok(())
    }
}
