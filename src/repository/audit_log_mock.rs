#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::audit_log::{AuditEntry, AuditEventType, AuditLogRepository, NewAuditEntry};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone, Default)]
pub struct MockAuditLogRepository {
    pub entries: Arc<Mutex<HashMap<Partition, Vec<AuditEntry>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockAuditLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `append` fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self, partition: &Partition) -> Vec<AuditEventType> {
        self.entries
            .lock()
            .unwrap()
            .get(partition)
            .map(|list| list.iter().map(|e| e.event_type).collect())
            .unwrap_or_default()
    }

    pub fn entries_of(&self, partition: &Partition, event_type: AuditEventType) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(partition)
            .map(|list| {
                list.iter()
                    .filter(|e| e.event_type == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditLogRepository for MockAuditLogRepository {
    async fn append(
        &self,
        partition: &Partition,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, DashboardError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DashboardError::Database("audit_log insert failed".to_owned()));
        }

        let stored = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: entry.timestamp,
            user_id: entry.user_id,
            user_email: None,
            event_type: entry.event_type,
            detail: entry.detail,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
        };
        self.entries
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn recent(
        &self,
        partition: &Partition,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, DashboardError> {
        let entries = self.entries.lock().unwrap();
        let mut list = entries.get(partition).cloned().unwrap_or_default();
        list.reverse();
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        list.truncate(limit as usize);
        Ok(list)
    }
}
