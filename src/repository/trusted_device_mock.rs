#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::trusted_device::{TrustedDevice, TrustedDeviceRepository};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone, Default)]
pub struct MockTrustedDeviceRepository {
    pub devices: Arc<Mutex<HashMap<Partition, Vec<TrustedDevice>>>>,
}

impl MockTrustedDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, partition: &Partition) -> usize {
        self.devices
            .lock()
            .unwrap()
            .get(partition)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl TrustedDeviceRepository for MockTrustedDeviceRepository {
    async fn create_device(
        &self,
        partition: &Partition,
        user_id: Uuid,
        device_hash: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<TrustedDevice, DashboardError> {
        let device = TrustedDevice {
            id: Uuid::new_v4(),
            user_id,
            device_hash: device_hash.to_owned(),
            created_at,
            expires_at,
        };
        self.devices
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .push(device.clone());
        Ok(device)
    }

    async fn find_valid_device(
        &self,
        partition: &Partition,
        user_id: Uuid,
        device_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TrustedDevice>, DashboardError> {
        let devices = self.devices.lock().unwrap();
        Ok(devices.get(partition).and_then(|list| {
            list.iter()
                .find(|d| d.user_id == user_id && d.device_hash == device_hash && d.is_valid_at(now))
                .cloned()
        }))
    }

    async fn delete_user_devices(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError> {
        let mut devices = self.devices.lock().unwrap();
        let Some(list) = devices.get_mut(partition) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|d| d.user_id != user_id);
        Ok((before - list.len()) as u64)
    }

    async fn prune_expired(
        &self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, DashboardError> {
        let mut devices = self.devices.lock().unwrap();
        let Some(list) = devices.get_mut(partition) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|d| d.is_valid_at(now));
        Ok((before - list.len()) as u64)
    }
}
