#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::client::{Client, ClientAccount, ClientRepository};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Default)]
struct ClientData {
    clients: Vec<Client>,
    mappings: Vec<ClientAccount>,
    next_mapping_id: i64,
}

#[derive(Clone, Default)]
pub struct MockClientRepository {
    data: Arc<Mutex<HashMap<Partition, ClientData>>>,
}

impl MockClientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientRepository for MockClientRepository {
    async fn list_clients(&self, partition: &Partition) -> Result<Vec<Client>, DashboardError> {
        let data = self.data.lock().unwrap();
        let mut clients = data
            .get(partition)
            .map(|d| d.clients.clone())
            .unwrap_or_default();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn list_active_clients(
        &self,
        partition: &Partition,
    ) -> Result<Vec<Client>, DashboardError> {
        let mut clients = self.list_clients(partition).await?;
        clients.retain(|c| c.active);
        Ok(clients)
    }

    async fn find_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Option<Client>, DashboardError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .get(partition)
            .and_then(|d| d.clients.iter().find(|c| c.client_id == client_id).cloned()))
    }

    async fn create_client(
        &self,
        partition: &Partition,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError> {
        let now = Utc::now();
        let client = Client {
            client_id: Uuid::new_v4(),
            name: name.to_owned(),
            active,
            created_at: now,
            updated_at: now,
        };
        self.data
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .clients
            .push(client.clone());
        Ok(client)
    }

    async fn update_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError> {
        let mut data = self.data.lock().unwrap();
        let client = data
            .get_mut(partition)
            .and_then(|d| d.clients.iter_mut().find(|c| c.client_id == client_id))
            .ok_or(DashboardError::NotFound)?;
        client.name = name.to_owned();
        client.active = active;
        client.updated_at = Utc::now();
        Ok(client.clone())
    }

    async fn list_mappings(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Vec<ClientAccount>, DashboardError> {
        let data = self.data.lock().unwrap();
        let mut mappings: Vec<ClientAccount> = data
            .get(partition)
            .map(|d| {
                d.mappings
                    .iter()
                    .filter(|m| m.client_id == client_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        mappings.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        Ok(mappings)
    }

    async fn add_mappings(
        &self,
        partition: &Partition,
        client_id: Uuid,
        account_ids: &[String],
    ) -> Result<u64, DashboardError> {
        let mut data = self.data.lock().unwrap();
        let entry = data.entry(partition.clone()).or_default();
        let mut created = 0;
        for account_id in account_ids {
            let exists = entry
                .mappings
                .iter()
                .any(|m| m.client_id == client_id && &m.account_id == account_id);
            if !exists {
                entry.next_mapping_id += 1;
                entry.mappings.push(ClientAccount {
                    id: entry.next_mapping_id,
                    client_id,
                    account_id: account_id.clone(),
                });
                created += 1;
            }
        }
        Ok(created)
    }

    async fn delete_mapping(
        &self,
        partition: &Partition,
        client_id: Uuid,
        mapping_id: i64,
    ) -> Result<Option<ClientAccount>, DashboardError> {
        let mut data = self.data.lock().unwrap();
        let Some(entry) = data.get_mut(partition) else {
            return Ok(None);
        };
        let position = entry
            .mappings
            .iter()
            .position(|m| m.id == mapping_id && m.client_id == client_id);
        Ok(position.map(|i| entry.mappings.remove(i)))
    }

    async fn account_ids_for_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Vec<String>, DashboardError> {
        Ok(self
            .list_mappings(partition, client_id)
            .await?
            .into_iter()
            .map(|m| m.account_id)
            .collect())
    }
}
