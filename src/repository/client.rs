use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::Partition;
use crate::DashboardError;

/// A customer grouping of bank accounts, used as a dashboard filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maps an account id from the analytics views onto a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAccount {
    pub id: i64,
    pub client_id: Uuid,
    pub account_id: String,
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// All clients ordered by name.
    async fn list_clients(&self, partition: &Partition) -> Result<Vec<Client>, DashboardError>;

    /// Active clients ordered by name, for filter dropdowns.
    async fn list_active_clients(
        &self,
        partition: &Partition,
    ) -> Result<Vec<Client>, DashboardError>;

    async fn find_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Option<Client>, DashboardError>;

    async fn create_client(
        &self,
        partition: &Partition,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError>;

    async fn update_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError>;

    /// Mappings for one client ordered by account id.
    async fn list_mappings(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Vec<ClientAccount>, DashboardError>;

    /// Inserts each mapping that does not exist yet. Returns how many were created.
    async fn add_mappings(
        &self,
        partition: &Partition,
        client_id: Uuid,
        account_ids: &[String],
    ) -> Result<u64, DashboardError>;

    /// Removes one mapping and returns it, or `None` if it does not belong to the client.
    async fn delete_mapping(
        &self,
        partition: &Partition,
        client_id: Uuid,
        mapping_id: i64,
    ) -> Result<Option<ClientAccount>, DashboardError>;

    async fn account_ids_for_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Vec<String>, DashboardError>;
}
