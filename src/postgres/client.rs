use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{commit, db_error, scoped};
use crate::repository::{Client, ClientAccount, ClientRepository};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone)]
pub struct PostgresClientRepository {
    pool: PgPool,
}

impl PostgresClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ClientRecord {
    client_id: Uuid,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRecord> for Client {
    fn from(row: ClientRecord) -> Self {
        Client {
            client_id: row.client_id,
            name: row.name,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ClientAccountRecord {
    id: i64,
    client_id: Uuid,
    account_id: String,
}

impl From<ClientAccountRecord> for ClientAccount {
    fn from(row: ClientAccountRecord) -> Self {
        ClientAccount {
            id: row.id,
            client_id: row.client_id,
            account_id: row.account_id,
        }
    }
}

#[async_trait]
impl ClientRepository for PostgresClientRepository {
    async fn list_clients(&self, partition: &Partition) -> Result<Vec<Client>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<ClientRecord> = sqlx::query_as(
            "SELECT client_id, name, active, created_at, updated_at FROM clients ORDER BY name",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("list_clients", e))?;
        commit(tx).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_active_clients(
        &self,
        partition: &Partition,
    ) -> Result<Vec<Client>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<ClientRecord> = sqlx::query_as(
            "SELECT client_id, name, active, created_at, updated_at FROM clients \
             WHERE active ORDER BY name",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("list_active_clients", e))?;
        commit(tx).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Option<Client>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<ClientRecord> = sqlx::query_as(
            "SELECT client_id, name, active, created_at, updated_at FROM clients \
             WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("find_client", e))?;
        commit(tx).await?;

        Ok(row.map(Into::into))
    }

    async fn create_client(
        &self,
        partition: &Partition,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: ClientRecord = sqlx::query_as(
            "INSERT INTO clients (client_id, name, active) VALUES ($1, $2, $3) \
             RETURNING client_id, name, active, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create_client", e))?;
        commit(tx).await?;

        Ok(row.into())
    }

    async fn update_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<ClientRecord> = sqlx::query_as(
            "UPDATE clients SET name = $2, active = $3, updated_at = NOW() \
             WHERE client_id = $1 \
             RETURNING client_id, name, active, created_at, updated_at",
        )
        .bind(client_id)
        .bind(name)
        .bind(active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("update_client", e))?;
        commit(tx).await?;

        row.map(Into::into).ok_or(DashboardError::NotFound)
    }

    async fn list_mappings(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Vec<ClientAccount>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<ClientAccountRecord> = sqlx::query_as(
            "SELECT id, client_id, account_id FROM client_accounts \
             WHERE client_id = $1 ORDER BY account_id",
        )
        .bind(client_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("list_client_accounts", e))?;
        commit(tx).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_mappings(
        &self,
        partition: &Partition,
        client_id: Uuid,
        account_ids: &[String],
    ) -> Result<u64, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let result = sqlx::query(
            "INSERT INTO client_accounts (client_id, account_id) \
             SELECT $1, account_id FROM UNNEST($2::text[]) AS account_id \
             ON CONFLICT (client_id, account_id) DO NOTHING",
        )
        .bind(client_id)
        .bind(account_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("add_client_accounts", e))?;
        commit(tx).await?;

        Ok(result.rows_affected())
    }

    async fn delete_mapping(
        &self,
        partition: &Partition,
        client_id: Uuid,
        mapping_id: i64,
    ) -> Result<Option<ClientAccount>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<ClientAccountRecord> = sqlx::query_as(
            "DELETE FROM client_accounts WHERE id = $1 AND client_id = $2 \
             RETURNING id, client_id, account_id",
        )
        .bind(mapping_id)
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("delete_client_account", e))?;
        commit(tx).await?;

        Ok(row.map(Into::into))
    }

    async fn account_ids_for_client(
        &self,
        partition: &Partition,
        client_id: Uuid,
    ) -> Result<Vec<String>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT account_id FROM client_accounts WHERE client_id = $1 ORDER BY account_id",
        )
        .bind(client_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("client_account_ids", e))?;
        commit(tx).await?;

        Ok(ids)
    }
}
