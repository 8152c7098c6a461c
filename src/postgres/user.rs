use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{commit, db_error, is_unique_violation, scoped};
use crate::permission::Role;
use crate::repository::{NewUser, User, UserRepository, UserUpdate};
use crate::tenant::Partition;
use crate::validators::ValidationError;
use crate::DashboardError;

const USER_COLUMNS: &str = "id, email, first_name, last_name, hashed_password, role, is_active, \
     mfa_secret, mfa_enabled, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs an `UPDATE .. WHERE id = $1` that binds only the id and `value`.
    async fn update_one(
        &self,
        partition: &Partition,
        operation: &str,
        sql: &str,
        id: Uuid,
        value: Option<&str>,
    ) -> Result<(), DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let mut query = sqlx::query(sql).bind(id);
        if let Some(value) = value {
            query = query.bind(value);
        }
        let result = query
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error(operation, e))?;
        commit(tx).await?;

        if result.rows_affected() == 0 {
            return Err(DashboardError::NotFound);
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    hashed_password: String,
    role: String,
    is_active: bool,
    mfa_secret: Option<String>,
    mfa_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = DashboardError;

    fn try_from(row: UserRecord) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DashboardError::Database(format!("unknown role '{}'", row.role)))?;
        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            hashed_password: row.hashed_password,
            role,
            is_active: row.is_active,
            mfa_secret: row.mfa_secret,
            mfa_enabled: row.mfa_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_user_by_id(
        &self,
        partition: &Partition,
        id: Uuid,
    ) -> Result<Option<User>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<UserRecord> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("find_user_by_id", e))?;
        commit(tx).await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_user_by_email(
        &self,
        partition: &Partition,
        email: &str,
    ) -> Result<Option<User>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<UserRecord> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("find_user_by_email", e))?;
        commit(tx).await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_users(&self, partition: &Partition) -> Result<Vec<User>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<UserRecord> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"))
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| db_error("list_users", e))?;
        commit(tx).await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_user(
        &self,
        partition: &Partition,
        user: NewUser,
    ) -> Result<User, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: UserRecord = sqlx::query_as(&format!(
            "INSERT INTO users (id, email, first_name, last_name, hashed_password, role, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ValidationError::DuplicateEmail.into()
            } else {
                db_error("create_user", e)
            }
        })?;
        commit(tx).await?;

        row.try_into()
    }

    async fn update_user(
        &self,
        partition: &Partition,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<User, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<UserRecord> = sqlx::query_as(&format!(
            "UPDATE users SET first_name = $2, last_name = $3, role = $4, is_active = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.role.as_str())
        .bind(update.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("update_user", e))?;
        commit(tx).await?;

        row.ok_or(DashboardError::NotFound)?.try_into()
    }

    async fn update_password(
        &self,
        partition: &Partition,
        id: Uuid,
        hashed_password: &str,
    ) -> Result<(), DashboardError> {
        self.update_one(
            partition,
            "update_password",
            "UPDATE users SET hashed_password = $2, updated_at = NOW() WHERE id = $1",
            id,
            Some(hashed_password),
        )
        .await
    }

    async fn set_mfa_secret(
        &self,
        partition: &Partition,
        id: Uuid,
        secret: &str,
    ) -> Result<(), DashboardError> {
        self.update_one(
            partition,
            "set_mfa_secret",
            "UPDATE users SET mfa_secret = $2, updated_at = NOW() WHERE id = $1",
            id,
            Some(secret),
        )
        .await
    }

    async fn enable_mfa(&self, partition: &Partition, id: Uuid) -> Result<(), DashboardError> {
        self.update_one(
            partition,
            "enable_mfa",
            "UPDATE users SET mfa_enabled = TRUE, updated_at = NOW() WHERE id = $1",
            id,
            None,
        )
        .await
    }

    async fn reset_mfa(&self, partition: &Partition, id: Uuid) -> Result<(), DashboardError> {
        self.update_one(
            partition,
            "reset_mfa",
            "UPDATE users SET mfa_secret = NULL, mfa_enabled = FALSE, updated_at = NOW() \
             WHERE id = $1",
            id,
            None,
        )
        .await
    }
}
