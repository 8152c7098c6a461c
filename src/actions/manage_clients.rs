use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::Actor;
use crate::audit::{AuditLogger, RequestContext};
use crate::permission::{Action, Resource, authorize};
use crate::repository::{AuditEventType, Client, ClientAccount, ClientRepository};
use crate::validators::{ValidationError, validate_name};
use crate::DashboardError;

#[derive(Debug, Clone, Serialize)]
pub struct ClientDetail {
    pub client: Client,
    pub mappings: Vec<ClientAccount>,
}

/// Splits a textarea of account ids, one per line. Blank lines and repeats
/// are dropped.
pub fn parse_account_ids(raw: &str) -> Result<Vec<String>, ValidationError> {
    let mut ids: Vec<String> = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|id| id == line) {
            ids.push(line.to_owned());
        }
    }

    if ids.is_empty() {
        return Err(ValidationError::AccountIdsEmpty);
    }
    Ok(ids)
}

/// Tenant administration of clients and their account mappings.
pub struct ManageClientsAction {
    clients: Arc<dyn ClientRepository>,
    audit: AuditLogger,
}

impl ManageClientsAction {
    pub fn new(clients: Arc<dyn ClientRepository>, audit: AuditLogger) -> Self {
        Self { clients, audit }
    }

    async fn target(&self, actor: &Actor, client_id: Uuid) -> Result<Client, DashboardError> {
        self.clients
            .find_client(&actor.partition, client_id)
            .await?
            .ok_or(DashboardError::NotFound)
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<Client>, DashboardError> {
        authorize(actor.role, Resource::Clients, Action::Read)?;
        self.clients.list_clients(&actor.partition).await
    }

    pub async fn get(&self, actor: &Actor, client_id: Uuid) -> Result<ClientDetail, DashboardError> {
        authorize(actor.role, Resource::Clients, Action::Read)?;
        let client = self.target(actor, client_id).await?;
        let mappings = self.clients.list_mappings(&actor.partition, client_id).await?;
        Ok(ClientDetail { client, mappings })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "create_client", skip_all, err)
    )]
    pub async fn create(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError> {
        authorize(actor.role, Resource::Clients, Action::Create)?;
        validate_name(name)?;

        let client = self
            .clients
            .create_client(&actor.partition, name.trim(), active)
            .await?;

        self.audit
            .record(
                &actor.partition,
                ctx,
                AuditEventType::ClientCreated,
                Some(actor.user_id),
                format!("Created client '{}'", client.name),
            )
            .await?;

        Ok(client)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_client", skip_all, err)
    )]
    pub async fn update(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        client_id: Uuid,
        name: &str,
        active: bool,
    ) -> Result<Client, DashboardError> {
        authorize(actor.role, Resource::Clients, Action::Update)?;
        validate_name(name)?;

        let client = self
            .clients
            .update_client(&actor.partition, client_id, name.trim(), active)
            .await?;

        self.audit
            .record(
                &actor.partition,
                ctx,
                AuditEventType::ClientUpdated,
                Some(actor.user_id),
                format!("Updated client '{}'", client.name),
            )
            .await?;

        Ok(client)
    }

    /// Maps each id in `raw` (one per line) to the client. Returns how many
    /// mappings were new.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "add_client_accounts", skip_all, err)
    )]
    pub async fn add_accounts(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        client_id: Uuid,
        raw: &str,
    ) -> Result<u64, DashboardError> {
        authorize(actor.role, Resource::Clients, Action::Update)?;
        let ids = parse_account_ids(raw)?;
        let client = self.target(actor, client_id).await?;

        let created = self
            .clients
            .add_mappings(&actor.partition, client_id, &ids)
            .await?;

        self.audit
            .record(
                &actor.partition,
                ctx,
                AuditEventType::ClientAccountsAdded,
                Some(actor.user_id),
                format!("Added {created} account(s) to client '{}'", client.name),
            )
            .await?;

        Ok(created)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "remove_client_account", skip_all, err)
    )]
    pub async fn remove_account(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        client_id: Uuid,
        mapping_id: i64,
    ) -> Result<ClientAccount, DashboardError> {
        authorize(actor.role, Resource::Clients, Action::Delete)?;
        let client = self.target(actor, client_id).await?;

        let mapping = self
            .clients
            .delete_mapping(&actor.partition, client_id, mapping_id)
            .await?
            .ok_or(DashboardError::NotFound)?;

        self.audit
            .record(
                &actor.partition,
                ctx,
                AuditEventType::ClientAccountRemoved,
                Some(actor.user_id),
                format!(
                    "Removed account {} from client '{}'",
                    mapping.account_id, client.name
                ),
            )
            .await?;

        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::permission::Role;
    use crate::repository::{MockAuditLogRepository, MockClientRepository, MockUserRepository};

    struct Fixture {
        clients: MockClientRepository,
        audit: MockAuditLogRepository,
        action: ManageClientsAction,
        admin: Actor,
        users: MockUserRepository,
    }

    fn fixture() -> Fixture {
        let users = MockUserRepository::new();
        let clients = MockClientRepository::new();
        let audit_repo = MockAuditLogRepository::new();
        let admin = seed_user(&users, &acme(), "admin@acme.example", Role::Admin);
        let action = ManageClientsAction::new(Arc::new(clients.clone()), audit(&audit_repo));
        Fixture {
            clients,
            audit: audit_repo,
            action,
            admin: actor_for(&admin, &acme()),
            users,
        }
    }

    #[test]
    fn test_parse_account_ids() {
        assert_eq!(
            parse_account_ids("acc-1\n\n  acc-2  \r\nacc-1\n").unwrap(),
            vec!["acc-1", "acc-2"]
        );
        assert_eq!(parse_account_ids(" \n "), Err(ValidationError::AccountIdsEmpty));
    }

    #[tokio::test]
    async fn test_add_accounts_counts_new_mappings() {
        let f = fixture();
        let client = f.action.create(&f.admin, &ctx(), "Northwind", true).await.unwrap();

        let first = f
            .action
            .add_accounts(&f.admin, &ctx(), client.client_id, "acc-1\nacc-2")
            .await
            .unwrap();
        let second = f
            .action
            .add_accounts(&f.admin, &ctx(), client.client_id, "acc-2\nacc-3")
            .await
            .unwrap();

        assert_eq!((first, second), (2, 1));
        let detail = f.action.get(&f.admin, client.client_id).await.unwrap();
        let ids: Vec<_> = detail.mappings.iter().map(|m| m.account_id.as_str()).collect();
        assert_eq!(ids, vec!["acc-1", "acc-2", "acc-3"]);

        let added = f.audit.entries_of(&acme(), AuditEventType::ClientAccountsAdded);
        assert_eq!(added[1].detail, "Added 1 account(s) to client 'Northwind'");
    }

    #[tokio::test]
    async fn test_remove_account() {
        let f = fixture();
        let client = f.action.create(&f.admin, &ctx(), "Northwind", true).await.unwrap();
        f.action
            .add_accounts(&f.admin, &ctx(), client.client_id, "acc-1")
            .await
            .unwrap();
        let mapping_id = f.action.get(&f.admin, client.client_id).await.unwrap().mappings[0].id;

        let removed = f
            .action
            .remove_account(&f.admin, &ctx(), client.client_id, mapping_id)
            .await
            .unwrap();
        assert_eq!(removed.account_id, "acc-1");

        let again = f
            .action
            .remove_account(&f.admin, &ctx(), client.client_id, mapping_id)
            .await;
        assert_eq!(again.err(), Some(DashboardError::NotFound));
        assert_eq!(
            f.audit.entries_of(&acme(), AuditEventType::ClientAccountRemoved)[0].detail,
            "Removed account acc-1 from client 'Northwind'"
        );
    }

    #[tokio::test]
    async fn test_clients_are_partitioned_and_admin_only() {
        let f = fixture();
        let client = f.action.create(&f.admin, &ctx(), "Northwind", true).await.unwrap();

        let other_admin = seed_user(&f.users, &globex(), "admin@globex.example", Role::Admin);
        let other = actor_for(&other_admin, &globex());
        assert!(f.action.list(&other).await.unwrap().is_empty());
        assert_eq!(
            f.action.get(&other, client.client_id).await.err(),
            Some(DashboardError::NotFound)
        );

        let user = seed_user(&f.users, &acme(), "ada@acme.example", Role::User);
        let user = actor_for(&user, &acme());
        assert!(matches!(
            f.action.create(&user, &ctx(), "Initech", true).await,
            Err(DashboardError::Forbidden(_))
        ));
        assert_eq!(f.clients.list_clients(&acme()).await.unwrap().len(), 1);
    }
}
