use std::sync::Arc;

use async_trait::async_trait;

use super::{Partition, Tenant, normalize_host};
use crate::crypto::PasswordHasher;
use crate::permission::Role;
use crate::repository::{NewUser, User, UserRepository};
use crate::validators::email::normalize_email;
use crate::validators::{PasswordPolicy, ValidationError, validate_email, validate_name};
use crate::DashboardError;

/// Creates tenants together with their storage partition.
#[async_trait]
pub trait TenantProvisioner: Send + Sync {
    async fn slug_exists(&self, slug: &str) -> Result<bool, DashboardError>;

    /// Inserts the tenant and its primary domain, creates the partition and
    /// applies the per-tenant schema. Either all of it happens or none.
    async fn create_tenant(
        &self,
        name: &str,
        partition: &Partition,
        primary_domain: &str,
    ) -> Result<Tenant, DashboardError>;
}

#[derive(Debug, Clone)]
pub struct ProvisionTenantRequest {
    pub name: String,
    /// Also used as the partition name.
    pub slug: String,
    pub domain: String,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_first_name: String,
    pub admin_last_name: String,
}

#[derive(Debug, Clone)]
pub struct ProvisionedTenant {
    pub tenant: Tenant,
    pub domain: String,
    pub admin: User,
}

/// Onboards a new organization and its first administrator.
pub struct ProvisionTenantAction {
    provisioner: Arc<dyn TenantProvisioner>,
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    policy: PasswordPolicy,
}

impl ProvisionTenantAction {
    pub fn new(
        provisioner: Arc<dyn TenantProvisioner>,
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            provisioner,
            users,
            hasher,
            policy: PasswordPolicy::default(),
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "provision_tenant", skip_all, err)
    )]
    pub async fn execute(
        &self,
        request: ProvisionTenantRequest,
    ) -> Result<ProvisionedTenant, DashboardError> {
        validate_name(&request.name)?;
        let partition = Partition::new(request.slug.trim())?;
        let domain = normalize_host(&request.domain);
        if domain.is_empty() || domain.contains(['/', ' ', '@']) {
            return Err(ValidationError::InvalidDomain.into());
        }
        let email = normalize_email(&request.admin_email);
        validate_email(&email)?;
        self.policy.validate(&request.admin_password)?;

        if self.provisioner.slug_exists(partition.as_str()).await? {
            return Err(ValidationError::DuplicateSlug.into());
        }

        let hashed_password = self.hasher.hash(&request.admin_password)?;
        let tenant = self
            .provisioner
            .create_tenant(request.name.trim(), &partition, &domain)
            .await?;

        let admin = self
            .users
            .create_user(
                &partition,
                NewUser {
                    email,
                    first_name: request.admin_first_name.trim().to_owned(),
                    last_name: request.admin_last_name.trim().to_owned(),
                    hashed_password,
                    role: Role::Admin,
                    is_active: true,
                },
            )
            .await?;

        log::info!(
            target: "ledgerdash::tenant",
            "msg=\"tenant provisioned\", slug=\"{}\", domain=\"{domain}\"",
            tenant.slug
        );

        Ok(ProvisionedTenant {
            tenant,
            domain,
            admin,
        })
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockTenantProvisioner;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    #![allow(clippy::unwrap_used)]

    use std::sync::Mutex;

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::tenant::InMemoryTenantDirectory;

    /// Provisioner that registers tenants in an [`InMemoryTenantDirectory`].
    #[derive(Clone, Default)]
    pub struct MockTenantProvisioner {
        pub directory: InMemoryTenantDirectory,
        pub tenants: Arc<Mutex<Vec<Tenant>>>,
    }

    impl MockTenantProvisioner {
        pub fn new(directory: InMemoryTenantDirectory) -> Self {
            Self {
                directory,
                tenants: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl TenantProvisioner for MockTenantProvisioner {
        async fn slug_exists(&self, slug: &str) -> Result<bool, DashboardError> {
            Ok(self.tenants.lock().unwrap().iter().any(|t| t.slug == slug))
        }

        async fn create_tenant(
            &self,
            name: &str,
            partition: &Partition,
            primary_domain: &str,
        ) -> Result<Tenant, DashboardError> {
            let tenant = Tenant {
                id: Uuid::new_v4(),
                name: name.to_owned(),
                slug: partition.as_str().to_owned(),
                partition: partition.clone(),
                is_active: true,
                created_at: Utc::now(),
            };
            self.directory.insert(primary_domain, tenant.clone())?;
            self.tenants.lock().unwrap().push(tenant.clone());
            Ok(tenant)
        }
    }
}
