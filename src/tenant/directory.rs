use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{Tenant, TenantResolution, normalize_host};
use crate::DashboardError;

/// Lookup from request host to tenant.
///
/// Implementations must return [`TenantResolution::Public`] for hosts with
/// no domain record and for inactive tenants.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Looks up a host that has already been passed through [`normalize_host`].
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DashboardError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DashboardError>;

    /// Every tenant, active or not, ordered by slug.
    async fn list_tenants(&self) -> Result<Vec<Tenant>, DashboardError>;

    async fn resolve(&self, host: &str) -> Result<TenantResolution, DashboardError> {
        let domain = normalize_host(host);
        if domain.is_empty() {
            return Ok(TenantResolution::Public);
        }

        match self.find_by_domain(&domain).await? {
            Some(tenant) if tenant.is_active => Ok(TenantResolution::Tenant(tenant)),
            Some(tenant) => {
                log::info!(
                    target: "ledgerdash::tenant",
                    "msg=\"inactive tenant requested\", slug=\"{}\"",
                    tenant.slug
                );
                Ok(TenantResolution::Public)
            }
            None => Ok(TenantResolution::Public),
        }
    }
}

/// Directory held in memory, for tests and single-tenant deployments.
#[derive(Clone, Default)]
pub struct InMemoryTenantDirectory {
    domains: Arc<RwLock<HashMap<String, Tenant>>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `domain` to `tenant`, replacing any previous mapping.
    pub fn insert(&self, domain: &str, tenant: Tenant) -> Result<(), DashboardError> {
        self.domains
            .write()
            .map_err(|_| DashboardError::Internal("tenant directory lock poisoned".to_owned()))?
            .insert(normalize_host(domain), tenant);
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DashboardError> {
        let domains = self
            .domains
            .read()
            .map_err(|_| DashboardError::Internal("tenant directory lock poisoned".to_owned()))?;
        Ok(domains.get(domain).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DashboardError> {
        let domains = self
            .domains
            .read()
            .map_err(|_| DashboardError::Internal("tenant directory lock poisoned".to_owned()))?;
        Ok(domains.values().find(|t| t.slug == slug).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, DashboardError> {
        let domains = self
            .domains
            .read()
            .map_err(|_| DashboardError::Internal("tenant directory lock poisoned".to_owned()))?;
        let mut tenants: Vec<Tenant> = domains.values().cloned().collect();
        tenants.sort_by(|a, b| a.slug.cmp(&b.slug));
        tenants.dedup_by(|a, b| a.slug == b.slug);
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> (InMemoryTenantDirectory, Tenant, Tenant) {
        let dir = InMemoryTenantDirectory::new();
        let acme = Tenant::mock("acme");
        let globex = Tenant::mock("globex");
        dir.insert("acme.example.com", acme.clone()).unwrap();
        dir.insert("portal.acme.io", acme.clone()).unwrap();
        dir.insert("globex.example.com", globex.clone()).unwrap();
        (dir, acme, globex)
    }

    #[tokio::test]
    async fn test_each_domain_resolves_to_its_own_partition() {
        let (dir, acme, globex) = directory();

        for (host, expected) in [
            ("acme.example.com", &acme),
            ("portal.acme.io", &acme),
            ("globex.example.com", &globex),
            ("ACME.example.com:443", &acme),
        ] {
            let resolved = dir.resolve(host).await.unwrap();
            assert_eq!(
                resolved.tenant().map(|t| &t.partition),
                Some(&expected.partition),
                "{host}"
            );
        }
    }

    #[tokio::test]
    async fn test_unmapped_hosts_are_public() {
        let (dir, _, _) = directory();

        for host in [
            "example.com",
            "evil.example.com",
            "acme.example.com.evil.net",
            "xacme.example.com",
            "",
        ] {
            assert_eq!(dir.resolve(host).await.unwrap(), TenantResolution::Public, "{host}");
        }
    }

    #[tokio::test]
    async fn test_inactive_tenant_is_public() {
        let dir = InMemoryTenantDirectory::new();
        let mut tenant = Tenant::mock("dormant");
        tenant.is_active = false;
        dir.insert("dormant.example.com", tenant).unwrap();

        assert_eq!(
            dir.resolve("dormant.example.com").await.unwrap(),
            TenantResolution::Public
        );
    }

    #[tokio::test]
    async fn test_find_by_slug() {
        let (dir, acme, _) = directory();
        assert_eq!(dir.find_by_slug("acme").await.unwrap(), Some(acme));
        assert!(dir.find_by_slug("initech").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_tenants_once_per_slug() {
        let (dir, acme, globex) = directory();
        assert_eq!(dir.list_tenants().await.unwrap(), vec![acme, globex]);
    }
}
