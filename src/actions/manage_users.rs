use std::sync::Arc;

use uuid::Uuid;

use super::Actor;
use crate::audit::{AuditLogger, RequestContext};
use crate::crypto::PasswordHasher;
use crate::mfa::generate_recovery_codes;
use crate::permission::{Action, Resource, Role, authorize};
use crate::repository::{
    AuditEventType, NewUser, RecoveryCodeRepository, TrustedDeviceRepository, User,
    UserRepository, UserUpdate,
};
use crate::session::SessionRepository;
use crate::validators::email::normalize_email;
use crate::validators::{PasswordPolicy, ValidationError, validate_email, validate_name};
use crate::DashboardError;

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
    pub is_active: bool,
}

/// Tenant administration of user accounts.
pub struct ManageUsersAction {
    users: Arc<dyn UserRepository>,
    recovery_codes: Arc<dyn RecoveryCodeRepository>,
    devices: Arc<dyn TrustedDeviceRepository>,
    sessions: Arc<dyn SessionRepository>,
    audit: AuditLogger,
    hasher: Arc<dyn PasswordHasher>,
    policy: PasswordPolicy,
    recovery_code_count: usize,
}

impl ManageUsersAction {
    pub fn new(
        users: Arc<dyn UserRepository>,
        recovery_codes: Arc<dyn RecoveryCodeRepository>,
        devices: Arc<dyn TrustedDeviceRepository>,
        sessions: Arc<dyn SessionRepository>,
        audit: AuditLogger,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            recovery_codes,
            devices,
            sessions,
            audit,
            hasher,
            policy: PasswordPolicy::default(),
            recovery_code_count: 10,
        }
    }

    #[must_use]
    pub fn recovery_code_count(mut self, count: usize) -> Self {
        self.recovery_code_count = count;
        self
    }

    async fn target(&self, actor: &Actor, user_id: Uuid) -> Result<User, DashboardError> {
        self.users
            .find_user_by_id(&actor.partition, user_id)
            .await?
            .ok_or(DashboardError::NotFound)
    }

    /// Users ordered by email.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<User>, DashboardError> {
        authorize(actor.role, Resource::Users, Action::Read)?;
        self.users.list_users(&actor.partition).await
    }

    pub async fn get(&self, actor: &Actor, user_id: Uuid) -> Result<User, DashboardError> {
        authorize(actor.role, Resource::Users, Action::Read)?;
        self.target(actor, user_id).await
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "create_user", skip_all, err)
    )]
    pub async fn create(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        request: CreateUserRequest,
    ) -> Result<User, DashboardError> {
        authorize(actor.role, Resource::Users, Action::Create)?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_name(&request.first_name)?;
        self.policy.validate(&request.password)?;

        if self
            .users
            .find_user_by_email(&actor.partition, &email)
            .await?
            .is_some()
        {
            return Err(ValidationError::DuplicateEmail.into());
        }

        let user = self
            .users
            .create_user(
                &actor.partition,
                NewUser {
                    email,
                    first_name: request.first_name.trim().to_owned(),
                    last_name: request.last_name.trim().to_owned(),
                    hashed_password: self.hasher.hash(&request.password)?,
                    role: request.role,
                    is_active: request.is_active,
                },
            )
            .await?;

        self.audit
            .record(
                &actor.partition,
                ctx,
                AuditEventType::UserCreated,
                Some(actor.user_id),
                format!("Created user {} with role {}", user.email, user.role),
            )
            .await?;

        Ok(user)
    }

    /// Updates names, role and active flag. Deactivating a user ends their
    /// sessions.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_user", skip_all, err)
    )]
    pub async fn update(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        user_id: Uuid,
        update: UserUpdate,
    ) -> Result<User, DashboardError> {
        authorize(actor.role, Resource::Users, Action::Update)?;
        validate_name(&update.first_name)?;

        let before = self.target(actor, user_id).await?;
        let user = self
            .users
            .update_user(&actor.partition, user_id, update)
            .await?;

        let mut changes = Vec::new();
        if before.role != user.role {
            changes.push(format!("role: {} -> {}", before.role, user.role));
        }
        if before.is_active != user.is_active {
            changes.push(format!("active: {} -> {}", before.is_active, user.is_active));
        }

        if !changes.is_empty() {
            self.audit
                .record(
                    &actor.partition,
                    ctx,
                    AuditEventType::UserUpdated,
                    Some(actor.user_id),
                    format!("Updated {}: {}", user.email, changes.join(", ")),
                )
                .await?;
        }

        if before.is_active && !user.is_active {
            self.sessions
                .destroy_user_sessions(&actor.partition, user_id)
                .await?;
        }

        Ok(user)
    }

    /// Clears the user's TOTP secret, recovery codes, trusted devices and
    /// sessions. Their next login starts MFA setup again.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "reset_mfa", skip_all, err)
    )]
    pub async fn reset_mfa(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        user_id: Uuid,
    ) -> Result<(), DashboardError> {
        authorize(actor.role, Resource::Users, Action::Reset)?;
        let user = self.target(actor, user_id).await?;
        let partition = &actor.partition;

        self.users.reset_mfa(partition, user_id).await?;
        self.recovery_codes.delete_user_codes(partition, user_id).await?;
        let devices = self.devices.delete_user_devices(partition, user_id).await?;
        let sessions = self.sessions.destroy_user_sessions(partition, user_id).await?;

        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::MfaReset,
                Some(user_id),
                format!("MFA reset for {}", user.email),
            )
            .await?;

        log::info!(
            target: "ledgerdash",
            "msg=\"mfa reset\", partition=\"{partition}\", user_id=\"{user_id}\", devices={devices}, sessions={sessions}"
        );

        Ok(())
    }

    /// Replaces the user's recovery codes and returns the new plaintext set.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "regenerate_recovery_codes", skip_all, err)
    )]
    pub async fn regenerate_recovery_codes(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        user_id: Uuid,
    ) -> Result<Vec<String>, DashboardError> {
        authorize(actor.role, Resource::Users, Action::Reset)?;
        let user = self.target(actor, user_id).await?;

        let codes = generate_recovery_codes(self.recovery_code_count);
        self.recovery_codes
            .replace_codes(&actor.partition, user_id, &codes.hashes)
            .await?;

        self.audit
            .record(
                &actor.partition,
                ctx,
                AuditEventType::RecoveryCodesRegenerated,
                Some(user_id),
                format!("Recovery codes regenerated for {}", user.email),
            )
            .await?;

        Ok(codes.plaintext)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::actions::remember_device;
    use crate::actions::test_support::*;
    use crate::crypto::Argon2Hasher;
    use crate::mfa::MfaState;
    use crate::repository::{
        MockAuditLogRepository, MockRecoveryCodeRepository, MockTrustedDeviceRepository,
        MockUserRepository,
    };
    use crate::session::{InMemorySessionRepository, SessionData};

    struct Fixture {
        users: MockUserRepository,
        codes: MockRecoveryCodeRepository,
        devices: MockTrustedDeviceRepository,
        sessions: InMemorySessionRepository,
        audit: MockAuditLogRepository,
        action: ManageUsersAction,
        admin: Actor,
    }

    fn fixture() -> Fixture {
        let users = MockUserRepository::new();
        let codes = MockRecoveryCodeRepository::new();
        let devices = MockTrustedDeviceRepository::new();
        let sessions = InMemorySessionRepository::new();
        let audit_repo = MockAuditLogRepository::new();
        let admin = seed_user(&users, &acme(), "admin@acme.example", Role::Admin);
        let action = ManageUsersAction::new(
            Arc::new(users.clone()),
            Arc::new(codes.clone()),
            Arc::new(devices.clone()),
            Arc::new(sessions.clone()),
            audit(&audit_repo),
            Arc::new(Argon2Hasher::fast()),
        );
        Fixture {
            users,
            codes,
            devices,
            sessions,
            audit: audit_repo,
            action,
            admin: actor_for(&admin, &acme()),
        }
    }

    fn new_user(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_owned(),
            first_name: "Grace".to_owned(),
            last_name: "Hopper".to_owned(),
            password: "compile-the-ledger".to_owned(),
            role: Role::User,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let f = fixture();
        let user = seed_user(&f.users, &acme(), "ada@acme.example", Role::User);
        let actor = actor_for(&user, &acme());

        assert!(matches!(f.action.list(&actor).await, Err(DashboardError::Forbidden(_))));
        assert!(matches!(
            f.action.reset_mfa(&actor, &ctx(), user.id).await,
            Err(DashboardError::Forbidden(_))
        ));
        assert!(f.audit.events(&acme()).is_empty());
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let f = fixture();
        let user = f
            .action
            .create(&f.admin, &ctx(), new_user("Grace@Acme.example"))
            .await
            .unwrap();
        assert_eq!(user.email, "grace@acme.example");

        let dup = f.action.create(&f.admin, &ctx(), new_user("grace@acme.example")).await;
        assert_eq!(
            dup.err(),
            Some(DashboardError::Validation(ValidationError::DuplicateEmail))
        );

        let created = f.audit.entries_of(&acme(), AuditEventType::UserCreated);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].detail, "Created user grace@acme.example with role user");
        assert_eq!(f.action.list(&f.admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_audits_changes_and_ends_sessions_on_deactivate() {
        let f = fixture();
        let user = seed_user(&f.users, &acme(), "ada@acme.example", Role::User);
        f.sessions
            .create(SessionData::mock(&acme(), user.id, Role::User, MfaState::MfaRequired))
            .await
            .unwrap();

        let update = UserUpdate {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: Role::Admin,
            is_active: false,
        };
        f.action.update(&f.admin, &ctx(), user.id, update).await.unwrap();

        let updated = f.audit.entries_of(&acme(), AuditEventType::UserUpdated);
        assert_eq!(
            updated[0].detail,
            "Updated ada@acme.example: role: user -> admin, active: true -> false"
        );
        assert!(f.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_reset_mfa_clears_everything() {
        let f = fixture();
        let mut user = seed_user(&f.users, &acme(), "ada@acme.example", Role::User);
        user.mfa_enabled = true;
        user.mfa_secret = Some("JBSWY3DPEHPK3PXP".to_owned());
        store_user(&f.users, &acme(), &user);

        f.codes
            .replace_codes(&acme(), user.id, &generate_recovery_codes(10).hashes)
            .await
            .unwrap();
        remember_device(&f.devices, &acme(), user.id, Duration::days(7), Utc::now())
            .await
            .unwrap();
        f.sessions
            .create(SessionData::mock(&acme(), user.id, Role::User, MfaState::MfaRequired))
            .await
            .unwrap();

        f.action.reset_mfa(&f.admin, &ctx(), user.id).await.unwrap();

        let stored = f.users.find_user_by_id(&acme(), user.id).await.unwrap().unwrap();
        assert!(!stored.mfa_enabled);
        assert!(stored.mfa_secret.is_none());
        assert_eq!(f.codes.count_unused(&acme(), user.id).await.unwrap(), 0);
        assert_eq!(f.devices.count(&acme()), 0);
        assert!(f.sessions.is_empty());
        assert_eq!(f.audit.events(&acme()), vec![AuditEventType::MfaReset]);
    }

    #[tokio::test]
    async fn test_regenerate_recovery_codes_replaces_set() {
        let f = fixture();
        let user = seed_user(&f.users, &acme(), "ada@acme.example", Role::User);
        let first = generate_recovery_codes(10);
        f.codes.replace_codes(&acme(), user.id, &first.hashes).await.unwrap();

        let codes = f
            .action
            .regenerate_recovery_codes(&f.admin, &ctx(), user.id)
            .await
            .unwrap();

        assert_eq!(codes.len(), 10);
        assert_eq!(f.codes.count_unused(&acme(), user.id).await.unwrap(), 10);
        let stored = f.codes.codes.lock().unwrap()[&acme()].clone();
        assert!(stored.iter().all(|c| !first.hashes.contains(&c.code_hash)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let f = fixture();
        assert_eq!(
            f.action.reset_mfa(&f.admin, &ctx(), Uuid::new_v4()).await,
            Err(DashboardError::NotFound)
        );
    }
}
