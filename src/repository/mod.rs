//! Repository traits and data types.
//!
//! Every tenant-scoped method takes the [`Partition`](crate::tenant::Partition)
//! it operates on. Implementations never read or write outside that
//! partition.
//!
//! # Traits
//!
//! | Trait | Description |
//! |-------|-------------|
//! | [`UserRepository`] | Users, passwords and MFA enrollment |
//! | [`TrustedDeviceRepository`] | Remembered devices that skip MFA |
//! | [`RecoveryCodeRepository`] | Hashed single-use MFA recovery codes |
//! | [`PasswordResetRepository`] | Password reset tokens |
//! | [`AuditLogRepository`] | Append-only audit trail |
//! | [`ClientRepository`] | Clients and their account mappings |
//! | [`AnalyticsRepository`] | Read-only dashboard views |
//!
//! # Mock Implementations
//!
//! Enable the `mocks` feature for in-memory implementations useful for testing.

mod analytics;
mod audit_log;
mod client;
mod password_reset;
mod recovery_code;
mod trusted_device;
mod user;

#[cfg(any(test, feature = "mocks"))]
mod analytics_mock;
#[cfg(any(test, feature = "mocks"))]
mod audit_log_mock;
#[cfg(any(test, feature = "mocks"))]
mod client_mock;
#[cfg(any(test, feature = "mocks"))]
mod password_reset_mock;
#[cfg(any(test, feature = "mocks"))]
mod recovery_code_mock;
#[cfg(any(test, feature = "mocks"))]
mod trusted_device_mock;
#[cfg(any(test, feature = "mocks"))]
mod user_mock;

pub use analytics::AnalyticsRepository;
pub use audit_log::{AuditEntry, AuditEventType, AuditLogRepository, NewAuditEntry};
pub use client::{Client, ClientAccount, ClientRepository};
pub use password_reset::{PasswordResetRepository, PasswordResetToken};
pub use recovery_code::RecoveryCodeRepository;
pub use trusted_device::{TrustedDevice, TrustedDeviceRepository};
pub use user::{NewUser, User, UserRepository, UserUpdate};

#[cfg(any(test, feature = "mocks"))]
pub use analytics_mock::MockAnalyticsRepository;
#[cfg(any(test, feature = "mocks"))]
pub use audit_log_mock::MockAuditLogRepository;
#[cfg(any(test, feature = "mocks"))]
pub use client_mock::MockClientRepository;
#[cfg(any(test, feature = "mocks"))]
pub use password_reset_mock::MockPasswordResetRepository;
#[cfg(any(test, feature = "mocks"))]
pub use recovery_code_mock::MockRecoveryCodeRepository;
#[cfg(any(test, feature = "mocks"))]
pub use trusted_device_mock::MockTrustedDeviceRepository;
#[cfg(any(test, feature = "mocks"))]
pub use user_mock::MockUserRepository;
