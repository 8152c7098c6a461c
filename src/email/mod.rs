//! Outbound email.
//!
//! Only password reset links are sent. Delivery is attempted once; the
//! caller decides what a failure means.

mod smtp;

use async_trait::async_trait;

use crate::DashboardError;

pub use smtp::SmtpMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn password_reset(to: &str, link: &str, expires_in_minutes: i64) -> Self {
        Self {
            to: to.to_owned(),
            subject: "Password reset request".to_owned(),
            body: format!(
                "A password reset was requested for your account.\n\n\
                 Open the link below to choose a new password:\n\n{link}\n\n\
                 The link expires in {expires_in_minutes} minutes. \
                 If you did not request this, you can ignore this email.\n"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), DashboardError>;
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockMailer;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Collects messages instead of sending them.
    #[derive(Clone, Default)]
    pub struct MockMailer {
        pub sent: Arc<Mutex<Vec<EmailMessage>>>,
        fail: Arc<AtomicBool>,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_sends(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, message: EmailMessage) -> Result<(), DashboardError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DashboardError::Email("connection refused".to_owned()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }
}
