use serde::{Deserialize, Serialize};

use super::ValidationError;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "1234567890",
    "12345678910",
    "qwertyuiop",
    "iloveyou123",
    "letmein123",
    "welcome123",
    "administrator",
    "changeme123",
];

/// Password rules applied when a password is set or reset.
///
/// # Examples
///
/// ```
/// use ledgerdash::validators::PasswordPolicy;
///
/// let policy = PasswordPolicy::default();
/// assert!(policy.validate("correct-horse-battery").is_ok());
/// assert!(policy.validate("short").is_err());
/// assert!(policy.validate("12345678901234").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum password length (default: 10)
    pub min_length: usize,
    /// Maximum password length (default: 128)
    pub max_length: usize,
    /// Reject passwords made only of digits
    pub reject_numeric: bool,
    /// Additional disallowed passwords, compared case-insensitively
    #[serde(default)]
    pub disallowed_passwords: Vec<String>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 128,
            reject_numeric: true,
            disallowed_passwords: Vec::new(),
        }
    }
}

impl PasswordPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn min(mut self, len: usize) -> Self {
        self.min_length = len;
        self
    }

    #[must_use]
    pub fn max(mut self, len: usize) -> Self {
        self.max_length = len;
        self
    }

    #[must_use]
    pub fn disallowed_passwords(mut self, passwords: Vec<String>) -> Self {
        self.disallowed_passwords = passwords;
        self
    }

    /// Validates a password against this policy.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` describing the first rule the password breaks.
    pub fn validate(&self, password: &str) -> Result<(), ValidationError> {
        if password.is_empty() {
            return Err(ValidationError::PasswordEmpty);
        }

        let len = password.chars().count();
        if len < self.min_length {
            return Err(ValidationError::PasswordTooShort(self.min_length));
        }
        if len > self.max_length {
            return Err(ValidationError::PasswordTooLong(self.max_length));
        }

        if self.reject_numeric && password.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::PasswordEntirelyNumeric);
        }

        let is_common = COMMON_PASSWORDS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(password))
            || self
                .disallowed_passwords
                .iter()
                .any(|p| p.eq_ignore_ascii_case(password));
        if is_common {
            return Err(ValidationError::PasswordCommon);
        }

        Ok(())
    }
}

/// Validates a password using the default policy.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    PasswordPolicy::default().validate(password)
}

/// Validates a new password together with its confirmation field.
pub fn validate_password_pair(
    policy: &PasswordPolicy,
    password: &str,
    confirmation: &str,
) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    policy.validate(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_valid_passwords() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("ledger-balance-7").is_ok());
        assert!(policy.validate("a]b@c#d$e%f^g&h*").is_ok());
    }

    #[test]
    fn test_password_too_short() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.validate("abcdefghi").unwrap_err(),
            ValidationError::PasswordTooShort(10)
        );
    }

    #[test]
    fn test_password_too_long() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.validate(&"a".repeat(129)).unwrap_err(),
            ValidationError::PasswordTooLong(128)
        );
    }

    #[test]
    fn test_numeric_password_rejected() {
        assert_eq!(
            validate_password("98127364509").unwrap_err(),
            ValidationError::PasswordEntirelyNumeric
        );
    }

    #[test]
    fn test_common_password_rejected() {
        assert_eq!(
            validate_password("Password123").unwrap_err(),
            ValidationError::PasswordCommon
        );

        let policy = PasswordPolicy::new().disallowed_passwords(vec!["ledgerdash2024".to_owned()]);
        assert_eq!(
            policy.validate("LEDGERDASH2024").unwrap_err(),
            ValidationError::PasswordCommon
        );
    }

    #[test]
    fn test_password_pair_mismatch() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            validate_password_pair(&policy, "ledger-balance-7", "ledger-balance-8").unwrap_err(),
            ValidationError::PasswordMismatch
        );
        assert!(validate_password_pair(&policy, "ledger-balance-7", "ledger-balance-7").is_ok());
    }
}
