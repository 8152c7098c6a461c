//! Wrapper for credentials that must never reach logs.

use std::fmt;

use serde::{Deserialize, Deserializer};
use subtle::ConstantTimeEq;

/// A string holding a password, signing key, or one-time code.
///
/// `Debug` and `Display` print `[REDACTED]`. Equality is constant-time.
/// The type deliberately has no `Serialize` impl so secrets cannot leak
/// into JSON responses by accident.
///
/// ```rust
/// use ledgerdash::SecretString;
///
/// let key = SecretString::new("hunter2-but-longer");
/// assert_eq!(format!("{key:?}"), "SecretString([REDACTED])");
/// assert_eq!(key.expose_secret(), "hunter2-but-longer");
/// ```
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrows the underlying value. Keep the borrow as short as possible.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SecretString {}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_debug_redacted() {
        let secret = SecretString::new("my_password");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn test_secret_string_equality() {
        assert_eq!(SecretString::new("abc"), SecretString::from("abc"));
        assert_ne!(SecretString::new("abc"), SecretString::from("abd"));
        assert_ne!(SecretString::new("abc"), SecretString::from("abcd"));
    }

    #[test]
    fn test_secret_string_deserialize() {
        #[derive(Deserialize)]
        struct Form {
            password: SecretString,
        }

        let form: Form = serde_json::from_str(r#"{"password":"s3cret-value"}"#).unwrap();
        assert_eq!(form.password.expose_secret(), "s3cret-value");
        assert_eq!(form.password.len(), 12);
    }
}
