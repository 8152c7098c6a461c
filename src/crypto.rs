use argon2::{Algorithm, Argon2, Params, PasswordVerifier, Version};
use password_hash::{PasswordHash, PasswordHasher as ArgonPasswordHasher, SaltString};
use rand::Rng;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::DashboardError;

/// Default length of session ids and opaque tokens.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Length of password reset tokens sent by email.
pub const RESET_TOKEN_LENGTH: usize = 64;

/// Pluggable password hashing.
///
/// The default implementation is [`Argon2Hasher`]. Tests use cheap parameters
/// through [`Argon2Hasher::new`].
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// Returns `DashboardError::Internal` if hashing fails.
    fn hash(&self, password: &str) -> Result<String, DashboardError>;

    /// # Errors
    ///
    /// Returns `DashboardError::Internal` if the stored hash is malformed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, DashboardError>;
}

/// Argon2id password hasher.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    /// Memory cost in KiB
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// 64 MiB memory, 3 iterations, 4 lanes.
    #[must_use]
    pub fn production() -> Self {
        Self::new(65536, 3, 4)
    }

    /// Minimal parameters for unit tests.
    #[cfg(any(test, feature = "mocks"))]
    #[must_use]
    pub fn fast() -> Self {
        Self::new(8, 1, 1)
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DashboardError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| DashboardError::Internal(format!("argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| DashboardError::Internal(format!("password hash: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, DashboardError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| DashboardError::Internal(format!("stored password hash: {e}")))?;

        // parameters come from the stored hash
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Generates a random alphanumeric token of `length` characters.
pub fn generate_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(rng.sample(rand::distributions::Alphanumeric)))
        .collect()
}

/// Generates `bytes` random bytes rendered as uppercase hex.
pub fn generate_hex_code(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill(buf.as_mut_slice());
    hex::encode_upper(buf)
}

/// SHA-256 hex digest, used to store high-entropy tokens at rest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_length_and_charset() {
        let token = generate_token(48);
        assert_eq!(token.len(), 48);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_token(32), generate_token(32));
    }

    #[test]
    fn test_generate_hex_code() {
        let code = generate_hex_code(4);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_token() {
        assert_eq!(hash_token("abc123"), hash_token("abc123"));
        assert_ne!(hash_token("token1"), hash_token("token2"));
        assert_eq!(hash_token("anytoken").len(), 64);
    }

    #[test]
    fn test_argon2_roundtrip() {
        let hasher = Argon2Hasher::fast();
        let hash = hasher.hash("ledger-balance-7").unwrap();
        assert!(hasher.verify("ledger-balance-7", &hash).unwrap());
        assert!(!hasher.verify("ledger-balance-8", &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash() {
        let hasher = Argon2Hasher::fast();
        assert!(hasher.verify("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hello!"));
    }
}
