use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::crypto::{DEFAULT_TOKEN_LENGTH, generate_token, hash_token};

/// Random token stored in the device cookie.
pub fn new_device_token() -> String {
    generate_token(DEFAULT_TOKEN_LENGTH)
}

/// Stored fingerprint for a device token. Binding the user id means a
/// cookie copied to another account's session matches nothing.
pub fn device_fingerprint(user_id: Uuid, token: &str) -> String {
    hash_token(&format!("{user_id}:{token}"))
}

pub fn device_expiry(created_at: DateTime<Utc>, remember_for: Duration) -> DateTime<Utc> {
    created_at + remember_for
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_bound_to_user() {
        let token = new_device_token();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert_eq!(device_fingerprint(alice, &token), device_fingerprint(alice, &token));
        assert_ne!(device_fingerprint(alice, &token), device_fingerprint(bob, &token));
        assert_ne!(device_fingerprint(alice, &token), token);
    }
}
