//! RFC 6238 time-based one-time passwords: SHA-1, six digits, 30 second
//! step, one step of clock skew in either direction.

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::DashboardError;

pub const DIGITS: usize = 6;
pub const STEP_SECONDS: u64 = 30;
const SKEW: u8 = 1;

/// New random secret, base32 encoded for storage and manual entry.
pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

fn build(secret: &str, issuer: Option<String>, account: String) -> Result<TOTP, DashboardError> {
    let bytes = Secret::Encoded(secret.to_owned())
        .to_bytes()
        .map_err(|e| DashboardError::Internal(format!("totp secret: {e}")))?;

    TOTP::new(Algorithm::SHA1, DIGITS, SKEW, STEP_SECONDS, bytes, issuer, account)
        .map_err(|e| DashboardError::Internal(format!("totp init: {e}")))
}

/// `otpauth://` URI for authenticator apps.
pub fn provisioning_uri(secret: &str, issuer: &str, account: &str) -> Result<String, DashboardError> {
    // ':' separates issuer and account in the URI label
    let issuer = issuer.replace(':', "");
    let account = account.replace(':', "");
    Ok(build(secret, Some(issuer), account)?.get_url())
}

/// Checks `code` against the steps around `now`.
pub fn verify_at(secret: &str, code: &str, now: DateTime<Utc>) -> Result<bool, DashboardError> {
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }
    let totp = build(secret, None, String::new())?;
    Ok(totp.check(code, unix_seconds(now)))
}

/// Code for the step containing `now`.
pub fn generate_at(secret: &str, now: DateTime<Utc>) -> Result<String, DashboardError> {
    Ok(build(secret, None, String::new())?.generate(unix_seconds(now)))
}

fn unix_seconds(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}
