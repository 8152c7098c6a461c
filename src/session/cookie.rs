//! Signed cookie helpers.
//!
//! Cookie values are `{value}.{hex hmac-sha256}`; a value whose signature
//! does not verify is treated as absent.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::SessionConfig;
use crate::SecretString;
use crate::crypto::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

/// Returns `{value}.{signature}`.
pub fn sign_session_id(session_id: &str, secret: &SecretString) -> String {
    let signature = compute_hmac(session_id.as_bytes(), secret.expose_secret().as_bytes());
    format!("{}.{}", session_id, hex::encode(signature))
}

/// Verifies a signed cookie value and extracts the payload.
pub fn verify_signed_cookie(cookie_value: &str, secret: &SecretString) -> Option<String> {
    let (session_id, signature_hex) = cookie_value.rsplit_once('.')?;

    let actual_sig = hex::decode(signature_hex).ok()?;
    let expected_sig = compute_hmac(session_id.as_bytes(), secret.expose_secret().as_bytes());

    if constant_time_eq(&expected_sig, &actual_sig) {
        Some(session_id.to_owned())
    } else {
        log::warn!(target: "ledgerdash::session", "msg=\"cookie signature mismatch\" cookie_prefix=\"{}...\"", &cookie_value.chars().take(8).collect::<String>());
        None
    }
}

fn compute_hmac(message: &[u8], key: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length, so this cannot fail.
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Finds `name` in a `Cookie` request header.
pub fn read_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

/// `Set-Cookie` value carrying `value` with the configured attributes.
///
/// `max_age_secs` of `None` makes a browser-session cookie.
pub fn set_cookie(
    config: &SessionConfig,
    name: &str,
    value: &str,
    max_age_secs: Option<i64>,
) -> String {
    let mut cookie = format!("{name}={value}; Path={}", config.cookie_path);
    if let Some(domain) = &config.cookie_domain {
        cookie.push_str(&format!("; Domain={domain}"));
    }
    if let Some(max_age) = max_age_secs {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if config.cookie_http_only {
        cookie.push_str("; HttpOnly");
    }
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str(&format!("; SameSite={}", config.cookie_same_site.as_str()));
    cookie
}

/// `Set-Cookie` value that deletes `name`.
pub fn clear_cookie(config: &SessionConfig, name: &str) -> String {
    set_cookie(config, name, "", Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::new("test-secret-key-that-is-long-enough")
    }

    #[test]
    fn test_sign_and_verify() {
        let signed = sign_session_id("abc123session", &secret());
        assert_eq!(
            verify_signed_cookie(&signed, &secret()),
            Some("abc123session".to_owned())
        );
    }

    #[test]
    fn test_tampered_signature() {
        let tampered = format!("abc123session.{}", "0".repeat(64));
        assert!(verify_signed_cookie(&tampered, &secret()).is_none());
    }

    #[test]
    fn test_tampered_session_id() {
        let signed = sign_session_id("abc123session", &secret());
        let signature = signed.rsplit_once('.').unwrap().1;
        let tampered = format!("different_session.{signature}");
        assert!(verify_signed_cookie(&tampered, &secret()).is_none());
    }

    #[test]
    fn test_wrong_secret() {
        let signed = sign_session_id("abc123session", &secret());
        let other = SecretString::new("secret-key-two-that-is-long-enough");
        assert!(verify_signed_cookie(&signed, &other).is_none());
    }

    #[test]
    fn test_malformed_cookie() {
        assert!(verify_signed_cookie("noseparator", &secret()).is_none());
        assert!(verify_signed_cookie("session.notahexsignature", &secret()).is_none());
    }

    #[test]
    fn test_read_cookie() {
        let header = "theme=dark; ledgerdash_session=abc.def; other=1";
        assert_eq!(read_cookie(header, "ledgerdash_session"), Some("abc.def"));
        assert_eq!(read_cookie(header, "missing"), None);
        assert_eq!(read_cookie("", "ledgerdash_session"), None);
    }

    #[test]
    fn test_set_cookie_attributes() {
        let config = SessionConfig::default();
        let cookie = set_cookie(&config, "ledgerdash_session", "v.sig", Some(28_800));
        assert_eq!(
            cookie,
            "ledgerdash_session=v.sig; Path=/; Max-Age=28800; HttpOnly; Secure; SameSite=Lax"
        );

        let insecure = SessionConfig {
            cookie_secure: false,
            ..SessionConfig::default()
        };
        assert!(!set_cookie(&insecure, "n", "v", None).contains("Secure"));
        assert!(clear_cookie(&config, "n").contains("Max-Age=0"));
    }
}
