use std::collections::HashSet;

use crate::crypto::{generate_hex_code, hash_token};

/// Random bytes per recovery code, rendered as uppercase hex.
const CODE_BYTES: usize = 4;

/// A freshly generated set. `plaintext` is shown to the user once;
/// only `hashes` are stored.
#[derive(Debug, Clone)]
pub struct RecoveryCodes {
    pub plaintext: Vec<String>,
    pub hashes: Vec<String>,
}

pub fn generate_recovery_codes(count: usize) -> RecoveryCodes {
    let mut seen = HashSet::with_capacity(count);
    let mut plaintext = Vec::with_capacity(count);
    while plaintext.len() < count {
        let code = generate_hex_code(CODE_BYTES);
        if seen.insert(code.clone()) {
            plaintext.push(code);
        }
    }

    let hashes = plaintext.iter().map(|c| hash_recovery_code(c)).collect();
    RecoveryCodes { plaintext, hashes }
}

/// Trims, uppercases and drops separators users commonly type.
pub fn normalize_recovery_code(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn hash_recovery_code(input: &str) -> String {
    hash_token(&normalize_recovery_code(input))
}

/// Six ASCII digits are treated as an authenticator code; anything else as
/// a recovery code.
pub fn looks_like_totp(input: &str) -> bool {
    let input = input.trim();
    input.len() == super::totp::DIGITS && input.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_distinct_codes() {
        let codes = generate_recovery_codes(10);
        assert_eq!(codes.plaintext.len(), 10);
        assert_eq!(codes.hashes.len(), 10);

        let unique: HashSet<_> = codes.plaintext.iter().collect();
        assert_eq!(unique.len(), 10);
        for code in &codes.plaintext {
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_hash_matches_normalized_input() {
        let codes = generate_recovery_codes(1);
        let code = &codes.plaintext[0];
        let typed = format!("  {}-{} ", code[..4].to_lowercase(), &code[4..]);
        assert_eq!(hash_recovery_code(&typed), codes.hashes[0]);
    }

    #[test]
    fn test_looks_like_totp() {
        assert!(looks_like_totp("123456"));
        assert!(looks_like_totp(" 123456 "));
        assert!(!looks_like_totp("12345678"));
        assert!(!looks_like_totp("ABCDEF"));
        assert!(!looks_like_totp("12345"));
    }
}
