use super::ValidationError;

/// Maximum stored length for person and client names.
pub const MAX_NAME_LENGTH: usize = 150;

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::NameEmpty);
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong(MAX_NAME_LENGTH));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("Acme Holdings").is_ok());
        assert!(validate_name("José García").is_ok());
    }

    #[test]
    fn test_name_empty() {
        assert_eq!(validate_name("").unwrap_err(), ValidationError::NameEmpty);
        assert_eq!(validate_name("   ").unwrap_err(), ValidationError::NameEmpty);
    }

    #[test]
    fn test_name_too_long() {
        let long_name = "a".repeat(151);
        assert_eq!(
            validate_name(&long_name).unwrap_err(),
            ValidationError::NameTooLong(150)
        );
    }
}
