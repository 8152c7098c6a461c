pub mod email;
pub mod name;
pub mod password;

pub use email::validate_email;
pub use name::validate_name;
pub use password::{PasswordPolicy, validate_password, validate_password_pair};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    EmailEmpty,
    EmailTooLong,
    EmailInvalidFormat,
    PasswordEmpty,
    PasswordTooShort(usize),
    PasswordTooLong(usize),
    PasswordEntirelyNumeric,
    PasswordCommon,
    PasswordMismatch,
    NameEmpty,
    NameTooLong(usize),
    MfaCodeEmpty,
    AccountIdsEmpty,
    InvalidFilter(String),
    InvalidSlug,
    DuplicateSlug,
    InvalidDomain,
    DuplicateEmail,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailEmpty => write!(f, "Email cannot be empty"),
            Self::EmailTooLong => write!(f, "Email is too long (max 254 characters)"),
            Self::EmailInvalidFormat => write!(f, "Invalid email format"),
            Self::PasswordEmpty => write!(f, "Password cannot be empty"),
            Self::PasswordTooShort(min) => {
                write!(f, "Password must be at least {min} characters")
            }
            Self::PasswordTooLong(max) => {
                write!(f, "Password is too long (max {max} characters)")
            }
            Self::PasswordEntirelyNumeric => write!(f, "Password cannot be entirely numeric"),
            Self::PasswordCommon => write!(f, "Password is too common"),
            Self::PasswordMismatch => write!(f, "Passwords do not match"),
            Self::NameEmpty => write!(f, "Name cannot be empty"),
            Self::NameTooLong(max) => write!(f, "Name is too long (max {max} characters)"),
            Self::MfaCodeEmpty => write!(f, "Verification code cannot be empty"),
            Self::AccountIdsEmpty => write!(f, "Provide at least one account ID"),
            Self::InvalidFilter(msg) => write!(f, "Invalid filter: {msg}"),
            Self::InvalidSlug => write!(
                f,
                "Slug must start with a letter and contain only lowercase letters, digits and underscores"
            ),
            Self::DuplicateSlug => write!(f, "A tenant with this slug already exists"),
            Self::InvalidDomain => write!(f, "Invalid domain name"),
            Self::DuplicateEmail => write!(f, "A user with this email already exists"),
        }
    }
}

impl std::error::Error for ValidationError {}
