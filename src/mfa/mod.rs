//! Second-factor authentication.
//!
//! [`MfaState`] is the session state machine. The remaining modules supply
//! the credentials it consumes: TOTP codes, single-use recovery codes and
//! remembered devices.

mod device;
mod recovery;
mod state;
pub mod totp;

pub use device::{device_expiry, device_fingerprint, new_device_token};
pub use recovery::{
    RecoveryCodes, generate_recovery_codes, hash_recovery_code, looks_like_totp,
    normalize_recovery_code,
};
pub use state::{MfaEvent, MfaState, VerificationMethod};
