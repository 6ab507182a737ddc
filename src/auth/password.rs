//! Password hashing and verification using Argon2
//!
//! Uses the argon2id variant with default parameters. Stored hashes are
//! PHC-formatted strings carrying their own salt and parameters, so the
//! verify side needs no extra state.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::TownhallError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Reject passwords that are too short to be worth hashing.
pub fn validate_password(password: &str) -> Result<(), TownhallError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(TownhallError::InvalidArgument(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, TownhallError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TownhallError::Internal(format!("failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash string.
///
/// Returns Ok(false) for a wrong password; an error only when the stored
/// hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, TownhallError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| TownhallError::Internal(format!("stored password hash is invalid: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_accepts_correct_password() {
        let hash = hash_password("pavement-is-cracked").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("pavement-is-cracked", &hash).unwrap());
        assert!(!verify_password("pavement-is-fine", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("report-a-pothole").unwrap();
        let second = hash_password("report-a-pothole").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("report-a-pothole", &first).unwrap());
        assert!(verify_password("report-a-pothole", &second).unwrap());
    }

    #[test]
    fn short_password_is_rejected_before_hashing() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("exactly8").is_ok());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
