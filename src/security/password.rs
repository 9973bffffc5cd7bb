/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

use crate::error::{AuthError, Result};

/// Hash a secret using Argon2id.
///
/// The salt is generated here and embedded in the PHC-format output; nothing
/// is stored separately. The plaintext is never logged or returned.
pub fn hash_password(password: &str) -> Result<String> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Internal("failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a secret against a stored hash.
///
/// Comparison is delegated to the algorithm's own verifier, which runs in
/// time independent of where a mismatch occurs.
pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AuthError::Internal("invalid password hash".to_string()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Registration-time strength rules:
/// - minimum 8 characters
/// - at least one uppercase, one lowercase, one digit, one special character
fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword);
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if has_uppercase && has_lowercase && has_digit && has_special {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}
