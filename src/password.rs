use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};

use crate::error::{ApiError, ApiResult};

/// Minimum accepted password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// A short list of passwords rejected outright. Matched case-insensitively.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "passw0rd",
    "12345678",
    "123456789",
    "1234567890",
    "qwertyui",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "superman",
    "trustno1",
    "welcome1",
    "admin123",
    "letmein1",
    "1q2w3e4r",
    "asdfghjkl",
];

/// Hash a password using Argon2id.
/// Returns the PHC hash string suitable for storage; the plaintext is never persisted.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored PHC hash string.
/// A hash that fails to parse verifies as false rather than erroring, so a
/// corrupt credential row behaves like a wrong password.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Validate password strength for registration and password changes.
///
/// Rules:
/// - minimum 8 characters;
/// - not entirely numeric;
/// - not in the common-password list;
/// - not similar to the user's email local part or username.
pub fn validate_password_strength(password: &str, email: &str, username: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation(
            "password cannot be entirely numeric".to_string(),
        ));
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(ApiError::Validation(
            "password is too common".to_string(),
        ));
    }

    let email_local = email.split('@').next().unwrap_or_default();
    if is_similar(&lowered, email_local) {
        return Err(ApiError::Validation(
            "password is too similar to the email address".to_string(),
        ));
    }
    if is_similar(&lowered, username) {
        return Err(ApiError::Validation(
            "password is too similar to the username".to_string(),
        ));
    }

    Ok(())
}

/// Case-insensitive containment in either direction. Attributes shorter than
/// four characters are ignored so trivially short usernames do not veto
/// unrelated passwords.
fn is_similar(lowered_password: &str, attribute: &str) -> bool {
    let attr = attribute.to_lowercase();
    if attr.chars().count() < 4 {
        return false;
    }
    lowered_password.contains(&attr) || attr.contains(lowered_password)
}
