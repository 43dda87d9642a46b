//! Password hashing and verification.
//!
//! New digests are Argon2id PHC strings. Legacy bcrypt digests (`$2a$`,
//! `$2b$`, `$2y$` prefixes) still verify; callers use `needs_rehash` to
//! upgrade them transparently on successful login. Verification dispatches
//! on the digest prefix, never on anything the client sends.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use tessera_core::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, digest: &str) -> Result<bool, AppError> {
    if digest.starts_with("$argon2") {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| AppError::Internal(format!("malformed password digest: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    } else if digest.starts_with("$2a$") || digest.starts_with("$2b$") || digest.starts_with("$2y$")
    {
        bcrypt::verify(password, digest)
            .map_err(|e| AppError::Internal(format!("bcrypt verification failed: {}", e)))
    } else {
        Err(AppError::Internal(
            "unrecognized password digest format".to_string(),
        ))
    }
}

/// True when a successful login should rewrite the stored digest.
pub fn needs_rehash(digest: &str) -> bool {
    !digest.starts_with("$argon2")
}

/// Burn comparable work when the account does not exist, so login timing
/// does not reveal which usernames are taken.
pub fn dummy_verify(password: &str) {
    static DUMMY: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    let digest = DUMMY.get_or_init(|| {
        hash_password("tessera-dummy-password").unwrap_or_else(|_| String::new())
    });
    if !digest.is_empty() {
        let _ = verify_password(password, digest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_round_trip() {
        let digest = hash_password("s3cret!").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(verify_password("s3cret!", &digest).unwrap());
        assert!(!verify_password("wrong", &digest).unwrap());
        assert!(!needs_rehash(&digest));
    }

    #[test]
    fn bcrypt_digests_still_verify_and_need_rehash() {
        let digest = bcrypt::hash("s3cret!", 4).unwrap();
        assert!(verify_password("s3cret!", &digest).unwrap());
        assert!(!verify_password("wrong", &digest).unwrap());
        assert!(needs_rehash(&digest));
    }

    #[test]
    fn unknown_format_is_an_internal_error() {
        let err = verify_password("x", "plaintext-oops").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
