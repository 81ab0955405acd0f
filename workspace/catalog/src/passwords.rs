use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{CatalogError, Result};

/// Hashes a plain-text password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CatalogError::PasswordHash(e.to_string()))
}

/// Returns false for a wrong password and for unusable stored hashes alike.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret-Password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-Password", &hash));
        assert!(!verify_password("s3cret-password", &hash));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let first = hash_password("repeat-me-please").unwrap();
        let second = hash_password("repeat-me-please").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_unusable_hash_never_verifies() {
        assert!(!verify_password("anything", "!"));
        assert!(!verify_password("", ""));
    }
}
