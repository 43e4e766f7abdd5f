use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::warn;

/// Hashes a password into an argon2id PHC string suitable for the config file.
///
/// # Errors
///
/// Returns an error if salt encoding or hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::Rng::fill(&mut rand::rng(), &mut salt_bytes[..]);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| eyre!("Failed to encode salt: {e}"))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| eyre!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC string. A malformed hash never verifies.
#[must_use]
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(password_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is malformed: {e}");
            return false;
        }
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!verify_password("not-a-phc-string", "anything"));
        assert!(!verify_password("", ""));
    }
}
