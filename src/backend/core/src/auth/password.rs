//! Password hashing and verification using Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$digest`), so
//! verification always uses the parameters a hash was created with, even after
//! the configured work factor changes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::fmt;

use super::AuthError;
use crate::config::PasswordConfig;

/// One-way password hasher with a fixed work factor.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: String,
}

impl CredentialHasher {
    /// Build a hasher from the configured Argon2 parameters.
    pub fn new(config: &PasswordConfig) -> Result<Self, AuthError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| AuthError::Internal(format!("Invalid Argon2 parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let decoy = argon2
            .hash_password(b"decoy-credential", &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Failed to hash decoy: {e}")))?;

        Ok(Self { argon2, decoy })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
    }

    /// Verify a password against a stored hash.
    ///
    /// A malformed hash never verifies.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Spend the same work as a real verification for a username that does
    /// not exist. Always false.
    pub fn verify_decoy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.decoy);
        false
    }
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", self.argon2.params())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(&PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct-horse-battery-staple").unwrap();

        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(hasher.verify("correct-horse-battery-staple", &hash));
        assert!(!hasher.verify("wrong-password", &hash));
    }

    #[test]
    fn test_different_salts() {
        let hasher = hasher();
        let hash1 = hasher.hash("same-password").unwrap();
        let hash2 = hasher.hash("same-password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("same-password", &hash1));
        assert!(hasher.verify("same-password", &hash2));
    }

    #[test]
    fn test_malformed_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("password", "not-a-valid-hash"));
        assert!(!hasher.verify("password", ""));
        assert!(!hasher.verify("password", "$argon2id$v=19$m=1024,t=1,p=1$"));
    }

    #[test]
    fn test_verify_uses_embedded_parameters() {
        let weak = hasher();
        let stronger = CredentialHasher::new(&PasswordConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();

        let hash = weak.hash("pw1").unwrap();
        assert!(stronger.verify("pw1", &hash));
    }

    #[test]
    fn test_decoy_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify_decoy("decoy-credential"));
        assert!(!hasher.verify_decoy("anything"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = CredentialHasher::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[test]
    fn test_debug_hides_decoy() {
        let output = format!("{:?}", hasher());
        assert!(!output.contains("$argon2id"));
    }
}
