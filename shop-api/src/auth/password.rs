use crate::errors::ServiceError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::warn;

const OUTPUT_LEN: usize = 32;

/// One-way password hashing. The stored string carries its own salt and
/// parameters.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, ServiceError>;

    /// False for a wrong password and for a stored hash that cannot be
    /// parsed.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with a random salt per hash, stored in PHC string format.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Argon2PasswordHasher {
    pub fn new(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, ServiceError> {
        let params = Params::new(memory_kib, iterations, parallelism, Some(OUTPUT_LEN))
            .map_err(|e| ServiceError::Internal(format!("argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::Internal(format!("password hashing: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        // parameters come from the stored hash
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2PasswordHasher {
        Argon2PasswordHasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn hash_is_argon2id_and_verifies() {
        let hasher = cheap();
        let hash = hasher.hash("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(hasher.verify("hunter2", &hash));
        assert!(!hasher.verify("hunter3", &hash));
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let hasher = cheap();
        let a = hasher.hash("hunter2").unwrap();
        let b = hasher.hash("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("hunter2", &b));
    }

    #[test]
    fn malformed_or_empty_hash_never_verifies() {
        let hasher = cheap();
        assert!(!hasher.verify("hunter2", ""));
        assert!(!hasher.verify("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn invalid_cost_is_rejected() {
        assert!(Argon2PasswordHasher::new(1, 1, 1).is_err());
        assert!(Argon2PasswordHasher::new(32 * 1024, 0, 1).is_err());
    }
}
