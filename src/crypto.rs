//! Password hashing.

use argon2::password_hash::{
    PasswordHash as PhcString, PasswordHasher as _, PasswordVerifier,
    SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::ServerError;
use crate::config::Argon2 as ArgonConfig;
use crate::error::Result;

/// Value object of a plaintext password.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    /// Create a new [`Password`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the password is empty.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.is_empty() {
            return Err(ServerError::InvalidInput(
                "All fields are required".into(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the password as bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// A salted password hash, as a PHC string.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Converts a [`String`] into a valid [`PasswordHash`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string is not in PHC format.
    pub fn parse(phc_string: impl Into<String>) -> Result<Self> {
        let phc_string = phc_string.into();
        PhcString::new(&phc_string).map_err(|err| ServerError::Internal {
            details: format!("stored password is not a PHC string: {err}"),
            source: None,
        })?;

        Ok(Self(phc_string))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("phc_string", &"[REDACTED]")
            .finish()
    }
}

/// Port for password hashing operations.
pub trait PasswordHasher: Send + Sync {
    /// Hash a password with a freshly generated salt.
    fn hash(&self, password: &Password) -> Result<PasswordHash>;

    /// Check a password against a stored hash.
    ///
    /// Login lives in the authentication service, so only tests call this
    /// to assert what was stored.
    fn verify(&self, password: &Password, hash: &PasswordHash) -> Result<bool>;
}

/// Argon2id password hasher.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Argon2PasswordHasher {
    /// Create a new [`Argon2PasswordHasher`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(argon2_error)?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &Password) -> Result<PasswordHash> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| ServerError::Internal {
                details: format!("argon2 failed to hash password: {err}"),
                source: None,
            })?;

        Ok(PasswordHash(hash.to_string()))
    }

    fn verify(&self, password: &Password, hash: &PasswordHash) -> Result<bool> {
        let parsed = PhcString::new(hash.as_str()).map_err(|err| {
            ServerError::Internal {
                details: format!("stored password is not a PHC string: {err}"),
                source: None,
            }
        })?;

        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

fn argon2_error(err: argon2::Error) -> ServerError {
    ServerError::Internal {
        details: format!("invalid argon2 parameters: {err}"),
        source: None,
    }
}

/// Cheap parameters for tests.
#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2PasswordHasher {
    Argon2PasswordHasher::new(Some(ArgonConfig {
        memory_cost: 1024 * 8,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }))
    .expect("valid argon2 parameters")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = test_hasher();
        let password = Password::new("p@ss").unwrap();

        let hash = hasher.hash(&password).unwrap();
        assert_ne!(hash.as_str(), "p@ss");
        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify(&password, &hash).unwrap());
        assert!(
            !hasher
                .verify(&Password::new("wrong").unwrap(), &hash)
                .unwrap()
        );
    }

    #[test]
    fn test_salt_differs_per_hash() {
        let hasher = test_hasher();
        let password = Password::new("same-password").unwrap();

        let first = hasher.hash(&password).unwrap();
        let second = hasher.hash(&password).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_password_rules() {
        assert!(matches!(
            Password::new(""),
            Err(ServerError::InvalidInput(_))
        ));
        assert!(Password::new("a".repeat(1024)).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = Password::new("hunter22").unwrap();
        assert!(!format!("{password:?}").contains("hunter22"));

        let hash = test_hasher().hash(&password).unwrap();
        assert!(!format!("{hash:?}").contains("argon2id"));
    }

    #[test]
    fn test_parse_rejects_plaintext() {
        assert!(PasswordHash::parse("plaintext").is_err());
    }
}
