//! Verify json web tokens issued to notekeeper users.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::ServerError;
use crate::error::Result;

pub const EXPIRATION_TIME: u64 = 60 * 15; // 15 minutes.

/// Identity of the caller, as asserted by the token issuer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "UserInfo")]
    pub user_info: UserInfo,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    #[serde(default)]
    pub iat: u64,
}

/// Manage access tokens signed with a shared secret.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(secret: &str) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create a new access token.
    ///
    /// Tokens are issued by the authentication service; this one only
    /// signs fixtures for tests.
    pub fn create(&self, user_info: UserInfo) -> Result<String> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| ServerError::internal("clock before epoch", err))?
            .as_secs();
        let claims = Claims {
            user_info,
            exp: time + EXPIRATION_TIME,
            iat: time,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|err| ServerError::internal("cannot sign token", err))
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(self.algorithm);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "access token rejected");
                ServerError::Unauthorized
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_info() -> UserInfo {
        UserInfo {
            username: "admin".into(),
            roles: vec!["Admin".into()],
        }
    }

    #[test]
    fn test_create_and_decode() {
        let manager = TokenManager::new("secret");
        let token = manager.create(user_info()).unwrap();

        let claims = manager.decode(&token).unwrap();
        assert_eq!(claims.user_info, user_info());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = TokenManager::new("secret").create(user_info()).unwrap();

        assert!(matches!(
            TokenManager::new("other").decode(&token),
            Err(ServerError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let manager = TokenManager::new("secret");
        let claims = Claims {
            user_info: user_info(),
            exp: 1_000,
            iat: 0,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            manager.decode(&token),
            Err(ServerError::Unauthorized)
        ));
    }
}
