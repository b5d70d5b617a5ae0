use crate::config::AuthConfig;
use crate::errors::ServiceError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shop_models::{User, UserRole};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    #[serde(rename = "roles")]
    pub role: UserRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, allowed: &[UserRole]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            ttl: config.token_ttl,
        }
    }

    pub fn claims_for(&self, user: &User) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: user.username.clone(),
            user_id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, ServiceError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ServiceError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: secret.into(),
            issuer: "storefront".into(),
            token_ttl: Duration::from_secs(3600),
            password_memory_kib: 32 * 1024,
            password_iterations: 1,
            password_parallelism: 2,
        })
    }

    fn admin() -> User {
        User {
            id: 9,
            username: "root".into(),
            email: "root@shop.test".into(),
            full_name: "Root".into(),
            role: UserRole::Admin,
            ..Default::default()
        }
    }

    #[test]
    fn signed_claims_verify() {
        let tokens = service("s3cret");
        let claims = tokens.claims_for(&admin());
        let token = tokens.sign(&claims).unwrap();
        let verified = tokens.verify(&token).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.exp - verified.iat, 3600);
        assert!(verified.has_role(&[UserRole::Admin]));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = service("a").sign(&service("a").claims_for(&admin())).unwrap();
        assert!(matches!(
            service("b").verify(&token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service("s3cret");
        let mut claims = tokens.claims_for(&admin());
        claims.iat -= 7200;
        claims.exp -= 7200;
        let token = tokens.sign(&claims).unwrap();
        assert!(tokens.verify(&token).is_err());
    }
}
