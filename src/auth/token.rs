// JWT token generation and validation service

use crate::auth::{error::AuthError, models::Role, models::TokenPair};
use crate::config::JwtConfig;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: i32, // user_id
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Claims carried by a refresh token, identity only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: i32, // user_id
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Token service for JWT operations
///
/// Access and refresh tokens are signed with different secrets, so one kind
/// never verifies as the other.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    access_token_duration: i64,  // in seconds
    refresh_token_duration: i64, // in seconds
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        issuer: impl Into<String>,
        access_token_duration: i64,
        refresh_token_duration: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            issuer: issuer.into(),
            access_token_duration,
            refresh_token_duration,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.access_secret,
            &config.refresh_secret,
            config.issuer.clone(),
            config.access_ttl,
            config.refresh_ttl,
        )
    }

    /// Access token lifetime in seconds
    pub fn access_token_duration(&self) -> i64 {
        self.access_token_duration
    }

    pub fn issue_access_token(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now,
            exp: now + self.access_token_duration,
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    pub fn issue_refresh_token(&self, user_id: i32) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: user_id,
            iat: now,
            exp: now + self.refresh_token_duration,
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Issue a fresh access + refresh pair
    pub fn issue_pair(&self, user_id: i32, email: &str, role: Role) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, email, role)?,
            refresh_token: self.issue_refresh_token(user_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_duration,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.verify(token, &self.access_decoding)
    }

    /// Verify a refresh token and return the user id it was issued for
    pub fn verify_refresh_token(&self, token: &str) -> Result<i32, AuthError> {
        self.verify::<RefreshClaims>(token, &self.refresh_decoding)
            .map(|claims| claims.sub)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> Result<T, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        decode::<T>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ACCESS_SECRET: &str = "access_secret_for_tests";
    const REFRESH_SECRET: &str = "refresh_secret_for_tests";

    fn test_token_service() -> TokenService {
        TokenService::new(ACCESS_SECRET, REFRESH_SECRET, "user_accounts_api", 3600, 604800)
    }

    fn decode_refresh_claims(token: &str) -> RefreshClaims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["user_accounts_api"]);
        decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(REFRESH_SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims
    }

    // Feature: token-service, access token lifetime defaults to one hour
    #[test]
    fn test_access_token_expiration_is_one_hour() {
        let service = test_token_service();
        let token = service.issue_access_token(1, "test@example.com", Role::User).unwrap();
        let claims = service.verify_access_token(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss, "user_accounts_api");
    }

    // Feature: token-service, refresh token lifetime defaults to seven days
    #[test]
    fn test_refresh_token_expiration_is_seven_days() {
        let service = test_token_service();
        let token = service.issue_refresh_token(1).unwrap();
        let claims = decode_refresh_claims(&token);

        assert_eq!(claims.exp - claims.iat, 604800);
        assert_eq!(service.verify_refresh_token(&token).unwrap(), 1);
    }

    // Feature: token-service, access and refresh tokens are not interchangeable
    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let service = test_token_service();
        let access = service.issue_access_token(7, "a@b.com", Role::Admin).unwrap();
        let refresh = service.issue_refresh_token(7).unwrap();

        assert!(matches!(
            service.verify_refresh_token(&access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service.verify_access_token(&refresh),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let service =
            TokenService::new(ACCESS_SECRET, REFRESH_SECRET, "user_accounts_api", -120, -120);
        let access = service.issue_access_token(1, "a@b.com", Role::User).unwrap();
        let refresh = service.issue_refresh_token(1).unwrap();

        assert!(matches!(service.verify_access_token(&access), Err(AuthError::ExpiredToken)));
        assert!(matches!(service.verify_refresh_token(&refresh), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let other = TokenService::new(ACCESS_SECRET, REFRESH_SECRET, "someone_else", 3600, 3600);
        let token = other.issue_access_token(1, "a@b.com", Role::User).unwrap();

        assert!(matches!(
            test_token_service().verify_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_signature_verification() {
        let service1 = test_token_service();
        let service2 = TokenService::new("secret1", "secret2", "user_accounts_api", 3600, 3600);

        let token = service1.issue_access_token(1, "test@example.com", Role::User).unwrap();

        assert!(service1.verify_access_token(&token).is_ok());
        assert!(service2.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_issue_pair() {
        let service = test_token_service();
        let pair = service.issue_pair(3, "test@example.com", Role::User).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 3600);
        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(service.verify_access_token(&pair.access_token).unwrap().sub, 3);
        assert_eq!(service.verify_refresh_token(&pair.refresh_token).unwrap(), 3);
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let service = test_token_service();

        assert!(service.verify_access_token("").is_err());
        assert!(service.verify_access_token("not.a.token").is_err());
        assert!(service
            .verify_access_token("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature")
            .is_err());
        assert!(service.verify_refresh_token("invalid_token_format").is_err());
    }

    proptest! {
        // Feature: token-service, access claims carry identity and role
        #[test]
        fn prop_access_claims_contain_identity(
            user_id in 1i32..1000000,
            email in "[a-z]{3,10}@[a-z]{3,10}\\.(com|org|net)",
            admin in any::<bool>()
        ) {
            let role = if admin { Role::Admin } else { Role::User };
            let service = test_token_service();

            let token = service.issue_access_token(user_id, &email, role)?;
            let claims = service.verify_access_token(&token)?;
            prop_assert_eq!(claims.sub, user_id);
            prop_assert_eq!(claims.email, email);
            prop_assert_eq!(claims.role, role);
        }

        // Feature: token-service, lifetimes follow configuration
        #[test]
        fn prop_lifetimes_follow_configuration(
            access_ttl in 60i64..86400,
            refresh_ttl in 86400i64..2592000
        ) {
            let service = TokenService::new(
                ACCESS_SECRET, REFRESH_SECRET, "user_accounts_api", access_ttl, refresh_ttl,
            );

            let access = service.issue_access_token(1, "a@b.com", Role::User)?;
            let claims = service.verify_access_token(&access)?;
            prop_assert_eq!(claims.exp - claims.iat, access_ttl);

            let refresh = service.issue_refresh_token(1)?;
            let claims = decode_refresh_claims(&refresh);
            prop_assert_eq!(claims.exp - claims.iat, refresh_ttl);
        }

        // Feature: token-service, random strings are rejected
        #[test]
        fn prop_malformed_tokens_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let service = test_token_service();
            prop_assert!(service.verify_access_token(&malformed).is_err());
            prop_assert!(service.verify_refresh_token(&malformed).is_err());
        }
    }
}
