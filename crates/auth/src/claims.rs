use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use labstock_core::UserId;

use crate::{Role, Session};

/// Claims carried by a bearer token issued by the identity provider.
///
/// Only the fields the workflows consume are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (person id).
    pub sub: UserId,

    /// Display name, copied into operator fields of movement records.
    pub name: String,

    pub role: Role,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn session(&self) -> Session {
        Session::new(self.sub, self.name.clone(), self.role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate the time window of decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Decodes and verifies a bearer token into claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 token validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            key: DecodingKey::from_secret(&secret),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        // Time window lives in our own claim names; `validate_claims` checks it.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            name: "Alice".to_string(),
            role: Role::Operator,
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn rejects_expired_and_future_tokens() {
        let now = Utc::now();
        let mut c = claims(now);
        assert!(validate_claims(&c, now).is_ok());

        c.expires_at = now;
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));

        let mut c = claims(now);
        c.issued_at = now + Duration::minutes(1);
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn hs256_round_trip_yields_session() {
        let now = Utc::now();
        let c = claims(now);
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &c,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded.session(), Session::new(c.sub, "Alice", Role::Operator));

        let wrong = Hs256JwtValidator::new(b"other".to_vec());
        assert!(matches!(
            wrong.validate(&token, now),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
