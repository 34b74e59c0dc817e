//! JWT token handling

use chrono::{Duration, Utc};
use collectives_shared::constants::TOKEN_TYPE_ACCESS;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token creation failed: {0}")]
    CreationError(String),
    #[error("Token validation failed: {0}")]
    ValidationError(String),
    #[error("Token expired")]
    TokenExpired,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Member id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: String,
}

#[derive(Clone)]
pub struct JwtService {
    secret: String,
    access_token_expiry: i64,
}

impl JwtService {
    pub fn new(secret: String, access_expiry: i64) -> Self {
        Self {
            secret,
            access_token_expiry: access_expiry,
        }
    }

    pub fn generate_access_token(&self, user_id: &Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::CreationError(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::ValidationError(e.to_string()),
        })
    }

    /// Member id carried by a valid access token.
    pub fn authenticate(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(JwtError::ValidationError("not an access token".into()));
        }
        Uuid::parse_str(&claims.sub).map_err(|e| JwtError::ValidationError(e.to_string()))
    }
}
