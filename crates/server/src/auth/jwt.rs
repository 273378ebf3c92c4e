//! JWT access/refresh token issuance and validation

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub token_type: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Token pair returned by registration and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub refresh_token: String,
    pub access_token: String,
}

/// Signing keys and token lifetimes
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue_pair(&self, user_id: i64) -> jsonwebtoken::errors::Result<TokenPair> {
        Ok(TokenPair {
            refresh_token: self.issue(user_id, REFRESH, self.refresh_ttl_secs)?,
            access_token: self.issue(user_id, ACCESS, self.access_ttl_secs)?,
        })
    }

    /// Validate signature and expiry, and reject refresh tokens
    pub fn verify_access(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())?.claims;
        if claims.token_type != ACCESS {
            return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
        }
        Ok(claims)
    }

    fn issue(&self, user_id: i64, token_type: &str, ttl_secs: u64) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            token_type: token_type.to_string(),
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }
}
