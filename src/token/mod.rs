use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted password-reset credential. The plaintext goes out of
/// band to the user; only the hash and expiry are ever persisted.
#[derive(Debug)]
pub struct ResetToken {
    pub plaintext: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies the signed session tokens, and computes
/// password-reset tokens. Stateless: validity is entirely a function of
/// signature, expiry and the subject's password-change timestamp.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_secs: i64,
    reset_ttl_secs: i64,
    cookie_name: String,
    secure_cookies: bool,
}

impl TokenService {
    pub fn new(security: &SecurityConfig) -> Self {
        Self {
            secret: security.jwt_secret.clone(),
            ttl_secs: security.jwt_ttl_secs,
            reset_ttl_secs: security.reset_token_ttl_secs,
            cookie_name: security.cookie_name.clone(),
            secure_cookies: security.secure_cookies,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn issue(&self, subject: Uuid) -> Result<String, ApiError> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: Uuid, now: DateTime<Utc>) -> Result<String, ApiError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: subject,
            iat,
            exp: iat + self.ttl_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(ApiError::from)
    }

    /// Checks signature and expiry. Does NOT check password freshness; that
    /// needs the subject record and lives in the auth guard.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;
        Ok(data.claims)
    }

    /// 32 random bytes; the caller persists `hash` + `expires_at` and mails
    /// the plaintext. A new token overwrites any outstanding one.
    pub fn new_reset_token(&self) -> ResetToken {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        ResetToken {
            hash: Self::hash_reset_token(&plaintext),
            plaintext,
            expires_at: Utc::now() + Duration::seconds(self.reset_ttl_secs),
        }
    }

    pub fn hash_reset_token(plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// `Set-Cookie` value carrying the session token. HttpOnly always,
    /// Secure outside development.
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, self.ttl_secs)
    }

    /// Overwrites the session cookie with a short-lived placeholder.
    pub fn logout_cookie(&self) -> String {
        self.cookie("loggedout", 10)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name, value, max_age
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
