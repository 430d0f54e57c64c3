//! Session tokens.
//!
//! After a successful login the caller receives a signed token naming the
//! user. The token is short-lived and renewed on every authenticated call.
//! Issuing and verifying is behind the [`TokenIssuer`] trait;
//! [`HmacTokenIssuer`] is the built-in implementation, an HMAC-SHA512 over
//! the JSON claims:
//!
//! ```text
//! base64url(claims json) "." base64url(hmac-sha512(key, first part))
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// Token failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signature does not match")]
    InvalidSignature,

    #[error("Token for '{subject}' has expired")]
    Expired { subject: String },

    #[error("Token issued by '{found}', expected '{expected}'")]
    WrongIssuer { expected: String, found: String },

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    /// Claims valid from now for `lifetime`, at whole-second precision.
    ///
    /// Expiry saturates at the latest representable instant.
    pub fn new(subject: impl Into<String>, issuer: impl Into<String>, lifetime: Duration) -> Self {
        let issued_at = Utc::now().trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .trunc_subsecs(0);
        Self {
            subject: subject.into(),
            issuer: issuer.into(),
            issued_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Signs and checks session tokens.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError>;

    /// Check signature, issuer and expiry, returning the claims.
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HMAC-SHA512 signed tokens.
pub struct HmacTokenIssuer {
    key: Vec<u8>,
    issuer: String,
}

impl HmacTokenIssuer {
    pub fn new(key: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            issuer: issuer.into(),
        }
    }

    /// An issuer with a random 64-byte key; tokens do not survive a
    /// restart.
    pub fn with_random_key(issuer: impl Into<String>) -> Self {
        use rand::RngCore;
        let mut key = vec![0u8; 64];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key, issuer)
    }

    fn mac(&self, payload: &str) -> Result<HmacSha512, TokenError> {
        let mut mac = HmacSha512::new_from_slice(&self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

impl fmt::Debug for HmacTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacTokenIssuer")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer for HmacTokenIssuer {
    fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|e| TokenError::Signing(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| TokenError::Malformed("missing signature".to_string()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let claims: TokenClaims =
            serde_json::from_slice(&json).map_err(|e| TokenError::Malformed(e.to_string()))?;

        if claims.issuer != self.issuer {
            return Err(TokenError::WrongIssuer {
                expected: self.issuer.clone(),
                found: claims.issuer,
            });
        }
        if claims.is_expired() {
            return Err(TokenError::Expired {
                subject: claims.subject,
            });
        }
        Ok(claims)
    }
}
