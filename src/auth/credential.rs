//! Salted SHA-512 password credentials.
//!
//! The text form is the one directory servers accept in `userPassword`:
//!
//! ```text
//! {SSHA512}<radix64(sha512(password ++ salt) ++ salt)>
//! ```
//!
//! Radix-64 here is base64 over the crypt(3) alphabet `./0-9A-Za-z` without
//! padding: three bytes become four symbols, a trailing single byte two
//! symbols and two trailing bytes three symbols.
//!
//! # Example Usage
//!
//! ```rust
//! use directory_store::auth::Credential;
//!
//! let stored = Credential::encode("correct horse").to_string();
//! assert!(stored.starts_with("{SSHA512}"));
//!
//! let credential: Credential = stored.parse().unwrap();
//! assert!(credential.check_password("correct horse"));
//! assert!(!credential.check_password("battery staple"));
//! ```

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rand::RngCore;
use sha2::{Digest, Sha512};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Scheme tag prefixed to the encoded credential.
pub const SCHEME: &str = "{SSHA512}";

/// Length of a SHA-512 digest.
pub const HASH_LEN: usize = 64;

/// Salt length of newly encoded credentials.
pub const SALT_LEN: usize = 16;

const RADIX64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::CRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// A stored credential that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Unsupported credential scheme in '{0}'")]
    UnknownScheme(String),

    #[error("Credential is not valid radix-64: {0}")]
    InvalidEncoding(String),

    #[error("Credential holds {length} bytes, at least 64 required")]
    TooShort { length: usize },
}

/// Radix-64 encode `bytes`.
pub fn radix64_encode(bytes: &[u8]) -> String {
    RADIX64.encode(bytes)
}

/// Decode radix-64 text produced by [`radix64_encode`].
pub fn radix64_decode(text: &str) -> Result<Vec<u8>, CredentialError> {
    RADIX64
        .decode(text)
        .map_err(|e| CredentialError::InvalidEncoding(e.to_string()))
}

fn digest(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// A salted SHA-512 hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    hash: [u8; HASH_LEN],
    salt: Vec<u8>,
}

impl Credential {
    /// Hash `password` with a fresh random salt.
    pub fn encode(password: &str) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::with_salt(password, salt)
    }

    /// Hash `password` with the given salt.
    pub fn with_salt(password: &str, salt: impl Into<Vec<u8>>) -> Self {
        let salt = salt.into();
        Self {
            hash: digest(password, &salt),
            salt,
        }
    }

    pub fn hash(&self) -> &[u8; HASH_LEN] {
        &self.hash
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Compare in constant time against the hash of `password`.
    pub fn check_password(&self, password: &str) -> bool {
        digest(password, &self.salt).ct_eq(&self.hash).into()
    }

    /// Whether a stored value looks like an encoded credential rather than
    /// a plain password.
    pub fn is_encoded(value: &str) -> bool {
        value
            .get(..SCHEME.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("salt_len", &self.salt.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = Vec::with_capacity(HASH_LEN + self.salt.len());
        bytes.extend_from_slice(&self.hash);
        bytes.extend_from_slice(&self.salt);
        write!(f, "{}{}", SCHEME, radix64_encode(&bytes))
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_encoded(s) {
            // Never echo a value without a scheme tag, it may be a password.
            let scheme = match s.split_once('}') {
                Some((scheme, _)) if scheme.starts_with('{') => format!("{}}}", scheme),
                _ => "<none>".to_string(),
            };
            return Err(CredentialError::UnknownScheme(scheme));
        }
        let bytes = radix64_decode(&s[SCHEME.len()..])?;
        if bytes.len() < HASH_LEN {
            return Err(CredentialError::TooShort {
                length: bytes.len(),
            });
        }

        let (hash_bytes, salt) = bytes.split_at(HASH_LEN);
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(hash_bytes);
        Ok(Self {
            hash,
            salt: salt.to_vec(),
        })
    }
}
