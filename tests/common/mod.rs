//! Shared fixtures for the integration tests.
//!
//! Every test builds its own [`InMemoryDirectory`], so tests never share
//! state and can run in parallel.

#![allow(dead_code)]

use chrono::Utc;
use directory_store::auth::{TokenClaims, TokenError, TokenIssuer};
use directory_store::entity::{Employee, Student};
use directory_store::{EntityStore, GroupStore, InMemoryDirectory, StoreConfig, ValueStore};
use std::collections::HashMap;
use std::sync::Mutex;

pub const ROOT: &str = "dc=school,dc=example";

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config() -> StoreConfig {
    StoreConfig::default().with_root_dn(ROOT)
}

pub fn directory() -> InMemoryDirectory {
    init_logging();
    InMemoryDirectory::new(ROOT)
}

pub fn student_store(
    directory: &InMemoryDirectory,
) -> EntityStore<InMemoryDirectory, Student> {
    EntityStore::new(directory.clone(), &config())
}

pub fn employee_store(
    directory: &InMemoryDirectory,
) -> EntityStore<InMemoryDirectory, Employee> {
    EntityStore::new(directory.clone(), &config())
}

pub fn group_store(directory: &InMemoryDirectory) -> GroupStore<InMemoryDirectory> {
    GroupStore::new(directory.clone(), &config())
}

pub fn value_store(directory: &InMemoryDirectory) -> ValueStore<InMemoryDirectory> {
    ValueStore::new(directory.clone(), &config())
}

pub fn student(id: u32) -> Student {
    Student {
        id,
        first_name: Some(format!("Pupil{}", id)),
        last_name: Some("Example".to_string()),
        display_name: Some(format!("Pupil{} Example", id)),
        email: Some(format!("pupil{}@school.example", id)),
        class_name: Some("7a".to_string()),
        year: Some(7),
        note: None,
        photo_consent: id % 2 == 0,
        has_laptop: true,
        special_needs: false,
    }
}

pub fn employee(id: &str) -> Employee {
    Employee {
        id: id.to_string(),
        first_name: Some("Jo".to_string()),
        last_name: Some(id.to_string()),
        email: Some(format!("{}@school.example", id)),
        teacher: true,
        ..Default::default()
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Token issuer that remembers what it issued instead of signing.
///
/// Tokens are `"<subject>#<n>"`; verification only accepts tokens this
/// instance issued and that have not expired.
#[derive(Default)]
pub struct RecordingIssuer {
    issued: Mutex<HashMap<String, TokenClaims>>,
}

impl RecordingIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued_count(&self) -> usize {
        self.issued.lock().unwrap().len()
    }

    pub fn claims(&self, token: &str) -> Option<TokenClaims> {
        self.issued.lock().unwrap().get(token).cloned()
    }
}

impl TokenIssuer for RecordingIssuer {
    fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let mut issued = self.issued.lock().unwrap();
        let token = format!("{}#{}", claims.subject, issued.len() + 1);
        issued.insert(token.clone(), claims.clone());
        Ok(token)
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self
            .claims(token)
            .ok_or_else(|| TokenError::Malformed(format!("unknown token {}", token)))?;
        if claims.is_expired_at(Utc::now()) {
            return Err(TokenError::Expired {
                subject: claims.subject,
            });
        }
        Ok(claims)
    }
}
