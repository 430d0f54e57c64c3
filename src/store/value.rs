//! Key/value settings.
//!
//! Each setting is one entry `cn=<key>,ou=values,<root>` holding its value
//! in `description`. Empty values are not representable in the directory
//! and are rejected before any request is made.

use crate::config::StoreConfig;
use crate::directory::dn::{VALUE_RDN_ATTRIBUTE, VALUES_CONTAINER};
use crate::directory::{
    AttributeMod, AttributeSet, DirectoryError, DirectoryGateway, DirectorySession, Filter, Naming,
    SearchScope,
};
use crate::error::StoreResult;
use crate::store::{CONTAINER_OBJECT_CLASSES, ensure_container};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Attribute carrying the value of a setting.
pub const VALUE_ATTRIBUTE: &str = "description";

const VALUE_OBJECT_CLASSES: &[&str] = &["top", "applicationProcess"];

pub struct ValueStore<G> {
    gateway: G,
    naming: Naming,
}

impl<G: DirectoryGateway> ValueStore<G> {
    pub fn new(gateway: G, config: &StoreConfig) -> Self {
        Self {
            gateway,
            naming: config.naming(),
        }
    }

    async fn read(&self, session: &G::Session, key: &str) -> Result<Option<String>, DirectoryError> {
        let entry = session
            .read(&self.naming.value_dn(key), Some(&[VALUE_ATTRIBUTE]))
            .await?;
        Ok(entry.and_then(|entry| entry.first(VALUE_ATTRIBUTE).map(str::to_string)))
    }

    /// Lookup failures read as absent.
    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        debug!("Checking existence of value '{}'", key);
        let session = self.gateway.connect().await?;
        Ok(match self.read(&session, key).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                debug!("Lookup of value '{}' failed, treating as absent: {}", key, e);
                false
            }
        })
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        debug!("Getting value '{}'", key);
        let session = self.gateway.connect().await?;
        Ok(self.read(&session, key).await?)
    }

    /// Create or overwrite a setting. Returns false for an empty value or
    /// when the directory refuses the write.
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<bool> {
        if value.is_empty() {
            warn!("Refusing to store empty value for '{}'", key);
            return Ok(false);
        }
        info!("Setting value '{}'", key);
        let session = self.gateway.connect().await?;

        if let Err(e) = ensure_container(
            &session,
            &self.naming.values_dn(),
            VALUES_CONTAINER,
            CONTAINER_OBJECT_CLASSES,
            AttributeSet::new(),
        )
        .await
        {
            warn!("Failed to create values container: {}", e);
            return Ok(false);
        }

        let dn = self.naming.value_dn(key);
        let exists = session.read(&dn, Some(&[VALUE_RDN_ATTRIBUTE])).await;
        let outcome = match exists {
            Ok(Some(_)) => {
                session
                    .modify(
                        &dn,
                        vec![AttributeMod::Replace(
                            VALUE_ATTRIBUTE.to_string(),
                            vec![value.to_string()],
                        )],
                    )
                    .await
            }
            Ok(None) => {
                let mut attributes = AttributeSet::new();
                attributes.insert(
                    "objectClass".to_string(),
                    VALUE_OBJECT_CLASSES.iter().map(|c| c.to_string()).collect(),
                );
                attributes.insert(VALUE_RDN_ATTRIBUTE.to_string(), vec![key.to_string()]);
                attributes.insert(VALUE_ATTRIBUTE.to_string(), vec![value.to_string()]);
                session.add(&dn, attributes).await
            }
            Err(e) => Err(e),
        };

        Ok(match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to set value '{}': {}", key, e);
                false
            }
        })
    }

    /// Remove a setting. A missing key counts as success only when
    /// `success_if_missing` is set.
    pub async fn unset(&self, key: &str, success_if_missing: bool) -> StoreResult<bool> {
        info!("Unsetting value '{}'", key);
        let session = self.gateway.connect().await?;

        Ok(match session.delete(&self.naming.value_dn(key)).await {
            Ok(()) => true,
            Err(DirectoryError::NoSuchObject { .. }) => success_if_missing,
            Err(e) => {
                warn!("Failed to unset value '{}': {}", key, e);
                false
            }
        })
    }

    /// Every setting. A missing container is an empty map.
    pub async fn get_all(&self) -> StoreResult<BTreeMap<String, String>> {
        debug!("Listing all values");
        let session = self.gateway.connect().await?;

        let entries = match session
            .search(
                &self.naming.values_dn(),
                &Filter::present(VALUE_RDN_ATTRIBUTE),
                SearchScope::OneLevel,
                Some(&[VALUE_RDN_ATTRIBUTE, VALUE_ATTRIBUTE]),
            )
            .await
        {
            Ok(entries) => entries,
            Err(DirectoryError::NoSuchObject { .. }) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let key = entry.first(VALUE_RDN_ATTRIBUTE)?;
                let value = entry.first(VALUE_ATTRIBUTE)?;
                Some((key.to_string(), value.to_string()))
            })
            .collect())
    }
}
