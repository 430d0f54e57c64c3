//! LDAP backend built on the `ldap3` async client.
//!
//! Each [`connect`](DirectoryGateway::connect) opens a fresh connection,
//! spawns its driver on the tokio runtime and performs a simple bind with the
//! configured service account. Result codes are mapped onto
//! [`DirectoryError`] so callers see the same conditions as with the
//! in-memory backend.

use crate::config::DirectoryConfig;
use crate::directory::{
    AttributeMod, AttributeSet, BindError, DirectoryEntry, DirectoryError, DirectoryGateway,
    DirectorySession, Filter, SearchScope,
};
use ldap3::{Ldap, LdapConnAsync, LdapResult, Mod, Scope, SearchEntry, SearchResult};
use log::{debug, warn};
use std::collections::HashSet;

/// Gateway to a real directory server.
#[derive(Debug, Clone)]
pub struct LdapGateway {
    config: DirectoryConfig,
}

impl LdapGateway {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }
}

fn check(result: LdapResult, target: &str) -> Result<(), DirectoryError> {
    if result.rc == 0 {
        Ok(())
    } else {
        Err(DirectoryError::from_result_code(result.rc, target, result.text))
    }
}

fn transport(e: ldap3::LdapError) -> DirectoryError {
    DirectoryError::Transport(e.to_string())
}

fn value_set(values: Vec<String>) -> HashSet<String> {
    values.into_iter().collect()
}

impl DirectoryGateway for LdapGateway {
    type Session = LdapSession;

    async fn connect(&self) -> Result<LdapSession, BindError> {
        let url = &self.config.url;
        debug!("Connecting to directory at {}", url);

        let (conn, mut ldap) = LdapConnAsync::new(url)
            .await
            .map_err(|e| BindError::unreachable(url, e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("Directory connection driver error: {}", e);
            }
        });

        let bind_dn = &self.config.bind_dn;
        let result = ldap
            .simple_bind(bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| BindError::unreachable(url, e.to_string()))?;
        if result.rc != 0 {
            return Err(BindError::rejected(
                bind_dn,
                format!("code {}: {}", result.rc, result.text),
            ));
        }

        Ok(LdapSession { ldap })
    }
}

/// A bound `ldap3` connection.
///
/// Multi-valued attributes travel as sets, so the server decides the order
/// in which values come back.
pub struct LdapSession {
    ldap: Ldap,
}

impl DirectorySession for LdapSession {
    async fn search(
        &self,
        base: &str,
        filter: &Filter,
        scope: SearchScope,
        attributes: Option<&[&str]>,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let scope = match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        };
        let attributes: Vec<String> = match attributes {
            Some(names) => names.iter().map(|name| name.to_string()).collect(),
            None => vec!["*".to_string()],
        };

        let mut ldap = self.ldap.clone();
        let SearchResult(entries, result) = ldap
            .search(base, scope, &filter.to_string(), attributes)
            .await
            .map_err(transport)?;
        check(result, base)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry::new(entry.dn, entry.attrs))
            .collect())
    }

    async fn add(&self, dn: &str, attributes: AttributeSet) -> Result<(), DirectoryError> {
        let attributes: Vec<(String, HashSet<String>)> = attributes
            .into_iter()
            .map(|(name, values)| (name, value_set(values)))
            .collect();
        let mut ldap = self.ldap.clone();
        let result = ldap.add(dn, attributes).await.map_err(transport)?;
        check(result, dn)
    }

    async fn modify(&self, dn: &str, mods: Vec<AttributeMod>) -> Result<(), DirectoryError> {
        let mods: Vec<Mod<String>> = mods
            .into_iter()
            .map(|change| match change {
                AttributeMod::Add(name, values) => Mod::Add(name, value_set(values)),
                AttributeMod::Replace(name, values) => Mod::Replace(name, value_set(values)),
                AttributeMod::Delete(name, values) => Mod::Delete(name, value_set(values)),
            })
            .collect();
        let mut ldap = self.ldap.clone();
        let result = ldap.modify(dn, mods).await.map_err(transport)?;
        check(result, dn)
    }

    async fn delete(&self, dn: &str) -> Result<(), DirectoryError> {
        let mut ldap = self.ldap.clone();
        let result = ldap.delete(dn).await.map_err(transport)?;
        check(result, dn)
    }
}
