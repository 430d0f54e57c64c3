//! Immutable configuration threaded into stores and the authenticator.
//!
//! Configuration is plain data: it can be built in code with the `with_*`
//! methods or deserialised from JSON. Missing fields fall back to defaults.
//!
//! ```rust
//! use directory_store::config::StoreConfig;
//!
//! let config = StoreConfig::from_json(r#"{
//!     "directory": { "root_dn": "dc=school,dc=example" },
//!     "auth": { "default_admin_name": "root" }
//! }"#).unwrap();
//!
//! assert_eq!(config.directory.root_dn, "dc=school,dc=example");
//! assert_eq!(config.auth.default_admin_name, "root");
//! assert_eq!(config.auth.admin_group, "admin");
//! ```

use crate::directory::Naming;
use serde::{Deserialize, Serialize};

/// Where the directory lives and how to bind to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Server URL, e.g. `ldap://localhost:389`
    pub url: String,
    /// Service account used for every bind
    pub bind_dn: String,
    pub bind_password: String,
    /// Root below which all containers live
    pub root_dn: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            bind_dn: "cn=admin,dc=example,dc=org".to_string(),
            bind_password: String::new(),
            root_dn: "dc=example,dc=org".to_string(),
        }
    }
}

/// Longest session token lifetime accepted, one year.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

/// Authentication policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Login name of the built-in administrator
    pub default_admin_name: String,
    /// Group whose employee members may log in
    pub admin_group: String,
    /// Group whose members are refused
    pub inactive_group: String,
    /// Issuer name placed into session tokens
    pub token_issuer: String,
    /// Lifetime of a session token, renewed on every authenticated call
    pub token_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_admin_name: "admin".to_string(),
            admin_group: "admin".to_string(),
            inactive_group: "inactive".to_string(),
            token_issuer: "directory-store".to_string(),
            token_lifetime_secs: 15 * 60,
        }
    }
}

impl AuthConfig {
    /// Token lifetime, capped at [`MAX_TOKEN_LIFETIME_SECS`].
    pub fn token_lifetime(&self) -> chrono::Duration {
        let secs = self.token_lifetime_secs.min(MAX_TOKEN_LIFETIME_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

/// Group membership representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Multi-valued attribute listing member identifiers
    pub membership_attribute: String,
    /// Placeholder member keeping the attribute non-empty
    pub sentinel_member: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            membership_attribute: "memberUid".to_string(),
            sentinel_member: "__none__".to_string(),
        }
    }
}

/// Complete store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub directory: DirectoryConfig,
    pub auth: AuthConfig,
    pub groups: GroupConfig,
}

impl StoreConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        if config.auth.token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS {
            log::warn!(
                "Token lifetime of {}s capped at {}s",
                config.auth.token_lifetime_secs,
                MAX_TOKEN_LIFETIME_SECS
            );
            config.auth.token_lifetime_secs = MAX_TOKEN_LIFETIME_SECS;
        }
        Ok(config)
    }

    pub fn with_root_dn(mut self, root_dn: impl Into<String>) -> Self {
        self.directory.root_dn = root_dn.into();
        self
    }

    pub fn with_bind(mut self, bind_dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.directory.bind_dn = bind_dn.into();
        self.directory.bind_password = password.into();
        self
    }

    pub fn with_default_admin(mut self, name: impl Into<String>) -> Self {
        self.auth.default_admin_name = name.into();
        self
    }

    pub fn with_token_lifetime_secs(mut self, secs: u64) -> Self {
        self.auth.token_lifetime_secs = secs.min(MAX_TOKEN_LIFETIME_SECS);
        self
    }

    /// DN builder for the configured root.
    pub fn naming(&self) -> Naming {
        Naming::new(&self.directory.root_dn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = StoreConfig::from_json(r#"{"groups": {"sentinel_member": "-"}}"#).unwrap();
        assert_eq!(config.groups.sentinel_member, "-");
        assert_eq!(config.groups.membership_attribute, "memberUid");
        assert_eq!(config.directory, DirectoryConfig::default());
    }

    #[test]
    fn test_builder_methods() {
        let config = StoreConfig::default()
            .with_root_dn("dc=school")
            .with_bind("cn=svc,dc=school", "secret")
            .with_token_lifetime_secs(60);
        assert_eq!(config.naming().root_dn(), "dc=school");
        assert_eq!(config.directory.bind_password, "secret");
        assert_eq!(config.auth.token_lifetime(), chrono::Duration::seconds(60));
    }

    #[test]
    fn test_token_lifetime_is_capped() {
        let json = r#"{"auth": {"token_lifetime_secs": 18446744073709551615}}"#;
        let config = StoreConfig::from_json(json).unwrap();
        assert_eq!(config.auth.token_lifetime_secs, MAX_TOKEN_LIFETIME_SECS);

        let config = StoreConfig::default().with_token_lifetime_secs(10_000_000_000_000);
        assert_eq!(config.auth.token_lifetime_secs, MAX_TOKEN_LIFETIME_SECS);

        let unchecked = AuthConfig {
            token_lifetime_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(
            unchecked.token_lifetime(),
            chrono::Duration::seconds(MAX_TOKEN_LIFETIME_SECS as i64)
        );
    }
}
