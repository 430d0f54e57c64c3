//! Distinguished name construction.
//!
//! Every record kind lives at a fixed place below the configured root:
//!
//! - entities: `uid=<id>,ou=<container>,<root>`
//! - groups: `ou=<name>,<root>`
//! - settings: `cn=<key>,ou=values,<root>`

/// Naming attribute of entity entries.
pub const ENTITY_RDN_ATTRIBUTE: &str = "uid";
/// Naming attribute of containers and groups.
pub const CONTAINER_RDN_ATTRIBUTE: &str = "ou";
/// Naming attribute of settings entries.
pub const VALUE_RDN_ATTRIBUTE: &str = "cn";
/// Container holding the settings entries.
pub const VALUES_CONTAINER: &str = "values";

/// Escape an RDN attribute value (RFC 4514 section 2.4).
pub fn escape_rdn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Builds DNs below a fixed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    root_dn: String,
}

impl Naming {
    pub fn new(root_dn: impl Into<String>) -> Self {
        Self {
            root_dn: root_dn.into(),
        }
    }

    pub fn root_dn(&self) -> &str {
        &self.root_dn
    }

    /// DN of an entity container, e.g. `ou=students,<root>`.
    pub fn container_dn(&self, container: &str) -> String {
        format!(
            "{}={},{}",
            CONTAINER_RDN_ATTRIBUTE,
            escape_rdn_value(container),
            self.root_dn
        )
    }

    /// DN of one entity inside its container.
    pub fn entity_dn(&self, container: &str, id: &str) -> String {
        format!(
            "{}={},{}",
            ENTITY_RDN_ATTRIBUTE,
            escape_rdn_value(id),
            self.container_dn(container)
        )
    }

    /// DN of a group. Groups share the container naming scheme.
    pub fn group_dn(&self, name: &str) -> String {
        self.container_dn(name)
    }

    /// DN of the settings container.
    pub fn values_dn(&self) -> String {
        self.container_dn(VALUES_CONTAINER)
    }

    /// DN of one settings entry.
    pub fn value_dn(&self, key: &str) -> String {
        format!(
            "{}={},{}",
            VALUE_RDN_ATTRIBUTE,
            escape_rdn_value(key),
            self.values_dn()
        )
    }
}
