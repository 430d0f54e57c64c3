//! Directory gateway abstraction.
//!
//! The directory is an external, hierarchical, attribute-based store. This
//! module defines the narrow surface the record stores need from it:
//!
//! - [`DirectoryGateway`] opens a bound [`DirectorySession`] (connect + bind)
//! - [`DirectorySession`] runs `search`, `add`, `modify` and `delete` against
//!   distinguished names
//!
//! A session is opened per logical unit of work and never shared between
//! callers. Backends:
//!
//! - [`InMemoryDirectory`] for tests and embedded use
//! - `LdapGateway` (feature `ldap`) on top of the `ldap3` client
//!
//! # Example Usage
//!
//! ```rust
//! use directory_store::directory::{
//!     AttributeMod, DirectoryGateway, DirectorySession, Filter, InMemoryDirectory, SearchScope,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new("dc=school,dc=example");
//! let session = directory.connect().await?;
//!
//! session
//!     .add(
//!         "ou=values,dc=school,dc=example",
//!         [("objectClass".to_string(), vec!["organizationalUnit".to_string()])].into(),
//!     )
//!     .await?;
//! session
//!     .modify(
//!         "ou=values,dc=school,dc=example",
//!         vec![AttributeMod::Replace("description".into(), vec!["settings".into()])],
//!     )
//!     .await?;
//!
//! let found = session
//!     .search("dc=school,dc=example", &Filter::Any, SearchScope::OneLevel, None)
//!     .await?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod dn;
pub mod errors;
pub mod in_memory;
#[cfg(feature = "ldap")]
pub mod ldap;

pub use dn::Naming;
pub use errors::{BindError, DirectoryError};
pub use in_memory::{InMemoryDirectory, InMemoryDirectoryStats};
#[cfg(feature = "ldap")]
pub use ldap::{LdapGateway, LdapSession};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;

/// Attribute name to values, as written by add requests.
///
/// Ordered so encoded entities produce deterministic requests.
pub type AttributeSet = BTreeMap<String, Vec<String>>;

/// One entry returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>, attributes: HashMap<String, Vec<String>>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// All values of an attribute. Attribute names match case-insensitively.
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    /// The first value of an attribute.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether the attribute is present with at least one value.
    pub fn has(&self, attribute: &str) -> bool {
        self.values(attribute).is_some_and(|values| !values.is_empty())
    }
}

/// Scope of a search relative to its base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// Direct children of the base entry.
    OneLevel,
    /// The base entry and everything below it.
    Subtree,
}

/// One change inside a modify request.
///
/// `Delete` with an empty value list removes the whole attribute;
/// `Replace` with an empty value list does the same on real servers but is
/// never emitted by the stores, which always delete explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeMod {
    Add(String, Vec<String>),
    Replace(String, Vec<String>),
    Delete(String, Vec<String>),
}

impl AttributeMod {
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add(name, _) | Self::Replace(name, _) | Self::Delete(name, _) => name,
        }
    }
}

/// A write directive addressed to one DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryRequest {
    Add { dn: String, attributes: AttributeSet },
    Modify { dn: String, mods: Vec<AttributeMod> },
    Delete { dn: String },
}

impl DirectoryRequest {
    pub fn dn(&self) -> &str {
        match self {
            Self::Add { dn, .. } | Self::Modify { dn, .. } | Self::Delete { dn } => dn,
        }
    }
}

/// Search filter.
///
/// Rendered to RFC 4515 text by its `Display` impl and evaluated directly by
/// the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every entry: `(objectClass=*)`.
    Any,
    Present(String),
    Equals(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn present(attribute: impl Into<String>) -> Self {
        Self::Present(attribute.into())
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals(attribute.into(), value.into())
    }

    /// Evaluate the filter against an entry.
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::Any => true,
            Self::Present(attribute) => entry.has(attribute),
            Self::Equals(attribute, value) => entry
                .values(attribute)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))),
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
        }
    }
}

/// Escape a filter assertion value (RFC 4515 section 3).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "(objectClass=*)"),
            Self::Present(attribute) => write!(f, "({}=*)", attribute),
            Self::Equals(attribute, value) => {
                write!(f, "({}={})", attribute, escape_filter_value(value))
            }
            Self::And(filters) => {
                write!(f, "(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Self::Or(filters) => {
                write!(f, "(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Opens bound sessions against a directory.
///
/// Implementations hold only immutable connection coordinates; every call
/// to [`connect`](Self::connect) produces an independent session.
pub trait DirectoryGateway: Send + Sync {
    type Session: DirectorySession;

    /// Connect and bind. A failure here is fatal for the caller's whole
    /// unit of work.
    fn connect(&self) -> impl Future<Output = Result<Self::Session, BindError>> + Send;
}

/// A bound directory connection.
pub trait DirectorySession: Send + Sync {
    /// Search below `base`.
    ///
    /// `attributes` restricts the returned attributes; `None` returns all
    /// user attributes. A missing base yields [`DirectoryError::NoSuchObject`].
    fn search(
        &self,
        base: &str,
        filter: &Filter,
        scope: SearchScope,
        attributes: Option<&[&str]>,
    ) -> impl Future<Output = Result<Vec<DirectoryEntry>, DirectoryError>> + Send;

    /// Create an entry. The parent must exist and the DN must be free.
    fn add(
        &self,
        dn: &str,
        attributes: AttributeSet,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Apply attribute changes to an existing entry, atomically.
    fn modify(
        &self,
        dn: &str,
        mods: Vec<AttributeMod>,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Remove a leaf entry.
    fn delete(&self, dn: &str) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Submit a prepared write directive.
    fn submit(
        &self,
        request: DirectoryRequest,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send {
        async move {
            match request {
                DirectoryRequest::Add { dn, attributes } => self.add(&dn, attributes).await,
                DirectoryRequest::Modify { dn, mods } => self.modify(&dn, mods).await,
                DirectoryRequest::Delete { dn } => self.delete(&dn).await,
            }
        }
    }

    /// Read a single entry, `None` if it does not exist.
    fn read(
        &self,
        dn: &str,
        attributes: Option<&[&str]>,
    ) -> impl Future<Output = Result<Option<DirectoryEntry>, DirectoryError>> + Send {
        async move {
            match self.search(dn, &Filter::Any, SearchScope::Base, attributes).await {
                Ok(entries) => Ok(entries.into_iter().next()),
                Err(DirectoryError::NoSuchObject { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}
