//! In-memory directory backend.
//!
//! A thread-safe tree of entries keyed by normalised DN, behaving like a
//! directory server for the operations the stores use:
//!
//! * adds require an existing parent and a free DN
//! * deletes only remove leaves
//! * modifies are applied atomically, with value-level add/delete errors
//! * searches honour base, one-level and subtree scopes
//!
//! The backend can be switched to "unavailable" to exercise the fatal bind
//! path, and it counts binds so tests can assert connection usage.
//!
//! # Example Usage
//!
//! ```rust
//! use directory_store::directory::{DirectoryGateway, DirectorySession, InMemoryDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new("dc=example");
//! directory.set_unavailable(true);
//! assert!(directory.connect().await.is_err());
//!
//! directory.set_unavailable(false);
//! let session = directory.connect().await?;
//! assert!(session.read("dc=example", None).await?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::directory::{
    AttributeMod, AttributeSet, BindError, DirectoryEntry, DirectoryError, DirectoryGateway,
    DirectorySession, Filter, SearchScope,
};
use log::trace;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Split a DN into its parent, honouring escaped commas.
fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(dn[i + 1..].trim_start()),
            _ => escaped = false,
        }
    }
    None
}

fn normalize(dn: &str) -> String {
    dn.trim().to_ascii_lowercase()
}

/// Find the stored key of an attribute, ignoring case.
fn attribute_key(attributes: &HashMap<String, Vec<String>>, name: &str) -> Option<String> {
    attributes
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
}

fn project(entry: &DirectoryEntry, attributes: Option<&[&str]>) -> DirectoryEntry {
    match attributes {
        None => entry.clone(),
        Some(wanted) if wanted.contains(&"*") => entry.clone(),
        Some(wanted) => DirectoryEntry {
            dn: entry.dn.clone(),
            attributes: entry
                .attributes
                .iter()
                .filter(|(name, _)| wanted.iter().any(|w| w.eq_ignore_ascii_case(name)))
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect(),
        },
    }
}

fn apply_mod(
    attributes: &mut HashMap<String, Vec<String>>,
    change: AttributeMod,
) -> Result<(), DirectoryError> {
    match change {
        AttributeMod::Add(name, values) => {
            let key = attribute_key(attributes, &name).unwrap_or(name);
            let current = attributes.entry(key.clone()).or_default();
            for value in values {
                if current.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                    return Err(DirectoryError::AttributeOrValueExists {
                        attribute: key,
                        value,
                    });
                }
                current.push(value);
            }
        }
        AttributeMod::Replace(name, values) => {
            if let Some(key) = attribute_key(attributes, &name) {
                attributes.remove(&key);
            }
            if !values.is_empty() {
                attributes.insert(name, values);
            }
        }
        AttributeMod::Delete(name, values) => {
            let key = attribute_key(attributes, &name)
                .ok_or_else(|| DirectoryError::NoSuchAttribute {
                    attribute: name.clone(),
                })?;
            if values.is_empty() {
                attributes.remove(&key);
                return Ok(());
            }
            let current = attributes.get_mut(&key).ok_or_else(|| {
                DirectoryError::NoSuchAttribute {
                    attribute: name.clone(),
                }
            })?;
            for value in values {
                let position = current
                    .iter()
                    .position(|v| v.eq_ignore_ascii_case(&value))
                    .ok_or_else(|| DirectoryError::NoSuchAttribute {
                        attribute: format!("{}={}", name, value),
                    })?;
                current.remove(position);
            }
            if current.is_empty() {
                attributes.remove(&key);
            }
        }
    }
    Ok(())
}

type EntryTree = BTreeMap<String, DirectoryEntry>;

/// Thread-safe in-memory directory.
///
/// Cloning shares the same tree, so a clone handed to a store sees the same
/// data as the one kept by a test.
#[derive(Clone)]
pub struct InMemoryDirectory {
    root_dn: String,
    entries: Arc<RwLock<EntryTree>>,
    unavailable: Arc<AtomicBool>,
    binds: Arc<AtomicUsize>,
}

impl InMemoryDirectory {
    /// Create a directory containing only the root entry.
    pub fn new(root_dn: impl Into<String>) -> Self {
        let root_dn = root_dn.into();
        let mut attributes = HashMap::new();
        attributes.insert(
            "objectClass".to_string(),
            vec!["top".to_string(), "domain".to_string()],
        );
        let mut entries = BTreeMap::new();
        entries.insert(normalize(&root_dn), DirectoryEntry::new(&root_dn, attributes));

        Self {
            root_dn,
            entries: Arc::new(RwLock::new(entries)),
            unavailable: Arc::new(AtomicBool::new(false)),
            binds: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn root_dn(&self) -> &str {
        &self.root_dn
    }

    /// Make every subsequent bind fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fetch an entry directly, bypassing sessions.
    pub async fn entry(&self, dn: &str) -> Option<DirectoryEntry> {
        self.entries.read().await.get(&normalize(dn)).cloned()
    }

    /// Statistics for tests and debugging.
    pub async fn stats(&self) -> InMemoryDirectoryStats {
        InMemoryDirectoryStats {
            entry_count: self.entries.read().await.len(),
            bind_count: self.binds.load(Ordering::SeqCst),
        }
    }
}

impl DirectoryGateway for InMemoryDirectory {
    type Session = InMemorySession;

    async fn connect(&self) -> Result<InMemorySession, BindError> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BindError::unreachable(
                format!("memory:///{}", self.root_dn),
                "directory is marked unavailable",
            ));
        }
        Ok(InMemorySession {
            entries: Arc::clone(&self.entries),
        })
    }
}

/// A session on an [`InMemoryDirectory`].
pub struct InMemorySession {
    entries: Arc<RwLock<EntryTree>>,
}

impl DirectorySession for InMemorySession {
    async fn search(
        &self,
        base: &str,
        filter: &Filter,
        scope: SearchScope,
        attributes: Option<&[&str]>,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let entries = self.entries.read().await;
        let base_key = normalize(base);
        if !entries.contains_key(&base_key) {
            return Err(DirectoryError::no_such_object(base));
        }
        let subtree_suffix = format!(",{}", base_key);

        let found: Vec<DirectoryEntry> = entries
            .iter()
            .filter(|(key, _)| match scope {
                SearchScope::Base => **key == base_key,
                SearchScope::OneLevel => {
                    parent_dn(key).is_some_and(|parent| parent == base_key)
                }
                SearchScope::Subtree => **key == base_key || key.ends_with(&subtree_suffix),
            })
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| project(entry, attributes))
            .collect();

        trace!("search {} {} {:?}: {} entries", base, filter, scope, found.len());
        Ok(found)
    }

    async fn add(&self, dn: &str, attributes: AttributeSet) -> Result<(), DirectoryError> {
        let mut entries = self.entries.write().await;
        let key = normalize(dn);
        if entries.contains_key(&key) {
            return Err(DirectoryError::already_exists(dn));
        }
        let parent = parent_dn(&key).ok_or_else(|| DirectoryError::no_such_object(dn))?;
        if !entries.contains_key(parent) {
            return Err(DirectoryError::no_such_object(parent));
        }
        if let Some((name, _)) = attributes.iter().find(|(_, values)| values.is_empty()) {
            return Err(DirectoryError::operation(
                21,
                format!("attribute '{}' has no values", name),
            ));
        }

        entries.insert(
            key,
            DirectoryEntry::new(dn, attributes.into_iter().collect()),
        );
        Ok(())
    }

    async fn modify(&self, dn: &str, mods: Vec<AttributeMod>) -> Result<(), DirectoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&normalize(dn))
            .ok_or_else(|| DirectoryError::no_such_object(dn))?;

        // Apply to a copy so a failing change leaves the entry untouched.
        let mut attributes = entry.attributes.clone();
        for change in mods {
            apply_mod(&mut attributes, change)?;
        }
        entry.attributes = attributes;
        Ok(())
    }

    async fn delete(&self, dn: &str) -> Result<(), DirectoryError> {
        let mut entries = self.entries.write().await;
        let key = normalize(dn);
        if !entries.contains_key(&key) {
            return Err(DirectoryError::no_such_object(dn));
        }
        let has_children = entries
            .keys()
            .any(|other| parent_dn(other).is_some_and(|parent| parent == key));
        if has_children {
            return Err(DirectoryError::NotAllowedOnNonLeaf { dn: dn.to_string() });
        }
        entries.remove(&key);
        Ok(())
    }
}

/// Statistics about an in-memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryDirectoryStats {
    /// Number of entries, including the root
    pub entry_count: usize,
    /// Number of bind attempts so far, successful or not
    pub bind_count: usize,
}
