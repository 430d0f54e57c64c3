//! Directory-level error types.
//!
//! These errors describe failures of the directory itself, independent of
//! the records stored in it. Result codes follow the LDAP numbering so the
//! in-memory backend and the ldap3 backend report the same conditions.

use thiserror::Error;

/// Failure to open or authenticate a directory connection.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// The server could not be reached.
    #[error("Cannot reach directory at {url}: {message}")]
    Unreachable { url: String, message: String },

    /// The server refused the bind credentials.
    #[error("Bind rejected for '{dn}': {message}")]
    Rejected { dn: String, message: String },
}

impl BindError {
    pub fn unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn rejected(dn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            dn: dn.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single search, add, modify or delete request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Result code 32: the addressed entry (or the search base) does not exist.
    #[error("No such object: {dn}")]
    NoSuchObject { dn: String },

    /// Result code 68: an entry with this DN already exists.
    #[error("Entry already exists: {dn}")]
    AlreadyExists { dn: String },

    /// Result code 20: the value being added is already present.
    #[error("Attribute '{attribute}' already has value '{value}'")]
    AttributeOrValueExists { attribute: String, value: String },

    /// Result code 16: the attribute or value being deleted is not present.
    #[error("No such attribute value: {attribute}")]
    NoSuchAttribute { attribute: String },

    /// Result code 66: deleting an entry that still has children.
    #[error("Entry has children and cannot be deleted: {dn}")]
    NotAllowedOnNonLeaf { dn: String },

    /// Any other non-zero result code.
    #[error("Directory operation failed with code {code}: {message}")]
    Operation { code: u32, message: String },

    /// The request never produced a result (connection dropped, protocol error).
    #[error("Directory transport error: {0}")]
    Transport(String),
}

impl DirectoryError {
    pub fn no_such_object(dn: impl Into<String>) -> Self {
        Self::NoSuchObject { dn: dn.into() }
    }

    pub fn already_exists(dn: impl Into<String>) -> Self {
        Self::AlreadyExists { dn: dn.into() }
    }

    pub fn operation(code: u32, message: impl Into<String>) -> Self {
        Self::Operation {
            code,
            message: message.into(),
        }
    }

    /// Map an LDAP result code onto the error taxonomy.
    ///
    /// `target` names the DN or attribute the request addressed.
    pub fn from_result_code(code: u32, target: &str, message: impl Into<String>) -> Self {
        match code {
            16 => Self::NoSuchAttribute {
                attribute: target.to_string(),
            },
            20 => Self::AttributeOrValueExists {
                attribute: target.to_string(),
                value: message.into(),
            },
            32 => Self::no_such_object(target),
            66 => Self::NotAllowedOnNonLeaf {
                dn: target.to_string(),
            },
            68 => Self::already_exists(target),
            _ => Self::operation(code, message),
        }
    }

    /// The LDAP result code this error corresponds to.
    pub fn result_code(&self) -> Option<u32> {
        match self {
            Self::NoSuchAttribute { .. } => Some(16),
            Self::AttributeOrValueExists { .. } => Some(20),
            Self::NoSuchObject { .. } => Some(32),
            Self::NotAllowedOnNonLeaf { .. } => Some(66),
            Self::AlreadyExists { .. } => Some(68),
            Self::Operation { code, .. } => Some(*code),
            Self::Transport(_) => None,
        }
    }
}
