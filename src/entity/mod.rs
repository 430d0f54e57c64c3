//! Typed records and their directory mapping.
//!
//! An entity type implements [`DirectoryEntity`]: it names its identifier
//! type, its type name (from which the container name is derived) and its
//! static [`AttributeSchema`]. The [`codec`] module converts between entities
//! and directory attribute sets using that table.
//!
//! Two record types ship with the crate: [`Student`] (numeric identifier)
//! and [`Employee`] (login name as identifier).

pub mod codec;
pub mod employee;
pub mod schema;
pub mod student;

pub use codec::{DecodeError, decode, diff, encode};
pub use employee::Employee;
pub use schema::{AttributeSchema, FieldMapping, Target, ValueAccess};
pub use student::Student;

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

/// Identifier of an entity within its container.
pub trait EntityId: Display + FromStr + Debug + Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> EntityId for T where T: Display + FromStr + Debug + Clone + Eq + Hash + Send + Sync + 'static {}

/// A record type persisted as directory entries.
pub trait DirectoryEntity: Default + Clone + Debug + PartialEq + Send + Sync + 'static {
    type Id: EntityId;

    /// Type name, e.g. `"Student"`.
    const TYPE_NAME: &'static str;

    /// The attribute table, declared once per type.
    fn schema() -> &'static AttributeSchema<Self>;

    fn id(&self) -> Self::Id;

    /// Container holding entries of this type: the pluralised lowercase
    /// type name.
    fn container() -> String {
        pluralize(&Self::TYPE_NAME.to_ascii_lowercase())
    }
}

/// English plural of a lowercase noun, enough for type names.
pub fn pluralize(noun: &str) -> String {
    let consonant_y = noun.len() > 1
        && noun.ends_with('y')
        && !noun[..noun.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);
    if consonant_y {
        format!("{}ies", &noun[..noun.len() - 1])
    } else if noun.ends_with(['s', 'x', 'z']) || noun.ends_with("ch") || noun.ends_with("sh") {
        format!("{}es", noun)
    } else {
        format!("{}s", noun)
    }
}
