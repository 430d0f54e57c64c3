//! Declarative attribute tables.
//!
//! Each entity type declares, once, how its fields map onto directory
//! attributes. A field maps either to its own attribute (text, integer or
//! boolean) or to a named flag inside the type's composite flag attribute.
//! Accessors are plain function pointers, so the table is static data and
//! nothing is discovered at call time.
//!
//! ```rust
//! use directory_store::entity::{AttributeSchema, FieldMapping};
//!
//! #[derive(Default)]
//! struct Room {
//!     number: Option<i64>,
//!     label: Option<String>,
//!     projector: bool,
//! }
//!
//! let schema = AttributeSchema::new(
//!     &["top", "room"],
//!     "businessCategory",
//!     vec![
//!         FieldMapping::integer("number", "roomNumber", |r: &Room| r.number, |r, v| {
//!             r.number = v;
//!             Ok(())
//!         }),
//!         FieldMapping::text("label", "description", |r: &Room| r.label.clone(), |r, v| r.label = v)
//!             .hidden(),
//!         FieldMapping::flag("projector", "projector", |r: &Room| r.projector, |r, v| r.projector = v),
//!     ],
//! );
//!
//! assert_eq!(schema.attribute_names(false), vec!["roomNumber", "businessCategory"]);
//! ```

use std::num::TryFromIntError;

/// Typed accessors of a field stored in its own attribute.
pub enum ValueAccess<T> {
    Text {
        get: fn(&T) -> Option<String>,
        set: fn(&mut T, Option<String>),
    },
    /// Integers travel as `i64`; the setter narrows into the field type.
    Integer {
        get: fn(&T) -> Option<i64>,
        set: fn(&mut T, Option<i64>) -> Result<(), TryFromIntError>,
    },
    Boolean {
        get: fn(&T) -> Option<bool>,
        set: fn(&mut T, Option<bool>),
    },
}

impl<T> ValueAccess<T> {
    /// Name of the semantic type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Integer { .. } => "integer",
            Self::Boolean { .. } => "boolean",
        }
    }
}

/// Where a field is stored.
pub enum Target<T> {
    /// A dedicated attribute.
    Attribute {
        name: &'static str,
        access: ValueAccess<T>,
    },
    /// A flag name inside the composite flag attribute.
    Flag {
        name: &'static str,
        get: fn(&T) -> bool,
        set: fn(&mut T, bool),
    },
}

/// One row of an attribute table.
pub struct FieldMapping<T> {
    field: &'static str,
    hidden: bool,
    target: Target<T>,
}

impl<T> FieldMapping<T> {
    pub fn text(
        field: &'static str,
        attribute: &'static str,
        get: fn(&T) -> Option<String>,
        set: fn(&mut T, Option<String>),
    ) -> Self {
        Self::attribute(field, attribute, ValueAccess::Text { get, set })
    }

    pub fn integer(
        field: &'static str,
        attribute: &'static str,
        get: fn(&T) -> Option<i64>,
        set: fn(&mut T, Option<i64>) -> Result<(), TryFromIntError>,
    ) -> Self {
        Self::attribute(field, attribute, ValueAccess::Integer { get, set })
    }

    pub fn boolean(
        field: &'static str,
        attribute: &'static str,
        get: fn(&T) -> Option<bool>,
        set: fn(&mut T, Option<bool>),
    ) -> Self {
        Self::attribute(field, attribute, ValueAccess::Boolean { get, set })
    }

    pub fn flag(
        field: &'static str,
        flag: &'static str,
        get: fn(&T) -> bool,
        set: fn(&mut T, bool),
    ) -> Self {
        Self {
            field,
            hidden: false,
            target: Target::Flag { name: flag, get, set },
        }
    }

    fn attribute(field: &'static str, attribute: &'static str, access: ValueAccess<T>) -> Self {
        Self {
            field,
            hidden: false,
            target: Target::Attribute {
                name: attribute,
                access,
            },
        }
    }

    /// Exclude the field from reads and writes unless hidden fields are
    /// explicitly requested.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn target(&self) -> &Target<T> {
        &self.target
    }

    /// Whether this mapping takes part in an operation.
    pub fn is_included(&self, include_hidden: bool) -> bool {
        include_hidden || !self.hidden
    }
}

/// The complete attribute table of one entity type.
pub struct AttributeSchema<T> {
    object_classes: &'static [&'static str],
    flags_attribute: &'static str,
    fields: Vec<FieldMapping<T>>,
}

impl<T> AttributeSchema<T> {
    /// Build a table.
    ///
    /// # Panics
    ///
    /// If two fields share a name, or two attribute mappings share an
    /// attribute, or an attribute mapping uses the composite flag attribute.
    /// Tables are declared once at startup, so these are programming errors.
    pub fn new(
        object_classes: &'static [&'static str],
        flags_attribute: &'static str,
        fields: Vec<FieldMapping<T>>,
    ) -> Self {
        for (i, mapping) in fields.iter().enumerate() {
            for other in &fields[i + 1..] {
                assert_ne!(mapping.field, other.field, "duplicate field in attribute table");
            }
            if let Target::Attribute { name, .. } = mapping.target {
                assert!(
                    !name.eq_ignore_ascii_case(flags_attribute),
                    "field '{}' maps onto the composite flag attribute",
                    mapping.field
                );
                let clash = fields[i + 1..].iter().any(|other| {
                    matches!(other.target, Target::Attribute { name: n, .. } if n.eq_ignore_ascii_case(name))
                });
                assert!(!clash, "attribute '{}' mapped twice", name);
            }
        }

        Self {
            object_classes,
            flags_attribute,
            fields,
        }
    }

    pub fn object_classes(&self) -> &'static [&'static str] {
        self.object_classes
    }

    pub fn flags_attribute(&self) -> &'static str {
        self.flags_attribute
    }

    pub fn fields(&self) -> &[FieldMapping<T>] {
        &self.fields
    }

    /// Mappings taking part in an operation.
    pub fn included(&self, include_hidden: bool) -> impl Iterator<Item = &FieldMapping<T>> {
        self.fields
            .iter()
            .filter(move |mapping| mapping.is_included(include_hidden))
    }

    /// Look up a mapping by field name.
    pub fn field(&self, name: &str) -> Option<&FieldMapping<T>> {
        self.fields.iter().find(|mapping| mapping.field == name)
    }

    pub fn has_flags(&self, include_hidden: bool) -> bool {
        self.included(include_hidden)
            .any(|mapping| matches!(mapping.target, Target::Flag { .. }))
    }

    /// Attributes to request when reading entities, in table order, with
    /// the composite flag attribute last.
    pub fn attribute_names(&self, include_hidden: bool) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .included(include_hidden)
            .filter_map(|mapping| match mapping.target {
                Target::Attribute { name, .. } => Some(name),
                Target::Flag { .. } => None,
            })
            .collect();
        if self.has_flags(include_hidden) {
            names.push(self.flags_attribute);
        }
        names
    }
}
