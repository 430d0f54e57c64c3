//! Entity ↔ attribute set conversion.
//!
//! [`encode`] turns an entity into the attributes of an add request,
//! [`decode`] turns a search entry back into an entity, and [`diff`] builds
//! the changes of a modify request against the currently stored entry.
//!
//! Values are stored as strings: integers in decimal, booleans as the
//! directory-native `TRUE`/`FALSE`. Empty strings are treated as absent, as
//! directories do not store empty values. Boolean flag fields are packed
//! into one composite attribute whose value is the `|`-joined names of the
//! flags that are set; the attribute is absent when no flag is set.

use crate::directory::dn::ENTITY_RDN_ATTRIBUTE;
use crate::directory::{AttributeMod, AttributeSet, DirectoryEntry};
use crate::entity::DirectoryEntity;
use crate::entity::schema::{Target, ValueAccess};
use std::num::IntErrorKind;
use thiserror::Error;

/// Separator between flag names in the composite attribute.
pub const FLAG_SEPARATOR: char = '|';

/// A stored value that does not fit its field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Attribute '{attribute}' has invalid {expected} value '{value}'")]
    InvalidFormat {
        attribute: String,
        expected: &'static str,
        value: String,
    },

    #[error("Attribute '{attribute}' value '{value}' is out of range")]
    Overflow { attribute: String, value: String },

    #[error("Attribute '{attribute}' has invalid boolean value '{value}'")]
    InvalidBoolean { attribute: String, value: String },

    #[error("Attribute '{attribute}' has {count} values, expected one")]
    MultipleValues { attribute: String, count: usize },
}

fn encode_bool(value: bool) -> String {
    if value { "TRUE" } else { "FALSE" }.to_string()
}

fn decode_bool(attribute: &str, value: &str) -> Result<bool, DecodeError> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(DecodeError::InvalidBoolean {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }),
    }
}

fn decode_integer(attribute: &str, value: &str) -> Result<i64, DecodeError> {
    value.trim().parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => DecodeError::Overflow {
            attribute: attribute.to_string(),
            value: value.to_string(),
        },
        _ => DecodeError::InvalidFormat {
            attribute: attribute.to_string(),
            expected: "integer",
            value: value.to_string(),
        },
    })
}

/// String form of a plain field, `None` when absent.
fn encode_value<T>(access: &ValueAccess<T>, entity: &T) -> Option<String> {
    match access {
        ValueAccess::Text { get, .. } => get(entity).filter(|value| !value.is_empty()),
        ValueAccess::Integer { get, .. } => get(entity).map(|value| value.to_string()),
        ValueAccess::Boolean { get, .. } => get(entity).map(encode_bool),
    }
}

fn decode_value<T>(
    access: &ValueAccess<T>,
    attribute: &str,
    value: &str,
    entity: &mut T,
) -> Result<(), DecodeError> {
    match access {
        ValueAccess::Text { set, .. } => {
            set(entity, Some(value.to_string()).filter(|v| !v.is_empty()));
        }
        ValueAccess::Integer { set, .. } => {
            let parsed = decode_integer(attribute, value)?;
            set(entity, Some(parsed)).map_err(|_| DecodeError::Overflow {
                attribute: attribute.to_string(),
                value: value.to_string(),
            })?;
        }
        ValueAccess::Boolean { set, .. } => set(entity, Some(decode_bool(attribute, value)?)),
    }
    Ok(())
}

/// Flag names stored in a composite attribute value.
pub fn split_flags(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(FLAG_SEPARATOR)
        .map(str::trim)
        .filter(|flag| !flag.is_empty())
}

/// Flag names across every value of the composite attribute.
fn stored_flags<'e>(entry: &'e DirectoryEntry, attribute: &str) -> Vec<&'e str> {
    entry
        .values(attribute)
        .unwrap_or_default()
        .iter()
        .flat_map(|value| split_flags(value))
        .collect()
}

/// Flags of included mappings that are set on the entity, in table order.
fn set_flags<T: DirectoryEntity>(entity: &T, include_hidden: bool) -> Vec<&'static str> {
    T::schema()
        .included(include_hidden)
        .filter_map(|mapping| match mapping.target() {
            Target::Flag { name, get, .. } if get(entity) => Some(*name),
            _ => None,
        })
        .collect()
}

/// Encode an entity into the attributes of an add request.
///
/// Object classes are not part of the result; the store adds them.
pub fn encode<T: DirectoryEntity>(entity: &T, include_hidden: bool) -> AttributeSet {
    let schema = T::schema();
    let mut attributes = AttributeSet::new();

    for mapping in schema.included(include_hidden) {
        if let Target::Attribute { name, access } = mapping.target() {
            if let Some(value) = encode_value(access, entity) {
                attributes.insert(name.to_string(), vec![value]);
            }
        }
    }

    let flags = set_flags(entity, include_hidden);
    if !flags.is_empty() {
        attributes.insert(
            schema.flags_attribute().to_string(),
            vec![flags.join(&FLAG_SEPARATOR.to_string())],
        );
    }

    attributes
}

/// Decode a search entry into an entity.
///
/// Attributes missing from the entry leave the field at its default.
pub fn decode<T: DirectoryEntity>(
    entry: &DirectoryEntry,
    include_hidden: bool,
) -> Result<T, DecodeError> {
    let schema = T::schema();
    let mut entity = T::default();
    let flags = stored_flags(entry, schema.flags_attribute());

    for mapping in schema.included(include_hidden) {
        match mapping.target() {
            Target::Attribute { name, access } => {
                let Some(values) = entry.values(name) else {
                    continue;
                };
                match values {
                    [] => {}
                    [value] => decode_value(access, name, value, &mut entity)?,
                    _ => {
                        return Err(DecodeError::MultipleValues {
                            attribute: name.to_string(),
                            count: values.len(),
                        });
                    }
                }
            }
            Target::Flag { name, set, .. } => set(&mut entity, flags.contains(name)),
        }
    }

    Ok(entity)
}

/// Changes turning the stored entry into `entity`.
///
/// Present values are replaced. Absent values whose attribute is currently
/// stored are deleted explicitly. The naming attribute is never touched, so
/// an entity cannot be renamed through a modify. Flags stored on the entry
/// that no included mapping owns (hidden flags on a default write, or flags
/// unknown to the table) are carried over into the new composite value.
pub fn diff<T: DirectoryEntity>(
    entity: &T,
    current: &DirectoryEntry,
    include_hidden: bool,
) -> Vec<AttributeMod> {
    let schema = T::schema();
    let mut mods = Vec::new();

    for mapping in schema.included(include_hidden) {
        let Target::Attribute { name, access } = mapping.target() else {
            continue;
        };
        if name.eq_ignore_ascii_case(ENTITY_RDN_ATTRIBUTE) {
            continue;
        }
        match encode_value(access, entity) {
            Some(value) => mods.push(AttributeMod::Replace(name.to_string(), vec![value])),
            None if current.has(name) => mods.push(AttributeMod::Delete(name.to_string(), vec![])),
            None => {}
        }
    }

    let owned: Vec<&str> = schema
        .included(include_hidden)
        .filter_map(|mapping| match mapping.target() {
            Target::Flag { name, .. } => Some(*name),
            _ => None,
        })
        .collect();
    let mut flags: Vec<String> = set_flags(entity, include_hidden)
        .into_iter()
        .map(str::to_string)
        .collect();
    for flag in stored_flags(current, schema.flags_attribute()) {
        if !owned.contains(&flag) && !flags.iter().any(|f| f == flag) {
            flags.push(flag.to_string());
        }
    }

    let flags_attribute = schema.flags_attribute().to_string();
    if !flags.is_empty() {
        mods.push(AttributeMod::Replace(
            flags_attribute,
            vec![flags.join(&FLAG_SEPARATOR.to_string())],
        ));
    } else if current.has(&flags_attribute) {
        mods.push(AttributeMod::Delete(flags_attribute, vec![]));
    }

    mods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Employee, Student};
    use std::collections::HashMap;

    fn student() -> Student {
        Student {
            id: 17,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            year: Some(9),
            photo_consent: true,
            has_laptop: false,
            special_needs: true,
            ..Default::default()
        }
    }

    fn entry_from(attributes: AttributeSet) -> DirectoryEntry {
        DirectoryEntry::new("uid=17,ou=students,dc=x", attributes.into_iter().collect())
    }

    #[test]
    fn test_encode_joins_flags() {
        let attributes = encode(&student(), false);
        assert_eq!(attributes["uid"], vec!["17"]);
        assert_eq!(attributes["givenName"], vec!["Ada"]);
        assert_eq!(attributes["businessCategory"], vec!["photoConsent|specialNeeds"]);
        assert!(!attributes.contains_key("mail"));
    }

    #[test]
    fn test_no_flags_means_no_composite_attribute() {
        let mut entity = student();
        entity.photo_consent = false;
        entity.special_needs = false;
        assert!(!encode(&entity, true).contains_key("businessCategory"));
    }

    #[test]
    fn test_hidden_fields_need_both_sides() {
        let mut entity = student();
        entity.note = Some("allergic to peanuts".to_string());

        assert!(!encode(&entity, false).contains_key("description"));
        let with_hidden = encode(&entity, true);
        assert!(with_hidden.contains_key("description"));

        let decoded: Student = decode(&entry_from(with_hidden.clone()), false).unwrap();
        assert_eq!(decoded.note, None);
        let decoded: Student = decode(&entry_from(with_hidden), true).unwrap();
        assert_eq!(decoded, entity);
    }

    #[test]
    fn test_decode_rejects_bad_values() {
        let mut attributes = encode(&student(), true);
        attributes.insert("uid".into(), vec!["seventeen".into()]);
        let error = decode::<Student>(&entry_from(attributes), true).unwrap_err();
        assert!(matches!(error, DecodeError::InvalidFormat { .. }));

        let mut attributes = encode(&student(), true);
        attributes.insert("uid".into(), vec!["99999999999".into()]);
        let error = decode::<Student>(&entry_from(attributes), true).unwrap_err();
        assert!(matches!(error, DecodeError::Overflow { .. }));

        let mut attributes = encode(&student(), true);
        attributes.insert("uid".into(), vec!["999999999999999999999999".into()]);
        let error = decode::<Student>(&entry_from(attributes), true).unwrap_err();
        assert!(matches!(error, DecodeError::Overflow { .. }));

        let mut attributes = encode(&Employee::default(), true);
        attributes.insert("uid".into(), vec!["jdoe".into()]);
        attributes.insert(
            "mail".into(),
            vec!["a@example.com".into(), "b@example.com".into()],
        );
        let error = decode::<Employee>(&entry_from(attributes), true).unwrap_err();
        assert!(matches!(error, DecodeError::MultipleValues { count: 2, .. }));
    }

    #[test]
    fn test_diff_deletes_cleared_attributes() {
        let stored = entry_from(encode(&student(), true));
        let mut changed = student();
        changed.last_name = None;
        changed.photo_consent = false;
        changed.special_needs = false;

        let mods = diff(&changed, &stored, false);
        assert!(mods.contains(&AttributeMod::Delete("sn".into(), vec![])));
        assert!(mods.contains(&AttributeMod::Delete("businessCategory".into(), vec![])));
        assert!(mods.contains(&AttributeMod::Replace("givenName".into(), vec!["Ada".into()])));
        assert!(mods.iter().all(|m| m.attribute() != "uid"));
        // never stored, never deleted
        assert!(mods.iter().all(|m| m.attribute() != "mail"));
    }

    #[test]
    fn test_diff_keeps_flags_it_does_not_own() {
        let mut attributes: AttributeSet = encode(&student(), true);
        attributes.insert("businessCategory".into(), vec!["photoConsent|archived".into()]);
        let stored = DirectoryEntry::new("uid=17,ou=students,dc=x", HashMap::from_iter(attributes));

        let mut changed = student();
        changed.photo_consent = false;
        changed.special_needs = false;
        let mods = diff(&changed, &stored, false);
        assert!(mods.contains(&AttributeMod::Replace(
            "businessCategory".into(),
            vec!["archived".into()]
        )));
    }

    #[test]
    fn test_flags_spread_over_several_values() {
        let mut attributes = encode(&student(), true);
        attributes.insert(
            "businessCategory".into(),
            vec!["photoConsent".into(), "archived|specialNeeds".into()],
        );
        let stored = entry_from(attributes);

        let decoded: Student = decode(&stored, true).unwrap();
        assert!(decoded.photo_consent);
        assert!(decoded.special_needs);

        let mut changed = student();
        changed.special_needs = false;
        let mods = diff(&changed, &stored, false);
        assert!(mods.contains(&AttributeMod::Replace(
            "businessCategory".into(),
            vec!["photoConsent|archived".into()]
        )));
    }

    #[test]
    fn test_boolean_decoding_is_case_insensitive() {
        assert_eq!(decode_bool("x", "True"), Ok(true));
        assert_eq!(decode_bool("x", " false "), Ok(false));
        assert!(decode_bool("x", "yes").is_err());
    }
}
