//! Student records, addressed by a numeric identifier.

use crate::entity::{AttributeSchema, DirectoryEntity, FieldMapping};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: u32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub class_name: Option<String>,
    pub year: Option<u8>,
    /// Pastoral note, only read and written on request.
    pub note: Option<String>,
    pub photo_consent: bool,
    pub has_laptop: bool,
    pub special_needs: bool,
}

static SCHEMA: LazyLock<AttributeSchema<Student>> = LazyLock::new(|| {
    AttributeSchema::new(
        &["top", "person", "organizationalPerson", "inetOrgPerson", "extensibleObject"],
        "businessCategory",
        vec![
            FieldMapping::integer(
                "id",
                "uid",
                |s: &Student| Some(i64::from(s.id)),
                |s, v| {
                    s.id = v.map(u32::try_from).transpose()?.unwrap_or_default();
                    Ok(())
                },
            ),
            FieldMapping::text(
                "first_name",
                "givenName",
                |s: &Student| s.first_name.clone(),
                |s, v| s.first_name = v,
            ),
            FieldMapping::text(
                "last_name",
                "sn",
                |s: &Student| s.last_name.clone(),
                |s, v| s.last_name = v,
            ),
            FieldMapping::text(
                "display_name",
                "cn",
                |s: &Student| s.display_name.clone(),
                |s, v| s.display_name = v,
            ),
            FieldMapping::text("email", "mail", |s: &Student| s.email.clone(), |s, v| {
                s.email = v
            }),
            FieldMapping::text(
                "class_name",
                "departmentNumber",
                |s: &Student| s.class_name.clone(),
                |s, v| s.class_name = v,
            ),
            FieldMapping::integer(
                "year",
                "schoolYear",
                |s: &Student| s.year.map(i64::from),
                |s, v| {
                    s.year = v.map(u8::try_from).transpose()?;
                    Ok(())
                },
            ),
            FieldMapping::text(
                "note",
                "description",
                |s: &Student| s.note.clone(),
                |s, v| s.note = v,
            )
            .hidden(),
            FieldMapping::flag(
                "photo_consent",
                "photoConsent",
                |s: &Student| s.photo_consent,
                |s, v| s.photo_consent = v,
            ),
            FieldMapping::flag(
                "has_laptop",
                "hasLaptop",
                |s: &Student| s.has_laptop,
                |s, v| s.has_laptop = v,
            ),
            FieldMapping::flag(
                "special_needs",
                "specialNeeds",
                |s: &Student| s.special_needs,
                |s, v| s.special_needs = v,
            ),
        ],
    )
});

impl DirectoryEntity for Student {
    type Id = u32;

    const TYPE_NAME: &'static str = "Student";

    fn schema() -> &'static AttributeSchema<Self> {
        &SCHEMA
    }

    fn id(&self) -> u32 {
        self.id
    }
}
