//! Employee records, addressed by login name.
//!
//! The stored password credential (`userPassword`, in `{SSHA512}` text form)
//! is a hidden field: it is only read or written when hidden attributes are
//! requested, which the authenticator and the dump service do.

use crate::entity::{AttributeSchema, DirectoryEntity, FieldMapping};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Login name
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub part_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub teacher: bool,
    pub substitute: bool,
}

static SCHEMA: LazyLock<AttributeSchema<Employee>> = LazyLock::new(|| {
    AttributeSchema::new(
        &["top", "person", "organizationalPerson", "inetOrgPerson", "extensibleObject"],
        "businessCategory",
        vec![
            FieldMapping::text(
                "id",
                "uid",
                |e: &Employee| Some(e.id.clone()),
                |e, v| e.id = v.unwrap_or_default(),
            ),
            FieldMapping::text(
                "first_name",
                "givenName",
                |e: &Employee| e.first_name.clone(),
                |e, v| e.first_name = v,
            ),
            FieldMapping::text(
                "last_name",
                "sn",
                |e: &Employee| e.last_name.clone(),
                |e, v| e.last_name = v,
            ),
            FieldMapping::text(
                "display_name",
                "cn",
                |e: &Employee| e.display_name.clone(),
                |e, v| e.display_name = v,
            ),
            FieldMapping::text("email", "mail", |e: &Employee| e.email.clone(), |e, v| {
                e.email = v
            }),
            FieldMapping::text(
                "phone",
                "telephoneNumber",
                |e: &Employee| e.phone.clone(),
                |e, v| e.phone = v,
            ),
            FieldMapping::text("title", "title", |e: &Employee| e.title.clone(), |e, v| {
                e.title = v
            }),
            FieldMapping::boolean(
                "part_time",
                "partTime",
                |e: &Employee| e.part_time,
                |e, v| e.part_time = v,
            ),
            FieldMapping::text(
                "password",
                "userPassword",
                |e: &Employee| e.password.clone(),
                |e, v| e.password = v,
            )
            .hidden(),
            FieldMapping::flag(
                "teacher",
                "teacher",
                |e: &Employee| e.teacher,
                |e, v| e.teacher = v,
            ),
            FieldMapping::flag(
                "substitute",
                "substitute",
                |e: &Employee| e.substitute,
                |e, v| e.substitute = v,
            ),
        ],
    )
});

impl DirectoryEntity for Employee {
    type Id = String;

    const TYPE_NAME: &'static str = "Employee";

    fn schema() -> &'static AttributeSchema<Self> {
        &SCHEMA
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}
