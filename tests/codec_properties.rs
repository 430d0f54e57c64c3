//! Property tests for the entity codec.

use directory_store::directory::DirectoryEntry;
use directory_store::entity::{Employee, Student, decode, diff, encode};
use proptest::option;
use proptest::prelude::*;

fn text() -> impl Strategy<Value = Option<String>> {
    option::of("[A-Za-z0-9 .@'-]{1,24}")
}

prop_compose! {
    fn any_student()(
        id in any::<u32>(),
        first_name in text(),
        last_name in text(),
        display_name in text(),
        email in text(),
        class_name in text(),
        year in option::of(any::<u8>()),
        note in text(),
        photo_consent in any::<bool>(),
        has_laptop in any::<bool>(),
        special_needs in any::<bool>(),
    ) -> Student {
        Student {
            id, first_name, last_name, display_name, email, class_name, year, note,
            photo_consent, has_laptop, special_needs,
        }
    }
}

prop_compose! {
    fn any_employee()(
        id in "[a-z][a-z0-9.]{0,15}",
        first_name in text(),
        last_name in text(),
        phone in text(),
        title in text(),
        part_time in option::of(any::<bool>()),
        password in text(),
        teacher in any::<bool>(),
        substitute in any::<bool>(),
    ) -> Employee {
        Employee {
            id, first_name, last_name, phone, title, part_time, password, teacher, substitute,
            ..Default::default()
        }
    }
}

fn entry(attributes: directory_store::directory::AttributeSet) -> DirectoryEntry {
    DirectoryEntry::new("uid=x,ou=test,dc=example", attributes.into_iter().collect())
}

proptest! {
    #[test]
    fn student_round_trips(student in any_student()) {
        let decoded: Student = decode(&entry(encode(&student, true)), true).unwrap();
        prop_assert_eq!(decoded, student);
    }

    #[test]
    fn employee_round_trips(employee in any_employee()) {
        let decoded: Employee = decode(&entry(encode(&employee, true)), true).unwrap();
        prop_assert_eq!(decoded, employee);
    }

    #[test]
    fn default_reads_never_see_hidden_fields(student in any_student()) {
        let decoded: Student = decode(&entry(encode(&student, true)), false).unwrap();
        prop_assert_eq!(decoded.note, None);
        prop_assert_eq!(decoded.first_name, student.first_name);
    }

    #[test]
    fn composite_flag_attribute_is_absent_without_flags(student in any_student()) {
        let attributes = encode(&student, true);
        let any_flag = student.photo_consent || student.has_laptop || student.special_needs;
        prop_assert_eq!(attributes.contains_key("businessCategory"), any_flag);
    }

    #[test]
    fn diff_against_itself_only_replaces(student in any_student()) {
        let stored = entry(encode(&student, true));
        let mods = diff(&student, &stored, true);
        prop_assert!(mods.iter().all(|m| matches!(m, directory_store::directory::AttributeMod::Replace(..))));
        prop_assert!(mods.iter().all(|m| m.attribute() != "uid"));
    }
}
