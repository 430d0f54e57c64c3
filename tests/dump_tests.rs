//! Moving a complete store between directories through its JSON dump.

mod common;

use common::{config, directory, employee, ids, student};
use directory_store::auth::Credential;
use directory_store::{DumpService, ImportMode, InMemoryDirectory, Snapshot, StatusCode};
use std::collections::BTreeMap;

fn populated() -> Snapshot {
    let mut staff = employee("jdoe");
    staff.password = Some(Credential::encode("pw").to_string());
    Snapshot {
        students: (1..=3).map(student).collect(),
        employees: vec![staff, employee("asmith")],
        groups: BTreeMap::from([
            ("admin".to_string(), ids(&["jdoe"])),
            ("inactive".to_string(), vec![]),
        ]),
        values: BTreeMap::from([("motd".to_string(), "Welcome back".to_string())]),
    }
}

fn service(directory: &InMemoryDirectory) -> DumpService<InMemoryDirectory> {
    DumpService::new(directory.clone(), &config())
}

#[test]
fn test_dump_survives_json_between_directories() {
    tokio_test::block_on(async {
        let source = directory();
        let imported = service(&source)
            .import(&populated(), ImportMode::Additive)
            .await
            .unwrap();
        assert!(imported.is_success(), "{:?}", imported.errors());

        let exported = service(&source).export().await.unwrap();
        let json = serde_json::to_string(exported.value().unwrap()).unwrap();

        let target = directory();
        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
        service(&target)
            .import(&snapshot, ImportMode::Overwrite)
            .await
            .unwrap();

        let copied = service(&target).export().await.unwrap();
        let mut expected = populated();
        // listings come back in directory order
        expected.employees.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(copied.value(), Some(&expected));
    });
}

#[tokio::test]
async fn test_partial_import_is_multi_status() {
    let directory = directory();
    let mut snapshot = populated();
    snapshot.values.insert("blank".to_string(), String::new());

    let result = service(&directory)
        .import(&snapshot, ImportMode::Additive)
        .await
        .unwrap();
    assert_eq!(result.status(), StatusCode::MULTI_STATUS);
    assert_eq!(result.errors().len(), 1);
}

#[tokio::test]
async fn test_import_into_unavailable_directory_fails() {
    let directory = directory();
    directory.set_unavailable(true);
    let error = service(&directory)
        .import(&populated(), ImportMode::Overwrite)
        .await
        .unwrap_err();
    assert!(error.is_service_unavailable());
}
