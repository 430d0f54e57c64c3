//! End-to-end behaviour of the record stores over the in-memory directory.

mod common;

use common::{
    ROOT, directory, employee, employee_store, group_store, ids, student, student_store,
    value_store,
};
use directory_store::StatusCode;
use directory_store::directory::{DirectoryGateway, DirectorySession};
use futures::future::join_all;

#[tokio::test]
async fn test_get_after_add_returns_the_same_entity() {
    let directory = directory();
    let students = student_store(&directory);

    let first = students.add(&student(7), &7, false).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = students.add(&student(7), &7, false).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let fetched = students.get(&7, false).await.unwrap();
    assert_eq!(fetched.into_values(), vec![student(7)]);
}

#[tokio::test]
async fn test_modify_that_clears_a_field_removes_it() {
    let directory = directory();
    let employees = employee_store(&directory);

    let missing = employees.modify(&employee("jdoe"), &"jdoe".to_string(), false).await;
    assert_eq!(missing.unwrap().status(), StatusCode::NOT_FOUND);

    employees.add(&employee("jdoe"), &"jdoe".to_string(), false).await.unwrap();
    let mut changed = employee("jdoe");
    changed.email = None;
    changed.teacher = false;
    employees.modify(&changed, &"jdoe".to_string(), false).await.unwrap();

    let fetched = employees.get(&"jdoe".to_string(), false).await.unwrap();
    assert_eq!(fetched.value().unwrap().email, None);
    assert!(!fetched.value().unwrap().teacher);

    let entry = directory
        .entry(&format!("uid=jdoe,ou=employees,{}", ROOT))
        .await
        .unwrap();
    assert!(!entry.has("mail"));
    assert!(!entry.has("businessCategory"));
}

#[tokio::test]
async fn test_add_many_with_two_collisions() {
    let directory = directory();
    let students = student_store(&directory);
    students.add(&student(10), &10, false).await.unwrap();
    students.add(&student(30), &30, false).await.unwrap();

    let batch: Vec<_> = [10, 20, 30, 40, 50].into_iter().map(student).collect();
    let binds_before = directory.stats().await.bind_count;
    let result = students.add_many(&batch, |s| s.id, false, false).await.unwrap();

    assert_eq!(result.status(), StatusCode::MULTI_STATUS);
    assert_eq!(result.errors().len(), 2);
    assert!(result.errors()[0].starts_with("10: "));
    assert!(result.errors()[1].starts_with("30: "));
    // preparation and directives share one bind
    assert_eq!(directory.stats().await.bind_count - binds_before, 1);

    for id in [20, 40, 50] {
        let fetched = students.get(&id, false).await.unwrap();
        assert_eq!(fetched.value(), Some(&student(id)));
    }
}

#[tokio::test]
async fn test_batch_aborts_entirely_on_bind_failure() {
    let directory = directory();
    let students = student_store(&directory);
    directory.set_unavailable(true);

    let batch: Vec<_> = (1..=3).map(student).collect();
    let error = students
        .add_many(&batch, |s| s.id, false, false)
        .await
        .unwrap_err();
    assert!(error.is_service_unavailable());

    directory.set_unavailable(false);
    assert!(students.get_all(false).await.unwrap().values().is_empty());
}

#[tokio::test]
async fn test_concurrent_callers_do_not_interfere() {
    let directory = directory();
    let students = student_store(&directory);

    let results = join_all((1..=10).map(|id| {
        let students = &students;
        async move { students.add(&student(id), &id, false).await }
    }))
    .await;
    assert!(results.into_iter().all(|r| r.unwrap().status() == StatusCode::CREATED));

    let all = students.get_all(false).await.unwrap();
    assert!(all.is_success());
    assert_eq!(all.values().len(), 10);
}

#[tokio::test]
async fn test_undecodable_entries_do_not_hide_the_others() {
    let directory = directory();
    let students = student_store(&directory);
    students.add(&student(1), &1, false).await.unwrap();

    // An entry written by another tool with a non-numeric year.
    let session = directory.connect().await.unwrap();
    session
        .add(
            &format!("uid=2,ou=students,{}", ROOT),
            [
                ("objectClass".to_string(), vec!["inetOrgPerson".to_string()]),
                ("uid".to_string(), vec!["2".to_string()]),
                ("schoolYear".to_string(), vec!["seven".to_string()]),
            ]
            .into(),
        )
        .await
        .unwrap();

    let all = students.get_all(false).await.unwrap();
    assert_eq!(all.status(), StatusCode::MULTI_STATUS);
    assert_eq!(all.values(), &[student(1)]);
    assert_eq!(all.errors().len(), 1);
}

#[tokio::test]
async fn test_group_membership_lifecycle() {
    let directory = directory();
    let groups = group_store(&directory);

    assert!(groups.set_members("staff", &[]).await.unwrap());
    assert!(groups.members("staff").await.unwrap().is_empty());

    groups.set_members("staff", &ids(&["a", "b"])).await.unwrap();
    groups.set_members("staff", &ids(&["a", "c"])).await.unwrap();
    assert_eq!(groups.members("staff").await.unwrap(), ids(&["a", "c"]));

    assert!(groups.add_member("staff", "d").await.unwrap().is_success());
    assert_eq!(
        groups.add_member("staff", "d").await.unwrap().status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        groups.remove_member("staff", "zz").await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    assert!(groups.is_member("staff", "d").await.unwrap());
    assert!(!groups.is_member("staff", "zz").await.unwrap());
}

#[tokio::test]
async fn test_group_batches_bind_once() {
    let directory = directory();
    let groups = group_store(&directory);

    let binds_before = directory.stats().await.bind_count;
    let added = groups.add_members("staff", &ids(&["a", "b", "c"])).await.unwrap();
    assert!(added.is_success());
    assert_eq!(directory.stats().await.bind_count - binds_before, 1);

    let binds_before = directory.stats().await.bind_count;
    let removed = groups.remove_members("staff", &ids(&["a", "zz"])).await.unwrap();
    assert_eq!(removed.status(), StatusCode::MULTI_STATUS);
    assert_eq!(directory.stats().await.bind_count - binds_before, 1);
    assert_eq!(groups.members("staff").await.unwrap(), ids(&["b", "c"]));
}

#[tokio::test]
async fn test_empty_value_is_never_stored() {
    let directory = directory();
    let values = value_store(&directory);

    assert!(!values.set("motd", "").await.unwrap());
    assert!(!values.exists("motd").await.unwrap());

    assert!(values.set("motd", "welcome").await.unwrap());
    assert_eq!(values.get("motd").await.unwrap().as_deref(), Some("welcome"));
    assert_eq!(values.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_groups_and_entities_share_the_root() {
    let directory = directory();
    let students = student_store(&directory);
    let groups = group_store(&directory);

    students.add(&student(1), &1, false).await.unwrap();
    groups.set_members("admin", &ids(&["jdoe"])).await.unwrap();

    assert_eq!(groups.names().await.unwrap(), ids(&["admin"]));
    assert!(!groups.exists("missing").await.unwrap());
    assert_eq!(students.ids().await.unwrap(), vec![1]);
}
