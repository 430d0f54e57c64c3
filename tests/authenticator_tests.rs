//! Authentication flows over the in-memory directory.

mod common;

use common::{RecordingIssuer, config, directory, employee, employee_store, group_store, ids};
use directory_store::auth::{
    AuthOutcome, Authenticator, Credential, DEFAULT_ADMIN_ENABLED_KEY, DEFAULT_ADMIN_PASSWORD_KEY,
    basic_header,
};
use directory_store::{InMemoryDirectory, StatusCode, ValueStore};

type TestAuthenticator = Authenticator<InMemoryDirectory, RecordingIssuer>;

fn authenticator(directory: &InMemoryDirectory) -> TestAuthenticator {
    Authenticator::new(directory.clone(), &config(), RecordingIssuer::new())
}

fn values(directory: &InMemoryDirectory) -> ValueStore<InMemoryDirectory> {
    ValueStore::new(directory.clone(), &config())
}

async fn login(auth: &TestAuthenticator, username: &str, password: &str) -> AuthOutcome {
    auth.authenticate(Some(&basic_header(username, password)))
        .await
        .unwrap()
}

/// An employee in the admin group with the given password.
async fn admin_employee(directory: &InMemoryDirectory, auth: &TestAuthenticator, id: &str, pw: &str) {
    employee_store(directory)
        .add(&employee(id), &id.to_string(), false)
        .await
        .unwrap();
    group_store(directory).add_member("admin", id).await.unwrap();
    assert!(auth.set_password(id, pw).await.unwrap().is_success());
}

#[tokio::test]
async fn test_default_admin_bootstrap() {
    let directory = directory();
    let auth = authenticator(&directory);
    let values = values(&directory);
    assert_eq!(values.get(DEFAULT_ADMIN_PASSWORD_KEY).await.unwrap(), None);

    let first = login(&auth, "admin", "guess").await;
    assert_eq!(first, AuthOutcome::WrongCredentials);

    let generated = values.get(DEFAULT_ADMIN_PASSWORD_KEY).await.unwrap().unwrap();
    assert!(!generated.is_empty());
    assert_eq!(
        values.get(DEFAULT_ADMIN_ENABLED_KEY).await.unwrap().as_deref(),
        Some("true")
    );

    let second = login(&auth, "admin", &generated).await;
    assert!(second.is_success());

    // Not regenerated by later attempts.
    login(&auth, "admin", "guess").await;
    assert_eq!(
        values.get(DEFAULT_ADMIN_PASSWORD_KEY).await.unwrap(),
        Some(generated)
    );
}

#[tokio::test]
async fn test_disabled_default_admin_is_forbidden() {
    let directory = directory();
    let auth = authenticator(&directory);
    login(&auth, "admin", "guess").await;
    let password = values(&directory)
        .get(DEFAULT_ADMIN_PASSWORD_KEY)
        .await
        .unwrap()
        .unwrap();

    assert!(auth.set_default_admin_enabled(false).await.unwrap());
    assert_eq!(login(&auth, "admin", &password).await, AuthOutcome::Forbidden);

    assert!(auth.set_default_admin_enabled(true).await.unwrap());
    assert!(login(&auth, "admin", &password).await.is_success());
}

#[tokio::test]
async fn test_replaced_default_admin_password_is_stored_hashed() {
    let directory = directory();
    let auth = authenticator(&directory);
    login(&auth, "admin", "guess").await;

    assert!(auth.set_default_admin_password("n3w-secret").await.unwrap());
    let stored = values(&directory)
        .get(DEFAULT_ADMIN_PASSWORD_KEY)
        .await
        .unwrap()
        .unwrap();
    assert!(Credential::is_encoded(&stored));

    assert!(login(&auth, "admin", "n3w-secret").await.is_success());
    assert_eq!(login(&auth, "admin", &stored).await, AuthOutcome::WrongCredentials);
}

#[tokio::test]
async fn test_admin_group_employee_logs_in() {
    let directory = directory();
    let auth = authenticator(&directory);
    admin_employee(&directory, &auth, "jdoe", "hunter2").await;

    let stored = employee_store(&directory)
        .get(&"jdoe".to_string(), true)
        .await
        .unwrap();
    let credential: Credential = stored.value().unwrap().password.as_deref().unwrap().parse().unwrap();
    assert!(credential.check_password("hunter2"));

    match login(&auth, "jdoe", "hunter2").await {
        AuthOutcome::Success { username, token } => {
            assert_eq!(username, "jdoe");
            assert_eq!(auth.issuer().claims(&token).unwrap().subject, "jdoe");
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(login(&auth, "jdoe", "wrong").await, AuthOutcome::WrongCredentials);
}

#[tokio::test]
async fn test_employee_outside_admin_group_is_rejected() {
    let directory = directory();
    let auth = authenticator(&directory);
    admin_employee(&directory, &auth, "jdoe", "hunter2").await;
    group_store(&directory).remove_member("admin", "jdoe").await.unwrap();

    assert_eq!(login(&auth, "jdoe", "hunter2").await, AuthOutcome::WrongCredentials);
    assert_eq!(login(&auth, "nobody", "x").await, AuthOutcome::WrongCredentials);
}

#[tokio::test]
async fn test_inactive_users_are_forbidden() {
    let directory = directory();
    let auth = authenticator(&directory);
    admin_employee(&directory, &auth, "jdoe", "hunter2").await;
    group_store(&directory)
        .set_members("inactive", &ids(&["jdoe"]))
        .await
        .unwrap();

    assert_eq!(login(&auth, "jdoe", "hunter2").await, AuthOutcome::Forbidden);
}

#[tokio::test]
async fn test_malformed_stored_credential_is_an_internal_error() {
    let directory = directory();
    let auth = authenticator(&directory);
    let mut broken = employee("jdoe");
    broken.password = Some("{SSHA512}tooshort".to_string());
    employee_store(&directory)
        .add(&broken, &broken.id, true)
        .await
        .unwrap();
    group_store(&directory).add_member("admin", "jdoe").await.unwrap();

    let outcome = login(&auth, "jdoe", "anything").await;
    assert_eq!(outcome, AuthOutcome::InternalError);
    assert_eq!(outcome.into_result().status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_header_problems() {
    let directory = directory();
    let auth = authenticator(&directory);

    assert_eq!(auth.authenticate(None).await.unwrap(), AuthOutcome::MissingHeader);
    assert_eq!(
        auth.authenticate(Some("Basic not-base64")).await.unwrap(),
        AuthOutcome::InvalidHeader
    );
    assert_eq!(
        auth.authenticate(Some("Bearer unknown")).await.unwrap(),
        AuthOutcome::InvalidToken
    );
}

#[tokio::test]
async fn test_bind_failure_is_not_a_failed_login() {
    let directory = directory();
    let auth = authenticator(&directory);
    directory.set_unavailable(true);

    let error = auth
        .authenticate(Some(&basic_header("jdoe", "pw")))
        .await
        .unwrap_err();
    assert!(error.is_service_unavailable());
    assert!(
        auth.authenticate(Some(&basic_header("admin", "pw")))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_bearer_token_is_renewed() {
    let directory = directory();
    let auth = authenticator(&directory);
    admin_employee(&directory, &auth, "jdoe", "hunter2").await;

    let AuthOutcome::Success { token, .. } = login(&auth, "jdoe", "hunter2").await else {
        panic!("login failed");
    };
    let renewed = auth
        .authenticate(Some(&format!("Bearer {}", token)))
        .await
        .unwrap();
    let result = renewed.clone().into_result();
    assert_eq!(result.status(), StatusCode::OK);
    let new_token = result.new_token().unwrap();
    assert_ne!(new_token, token);
    assert_eq!(auth.issuer().issued_count(), 2);

    group_store(&directory)
        .set_members("inactive", &ids(&["jdoe"]))
        .await
        .unwrap();
    assert_eq!(
        auth.authenticate(Some(&format!("Bearer {}", new_token)))
            .await
            .unwrap(),
        AuthOutcome::Forbidden
    );
}

#[tokio::test]
async fn test_set_password_for_unknown_employee() {
    let directory = directory();
    let auth = authenticator(&directory);

    let result = auth.set_password("ghost", "pw").await.unwrap();
    assert_eq!(result.status(), StatusCode::NOT_FOUND);
    let result = auth.set_password("ghost", "").await.unwrap();
    assert_eq!(result.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_unbounded_token_lifetime() {
    let directory = directory();
    let auth = Authenticator::new(
        directory.clone(),
        &config().with_token_lifetime_secs(u64::MAX),
        RecordingIssuer::new(),
    );
    login(&auth, "admin", "guess").await;
    let password = values(&directory)
        .get(DEFAULT_ADMIN_PASSWORD_KEY)
        .await
        .unwrap()
        .unwrap();

    let AuthOutcome::Success { token, .. } = login(&auth, "admin", &password).await else {
        panic!("login failed");
    };
    let claims = auth.issuer().claims(&token).unwrap();
    assert!(claims.expires_at > claims.issued_at);
}
