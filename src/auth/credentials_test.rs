use crate::auth::credentials::{CreateOutcome, CredentialStore};
use std::sync::Arc;
use std::time::Instant;

#[test]
fn test_create_and_verify() {
    let store = CredentialStore::new();
    assert_eq!(store.create("ann", "pw").unwrap(), CreateOutcome::Created);

    let user = store.verify("ann", "pw").expect("password matches");
    assert!(user.has_role("USER"));
    assert!(store.verify("ann", "wrong").is_none());
    assert!(store.verify("nobody", "pw").is_none());
}

#[test]
fn test_duplicate_registration_keeps_first_password() {
    let store = CredentialStore::new();
    store.create("ann", "first").unwrap();

    assert_eq!(store.create("ann", "second").unwrap(), CreateOutcome::AlreadyExists);
    assert!(store.verify("ann", "first").is_some());
    assert!(store.verify("ann", "second").is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_create_with_roles() {
    let store = CredentialStore::new();
    store
        .create_with_roles("joe", "joe", ["SUPERVISOR".to_string()])
        .unwrap();

    let joe = store.lookup("joe").unwrap();
    assert!(joe.has_role("SUPERVISOR"));
    assert!(!joe.has_role("USER"));
}

#[test]
fn test_empty_role_list_gets_default_role() {
    let store = CredentialStore::new();
    store.create_with_roles("ann", "pw", Vec::new()).unwrap();
    assert!(store.lookup("ann").unwrap().has_role("USER"));
}

#[test]
fn test_password_is_hashed() {
    let store = CredentialStore::new();
    store.create("ann", "plaintext").unwrap();

    let user = store.lookup("ann").unwrap();
    assert_ne!(user.password_hash, "plaintext");
    assert!(user.password_hash.starts_with("$argon2"));
}

#[test]
fn test_unknown_user_costs_a_password_check() {
    let store = CredentialStore::new();
    store.create("ann", "pw").unwrap();
    // warm the dummy hash
    assert!(store.verify("nobody", "pw").is_none());

    let started = Instant::now();
    assert!(store.verify("ann", "wrong").is_none());
    let known = started.elapsed();

    let started = Instant::now();
    assert!(store.verify("nobody", "wrong").is_none());
    let unknown = started.elapsed();

    assert!(
        unknown * 10 >= known,
        "unknown user answered in {unknown:?}, known user in {known:?}"
    );
}

#[test]
fn test_invalid_input_is_rejected() {
    let store = CredentialStore::new();
    assert!(store.create("", "pw").is_err());
    assert!(store.create("a:b", "pw").is_err());
    assert!(store.create("a\nb", "pw").is_err());
    assert!(store.create("ann", "").is_err());
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_creates_one_record() {
    let store = Arc::new(CredentialStore::new());

    let tasks = (0..16).map(|i| {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.create("race", &format!("pw-{}", i)).unwrap())
    });
    let outcomes: Vec<CreateOutcome> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let created = outcomes.iter().filter(|o| o.is_created()).count();
    assert_eq!(created, 1);
    assert_eq!(store.len(), 1);

    // exactly one of the submitted passwords is the stored one
    let matching = (0..16)
        .filter(|i| store.verify("race", &format!("pw-{}", i)).is_some())
        .count();
    assert_eq!(matching, 1);
}
