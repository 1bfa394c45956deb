use serde_json::json;
use strongbox::storage::{AnomalyKind, CURRENT_SCHEMA_VERSION};
use strongbox::{Document, Role};

use crate::helpers::*;

fn legacy_store() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "users": [
            {"username": "admin", "password": "123", "role": "Admin", "name": "Administrator"},
            {"username": "sarah", "password": "hunter2", "role": "manager"},
        ],
        "projects": [
            {"title": "Legacy roadmap", "tasks": [{"text": "Plan", "done": true}, {"text": "Ship"}]},
        ],
    }))
    .unwrap()
}

#[tokio::test]
async fn test_legacy_document_is_migrated_on_load() {
    let env = setup().await;
    overwrite_primary(&env, &legacy_store());

    let document = env.instance.load_store().await.unwrap();
    assert_eq!(document.schema_version, CURRENT_SCHEMA_VERSION);

    let users = env.instance.users().list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    let sarah = users.iter().find(|u| u.username == "sarah").unwrap();
    assert_eq!(sarah.role, Role::Manager);
    assert!(sarah.must_reset_password);

    // Plaintext passwords are gone from the migrated records.
    let raw = serde_json::to_string(&document).unwrap();
    assert!(!raw.contains("hunter2"));

    let projects = document.collection("projects").unwrap();
    let project = projects.values().next().unwrap();
    assert_eq!(project["tasks"][0]["status"], "Done");
    assert_eq!(project["tasks"][1]["status"], "To Do");
}

#[tokio::test]
async fn test_migrated_document_persists_current_marker_on_save() {
    let env = setup().await;
    overwrite_primary(&env, &legacy_store());

    let report = env.instance.health_check().await.unwrap();
    assert_eq!(report.schema_version, Some(0));
    assert!(report.has_anomaly(AnomalyKind::StaleSchema));

    let document = env.instance.load_store().await.unwrap();
    env.instance.save_store(&document).await.unwrap();

    let report = env.instance.health_check().await.unwrap();
    assert_eq!(report.schema_version, Some(CURRENT_SCHEMA_VERSION));
    assert!(!report.has_anomaly(AnomalyKind::StaleSchema));

    // The pre-migration file survives as the newest snapshot.
    let backups = env.instance.backups().await.unwrap();
    let snapshot = strongbox::storage::decode(&std::fs::read(&backups[0].path).unwrap()).unwrap();
    assert_eq!(snapshot.schema_version, 0);
}

#[tokio::test]
async fn test_migration_is_idempotent_across_loads() {
    let env = setup().await;
    overwrite_primary(&env, &legacy_store());

    let first = env.instance.load_store().await.unwrap();
    let second = env.instance.load_store().await.unwrap();
    assert_eq!(first, second);

    env.instance.save_store(&first).await.unwrap();
    assert_eq!(env.instance.load_store().await.unwrap(), first);
}

#[tokio::test]
async fn test_bare_project_list_is_version_zero() {
    let env = setup().await;
    overwrite_primary(&env, br#"[{"title": "Only projects"}]"#);

    let document = env.instance.load_store().await.unwrap();
    assert_eq!(document.collection("projects").map(|c| c.len()), Some(1));
    assert!(document.collection("users").is_none());
}

#[tokio::test]
async fn test_newer_marker_is_a_migration_error() {
    let env = setup().await;
    overwrite_primary(
        &env,
        format!(
            r#"{{"schema_version": {}, "collections": {{}}}}"#,
            CURRENT_SCHEMA_VERSION + 1
        )
        .as_bytes(),
    );

    let err = env.instance.load_store().await.unwrap_err();
    assert!(err.is_migration_error());
    assert!(!err.is_corrupt_store());

    let mut document = Document::empty();
    document.schema_version = CURRENT_SCHEMA_VERSION + 1;
    let err = env.instance.save_store(&document).await.unwrap_err();
    assert!(err.is_migration_error());
}

#[tokio::test]
async fn test_legacy_bcrypt_user_with_string_dates() {
    let env = setup().await;
    let legacy = json!({
        "users": [{
            "username": "admin",
            "password_hash": "$2b$12$KIXQJ8r6Qf0o1y7m3Zk5UeW2b7s9mJp4sLq8vT1cR6dN0hG3aYxEe",
            "role": "Admin",
            "name": "Administrator",
            "email": "",
            "created_at": "2024-01-05",
            "last_login": "2024-02-01 09:30:00",
            "is_active": true,
        }],
    });
    overwrite_primary(&env, &serde_json::to_vec(&legacy).unwrap());

    let users = env.instance.users().list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].must_reset_password);

    let err = env.instance.authenticate("admin", "123").await.unwrap_err();
    assert!(err.is_authentication_error());

    // The account needs a reset, so bootstrapping may claim it.
    let token = bootstrap_admin(&env.instance).await;
    assert!(env.instance.validate_token(&token).await.is_ok());
    assert_eq!(env.instance.users().list_users().await.unwrap().len(), 1);

    let raw = std::fs::read_to_string(env.instance.store().store_path()).unwrap();
    assert!(raw.contains("last_login"));
    assert!(!raw.contains("$2b$"));
}

#[tokio::test]
async fn test_colliding_legacy_ids_are_all_kept() {
    let env = setup().await;
    let legacy = json!({
        "projects": [
            {"id": "p1", "title": "Website"},
            {"id": "p1", "title": "Mobile app"},
        ],
    });
    overwrite_primary(&env, &serde_json::to_vec(&legacy).unwrap());

    let document = env.instance.load_store().await.unwrap();
    let projects = document.collection("projects").unwrap();
    assert_eq!(projects.len(), 2);
    let mut titles: Vec<_> = projects.values().map(|p| p["title"].as_str().unwrap()).collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["Mobile app", "Website"]);
    assert_eq!(projects["p1"]["title"], "Website");
}
