use serde_json::json;
use strongbox::Document;
use strongbox::storage::{AnomalyKind, CURRENT_SCHEMA_VERSION};

use crate::helpers::*;

#[tokio::test]
async fn test_healthy_store_report() {
    let (env, _token) = setup_with_admin().await;
    let mut document = env.instance.load_store().await.unwrap();
    document.insert("projects", "p1", project("p1", "Healthy"));
    env.instance.save_store(&document).await.unwrap();

    let report = env.instance.health_check().await.unwrap();
    assert!(report.is_healthy(), "{:?}", report.anomalies);
    assert_eq!(report.schema_version, Some(CURRENT_SCHEMA_VERSION));
    assert_eq!(report.record_counts.get("projects"), Some(&1));
    assert_eq!(report.record_counts.get("users"), Some(&1));
    assert_eq!(report.backup_count, env.instance.backups().await.unwrap().len());
    assert!(report.primary_size_bytes.unwrap_or_default() > 0);
}

#[tokio::test]
async fn test_health_check_reports_without_repairing() {
    let env = setup().await;
    let mut document = Document::empty();
    document.insert("tasks", "t1", task("t1", "Kept"));
    env.instance.save_store(&document).await.unwrap();
    overwrite_primary(&env, b"{oops");

    let audit_before = env.instance.audit_entries().len();
    let report = env.instance.health_check().await.unwrap();

    assert!(report.has_anomaly(AnomalyKind::PrimaryUnreadable));
    assert_eq!(report.schema_version, None);
    assert_eq!(std::fs::read(env.instance.store().store_path()).unwrap(), b"{oops");
    assert_eq!(env.instance.audit_entries().len(), audit_before);
}

#[tokio::test]
async fn test_damaged_snapshot_is_reported() {
    let env = setup().await;
    env.instance.save_store(&Document::empty()).await.unwrap();
    let backups = env.instance.backups().await.unwrap();
    std::fs::write(&backups[0].path, b"not json").unwrap();

    let report = env.instance.health_check().await.unwrap();
    assert!(report.has_anomaly(AnomalyKind::UnreadableSnapshot));
    assert!(!report.has_anomaly(AnomalyKind::PrimaryUnreadable));
}

#[tokio::test]
async fn test_record_level_anomalies() {
    let env = setup().await;
    // Hand-written file that bypasses save-time validation.
    let file = json!({
        "schema_version": CURRENT_SCHEMA_VERSION,
        "collections": {
            "tasks": {
                "t1": {"id": "t9", "text": "Wrong key"},
                "t2": {"id": "t2"},
            },
            "users": {
                "u1": {"id": "u1", "username": "sam", "role": "User"},
                "u2": {"id": "u2", "username": "sam", "role": "User"},
            },
        },
    });
    overwrite_primary(&env, &serde_json::to_vec(&file).unwrap());

    let report = env.instance.health_check().await.unwrap();
    assert!(report.has_anomaly(AnomalyKind::IdMismatch));
    assert!(report.has_anomaly(AnomalyKind::InvalidRecord));
    assert!(report.has_anomaly(AnomalyKind::DuplicateUsername));
    let locations: Vec<_> = report.anomalies.iter().map(|a| a.location.as_str()).collect();
    assert!(locations.contains(&"tasks/t2"));
}

#[tokio::test]
async fn test_missing_primary_is_reported() {
    let env = setup().await;
    std::fs::remove_file(env.instance.store().store_path()).unwrap();
    let report = env.instance.health_check().await.unwrap();
    assert!(report.has_anomaly(AnomalyKind::PrimaryMissing));
    assert_eq!(report.primary_size_bytes, None);
}
