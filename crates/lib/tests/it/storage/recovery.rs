use strongbox::{AuditEventKind, AuditOutcome, Document};

use crate::helpers::*;

fn recovery_outcomes(env: &TestEnv) -> Vec<AuditOutcome> {
    env.instance
        .audit()
        .entries_of_kind(AuditEventKind::IntegrityRecovery)
        .into_iter()
        .map(|entry| entry.outcome)
        .collect()
}

async fn two_generations(env: &TestEnv) -> Document {
    let mut first = Document::empty();
    first.insert("projects", "p1", project("p1", "First"));
    env.instance.save_store(&first).await.unwrap();

    let mut second = first.clone();
    second.insert("projects", "p2", project("p2", "Second"));
    env.instance.save_store(&second).await.unwrap();
    first
}

#[tokio::test]
async fn test_truncated_primary_recovers_newest_snapshot() {
    let env = setup().await;
    let first = two_generations(&env).await;

    let primary = std::fs::read(env.instance.store().store_path()).unwrap();
    overwrite_primary(&env, &primary[..primary.len() / 2]);

    let recovered = env.instance.load_store().await.unwrap();
    assert_eq!(recovered, first);
    assert_eq!(
        recovery_outcomes(&env),
        vec![AuditOutcome::Attempted, AuditOutcome::Success]
    );

    let detail = env
        .instance
        .audit()
        .entries_of_kind(AuditEventKind::IntegrityRecovery)
        .pop()
        .and_then(|entry| entry.detail)
        .unwrap();
    assert!(detail.starts_with("restored from store-backup-"), "{detail}");
}

#[tokio::test]
async fn test_checksum_mismatch_triggers_recovery() {
    let env = setup().await;
    let first = two_generations(&env).await;

    let primary = std::fs::read_to_string(env.instance.store().store_path()).unwrap();
    overwrite_primary(&env, primary.replace("Second", "Tampered").as_bytes());

    assert_eq!(env.instance.load_store().await.unwrap(), first);
}

#[tokio::test]
async fn test_recovery_skips_damaged_snapshots() {
    let env = setup().await;
    two_generations(&env).await;

    let backups = env.instance.backups().await.unwrap();
    assert_eq!(backups.len(), 2);
    std::fs::write(&backups[0].path, b"garbage").unwrap();
    overwrite_primary(&env, b"");

    // Falls through to the older snapshot: the empty initial document.
    assert_eq!(env.instance.load_store().await.unwrap(), Document::empty());
}

#[tokio::test]
async fn test_corrupt_store_without_snapshots_fails() {
    let env = setup().await;
    overwrite_primary(&env, b"{\"schema_version\": 3, \"collections\": ");

    let err = env.instance.load_store().await.unwrap_err();
    assert!(err.is_corrupt_store());
    assert_eq!(
        recovery_outcomes(&env),
        vec![AuditOutcome::Attempted, AuditOutcome::Failure]
    );
}

#[tokio::test]
async fn test_load_never_rewrites_a_damaged_primary() {
    let env = setup().await;
    two_generations(&env).await;
    overwrite_primary(&env, b"[not json");

    env.instance.load_store().await.unwrap();
    let on_disk = std::fs::read(env.instance.store().store_path()).unwrap();
    assert_eq!(on_disk, b"[not json");
}

#[tokio::test]
async fn test_saving_over_damaged_primary_does_not_snapshot_it() {
    let env = setup().await;
    let first = two_generations(&env).await;
    overwrite_primary(&env, b"{broken");

    let recovered = env.instance.load_store().await.unwrap();
    env.instance.save_store(&recovered).await.unwrap();

    for backup in env.instance.backups().await.unwrap() {
        let bytes = std::fs::read(&backup.path).unwrap();
        assert!(strongbox::storage::decode(&bytes).is_ok());
    }
    assert_eq!(env.instance.load_store().await.unwrap(), first);
}

#[tokio::test]
async fn test_missing_primary_with_snapshots_is_recovered() {
    let env = setup().await;
    let first = two_generations(&env).await;
    std::fs::remove_file(env.instance.store().store_path()).unwrap();

    // Reopening must not write a fresh empty primary over the history.
    let reopened = env.reopen().await;
    assert_eq!(reopened.load_store().await.unwrap(), first);
}
