//! Audit trail produced by the store and security layer.

use std::time::Duration;

use strongbox::{AuditEventKind, AuditOutcome, Role};

use crate::helpers::*;

fn kinds(env: &TestEnv) -> Vec<AuditEventKind> {
    env.instance.audit_entries().into_iter().map(|e| e.kind).collect()
}

#[tokio::test]
async fn test_login_flow_is_audited_in_order() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let _ = env.instance.authenticate("sarah", "Wrong!Pass1").await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
    env.instance.logout(&token).await;

    assert_eq!(
        kinds(&env),
        vec![
            AuditEventKind::AdminBootstrapped,
            AuditEventKind::LoginSuccess,
            AuditEventKind::UserCreated,
            AuditEventKind::LoginFailure,
            AuditEventKind::LoginSuccess,
            AuditEventKind::Logout,
        ]
    );

    let own: Vec<_> = env
        .instance
        .audit()
        .entries_for_actor(&sarah)
        .into_iter()
        .map(|e| (e.kind, e.outcome))
        .collect();
    assert_eq!(
        own,
        vec![
            (AuditEventKind::LoginFailure, AuditOutcome::Failure),
            (AuditEventKind::LoginSuccess, AuditOutcome::Success),
            (AuditEventKind::Logout, AuditOutcome::Success),
        ]
    );
}

#[tokio::test]
async fn test_lockout_events() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    for _ in 0..6 {
        let _ = env.instance.authenticate("sarah", "Wrong!Pass1").await;
    }

    let audit = env.instance.audit();
    assert_eq!(audit.entries_of_kind(AuditEventKind::LoginFailure).len(), 5);
    assert_eq!(audit.entries_of_kind(AuditEventKind::AccountLocked).len(), 1);
    let refused = audit.entries_of_kind(AuditEventKind::LockedOutAttempt);
    assert_eq!(refused.len(), 1);
    assert_eq!(refused[0].actor, sarah);
    assert_eq!(refused[0].outcome, AuditOutcome::Denied);
    assert!(audit.entries_of_kind(AuditEventKind::AccountUnlocked).is_empty());

    env.advance(Duration::from_secs(16 * 60));
    env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    let unlocked = audit.entries_of_kind(AuditEventKind::AccountUnlocked);
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].actor, sarah);
    assert_eq!(unlocked[0].outcome, AuditOutcome::Success);
    assert_eq!(unlocked[0].detail.as_deref(), Some("lockout elapsed"));
    let last = env.instance.audit_entries().pop().unwrap();
    assert_eq!(last.kind, AuditEventKind::LoginSuccess);
}

#[tokio::test]
async fn test_audit_log_is_bounded() {
    let env = setup_with(|config| config.audit.capacity = 3).await;
    for _ in 0..5 {
        let _ = env.instance.authenticate("ghost", "Wrong!Pass1").await;
    }
    let audit = env.instance.audit();
    assert_eq!(audit.capacity(), 3);
    assert_eq!(audit.len(), 3);
}

#[tokio::test]
async fn test_audit_entries_never_hold_secrets() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let _ = env.instance.authenticate("sarah", "Wrong!Pass1").await;

    for entry in env.instance.audit_entries() {
        let detail = entry.detail.unwrap_or_default();
        assert!(!detail.contains(USER_PASSWORD));
        assert!(!detail.contains("Wrong!Pass1"));
        assert!(!detail.contains(&admin_token));
    }
}
