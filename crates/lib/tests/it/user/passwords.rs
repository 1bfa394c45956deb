use strongbox::{AuditEventKind, AuditOutcome, Role};

use crate::helpers::*;

const NEW_PASSWORD: &str = "N3w!Password";

#[tokio::test]
async fn test_change_password_keeps_current_session_only() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let current = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
    let other = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    env.instance
        .change_password(&current, USER_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap();

    assert!(env.instance.validate_token(&current).await.is_ok());
    assert!(env.instance.validate_token(&other).await.is_err());
    assert!(env.instance.authenticate("sarah", USER_PASSWORD).await.is_err());
    assert!(env.instance.authenticate("sarah", NEW_PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_change_password_requires_current_password() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    let err = env
        .instance
        .change_password(&token, "Wrong!Pass1", NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_authentication_error());

    let failures: Vec<_> = env
        .instance
        .audit()
        .entries_of_kind(AuditEventKind::PasswordChanged)
        .into_iter()
        .map(|e| e.outcome)
        .collect();
    assert_eq!(failures, vec![AuditOutcome::Failure]);
    assert!(env.instance.authenticate("sarah", USER_PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_wrong_current_password_counts_toward_lockout() {
    let env = setup_with(|config| config.security.max_failed_attempts = 2).await;
    let admin_token = bootstrap_admin(&env.instance).await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    for _ in 0..2 {
        let err = env
            .instance
            .change_password(&token, "Wrong!Pass1", NEW_PASSWORD)
            .await
            .unwrap_err();
        assert!(err.is_authentication_error());
    }

    let err = env
        .instance
        .change_password(&token, USER_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_lockout());
    let err = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap_err();
    assert!(err.is_lockout());

    let locked = env.instance.audit().entries_of_kind(AuditEventKind::AccountLocked);
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0].actor, sarah);
}

#[tokio::test]
async fn test_change_password_enforces_policy() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    let err = env
        .instance
        .change_password(&token, USER_PASSWORD, "alllowercase")
        .await
        .unwrap_err();
    assert!(err.is_validation_error());
}

#[tokio::test]
async fn test_change_password_with_invalid_token() {
    let env = setup().await;
    let err = env
        .instance
        .change_password("bogus", USER_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_authentication_error());
}

#[tokio::test]
async fn test_admin_reset_password() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    env.instance
        .users()
        .reset_password(&admin_token, &sarah, NEW_PASSWORD)
        .await
        .unwrap();

    assert!(env.instance.validate_token(&token).await.is_err());
    assert!(env.instance.authenticate("sarah", NEW_PASSWORD).await.is_ok());
}
