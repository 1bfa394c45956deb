use std::time::Duration;

use strongbox::{AuditEventKind, Role, security::AuthError};

use crate::helpers::*;

const WRONG: &str = "Wrong!Pass1";

#[tokio::test]
async fn test_sarah_lockout_scenario() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let earlier = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    for _ in 0..5 {
        let err = env.instance.authenticate("sarah", WRONG).await.unwrap_err();
        assert!(err.is_authentication_error());
    }

    // Sixth attempt is refused even with the right password.
    let err = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap_err();
    assert!(err.is_lockout());
    let strongbox::Error::Auth(auth) = &err else {
        panic!("expected an auth error");
    };
    assert_eq!(auth.retry_after_minutes(), Some(15));

    env.advance(Duration::from_secs(15 * 60));

    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
    assert!(!token.is_empty());
    assert_ne!(token, earlier);
    assert_ne!(token, admin_token);
}

#[tokio::test]
async fn test_retry_hint_rounds_up() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    for _ in 0..5 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }

    env.advance(Duration::from_secs(14 * 60 + 30));
    let err = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap_err();
    let strongbox::Error::Auth(AuthError::LockedOut { retry_after_minutes }) = err else {
        panic!("expected a lockout");
    };
    assert_eq!(retry_after_minutes, 1);
}

#[tokio::test]
async fn test_failures_outside_window_do_not_count() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    for _ in 0..4 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }
    env.advance(Duration::from_secs(15 * 60));
    // The earlier four have aged out; this is the first failure in the window.
    let _ = env.instance.authenticate("sarah", WRONG).await;

    assert!(env.instance.authenticate("sarah", USER_PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_success_resets_the_counter() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    for _ in 0..4 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }
    env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
    for _ in 0..4 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }
    assert!(env.instance.authenticate("sarah", USER_PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_lockout_survives_reopen() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    for _ in 0..5 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }

    let reopened = env.reopen().await;
    let err = reopened.authenticate("sarah", USER_PASSWORD).await.unwrap_err();
    assert!(err.is_lockout());
}

#[tokio::test]
async fn test_admin_unlock_clears_lockout() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    for _ in 0..5 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }
    assert!(env.instance.users().get_user(&sarah).await.unwrap().is_locked);

    env.instance.users().unlock_user(&admin_token, &sarah).await.unwrap();

    assert!(!env.instance.users().get_user(&sarah).await.unwrap().is_locked);
    assert!(env.instance.authenticate("sarah", USER_PASSWORD).await.is_ok());
    assert_eq!(
        env.instance
            .audit()
            .entries_of_kind(AuditEventKind::AccountUnlocked)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_custom_threshold_is_respected() {
    let env = setup_with(|config| config.security.max_failed_attempts = 2).await;
    let admin_token = bootstrap_admin(&env.instance).await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    for _ in 0..2 {
        let _ = env.instance.authenticate("sarah", WRONG).await;
    }
    let err = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap_err();
    assert!(err.is_lockout());
}
