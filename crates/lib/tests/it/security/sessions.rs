use std::collections::HashSet;
use std::time::Duration;

use strongbox::Role;

use crate::helpers::*;

#[tokio::test]
async fn test_tokens_are_unique() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    let mut seen = HashSet::new();
    seen.insert(admin_token);
    for _ in 0..10 {
        let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
        assert!(seen.insert(token));
    }
    assert_eq!(env.instance.security().active_session_count().await, 11);
}

#[tokio::test]
async fn test_logout_revokes_and_is_idempotent() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    assert_eq!(env.instance.validate_token(&token).await.unwrap(), sarah);
    env.instance.logout(&token).await;
    env.instance.logout(&token).await;
    env.instance.logout("never-issued").await;

    let err = env.instance.validate_token(&token).await.unwrap_err();
    assert!(err.is_authentication_error());
    // Other sessions are unaffected.
    assert!(env.instance.validate_token(&admin_token).await.is_ok());
}

#[tokio::test]
async fn test_tokens_expire_after_ttl() {
    let env = setup_with(|config| config.security.session_ttl_secs = 60).await;
    let token = bootstrap_admin(&env.instance).await;

    env.advance(Duration::from_secs(59));
    assert!(env.instance.validate_token(&token).await.is_ok());

    env.advance(Duration::from_secs(1));
    let expired = env.instance.validate_token(&token).await.unwrap_err();
    let unknown = env.instance.validate_token("bogus").await.unwrap_err();
    assert_eq!(expired.to_string(), unknown.to_string());
}

#[tokio::test]
async fn test_sessions_do_not_survive_reopen() {
    let (env, admin_token) = setup_with_admin().await;
    let reopened = env.reopen().await;
    assert!(reopened.validate_token(&admin_token).await.is_err());
}

#[tokio::test]
async fn test_raw_token_is_not_persisted() {
    let (env, admin_token) = setup_with_admin().await;
    let raw = std::fs::read_to_string(env.instance.store().store_path()).unwrap();
    assert!(!raw.contains(&admin_token));
}

#[tokio::test]
async fn test_session_table_drops_dead_entries() {
    let env = setup_with(|config| config.security.session_ttl_secs = 60).await;
    let admin_token = bootstrap_admin(&env.instance).await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let sessions = env.instance.security().sessions();

    let mut tokens = Vec::new();
    for _ in 0..20 {
        tokens.push(env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap());
    }
    for token in tokens.iter().take(10) {
        env.instance.logout(token).await;
    }
    assert_eq!(sessions.len().await, 11);

    // Everything above has expired; the next login sweeps it away.
    env.advance(Duration::from_secs(61));
    let fresh = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
    assert_eq!(sessions.len().await, 1);
    assert!(env.instance.validate_token(&fresh).await.is_ok());
}
