use strongbox::{Role, UserUpdate, security::AuthError};

use crate::helpers::*;

#[tokio::test]
async fn test_correct_password_issues_token() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();
    assert!(!token.is_empty());
    assert_eq!(env.instance.validate_token(&token).await.unwrap(), sarah);

    let info = env.instance.users().get_user(&sarah).await.unwrap();
    assert!(info.last_success_at.is_some());
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_look_the_same() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    let wrong = env.instance.authenticate("sarah", "Wrong!Pass1").await.unwrap_err();
    let unknown = env.instance.authenticate("nobody", USER_PASSWORD).await.unwrap_err();

    assert!(wrong.is_authentication_error());
    assert!(unknown.is_authentication_error());
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn test_passwords_are_case_sensitive() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    let lower = USER_PASSWORD.to_lowercase();
    assert!(env.instance.authenticate("sarah", &lower).await.is_err());
}

#[tokio::test]
async fn test_disabled_account_cannot_log_in() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    env.instance
        .update_user(
            &admin_token,
            &sarah,
            UserUpdate {
                is_active: Some(false),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();

    let err = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap_err();
    assert!(matches!(err, strongbox::Error::Auth(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_no_plaintext_password_reaches_disk() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    let raw = std::fs::read_to_string(env.instance.store().store_path()).unwrap();
    assert!(!raw.contains(USER_PASSWORD));
    assert!(!raw.contains(ADMIN_PASSWORD));
    assert!(raw.contains("$argon2id$"));
}

#[tokio::test]
async fn test_migrated_account_needs_reset_before_login() {
    let env = setup().await;
    overwrite_primary(
        &env,
        br#"{"users": [{"username": "admin", "password": "123", "role": "Admin"}]}"#,
    );

    // The legacy default credentials no longer work.
    let err = env.instance.authenticate("admin", "123").await.unwrap_err();
    assert!(err.is_authentication_error());

    // Bootstrapping is still open because no admin can log in.
    env.instance
        .users()
        .bootstrap_admin("admin", "Administrator", ADMIN_PASSWORD)
        .await
        .unwrap();
    assert!(env.instance.authenticate("admin", ADMIN_PASSWORD).await.is_ok());
}
