use strongbox::{Role, user::UserError};

use crate::helpers::*;

#[tokio::test]
async fn test_bootstrap_creates_first_admin() {
    let env = setup().await;
    let admin = env
        .instance
        .users()
        .bootstrap_admin(ADMIN, "Administrator", ADMIN_PASSWORD)
        .await
        .unwrap();

    assert_eq!(admin.role, Role::Admin);
    assert!(admin.is_active);
    assert!(!admin.must_reset_password);
    assert_eq!(env.instance.users().list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bootstrap_is_refused_once_an_admin_exists() {
    let (env, _token) = setup_with_admin().await;
    let err = env
        .instance
        .users()
        .bootstrap_admin("mallory", "Mallory", "M4llory!Pass")
        .await
        .unwrap_err();
    assert!(matches!(err, strongbox::Error::User(UserError::AlreadyBootstrapped)));
    assert!(env.instance.users().find_by_username("mallory").await.unwrap().is_none());
}

#[tokio::test]
async fn test_bootstrap_enforces_password_policy() {
    let env = setup().await;
    let err = env
        .instance
        .users()
        .bootstrap_admin(ADMIN, "Administrator", "123")
        .await
        .unwrap_err();
    assert!(err.is_validation_error());
    assert!(env.instance.users().list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bootstrap_rejects_bad_username() {
    let env = setup().await;
    let err = env
        .instance
        .users()
        .bootstrap_admin("a b", "Administrator", ADMIN_PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_validation_error());
}
