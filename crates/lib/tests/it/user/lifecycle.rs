use strongbox::{NewUser, Role, UserUpdate};

use crate::helpers::*;

#[tokio::test]
async fn test_create_and_fetch_user() {
    let (env, admin_token) = setup_with_admin().await;

    let info = env
        .instance
        .create_user(
            &admin_token,
            NewUser::new("sarah", Role::Manager, USER_PASSWORD)
                .with_display_name("Sarah Connor")
                .with_email("sarah@example.com"),
        )
        .await
        .unwrap();

    assert_eq!(info.username, "sarah");
    assert_eq!(info.display_name, "Sarah Connor");
    assert_eq!(info.email.as_deref(), Some("sarah@example.com"));
    assert_eq!(info.role, Role::Manager);

    let users = env.instance.users();
    assert_eq!(users.get_user(&info.id).await.unwrap(), info);
    assert_eq!(users.find_by_username("sarah").await.unwrap(), Some(info.clone()));

    let names: Vec<_> = users
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, vec![ADMIN.to_string(), "sarah".to_string()]);
}

#[tokio::test]
async fn test_duplicate_username_is_a_conflict() {
    let (env, admin_token) = setup_with_admin().await;
    create_user(&env.instance, &admin_token, "sarah", Role::User).await;

    let err = env
        .instance
        .create_user(&admin_token, NewUser::new("sarah", Role::Viewer, USER_PASSWORD))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_create_user_collects_all_issues() {
    let (env, admin_token) = setup_with_admin().await;
    let err = env
        .instance
        .create_user(
            &admin_token,
            NewUser::new("x", Role::User, "short").with_email("not-an-email"),
        )
        .await
        .unwrap_err();

    let strongbox::Error::Validation(validation) = err else {
        panic!("expected a validation error");
    };
    assert!(validation.has_field("username"));
    assert!(validation.has_field("email"));
    assert!(validation.has_field("password"));
}

#[tokio::test]
async fn test_self_service_profile_update() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    let updated = env
        .instance
        .update_user(
            &token,
            &sarah,
            UserUpdate {
                display_name: Some("Sarah C.".to_string()),
                email: Some("sc@example.com".to_string()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.display_name, "Sarah C.");

    // Clearing the email with an empty string.
    let cleared = env
        .instance
        .update_user(
            &token,
            &sarah,
            UserUpdate {
                email: Some(String::new()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.email, None);
}

#[tokio::test]
async fn test_delete_user_revokes_sessions() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

    env.instance.delete_user(&admin_token, &sarah).await.unwrap();

    assert!(env.instance.validate_token(&token).await.is_err());
    let err = env.instance.users().get_user(&sarah).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_disabling_a_user_revokes_sessions() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let token = env.instance.authenticate("sarah", USER_PASSWORD).await.unwrap();

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
    assert!(env.instance.validate_token(&token).await.is_err());
}

#[tokio::test]
async fn test_user_info_omits_credentials() {
    let (env, admin_token) = setup_with_admin().await;
    let sarah = create_user(&env.instance, &admin_token, "sarah", Role::User).await;
    let info = env.instance.users().get_user(&sarah).await.unwrap();
    let json = serde_json::to_string(&info).unwrap();
    assert!(!json.contains("password_hash"));
    assert!(!json.contains("argon2"));
}
