//! Account provisioning, sign-in and user administration.

mod common;

use std::time::Duration;

use common::*;
use serde_json::json;
use shopdesk_core::{CoreError, Permission};
use shopdesk_data::{DataError, NewPermissionProfile, NewUser, UserUpdate};
use shopdesk_store::{resources, AuthProvider, Row};

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: "  Carla Mendes ".into(),
        email: email.into(),
        password: "s3cret!".into(),
        permission_profile_id: Some("cashier-profile".into()),
    }
}

fn user_row(id: &str, name: &str, email: &str, profile_id: Option<&str>, active: bool) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), json!(id));
    row.insert("name".into(), json!(name));
    row.insert("email".into(), json!(email));
    row.insert("permission_profile_id".into(), json!(profile_id));
    row.insert("active".into(), json!(active));
    row
}

#[tokio::test(start_paused = true)]
async fn test_provision_waits_for_profile_row() {
    let h = HarnessBuilder::new()
        .profile_trigger(Duration::from_millis(1_200))
        .build();

    let user = h
        .layer
        .users()
        .provision(&admin(), new_user("Carla@Example.com"))
        .await
        .unwrap();

    assert_eq!(user.name, "Carla Mendes");
    assert_eq!(user.email, "carla@example.com");
    assert_eq!(user.permission_profile_id.as_deref(), Some("cashier-profile"));
    assert!(user.active);
    // Polled at 0, 500 and 1000ms before the row showed up at 1200ms.
    assert!(h.store.calls().select >= 3);

    h.layer.flush().await;
    let audit = h.store.dump(resources::AUDIT_LOGS).await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["action"], json!("create"));
    assert_eq!(audit[0]["entity_id"], json!(user.id));
}

#[tokio::test(start_paused = true)]
async fn test_provision_gives_up_after_max_attempts() {
    let h = HarnessBuilder::new()
        .profile_trigger(Duration::from_secs(30))
        .build();

    let err = h
        .layer
        .users()
        .provision(&admin(), new_user("late@example.com"))
        .await
        .unwrap_err();

    match err {
        DataError::ProvisioningTimedOut { email, attempts } => {
            assert_eq!(email, "late@example.com");
            assert_eq!(attempts, 10);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_provision_requires_manage_users_and_valid_input() {
    let h = harness();

    let err = h
        .layer
        .users()
        .provision(&cashier("u1"), new_user("x@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::MissingPermission { .. })));

    let mut weak = new_user("x@example.com");
    weak.password = "123".into();
    let err = h.layer.users().provision(&admin(), weak).await.unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_users_cannot_deactivate_themselves() {
    let h = harness();
    h.store
        .seed(
            resources::USERS,
            [user_row("admin", "Admin", "admin@example.com", None, true)],
        )
        .await;

    let err = h.layer.users().deactivate(&admin(), "admin").await.unwrap_err();
    match err {
        DataError::Forbidden(message) => {
            assert_eq!(message, "you cannot deactivate your own account")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    let h = harness();
    h.store
        .seed(
            resources::USERS,
            [user_row("u2", "Bruno", "bruno@example.com", None, true)],
        )
        .await;

    let users = h.layer.users();
    assert!(users.list().await.unwrap()[0].active);

    let user = users.deactivate(&admin(), "u2").await.unwrap();
    assert!(!user.active);
    // Cache was cleared by the mutation.
    assert!(!users.list().await.unwrap()[0].active);

    let user = users.reactivate(&admin(), "u2").await.unwrap();
    assert!(user.active);

    let renamed = users
        .update(
            &admin(),
            "u2",
            UserUpdate {
                name: Some("Bruno Lima".into()),
                permission_profile_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Bruno Lima");
}

#[tokio::test]
async fn test_sign_in_resolves_permissions() {
    let h = harness();
    let profile = h
        .layer
        .permission_profiles()
        .create(
            &admin(),
            NewPermissionProfile {
                name: "Cashier".into(),
                is_admin: false,
                permissions: [Permission::ManageCash].into_iter().collect(),
            },
        )
        .await
        .unwrap();

    let account = h
        .auth
        .sign_up("carla@example.com", "s3cret!", Row::new())
        .await
        .unwrap();
    h.store
        .seed(
            resources::USERS,
            [user_row(&account.id, "Carla", "carla@example.com", Some(&profile.id), true)],
        )
        .await;

    let actor = h
        .layer
        .auth()
        .sign_in(" Carla@Example.com ", "s3cret!")
        .await
        .unwrap();
    assert_eq!(actor.user_id, account.id);
    assert_eq!(actor.user_name, "Carla");
    assert!(!actor.is_admin);
    assert!(actor.has(Permission::ManageCash));
    assert!(!actor.has(Permission::ManageUsers));
}

#[tokio::test]
async fn test_inactive_user_is_rejected_and_signed_out() {
    let h = harness();
    let account = h
        .auth
        .sign_up("gone@example.com", "s3cret!", Row::new())
        .await
        .unwrap();
    h.store
        .seed(
            resources::USERS,
            [user_row(&account.id, "Gone", "gone@example.com", None, false)],
        )
        .await;

    let err = h
        .layer
        .auth()
        .sign_in("gone@example.com", "s3cret!")
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Core(CoreError::UserInactive(_))));
    assert!(h.auth.get_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_out_drops_cached_data() {
    let h = harness();
    h.layer.users().list().await.unwrap();
    assert!(!h.layer.cache().is_empty().await);

    h.layer.auth().sign_out(&admin()).await.unwrap();
    assert!(h.layer.cache().is_empty().await);
}
