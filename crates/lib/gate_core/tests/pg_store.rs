//! Postgres store tests.
//!
//! Run against the database named by `DATABASE_URL`; each test returns early
//! when it is unset. Keys are random so runs do not collide.

use gate_core::models::audit::AuditStatus;
use gate_core::models::auth::AdminRole;
use gate_core::store::{
    AdminUpdate, AuditFilter, AuditLog, CredentialStore, ListQuery, NewAdmin, NewAuditEntry,
    NewUser, PgCredentialStore, StoreError, UserUpdate,
};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn store() -> Option<PgCredentialStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    gate_core::migrate::migrate(&pool).await.expect("migrate");
    Some(PgCredentialStore::new(pool))
}

fn random_phone() -> String {
    format!("+1{:012}", Uuid::new_v4().as_u128() % 1_000_000_000_000)
}

fn new_user(phone: &str) -> NewUser {
    NewUser {
        phone: phone.into(),
        password_hash: "hash".into(),
    }
}

fn new_admin(username: &str) -> NewAdmin {
    NewAdmin {
        id: None,
        username: username.into(),
        password_hash: "hash".into(),
        role: AdminRole::Standard,
    }
}

#[tokio::test]
async fn deleted_user_frees_phone() {
    let Some(store) = store().await else { return };
    let phone = random_phone();

    let user = store.create_user(new_user(&phone)).await.unwrap();
    assert_eq!(user.token_version, 0);
    let err = store.create_user(new_user(&phone)).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate("phone")));

    assert!(store.soft_delete_user(user.id).await.unwrap());
    assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
    assert!(!store.phone_exists(&phone).await.unwrap());
    assert!(!store.soft_delete_user(user.id).await.unwrap());

    let again = store.create_user(new_user(&phone)).await.unwrap();
    assert_ne!(again.id, user.id);
}

#[tokio::test]
async fn session_update_is_compare_and_swap() {
    let Some(store) = store().await else { return };
    let user = store.create_user(new_user(&random_phone())).await.unwrap();

    assert!(
        store
            .update_user_session(user.id, 0, 1, Some("dev-a"))
            .await
            .unwrap()
    );
    assert!(!store.update_user_session(user.id, 0, 1, None).await.unwrap());
    // No device keeps the stored one.
    assert!(store.update_user_session(user.id, 1, 2, None).await.unwrap());

    let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(user.token_version, 2);
    assert_eq!(user.current_device_id.as_deref(), Some("dev-a"));
}

#[tokio::test]
async fn user_update_bumps_only_when_asked() {
    let Some(store) = store().await else { return };
    let user = store.create_user(new_user(&random_phone())).await.unwrap();
    let taken = store.create_user(new_user(&random_phone())).await.unwrap();

    let updated = store
        .update_user(
            user.id,
            UserUpdate {
                password_hash: Some("other".into()),
                bump_version: true,
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.token_version, 1);
    assert_eq!(updated.password_hash, "other");

    let err = store
        .update_user(
            user.id,
            UserUpdate {
                phone: Some(taken.phone.clone()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate("phone")));
}

#[tokio::test]
async fn admin_versions_and_username_reuse() {
    let Some(store) = store().await else { return };
    let username = format!("ops-{}", Uuid::new_v4().simple());
    let admin = store.create_admin(new_admin(&username)).await.unwrap();

    assert_eq!(store.bump_admin_version(admin.id).await.unwrap(), Some(1));
    let updated = store
        .update_admin(
            admin.id,
            AdminUpdate {
                role: Some(AdminRole::Elevated),
                ..AdminUpdate::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.role, AdminRole::Elevated);
    assert_eq!(updated.token_version, 1);

    let err = store.create_admin(new_admin(&username)).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate("username")));
    assert!(store.soft_delete_admin(admin.id).await.unwrap());
    assert_eq!(store.bump_admin_version(admin.id).await.unwrap(), None);
    store.create_admin(new_admin(&username)).await.unwrap();
}

#[tokio::test]
async fn audit_entries_round_trip_and_filter() {
    let Some(store) = store().await else { return };
    let admin_id = Uuid::new_v4();
    let entry = |action: &str, status| NewAuditEntry {
        admin_id,
        admin_name: "root".into(),
        action: action.into(),
        resource_type: "user".into(),
        resource_id: Uuid::new_v4().to_string(),
        details: Some("phone changed".into()),
        ip_address: Some("10.0.0.1".into()),
        user_agent: None,
        status,
        error_message: None,
    };

    let created = store
        .record_audit(entry("create_user", AuditStatus::Success))
        .await
        .unwrap();
    store
        .record_audit(entry("delete_user", AuditStatus::Failed))
        .await
        .unwrap();

    let filter = AuditFilter {
        admin_id: Some(admin_id),
        ..AuditFilter::default()
    };
    let page = store
        .list_audit(&ListQuery::default(), &filter)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].action, "delete_user");
    assert_eq!(page.items[0].status, AuditStatus::Failed);

    let filter = AuditFilter {
        admin_id: Some(admin_id),
        action: Some("create_user".into()),
        ..AuditFilter::default()
    };
    let page = store
        .list_audit(&ListQuery::default(), &filter)
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let found = store.find_audit(created.id).await.unwrap().unwrap();
    assert_eq!(found.details.as_deref(), Some("phone changed"));
    assert_eq!(found.ip_address.as_deref(), Some("10.0.0.1"));
}
