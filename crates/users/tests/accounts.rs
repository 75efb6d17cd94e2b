use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use userverse_auth::{BasicCredentials, Hs256Jwt, JwtValidator};
use userverse_core::{Pagination, UserCompanyFilter};
use userverse_infra::config::PasswordResetConfig;
use userverse_infra::{Database, InMemoryDatabase, Notification, NotificationQueue};
use userverse_users::{AccountService, PasswordResetService, ProfileUpdate, Registration};

struct Harness {
    accounts: AccountService,
    resets: PasswordResetService,
    jwt: Hs256Jwt,
    notifications: UnboundedReceiver<Notification>,
}

fn harness() -> Harness {
    let db: Arc<dyn Database> = Arc::new(InMemoryDatabase::new());
    let (queue, notifications) = NotificationQueue::channel();
    let jwt = Hs256Jwt::new("test-secret", Duration::minutes(60));
    Harness {
        accounts: AccountService::new(db.clone(), jwt.clone(), queue.clone()),
        resets: PasswordResetService::new(db, queue, &PasswordResetConfig::default()),
        jwt,
        notifications,
    }
}

fn creds(email: &str, password: &str) -> BasicCredentials {
    BasicCredentials {
        email: email.into(),
        password: password.into(),
    }
}

fn profile() -> Registration {
    Registration {
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        phone_number: None,
    }
}

impl Harness {
    fn last_otp(&mut self) -> String {
        let mut otp = None;
        while let Ok(n) = self.notifications.try_recv() {
            if let Notification::PasswordResetRequested { otp: code, .. } = n {
                otp = Some(code);
            }
        }
        otp.expect("no reset notification")
    }
}

#[tokio::test]
async fn register_then_login_issues_valid_token() {
    let mut h = harness();
    let user = h.accounts.register(&creds("a@x.com", "pw-1"), profile()).await.unwrap();
    assert_ne!(user.password_hash, "pw-1");

    match h.notifications.try_recv().unwrap() {
        Notification::UserRegistered { user_id, display_name, .. } => {
            assert_eq!(user_id, user.id);
            assert_eq!(display_name, "Ada Lovelace");
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    let now = Utc::now();
    let token = h.accounts.login(&creds("a@x.com", "pw-1"), now).await.unwrap();
    assert_eq!(token.token_type, "bearer");
    let claims = h.jwt.validate(&token.access_token, now).unwrap();
    assert_eq!(claims.sub, user.id);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let h = harness();
    h.accounts.register(&creds("a@x.com", "pw"), profile()).await.unwrap();
    let err = h
        .accounts
        .register(&creds("a@x.com", "other"), profile())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
}

#[tokio::test]
async fn bad_logins_are_unauthorized() {
    let h = harness();
    let user = h.accounts.register(&creds("a@x.com", "pw"), profile()).await.unwrap();

    let err = h.accounts.login(&creds("a@x.com", "nope"), Utc::now()).await.unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    let err = h.accounts.login(&creds("b@x.com", "pw"), Utc::now()).await.unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    h.accounts.deactivate(user.id).await.unwrap();
    let err = h.accounts.login(&creds("a@x.com", "pw"), Utc::now()).await.unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    let err = h.accounts.get_user(user.id).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn profile_updates() {
    let h = harness();
    let user = h.accounts.register(&creds("a@x.com", "old"), profile()).await.unwrap();

    let err = h
        .accounts
        .update_user(user.id, ProfileUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let updated = h
        .accounts
        .update_user(
            user.id,
            ProfileUpdate {
                first_name: Some("Augusta".into()),
                password: Some("new".into()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name.as_deref(), Some("Augusta"));
    assert_eq!(updated.last_name.as_deref(), Some("Lovelace"));

    assert!(h.accounts.login(&creds("a@x.com", "old"), Utc::now()).await.is_err());
    assert!(h.accounts.login(&creds("a@x.com", "new"), Utc::now()).await.is_ok());
}

#[tokio::test]
async fn new_user_has_no_companies() {
    let h = harness();
    let user = h.accounts.register(&creds("a@x.com", "pw"), profile()).await.unwrap();
    let page = h
        .accounts
        .list_companies(user.id, &UserCompanyFilter::default(), Pagination::new(None, None).unwrap())
        .await
        .unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.pagination.total_pages, 0);
}

#[tokio::test]
async fn password_reset_round() {
    let mut h = harness();
    h.accounts.register(&creds("a@x.com", "old"), profile()).await.unwrap();

    let t0 = Utc::now();
    h.resets.request_reset("a@x.com", t0).await.unwrap();
    let otp = h.last_otp();
    assert_eq!(otp.len(), 6);

    let err = h
        .resets
        .reset_with_otp("a@x.com", "not-it", "new", t0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let user = h
        .resets
        .reset_with_otp("a@x.com", &otp, "new", t0 + Duration::minutes(5))
        .await
        .unwrap();
    assert!(user.metadata.primary().password_reset().unwrap().consumed_at.is_some());

    assert!(h.accounts.login(&creds("a@x.com", "old"), Utc::now()).await.is_err());
    assert!(h.accounts.login(&creds("a@x.com", "new"), Utc::now()).await.is_ok());

    // Single use.
    let err = h
        .resets
        .reset_with_otp("a@x.com", &otp, "newer", t0 + Duration::minutes(6))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn expired_otp_is_rejected() {
    let mut h = harness();
    h.accounts.register(&creds("a@x.com", "old"), profile()).await.unwrap();

    let t0 = Utc::now();
    h.resets.request_reset("a@x.com", t0).await.unwrap();
    let otp = h.last_otp();

    let err = h
        .resets
        .reset_with_otp("a@x.com", &otp, "new", t0 + Duration::minutes(60))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert!(h.accounts.login(&creds("a@x.com", "old"), Utc::now()).await.is_ok());
}

#[tokio::test]
async fn reset_requires_known_email_and_a_request() {
    let h = harness();
    let err = h.resets.request_reset("ghost@x.com", Utc::now()).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");

    h.accounts.register(&creds("a@x.com", "pw"), profile()).await.unwrap();
    let err = h
        .resets
        .reset_with_otp("a@x.com", "123456", "new", Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn repeated_wrong_codes_burn_the_ticket() {
    let mut h = harness();
    let user = h.accounts.register(&creds("a@x.com", "old"), profile()).await.unwrap();

    let t0 = Utc::now();
    h.resets.request_reset("a@x.com", t0).await.unwrap();
    let otp = h.last_otp();

    let limit = PasswordResetConfig::default().max_attempts;
    for _ in 0..limit {
        let err = h
            .resets
            .reset_with_otp("a@x.com", "not-it", "new", t0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    let ticket = h
        .accounts
        .get_user(user.id)
        .await
        .unwrap()
        .metadata
        .primary()
        .password_reset()
        .unwrap();
    assert_eq!(ticket.failed_attempts, limit);
    assert!(ticket.consumed_at.is_some());

    // The right code no longer helps.
    let err = h
        .resets
        .reset_with_otp("a@x.com", &otp, "new", t0 + Duration::minutes(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert!(h.accounts.login(&creds("a@x.com", "old"), Utc::now()).await.is_ok());

    // A fresh request starts over.
    h.resets.request_reset("a@x.com", t0 + Duration::minutes(2)).await.unwrap();
    let otp = h.last_otp();
    h.resets
        .reset_with_otp("a@x.com", &otp, "new", t0 + Duration::minutes(3))
        .await
        .unwrap();
    assert!(h.accounts.login(&creds("a@x.com", "new"), Utc::now()).await.is_ok());
}
