#![allow(dead_code)]

pub mod flaky;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use userverse_companies::{AccessGate, CompanyService, MembershipAuthority, RoleLifecycle};
use userverse_core::{ActorSnapshot, Company, NewCompany, NewUser};
use userverse_infra::{Database, InMemoryDatabase, Notification, NotificationQueue};

use self::flaky::FlakyDatabase;

pub struct Harness {
    pub db: Arc<InMemoryDatabase>,
    pub gate: AccessGate,
    pub companies: CompanyService,
    pub members: MembershipAuthority,
    pub roles: RoleLifecycle,
    pub notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        let shared: Arc<dyn Database> = db.clone();
        Self::over(db, shared)
    }

    /// Services run on a failure-injecting store; `db` still reads the
    /// underlying tables directly.
    pub fn flaky() -> (Self, FlakyDatabase) {
        let flaky = FlakyDatabase::default();
        let shared: Arc<dyn Database> = Arc::new(flaky.clone());
        (Self::over(flaky.inner.clone(), shared), flaky)
    }

    fn over(db: Arc<InMemoryDatabase>, shared: Arc<dyn Database>) -> Self {
        let (queue, notifications) = NotificationQueue::channel();
        Self {
            gate: AccessGate::new(shared.clone()),
            companies: CompanyService::new(shared.clone()),
            members: MembershipAuthority::new(shared.clone(), queue.clone()),
            roles: RoleLifecycle::new(shared, queue),
            db,
            notifications,
        }
    }

    pub async fn user(&self, email: &str) -> ActorSnapshot {
        let mut tx = self.db.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                first_name: Some("Test".into()),
                last_name: Some(email.split('@').next().unwrap_or_default().into()),
                email: email.into(),
                phone_number: None,
                password_hash: "not-a-real-hash".into(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        user.snapshot()
    }

    pub async fn company(&self, email: &str, creator: &ActorSnapshot) -> Company {
        self.companies
            .create_company(
                NewCompany {
                    name: Some(format!("{email} Ltd")),
                    description: None,
                    industry: None,
                    email: email.into(),
                    phone_number: None,
                },
                None,
                creator,
            )
            .await
            .unwrap()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}
