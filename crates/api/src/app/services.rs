use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tracing::{info, warn};

use userverse_auth::Hs256Jwt;
use userverse_companies::{CompanyService, MembershipAuthority, RoleLifecycle};
use userverse_infra::{AppConfig, Database, InMemoryDatabase, NotificationQueue, PgDatabase};
use userverse_users::{AccountService, PasswordResetService};

/// Everything a handler needs, constructed once at start-up.
#[derive(Clone)]
pub struct AppServices {
    pub jwt: Arc<Hs256Jwt>,
    pub accounts: AccountService,
    pub password_reset: PasswordResetService,
    pub companies: CompanyService,
    pub memberships: MembershipAuthority,
    pub roles: RoleLifecycle,
}

impl AppServices {
    pub fn new(db: Arc<dyn Database>, notifications: NotificationQueue, config: &AppConfig) -> Self {
        let jwt = Hs256Jwt::new(&config.jwt.secret, Duration::minutes(config.jwt.expiry_minutes));

        Self {
            accounts: AccountService::new(db.clone(), jwt.clone(), notifications.clone()),
            password_reset: PasswordResetService::new(
                db.clone(),
                notifications.clone(),
                &config.password_reset,
            ),
            companies: CompanyService::new(db.clone()),
            memberships: MembershipAuthority::new(db.clone(), notifications.clone()),
            roles: RoleLifecycle::new(db, notifications),
            jwt: Arc::new(jwt),
        }
    }
}

/// Postgres when `database_url` is set, otherwise the in-memory store.
pub async fn connect_database(config: &AppConfig) -> anyhow::Result<Arc<dyn Database>> {
    match &config.database_url {
        Some(url) => {
            let db = PgDatabase::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            db.migrate().await.context("failed to apply schema")?;
            info!("using Postgres entity store");
            Ok(Arc::new(db))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory entity store");
            Ok(Arc::new(InMemoryDatabase::new()))
        }
    }
}
