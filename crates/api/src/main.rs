use std::sync::Arc;

use anyhow::Context;
use userverse_api::app::{self, services, AppServices};
use userverse_infra::{AppConfig, Environment, LogNotifier, NotificationQueue};
use userverse_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    userverse_observability::init_with(match config.environment {
        Environment::Development => LogFormat::Compact,
        Environment::Test | Environment::Production => LogFormat::Json,
    });

    let db = services::connect_database(&config).await?;
    let (notifications, _worker) = NotificationQueue::spawn(Arc::new(LogNotifier));
    let services = Arc::new(AppServices::new(db, notifications, &config));

    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        environment = ?config.environment,
        version = %config.version,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
