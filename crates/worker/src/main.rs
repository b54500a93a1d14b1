use std::sync::Arc;

use anyhow::Context;
use coldmail_db::repositories::CustomerRepo;
use coldmail_delivery::{EmailConfig, SmtpMailer};
use coldmail_worker::{
    DispatchLoop, PgStore, RecipientStore, SendPipeline, StaleClaimReaper, WorkerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coldmail_worker=debug,coldmail_delivery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    let email_config = EmailConfig::from_env().context("SMTP_HOST must be set")?;
    let mailer = SmtpMailer::new(&email_config).context("Failed to configure SMTP mailer")?;

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = coldmail_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    coldmail_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    if config.run_migrations {
        coldmail_db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
    }

    match CustomerRepo::count_by_status(&pool).await {
        Ok(counts) => {
            for row in counts {
                tracing::info!(status = %row.status, count = row.count, "Queue snapshot");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to read queue snapshot"),
    }

    // --- Worker ---
    let store: Arc<dyn RecipientStore> = Arc::new(PgStore::new(pool));
    let cancel = CancellationToken::new();

    let reaper_handle = config.stale_sending_after.map(|stale_after| {
        let reaper = StaleClaimReaper::new(Arc::clone(&store), stale_after, config.reap_interval);
        let cancel = cancel.clone();
        tokio::spawn(async move { reaper.run(cancel).await })
    });

    let dispatch_loop = DispatchLoop::new(store, SendPipeline::new(Arc::new(mailer)), config);
    let dispatch_cancel = cancel.clone();
    let dispatch_handle = tokio::spawn(async move { dispatch_loop.run(dispatch_cancel).await });

    // --- Shutdown ---
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, finishing current cycle");
    cancel.cancel();

    dispatch_handle.await.context("Dispatch loop panicked")?;
    if let Some(handle) = reaper_handle {
        handle.await.context("Stale claim reaper panicked")?;
    }

    tracing::info!("Worker stopped");
    Ok(())
}
