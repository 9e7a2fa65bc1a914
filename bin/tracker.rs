use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use delegation_tracker::{
    CacheAside, CosmosRestReader, CronScheduler, Database, JobContext, JobTrigger, MokaStore,
    Settings,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let level: LevelFilter = settings
        .log_level
        .parse()
        .with_context(|| format!("Invalid log_level {:?}", settings.log_level))?;
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Failed to initialize logger")?;

    let db = Database::new(settings.postgres.clone())
        .await
        .context("Failed to initialize database connection")?;

    let cache = CacheAside::new(
        Arc::new(MokaStore::new(&settings.cache)),
        settings.cache.ttl(),
    );

    let reader = CosmosRestReader::new(&settings.chain_api)
        .context("Failed to initialize chain API reader")?;

    info!(
        "Tracking {} validator(s) via {}",
        settings.chain_api.validators.len(),
        settings.chain_api.base_url
    );

    let ctx = JobContext::new(
        db.postgres.clone(),
        Arc::new(reader),
        cache,
        settings.jobs.clone(),
    );
    let trigger = Arc::new(JobTrigger::new(ctx));

    let cancellation_token = CancellationToken::new();

    let cron_scheduler = CronScheduler::new(trigger, settings.jobs.clone());
    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron_scheduler.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    info!("Cron scheduler started - delegation jobs will run periodically");

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Tracker running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    cancellation_token.cancel();

    info!("Waiting for cron scheduler to stop...");
    let _ = cron_handle.await;

    info!("Shutdown complete");
    Ok(())
}
