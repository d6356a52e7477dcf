//! medlinkd: runs the expiry sweeper and reminder dispatcher against a store.

use std::sync::Arc;

use anyhow::Context;
use medlink_core::db::Database;
use medlink_core::reminders::NotificationTransport;
use medlink_scheduler::{default_log_filter, BackgroundTasks, SchedulerConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .init();

    let config = SchedulerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        database = %config.database_path.display(),
        poll_secs = config.poll_interval.as_secs(),
        sweep_at = %config.sweep_at,
        "medlinkd starting v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?
        .into_shared();

    // Built outside the async runtime; the blocking HTTP client must not be
    // created or dropped on a runtime thread.
    let transport = build_transport();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async {
        let tasks = BackgroundTasks::start(store, Arc::clone(&transport), config);
        tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
        tracing::info!("Shutdown requested");
        tasks.shutdown().await;
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(())
}

#[cfg(feature = "expo-push")]
fn build_transport() -> Arc<dyn NotificationTransport> {
    let url = std::env::var(medlink_scheduler::config::ENV_EXPO_PUSH_URL).ok();
    Arc::new(medlink_scheduler::ExpoPushTransport::new(url))
}

#[cfg(not(feature = "expo-push"))]
fn build_transport() -> Arc<dyn NotificationTransport> {
    tracing::warn!("Built without expo-push; reminders are logged, not delivered");
    Arc::new(medlink_scheduler::LogTransport)
}
