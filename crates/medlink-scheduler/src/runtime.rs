//! Lifecycle of the background loops.
//!
//! Started after the store and transport are ready; stopped through a shared
//! watch channel so both loops exit at their next poll.

use std::sync::Arc;
use std::time::Duration;

use medlink_core::db::SharedDatabase;
use medlink_core::reminders::NotificationTransport;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::dispatcher::run_reminder_dispatcher;
use crate::sweeper::run_expiry_sweeper;

/// Handle to the running expiry sweeper and reminder dispatcher.
pub struct BackgroundTasks {
    stop_tx: watch::Sender<bool>,
    sweeper: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Spawn both loops on the current tokio runtime.
    pub fn start(
        store: SharedDatabase,
        transport: Arc<dyn NotificationTransport>,
        config: SchedulerConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);

        let sweeper = tokio::spawn(run_expiry_sweeper(
            store.clone(),
            config.clone(),
            stop_rx.clone(),
        ));
        let dispatcher = tokio::spawn(run_reminder_dispatcher(store, transport, config, stop_rx));

        tracing::info!("Background tasks started");
        Self {
            stop_tx,
            sweeper,
            dispatcher,
        }
    }

    /// Signal both loops and wait for them to finish their current tick.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.sweeper.await {
            tracing::error!(error = %e, "Expiry sweeper ended abnormally");
        }
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "Reminder dispatcher ended abnormally");
        }
        tracing::info!("Background tasks stopped");
    }
}

/// Sleep for `period` unless stopped first. Returns true when the loop should exit.
pub(crate) async fn sleep_or_stop(period: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => *stop.borrow(),
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
    }
}
