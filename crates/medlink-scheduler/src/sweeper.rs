//! Expiry sweeper loop.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use medlink_core::db::SharedDatabase;
use medlink_core::error::CareResult;
use medlink_core::medicines::{sweep_user, SweepStats};
use medlink_core::schedule::DailyJob;
use tokio::sync::watch;

use crate::config::SchedulerConfig;
use crate::runtime::sleep_or_stop;

/// Sweep every user, taking the store lock once per user.
///
/// A failure on one user is logged and the sweep moves on to the next.
pub fn sweep_once(store: &SharedDatabase, now: DateTime<Utc>) -> CareResult<SweepStats> {
    let user_ids = store.lock()?.list_user_ids()?;

    let mut stats = SweepStats::default();
    for user_id in user_ids {
        let result = {
            let db = store.lock()?;
            sweep_user(&db, &user_id, now)
        };
        match result {
            Ok(expired) => {
                stats.users_swept += 1;
                stats.medicines_expired += expired;
            }
            Err(e) => tracing::error!(user_id = %user_id, error = %e, "Sweep failed for user"),
        }
    }

    tracing::info!(
        users = stats.users_swept,
        expired = stats.medicines_expired,
        "Expiry sweep complete"
    );
    Ok(stats)
}

/// Sweep if the job is due. The job only advances after a successful sweep,
/// so a failed one is retried on the next poll.
pub async fn run_due_sweep(store: &SharedDatabase, job: &mut DailyJob, now: NaiveDateTime) {
    if !job.is_due(now) {
        return;
    }

    let store = store.clone();
    match tokio::task::spawn_blocking(move || sweep_once(&store, Utc::now())).await {
        Ok(Ok(_)) => {
            job.mark_ran(now);
            tracing::debug!(next_run = %job.next_run(), "Next expiry sweep scheduled");
        }
        Ok(Err(e)) => tracing::error!(error = %e, "Expiry sweep failed, retrying next poll"),
        Err(e) => tracing::error!(error = %e, "Expiry sweep task panicked, retrying next poll"),
    }
}

/// Run the daily sweep at `config.sweep_at` local time until stopped.
pub async fn run_expiry_sweeper(
    store: SharedDatabase,
    config: SchedulerConfig,
    mut stop: watch::Receiver<bool>,
) {
    let mut job = DailyJob::new(config.sweep_at, Local::now().naive_local());
    tracing::info!(next_run = %job.next_run(), "Expiry sweeper started");

    loop {
        if *stop.borrow() {
            break;
        }

        run_due_sweep(&store, &mut job, Local::now().naive_local()).await;

        if sleep_or_stop(config.poll_interval, &mut stop).await {
            break;
        }
    }

    tracing::info!("Expiry sweeper stopped");
}
