//! Reminder dispatch loop.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use medlink_core::db::SharedDatabase;
use medlink_core::error::CareResult;
use medlink_core::reminders::{deliver_all, NotificationTransport, ReminderTable, TickReport};
use tokio::sync::watch;

use crate::config::SchedulerConfig;
use crate::runtime::sleep_or_stop;

/// One dispatch tick: rescan the store, fire due triggers, deliver.
///
/// The store lock is held only for the scan; sends happen without it.
pub fn dispatch_tick(
    store: &SharedDatabase,
    table: &mut ReminderTable,
    transport: &dyn NotificationTransport,
    now: NaiveDateTime,
) -> CareResult<TickReport> {
    let schedules = store.lock()?.medicine_schedules()?;
    table.rebuild(&schedules);

    let due = table.take_due(now);
    let mut report = deliver_all(&due, transport);
    report.triggers = table.len();

    if report.fired > 0 {
        tracing::info!(
            triggers = report.triggers,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Reminder tick"
        );
    }
    Ok(report)
}

/// Poll for due reminders every `config.poll_interval` until stopped.
pub async fn run_reminder_dispatcher(
    store: SharedDatabase,
    transport: Arc<dyn NotificationTransport>,
    config: SchedulerConfig,
    mut stop: watch::Receiver<bool>,
) {
    let grace = reminder_grace(&config);
    let mut table = ReminderTable::new(grace);
    tracing::info!(grace_secs = grace.num_seconds(), "Reminder dispatcher started");

    loop {
        if *stop.borrow() {
            break;
        }

        let store = store.clone();
        let transport = Arc::clone(&transport);
        let now = Local::now().naive_local();
        let tick = tokio::task::spawn_blocking(move || {
            let report = dispatch_tick(&store, &mut table, transport.as_ref(), now);
            (table, report)
        })
        .await;

        table = match tick {
            Ok((table, Ok(_))) => table,
            Ok((table, Err(e))) => {
                tracing::error!(error = %e, "Reminder tick failed");
                table
            }
            Err(e) => {
                tracing::error!(error = %e, "Reminder tick panicked, resetting trigger table");
                ReminderTable::new(grace)
            }
        };

        if sleep_or_stop(config.poll_interval, &mut stop).await {
            break;
        }
    }

    tracing::info!("Reminder dispatcher stopped");
}

fn reminder_grace(config: &SchedulerConfig) -> ChronoDuration {
    ChronoDuration::from_std(config.reminder_grace).unwrap_or_else(|_| ChronoDuration::seconds(120))
}
