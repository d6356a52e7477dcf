//! Medicine reminder triggers.
//!
//! The trigger table is re-derived from the store on every dispatch tick, so
//! medicines added or expired since the last tick are picked up without a
//! separate rebuild step. Per-trigger "fired today" state survives rebuilds.

mod notify;

pub use notify::*;

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sha2::{Digest, Sha256};

use crate::models::{format_time_of_day, Medicine, MedicineSchedule};
use crate::schedule::latest_occurrence;

pub const REMINDER_TITLE: &str = "Medicine Reminder";

/// A due reminder, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub user_id: String,
    pub medicine: String,
    pub time: NaiveTime,
    pub token: Option<String>,
}

impl Reminder {
    pub fn title(&self) -> &'static str {
        REMINDER_TITLE
    }

    pub fn body(&self) -> String {
        format!("Take {} at {}.", self.medicine, format_time_of_day(self.time))
    }
}

/// What happened to a single fired reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { message_id: String },
    SkippedNoToken,
    Failed { reason: String },
}

/// Counts for one dispatch tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub triggers: usize,
    pub fired: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        self.fired += 1;
        match outcome {
            DeliveryOutcome::Sent { .. } => self.sent += 1,
            DeliveryOutcome::SkippedNoToken => self.skipped += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Trigger {
    reminder: Reminder,
    /// Date of the occurrence this trigger last fired for
    last_fired: Option<NaiveDate>,
}

/// Daily triggers keyed by (user, medicine, time).
#[derive(Debug)]
pub struct ReminderTable {
    triggers: HashMap<String, Trigger>,
    grace: Duration,
}

impl ReminderTable {
    /// `grace` bounds how late after its time a trigger may still fire.
    pub fn new(grace: Duration) -> Self {
        Self {
            triggers: HashMap::new(),
            grace,
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Reconcile the table with a fresh scan of every user's current medicines.
    ///
    /// New triggers are added, vanished ones dropped, and surviving triggers
    /// keep their fired state while picking up the latest token.
    pub fn rebuild(&mut self, schedules: &[MedicineSchedule]) {
        let mut next = HashMap::with_capacity(self.triggers.len());
        for schedule in schedules {
            let mut seen: HashMap<(&str, DateTime<Utc>), u32> = HashMap::new();
            for medicine in &schedule.medicines {
                // Identical entries each get their own trigger
                let copy = seen.entry((medicine.name.as_str(), medicine.created_at)).or_insert(0);
                let ordinal = *copy;
                *copy += 1;

                for &time in &medicine.times {
                    let key = trigger_key(&schedule.user_id, medicine, ordinal, time);
                    let last_fired = self.triggers.get(&key).and_then(|t| t.last_fired);
                    next.insert(
                        key,
                        Trigger {
                            reminder: Reminder {
                                user_id: schedule.user_id.clone(),
                                medicine: medicine.name.clone(),
                                time,
                                token: schedule.notification_token.clone(),
                            },
                            last_fired,
                        },
                    );
                }
            }
        }
        self.triggers = next;
    }

    /// Collect reminders due at `now` and mark them fired for this occurrence.
    pub fn take_due(&mut self, now: NaiveDateTime) -> Vec<Reminder> {
        let mut due = Vec::new();
        for trigger in self.triggers.values_mut() {
            let occurrence = latest_occurrence(trigger.reminder.time, now);
            if now - occurrence > self.grace {
                continue;
            }
            if trigger.last_fired == Some(occurrence.date()) {
                continue;
            }
            trigger.last_fired = Some(occurrence.date());
            due.push(trigger.reminder.clone());
        }
        due.sort_by(|a, b| (a.time, &a.user_id, &a.medicine).cmp(&(b.time, &b.user_id, &b.medicine)));
        due
    }
}

/// Stable identity of a trigger across rebuilds.
///
/// `ordinal` tells apart entries that share a name and creation instant.
pub fn trigger_key(user_id: &str, medicine: &Medicine, ordinal: u32, time: NaiveTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(medicine.name.as_bytes());
    hasher.update([0u8]);
    hasher.update(medicine.created_at.to_rfc3339().as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_be_bytes());
    hasher.update([0u8]);
    hasher.update(format_time_of_day(time).as_bytes());
    hex::encode(hasher.finalize())
}

/// Send one reminder. Missing tokens and transport errors are logged, not raised.
pub fn deliver(reminder: &Reminder, transport: &dyn NotificationTransport) -> DeliveryOutcome {
    let Some(token) = reminder.token.as_deref() else {
        tracing::warn!(
            user_id = %reminder.user_id,
            medicine = %reminder.medicine,
            "No notification token, skipping reminder"
        );
        return DeliveryOutcome::SkippedNoToken;
    };

    match transport.send(token, reminder.title(), &reminder.body()) {
        Ok(message_id) => {
            tracing::info!(
                user_id = %reminder.user_id,
                medicine = %reminder.medicine,
                message_id = %message_id,
                "Reminder sent"
            );
            DeliveryOutcome::Sent { message_id }
        }
        Err(e) => {
            tracing::error!(
                user_id = %reminder.user_id,
                medicine = %reminder.medicine,
                error = %e,
                "Reminder delivery failed"
            );
            DeliveryOutcome::Failed { reason: e.to_string() }
        }
    }
}

/// Deliver a batch of due reminders in order and tally the outcomes.
pub fn deliver_all(reminders: &[Reminder], transport: &dyn NotificationTransport) -> TickReport {
    let mut report = TickReport::default();
    for reminder in reminders {
        report.record(&deliver(reminder, transport));
    }
    report
}
