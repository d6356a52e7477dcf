//! Background loops for medlink: the daily expiry sweeper and the reminder
//! dispatcher, plus the transports the daemon can deliver through.

pub mod config;
pub mod dispatcher;
pub mod runtime;
pub mod sweeper;
pub mod transport;

pub use config::{default_log_filter, ConfigError, SchedulerConfig};
pub use dispatcher::{dispatch_tick, run_reminder_dispatcher};
pub use runtime::BackgroundTasks;
pub use sweeper::{run_due_sweep, run_expiry_sweeper, sweep_once};
pub use transport::LogTransport;
#[cfg(feature = "expo-push")]
pub use transport::ExpoPushTransport;
