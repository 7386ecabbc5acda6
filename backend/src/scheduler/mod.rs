pub mod refresh;

pub use refresh::{RefreshScheduler, SchedulerSettings, TickOutcome};
