//! Background processing.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig, schedule_overdue_scan};
