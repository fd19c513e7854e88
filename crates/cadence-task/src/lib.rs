//! Scheduling engine: recurrence arithmetic, occurrence catch-up, completion
//! and missed tracking, alarms, and the long-running scheduler loop.

pub mod advance;
pub mod alarm;
pub mod completion;
pub mod missed;
pub mod reconcile;
pub mod recurrence;
pub mod report;
pub mod repo;
pub mod scheduler;
pub mod store;
pub mod view;

pub use repo::KvTaskRepo;
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerSettings};
pub use store::TaskStore;
