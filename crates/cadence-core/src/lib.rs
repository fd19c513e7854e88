//! Core abstractions for Cadence: the task domain model, clock, persistence and
//! alert contracts. Scheduling logic lives in `cadence-task`.

pub mod alert;
pub mod clock;
pub mod preferences;
pub mod storage;
pub mod tasks;
