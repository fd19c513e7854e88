use cadence_core::tasks::Task;
use chrono::NaiveDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{
    advance::{advance_task, Advance},
    missed::detect_missed,
    recurrence::RecurrenceError,
};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub advanced: Vec<Uuid>,
    /// Tasks whose series is over; they are left as they are.
    pub ended: Vec<Uuid>,
    pub missed: Vec<Uuid>,
    /// Tasks whose rule could not be applied.
    pub skipped: Vec<(Uuid, RecurrenceError)>,
}

impl ReconcileReport {
    /// Whether the pass mutated any task.
    pub fn changed(&self) -> bool {
        !self.advanced.is_empty() || !self.missed.is_empty()
    }
}

/// Advance completed or lapsed recurring tasks and count yesterday's misses.
/// A broken rule only skips its own task.
pub fn reconcile(tasks: &mut [Task], now: NaiveDateTime) -> ReconcileReport {
    let today = now.date();
    let mut report = ReconcileReport::default();

    for task in tasks.iter_mut().filter(|task| task.is_recurring()) {
        let lapsed = task.occurrence();
        let was_completed = task.completed;

        match advance_task(task, now) {
            Ok(Advance::Advanced(_)) => report.advanced.push(task.id),
            Ok(Advance::Ended) => report.ended.push(task.id),
            Ok(Advance::NotDue) => {}
            Err(err) => {
                warn!(task = %task.id, title = %task.title, error = %err, "skipping recurrence");
                report.skipped.push((task.id, err));
            }
        }

        if detect_missed(task, lapsed, was_completed, today) {
            report.missed.push(task.id);
        }
    }

    report
}
