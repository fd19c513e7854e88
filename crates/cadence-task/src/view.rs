use cadence_core::{preferences::ViewFilter, tasks::Task};
use chrono::NaiveDate;

/// Whether a task belongs in `filter` on `today`. Tasks without a due date
/// count as upcoming.
pub fn is_visible(task: &Task, filter: ViewFilter, show_completed: bool, today: NaiveDate) -> bool {
    if task.completed && !show_completed {
        return false;
    }
    match filter {
        ViewFilter::Today => task.due_date == Some(today),
        ViewFilter::Upcoming => task.due_date.is_none_or(|due| due > today),
        ViewFilter::All => true,
    }
}

pub fn visible_tasks(
    tasks: &[Task],
    filter: ViewFilter,
    show_completed: bool,
    today: NaiveDate,
) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| is_visible(task, filter, show_completed, today))
        .collect()
}
