use cadence_core::tasks::{CompletionRecord, Task};
use chrono::NaiveDateTime;

/// Mark the current occurrence done and log it in the task's history. The due
/// date is left alone; the next reconciliation pass rolls recurring tasks on.
pub fn record_completion(task: &mut Task, now: NaiveDateTime) {
    task.completed = true;
    task.last_completed = Some(now);
    task.completion_history.push(CompletionRecord {
        date: now,
        completed: true,
    });
    task.updated_at = now;
}

/// Flip completion and return the new state. Only the incomplete to complete
/// transition is recorded.
pub fn toggle_completion(task: &mut Task, now: NaiveDateTime) -> bool {
    if task.completed {
        task.completed = false;
        task.updated_at = now;
    } else {
        record_completion(task, now);
    }
    task.completed
}

#[cfg(test)]
mod tests {
    use cadence_core::tasks::NewTask;
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(12, 0, 0))
            .expect("valid datetime")
    }

    #[test]
    fn completion_appends_exactly_one_record() {
        let now = noon();
        let mut task = Task::new(NewTask::titled("Journal"), now);

        assert!(toggle_completion(&mut task, now));
        assert_eq!(task.last_completed, Some(now));
        assert_eq!(
            task.completion_history,
            vec![CompletionRecord {
                date: now,
                completed: true
            }]
        );
    }

    #[test]
    fn reopening_keeps_history_untouched() {
        let now = noon();
        let mut task = Task::new(NewTask::titled("Journal"), now);
        toggle_completion(&mut task, now);
        let history = task.completion_history.clone();

        let later = now + Duration::minutes(5);
        assert!(!toggle_completion(&mut task, later));
        assert_eq!(task.completion_history, history);
        assert_eq!(task.last_completed, Some(now));

        assert!(toggle_completion(&mut task, later));
        assert_eq!(task.completion_history.len(), 2);
        assert_eq!(task.completion_history[0], history[0]);
        assert_eq!(task.last_completed, Some(later));
    }
}
