use cadence_core::tasks::{Occurrence, Task};
use chrono::NaiveDate;

/// Count a miss when the occurrence a pass started from was due yesterday and
/// was still open. Looks back one calendar day only, so a long gap adds at most
/// one miss per pass.
///
/// `lapsed` and `was_completed` describe the task before the pass touched it:
/// advancement resets `missed_count`, and the lapsed occurrence is counted
/// against the freshly advanced one. `last_missed` keeps a re-run from
/// counting the same occurrence twice.
pub fn detect_missed(
    task: &mut Task,
    lapsed: Option<Occurrence>,
    was_completed: bool,
    today: NaiveDate,
) -> bool {
    if !task.is_recurring() || was_completed {
        return false;
    }
    let (Some(lapsed), Some(yesterday)) = (lapsed, today.pred_opt()) else {
        return false;
    };
    if lapsed.date != yesterday || task.last_missed == Some(lapsed.date) {
        return false;
    }

    task.missed_count = task.missed_count.saturating_add(1);
    task.last_missed = Some(lapsed.date);
    true
}

#[cfg(test)]
mod tests {
    use cadence_core::tasks::{NewTask, Recurrence};
    use chrono::NaiveDateTime;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).expect("valid date")
    }

    fn created() -> NaiveDateTime {
        date(1).and_hms_opt(8, 0, 0).expect("valid datetime")
    }

    fn daily_due(day: u32) -> Task {
        Task::new(
            NewTask {
                title: "Meditate".into(),
                due_date: Some(date(day)),
                recurrence: Some(Recurrence::daily()),
                ..NewTask::default()
            },
            created(),
        )
    }

    #[test]
    fn counts_an_open_occurrence_from_yesterday_once() {
        let mut task = daily_due(9);
        let lapsed = task.occurrence();

        assert!(detect_missed(&mut task, lapsed, false, date(10)));
        assert_eq!(task.missed_count, 1);
        assert_eq!(task.last_missed, Some(date(9)));

        assert!(!detect_missed(&mut task, lapsed, false, date(10)));
        assert_eq!(task.missed_count, 1);
    }

    #[test]
    fn ignores_completed_older_and_current_occurrences() {
        let mut done = daily_due(9);
        let lapsed = done.occurrence();
        assert!(!detect_missed(&mut done, lapsed, true, date(10)));

        let mut old = daily_due(5);
        let lapsed = old.occurrence();
        assert!(!detect_missed(&mut old, lapsed, false, date(10)));

        let mut current = daily_due(10);
        let lapsed = current.occurrence();
        assert!(!detect_missed(&mut current, lapsed, false, date(10)));

        assert_eq!(done.missed_count + old.missed_count + current.missed_count, 0);
    }

    #[test]
    fn ignores_non_recurring_tasks() {
        let mut task = daily_due(9);
        task.recurrence = None;
        let lapsed = task.occurrence();
        assert!(!detect_missed(&mut task, lapsed, false, date(10)));
        assert_eq!(task.missed_count, 0);
    }

    #[test]
    fn misses_accumulate_across_days() {
        let mut task = daily_due(9);
        let lapsed = task.occurrence();
        assert!(detect_missed(&mut task, lapsed, false, date(10)));

        task.due_date = Some(date(10));
        let lapsed = task.occurrence();
        assert!(detect_missed(&mut task, lapsed, false, date(11)));
        assert_eq!(task.missed_count, 2);
    }
}
