use cadence_core::tasks::{RecurrenceKind, Task};
use chrono::{Days, NaiveDate};
use uuid::Uuid;

/// A recurring task that has missed occurrences on record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedTask {
    pub id: Uuid,
    pub title: String,
    pub kind: RecurrenceKind,
    pub due_date: Option<NaiveDate>,
    pub missed_count: u32,
}

/// Summary of how recurring tasks are being kept up.
///
/// `missed_count` restarts with every advancement before the lapsed
/// occurrence is counted, so a task that is never completed holds a single
/// miss. Ties in the `missed` ordering are common and keep collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringReport {
    pub missed: Vec<MissedTask>,
    /// Completions over completions plus misses, in percent.
    pub completion_rate: u8,
}

pub fn recurring_report(tasks: &[Task]) -> RecurringReport {
    let mut completions = 0;
    let mut misses = 0;
    let mut missed = Vec::new();

    for task in tasks {
        let Some(rule) = &task.recurrence else {
            continue;
        };
        completions += task
            .completion_history
            .iter()
            .filter(|record| record.completed)
            .count();
        misses += task.missed_count as usize;
        if task.missed_count > 0 {
            missed.push(MissedTask {
                id: task.id,
                title: task.title.clone(),
                kind: rule.kind,
                due_date: task.due_date,
                missed_count: task.missed_count,
            });
        }
    }
    missed.sort_by(|a, b| b.missed_count.cmp(&a.missed_count));

    RecurringReport {
        missed,
        completion_rate: percent(completions, completions + misses),
    }
}

/// Open recurring tasks due on `today`, all-day ones first, then by time.
pub fn remaining_today(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let mut remaining: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.is_recurring() && !task.completed && task.due_date == Some(today))
        .collect();
    remaining.sort_by_key(|task| task.due_time);
    remaining
}

/// How a recurring task fared on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Completed,
    Missed,
    /// Due today and still open.
    Pending,
    NotDue,
    /// The task did not exist yet.
    NotApplicable,
}

impl DayStatus {
    pub fn label(self) -> &'static str {
        match self {
            DayStatus::Completed => "completed",
            DayStatus::Missed => "missed",
            DayStatus::Pending => "pending",
            DayStatus::NotDue => "not-due",
            DayStatus::NotApplicable => "not-applicable",
        }
    }
}

/// Per-day history of one recurring task, oldest day first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRow {
    pub task_id: Uuid,
    pub title: String,
    pub days: Vec<(NaiveDate, DayStatus)>,
    pub completion_rate: u8,
}

/// Completion grid of every recurring task over the `days` days ending today.
pub fn completion_grid(tasks: &[Task], today: NaiveDate, days: u32) -> Vec<CompletionRow> {
    tasks
        .iter()
        .filter(|task| task.is_recurring())
        .map(|task| {
            let days: Vec<_> = (0..days)
                .rev()
                .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
                .map(|day| (day, day_status(task, day, today)))
                .collect();
            let completed = count(&days, DayStatus::Completed);
            let missed = count(&days, DayStatus::Missed);
            CompletionRow {
                task_id: task.id,
                title: task.title.clone(),
                days,
                completion_rate: percent(completed, completed + missed),
            }
        })
        .collect()
}

fn day_status(task: &Task, day: NaiveDate, today: NaiveDate) -> DayStatus {
    if day < task.created_at.date() {
        return DayStatus::NotApplicable;
    }
    let completed_that_day = task
        .completion_history
        .iter()
        .any(|record| record.completed && record.date.date() == day);
    if completed_that_day {
        DayStatus::Completed
    } else if task.last_missed == Some(day) {
        DayStatus::Missed
    } else if task.due_date == Some(day) {
        if day < today {
            DayStatus::Missed
        } else {
            DayStatus::Pending
        }
    } else {
        DayStatus::NotDue
    }
}

fn count(days: &[(NaiveDate, DayStatus)], status: DayStatus) -> usize {
    days.iter().filter(|(_, s)| *s == status).count()
}

/// Rounded percentage; nothing to account for counts as 100%.
fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 100;
    }
    u8::try_from((part * 100 + whole / 2) / whole).unwrap_or(100)
}
