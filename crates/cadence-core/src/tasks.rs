use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::preferences::UserPreferences;

/// Task priority as shown to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Named recurrence families. Every type except `Custom` implies its unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

/// Calendar unit an interval multiplies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    /// Units shorter than a day only make sense for tasks with a due time.
    pub fn is_sub_daily(self) -> bool {
        matches!(self, IntervalUnit::Minute | IntervalUnit::Hour)
    }
}

/// Recurrence rule carried by repeating tasks. A task without one never
/// advances on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    /// "Every N units". Implied 1 for the fixed types; required for `Custom`.
    /// Signed on purpose: a bad stored value must surface as a rule error,
    /// not as an unreadable task collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// Only consulted for `Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<IntervalUnit>,
    /// No occurrence is scheduled after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
}

impl Recurrence {
    pub fn new(kind: RecurrenceKind) -> Self {
        Self {
            kind,
            interval: None,
            unit: None,
            end_date: None,
        }
    }

    pub fn daily() -> Self {
        Self::new(RecurrenceKind::Daily)
    }

    /// `Custom` rule: every `interval` `unit`s.
    pub fn custom(interval: i64, unit: IntervalUnit) -> Self {
        Self {
            kind: RecurrenceKind::Custom,
            interval: Some(interval),
            unit: Some(unit),
            end_date: None,
        }
    }

    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn until(mut self, end: NaiveDateTime) -> Self {
        self.end_date = Some(end);
        self
    }

    /// The unit implied by the type, or the explicit unit for `Custom`.
    pub fn resolved_unit(&self) -> Option<IntervalUnit> {
        match self.kind {
            RecurrenceKind::Hourly => Some(IntervalUnit::Hour),
            RecurrenceKind::Daily => Some(IntervalUnit::Day),
            RecurrenceKind::Weekly => Some(IntervalUnit::Week),
            RecurrenceKind::Monthly => Some(IntervalUnit::Month),
            RecurrenceKind::Yearly => Some(IntervalUnit::Year),
            RecurrenceKind::Custom => self.unit,
        }
    }
}

/// One entry of a task's completion history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub date: NaiveDateTime,
    pub completed: bool,
}

/// The due point of a task's current occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl Occurrence {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    /// Rebuild an occurrence from an instant, keeping the time only for timed
    /// occurrences.
    pub fn from_instant(instant: NaiveDateTime, timed: bool) -> Self {
        Self {
            date: instant.date(),
            time: timed.then(|| instant.time()),
        }
    }

    /// Due instant; date-only occurrences are anchored at midnight.
    pub fn instant(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }

    /// Timed occurrences lapse at their instant, date-only ones once their
    /// whole day has passed.
    pub fn is_elapsed(&self, now: NaiveDateTime) -> bool {
        match self.time {
            Some(_) => self.instant() < now,
            None => self.date < now.date(),
        }
    }
}

/// Task entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<NaiveDateTime>,
    #[serde(default)]
    pub completion_history: Vec<CompletionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub alarm_set: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub missed_count: u32,
    /// Date of the last occurrence counted in `missed_count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_missed: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    pub fn new(input: NewTask, now: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: input.description,
            priority: input.priority,
            completed: false,
            last_completed: None,
            completion_history: Vec::new(),
            due_date: input.due_date,
            due_time: input.due_time,
            alarm_set: input.alarm_set,
            recurrence: input.recurrence,
            missed_count: 0,
            last_missed: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Current occurrence, if the task has a due date.
    pub fn occurrence(&self) -> Option<Occurrence> {
        self.due_date
            .map(|date| Occurrence::new(date, self.due_time))
    }

    pub fn set_occurrence(&mut self, occurrence: Occurrence) {
        self.due_date = Some(occurrence.date);
        self.due_time = occurrence.time;
    }
}

/// User-supplied fields for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub alarm_set: bool,
    pub recurrence: Option<Recurrence>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial edit of a task. `None` leaves a field alone; `Some(None)` clears an
/// optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub due_time: Option<Option<NaiveTime>>,
    pub alarm_set: Option<bool>,
    pub recurrence: Option<Option<Recurrence>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    /// Apply the edit. Completion state is only changed through toggling.
    pub fn apply(self, task: &mut Task, now: NaiveDateTime) -> Result<(), TaskError> {
        if let Some(title) = self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(TaskError::EmptyTitle);
            }
            task.title = title.to_string();
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(due_time) = self.due_time {
            task.due_time = due_time;
        }
        if let Some(alarm_set) = self.alarm_set {
            task.alarm_set = alarm_set;
        }
        if let Some(recurrence) = self.recurrence {
            if recurrence.is_none() {
                task.missed_count = 0;
                task.last_missed = None;
            }
            task.recurrence = recurrence;
        }
        task.updated_at = now;
        Ok(())
    }
}

/// Errors raised by task mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task title must not be empty")]
    EmptyTitle,
    #[error("task not found: {id}")]
    NotFound { id: Uuid },
    #[error("invalid due time {value:?}, expected HH:MM")]
    InvalidDueTime { value: String },
}

/// Parse a 24-hour `HH:MM` due time.
pub fn parse_due_time(value: &str) -> Result<NaiveTime, TaskError> {
    NaiveTime::parse_from_str(value.trim(), hhmm::FORMAT).map_err(|_| TaskError::InvalidDueTime {
        value: value.to_string(),
    })
}

/// Persistence contract for the task collection and the user preferences.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn load_tasks(&self) -> anyhow::Result<Vec<Task>>;
    async fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()>;
    async fn load_preferences(&self) -> anyhow::Result<UserPreferences>;
    async fn save_preferences(&self, preferences: &UserPreferences) -> anyhow::Result<()>;
}

/// `HH:MM` wire format for due times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => s.serialize_some(&time.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.filter(|value| !value.is_empty())
            .map(|value| NaiveTime::parse_from_str(&value, FORMAT).map_err(D::Error::custom))
            .transpose()
    }
}
