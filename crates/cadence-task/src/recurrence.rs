use cadence_core::tasks::{IntervalUnit, Recurrence, RecurrenceKind};
use chrono::{Duration, Months, NaiveDateTime};
use thiserror::Error;

/// A recurrence rule that cannot produce a next occurrence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("custom recurrence has no interval unit")]
    MissingUnit,
    #[error("custom recurrence has no interval")]
    MissingInterval,
    #[error("recurrence interval must be a positive count, got {0}")]
    InvalidInterval(i64),
    #[error("{unit:?} recurrence needs a due time")]
    TimeRequired { unit: IntervalUnit },
    #[error("next occurrence is outside the supported date range")]
    OutOfRange,
    #[error("still behind after {0} catch-up steps")]
    TooManySteps(u32),
}

/// Resolved unit and multiplier of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub unit: IntervalUnit,
    pub count: u32,
}

/// Resolve what one recurrence step means. Fixed types imply their unit and
/// default to an interval of 1; `Custom` must spell out both.
pub fn resolve_step(rule: &Recurrence) -> Result<Step, RecurrenceError> {
    let unit = rule.resolved_unit().ok_or(RecurrenceError::MissingUnit)?;
    let interval = match (rule.kind, rule.interval) {
        (_, Some(interval)) => interval,
        (RecurrenceKind::Custom, None) => return Err(RecurrenceError::MissingInterval),
        (_, None) => 1,
    };
    let count = u32::try_from(interval)
        .ok()
        .filter(|count| *count > 0)
        .ok_or(RecurrenceError::InvalidInterval(interval))?;
    Ok(Step { unit, count })
}

/// Fixed length of a step, or `None` for calendar months and years, whose
/// length depends on where they start.
pub fn fixed_span(step: Step) -> Result<Option<Duration>, RecurrenceError> {
    let count = i64::from(step.count);
    let span = match step.unit {
        IntervalUnit::Minute => Duration::try_minutes(count),
        IntervalUnit::Hour => Duration::try_hours(count),
        IntervalUnit::Day => Duration::try_days(count),
        IntervalUnit::Week => Duration::try_weeks(count),
        IntervalUnit::Month | IntervalUnit::Year => return Ok(None),
    };
    span.map(Some).ok_or(RecurrenceError::OutOfRange)
}

/// Add one step to an instant. Month and year steps use chrono's month
/// arithmetic, which clamps to the last day of a shorter target month.
pub fn add_step(from: NaiveDateTime, step: Step) -> Result<NaiveDateTime, RecurrenceError> {
    let next = match fixed_span(step)? {
        Some(span) => from.checked_add_signed(span),
        None => calendar_months(step)
            .and_then(|months| from.checked_add_months(Months::new(months))),
    };
    next.ok_or(RecurrenceError::OutOfRange)
}

fn calendar_months(step: Step) -> Option<u32> {
    match step.unit {
        IntervalUnit::Year => step.count.checked_mul(12),
        _ => Some(step.count),
    }
}

/// The occurrence following `current` under `rule`.
pub fn next_occurrence(
    current: NaiveDateTime,
    rule: &Recurrence,
) -> Result<NaiveDateTime, RecurrenceError> {
    add_step(current, resolve_step(rule)?)
}
