use cadence_core::tasks::{Occurrence, Recurrence, Task};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::recurrence::{add_step, fixed_span, resolve_step, RecurrenceError, Step};

/// Upper bound on month and year steps taken in one catch-up.
pub const MAX_CATCH_UP_STEPS: u32 = 1_000_000;

/// First occurrence that is no longer elapsed, and how many steps it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUp {
    pub occurrence: Occurrence,
    pub steps: u64,
}

/// Step `current` forward at least once, then keep stepping while the result
/// is still elapsed at `now`. Fixed-length steps jump straight to the answer;
/// calendar months and years are walked one step at a time.
pub fn catch_up(
    current: Occurrence,
    rule: &Recurrence,
    now: NaiveDateTime,
) -> Result<CatchUp, RecurrenceError> {
    let step = resolve_step(rule)?;
    let timed = current.time.is_some();
    if step.unit.is_sub_daily() && !timed {
        return Err(RecurrenceError::TimeRequired { unit: step.unit });
    }

    match fixed_span(step)? {
        Some(span) => jump(current.instant(), span, timed, now),
        None => walk(current.instant(), step, timed, now),
    }
}

fn jump(
    start: NaiveDateTime,
    span: Duration,
    timed: bool,
    now: NaiveDateTime,
) -> Result<CatchUp, RecurrenceError> {
    // Date-only occurrences stay open for the whole of their day.
    let open_from = if timed {
        now
    } else {
        now.date().and_time(NaiveTime::MIN)
    };
    let span_ms = span.num_milliseconds();
    let behind_ms = (open_from - start).num_milliseconds();
    // Whole spans behind lands at or just before `open_from`; the loop then
    // takes at most one more step.
    let mut steps = (behind_ms / span_ms).max(1);
    loop {
        let instant = steps
            .checked_mul(span_ms)
            .and_then(Duration::try_milliseconds)
            .and_then(|offset| start.checked_add_signed(offset))
            .ok_or(RecurrenceError::OutOfRange)?;
        let next = Occurrence::from_instant(instant, timed);
        if !next.is_elapsed(now) {
            return Ok(CatchUp {
                occurrence: next,
                steps: steps.unsigned_abs(),
            });
        }
        steps += 1;
    }
}

fn walk(
    start: NaiveDateTime,
    step: Step,
    timed: bool,
    now: NaiveDateTime,
) -> Result<CatchUp, RecurrenceError> {
    let mut instant = start;
    let mut steps = 0;
    loop {
        instant = add_step(instant, step)?;
        steps += 1;
        let next = Occurrence::from_instant(instant, timed);
        if !next.is_elapsed(now) {
            return Ok(CatchUp {
                occurrence: next,
                steps: u64::from(steps),
            });
        }
        if steps >= MAX_CATCH_UP_STEPS {
            return Err(RecurrenceError::TooManySteps(steps));
        }
    }
}

/// What happened to a task's occurrence during advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Current occurrence is still open.
    NotDue,
    Advanced(Occurrence),
    /// The next occurrence would fall after the rule's end date.
    Ended,
}

/// Roll a recurring task to its next open occurrence when it was completed or
/// its occurrence lapsed. Advancing reopens the task and forgives misses.
pub fn advance_task(task: &mut Task, now: NaiveDateTime) -> Result<Advance, RecurrenceError> {
    let (Some(rule), Some(current)) = (task.recurrence.as_ref(), task.occurrence()) else {
        return Ok(Advance::NotDue);
    };
    if !task.completed && !current.is_elapsed(now) {
        return Ok(Advance::NotDue);
    }

    let CatchUp { occurrence, steps } = catch_up(current, rule, now)?;
    if rule
        .end_date
        .is_some_and(|end| occurrence.instant() > end)
    {
        debug!(task = %task.id, "recurrence ended");
        return Ok(Advance::Ended);
    }

    task.set_occurrence(occurrence);
    task.completed = false;
    task.missed_count = 0;
    task.updated_at = now;
    debug!(task = %task.id, steps, due = %occurrence.instant(), "advanced occurrence");
    Ok(Advance::Advanced(occurrence))
}
