use std::fmt::{Debug, Write as _};

use cadence_core::{
    clock::Clock,
    preferences::PreferencesUpdate,
    tasks::{NewTask, Recurrence, RecurrenceKind, Task, TaskRepository, TaskUpdate},
};
use cadence_task::{recurrence::resolve_step, report::DayStatus, TaskStore};
use chrono::{NaiveDateTime, NaiveTime};
use color_eyre::{
    eyre::{bail, eyre},
    Result,
};

use crate::{
    cli::{PrefsCommand, RepeatArgs, TaskCommand},
    config, storage,
};

const GRID_LEGEND: [DayStatus; 5] = [
    DayStatus::Completed,
    DayStatus::Missed,
    DayStatus::Pending,
    DayStatus::NotDue,
    DayStatus::NotApplicable,
];

/// Execute a task subcommand against the configured store.
pub async fn handle(cmd: TaskCommand, config: &config::Config) -> Result<()> {
    let mut store = storage::open_task_store(config).await?;
    print!("{}", execute(cmd, &mut store).await?);
    Ok(())
}

pub async fn reconcile(config: &config::Config) -> Result<()> {
    let mut store = storage::open_task_store(config).await?;
    print!("{}", run_reconcile(&mut store).await?);
    Ok(())
}

pub async fn report(days: u32, config: &config::Config) -> Result<()> {
    let mut store = storage::open_task_store(config).await?;
    // Bring counters up to date before reporting on them.
    run_reconcile(&mut store).await?;
    print!("{}", render_report(&store, days)?);
    Ok(())
}

pub async fn prefs(cmd: PrefsCommand, config: &config::Config) -> Result<()> {
    let mut store = storage::open_task_store(config).await?;
    print!("{}", execute_prefs(cmd, &mut store).await?);
    Ok(())
}

async fn execute<R: TaskRepository, C: Clock>(
    cmd: TaskCommand,
    store: &mut TaskStore<R, C>,
) -> Result<String> {
    let mut out = String::new();
    match cmd {
        TaskCommand::Add {
            title,
            description,
            priority,
            due,
            time,
            alarm,
            repeat,
        } => {
            let recurrence = recurrence_from(repeat)?;
            require_time_for_sub_daily(recurrence.as_ref(), time)?;
            let task = store
                .add(NewTask {
                    title,
                    description,
                    priority: priority.into(),
                    due_date: due,
                    due_time: time,
                    alarm_set: alarm,
                    recurrence,
                })
                .await
                .map_err(|e| eyre!(e.to_string()))?;
            writeln!(out, "Created task {}: {}", task.id, task.title)?;
        }
        TaskCommand::List { view } => {
            let filter = view
                .map(Into::into)
                .unwrap_or(store.preferences().default_view);
            let tasks = store.visible_tasks(filter);
            if tasks.is_empty() {
                writeln!(
                    out,
                    "No {} tasks. Add one with `cadence task add <title>`.",
                    lower(filter)
                )?;
            }
            for task in tasks {
                writeln!(out, "{}", task_line(task))?;
            }
        }
        TaskCommand::Show { id } => {
            let task = store
                .get(id)
                .ok_or_else(|| eyre!("task not found: {id}"))?;
            writeln!(out, "{}", task_line(task))?;
            if let Some(desc) = &task.description {
                writeln!(out, "    {desc}")?;
            }
            writeln!(out, "    created {}", stamp(task.created_at))?;
            if let Some(last) = task.last_completed {
                writeln!(out, "    last completed {}", stamp(last))?;
            }
            for record in task.completion_history.iter().filter(|r| r.completed) {
                writeln!(out, "    done {}", stamp(record.date))?;
            }
        }
        TaskCommand::Done { id } => {
            let was_completed = store.get(id).map(|task| task.completed);
            let task = store
                .toggle_completion(id)
                .await
                .map_err(|e| eyre!(e.to_string()))?;
            if was_completed == Some(false) {
                writeln!(out, "Completed: {}", task.title)?;
                if task.is_recurring() {
                    writeln!(out, "Next due {}", due_label(&task))?;
                }
            } else {
                writeln!(out, "Reopened: {}", task.title)?;
            }
        }
        TaskCommand::Edit {
            id,
            title,
            description,
            clear_description,
            priority,
            due,
            time,
            clear_due,
            alarm,
            repeat,
            no_repeat,
        } => {
            let update = TaskUpdate {
                title,
                description: clear_or(clear_description, description),
                priority: priority.map(Into::into),
                due_date: clear_or(clear_due, due),
                due_time: clear_or(clear_due, time),
                alarm_set: alarm,
                recurrence: if no_repeat {
                    Some(None)
                } else {
                    recurrence_from(repeat)?.map(Some)
                },
            };
            if update.is_empty() {
                bail!("nothing to change; pass at least one field to edit");
            }
            if let Some(current) = store.get(id) {
                let rule = match &update.recurrence {
                    Some(rule) => rule.as_ref(),
                    None => current.recurrence.as_ref(),
                };
                let time = update.due_time.unwrap_or(current.due_time);
                require_time_for_sub_daily(rule, time)?;
            }
            let task = store
                .update(id, update)
                .await
                .map_err(|e| eyre!(e.to_string()))?;
            writeln!(out, "Updated: {}", task_line(&task))?;
        }
        TaskCommand::Delete { id } => {
            let task = store.delete(id).await.map_err(|e| eyre!(e.to_string()))?;
            writeln!(out, "Deleted: {}", task.title)?;
        }
    }
    Ok(out)
}

/// Minute and hour rules only make sense on a task with a due time.
fn require_time_for_sub_daily(rule: Option<&Recurrence>, time: Option<NaiveTime>) -> Result<()> {
    if let Some(rule) = rule {
        let step = resolve_step(rule).map_err(|e| eyre!(e.to_string()))?;
        if step.unit.is_sub_daily() && time.is_none() {
            bail!("a {} recurrence needs --time", lower(step.unit));
        }
    }
    Ok(())
}

async fn run_reconcile<R: TaskRepository, C: Clock>(store: &mut TaskStore<R, C>) -> Result<String> {
    let report = store.reconcile().await.map_err(|e| eyre!(e.to_string()))?;
    let mut out = String::new();
    writeln!(
        out,
        "Advanced {}, missed {}, ended {}",
        report.advanced.len(),
        report.missed.len(),
        report.ended.len()
    )?;
    for (id, err) in &report.skipped {
        writeln!(out, "Skipped {id}: {err}")?;
    }
    Ok(out)
}

fn render_report<R: TaskRepository, C: Clock>(store: &TaskStore<R, C>, days: u32) -> Result<String> {
    let report = store.recurring_report();
    let mut out = String::new();
    writeln!(out, "Completion rate: {}%", report.completion_rate)?;
    if report.missed.is_empty() {
        writeln!(out, "No missed recurring tasks.")?;
    } else {
        writeln!(out, "Missed recurring tasks:")?;
        for task in &report.missed {
            let due = task
                .due_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".into());
            writeln!(
                out,
                "  {} ({}, due {due}) missed {}x",
                task.title,
                lower(task.kind),
                task.missed_count
            )?;
        }
    }

    let remaining = store.remaining_today();
    if remaining.is_empty() {
        writeln!(out, "\nNo remaining tasks for today.")?;
    } else {
        writeln!(out, "\nRemaining today:")?;
        for task in remaining {
            let time = task
                .due_time
                .map(|time| time.format("%H:%M").to_string())
                .unwrap_or_else(|| "all day".into());
            let rule = task.recurrence.as_ref().map(describe).unwrap_or_default();
            writeln!(
                out,
                "  {} ({}, {time}, {rule})",
                task.title,
                lower(task.priority)
            )?;
        }
    }

    let rows = store.completion_grid(days);
    if rows.is_empty() {
        return Ok(out);
    }
    writeln!(out, "\nLast {days} days:")?;
    for row in rows {
        let cells: String = row.days.iter().map(|(_, status)| cell(*status)).collect();
        writeln!(out, "  {cells}  {:>3}%  {}", row.completion_rate, row.title)?;
    }
    let legend: Vec<String> = GRID_LEGEND
        .iter()
        .map(|status| format!("{} {}", cell(*status), status.label()))
        .collect();
    writeln!(out, "  ({})", legend.join(", "))?;
    Ok(out)
}

async fn execute_prefs<R: TaskRepository, C: Clock>(
    cmd: PrefsCommand,
    store: &mut TaskStore<R, C>,
) -> Result<String> {
    let prefs = match cmd {
        PrefsCommand::Show => store.preferences().clone(),
        PrefsCommand::Set {
            view,
            show_completed,
            notifications,
            theme,
        } => {
            let update = PreferencesUpdate {
                default_view: view.map(Into::into),
                show_completed_tasks: show_completed,
                enable_notifications: notifications,
                theme: theme.map(Into::into),
            };
            if update == PreferencesUpdate::default() {
                bail!("nothing to change; pass at least one preference");
            }
            store
                .update_preferences(update)
                .await
                .map_err(|e| eyre!(e.to_string()))?
        }
    };
    let mut out = String::new();
    writeln!(out, "default view:         {}", lower(prefs.default_view))?;
    writeln!(out, "show completed tasks: {}", prefs.show_completed_tasks)?;
    writeln!(out, "notifications:        {}", prefs.enable_notifications)?;
    writeln!(out, "theme:                {}", lower(prefs.theme))?;
    Ok(out)
}

fn recurrence_from(args: RepeatArgs) -> Result<Option<Recurrence>> {
    let Some(kind) = args.repeat else {
        return Ok(None);
    };
    let rule = Recurrence {
        kind: kind.into(),
        interval: args.every,
        unit: args.unit.map(Into::into),
        // The end date covers the whole day.
        end_date: args.until.and_then(|day| day.and_hms_opt(23, 59, 59)),
    };
    resolve_step(&rule).map_err(|e| eyre!(e.to_string()))?;
    Ok(Some(rule))
}

fn clear_or<T>(clear: bool, value: Option<T>) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn task_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!(
        "{} [{mark}] {} ({})",
        task.id,
        task.title,
        lower(task.priority)
    );
    if task.due_date.is_some() {
        line.push_str(&format!(" due {}", due_label(task)));
    }
    if task.alarm_set {
        line.push_str(" alarm");
    }
    if let Some(rule) = &task.recurrence {
        line.push_str(&format!(" repeats {}", describe(rule)));
    }
    if task.missed_count > 0 {
        line.push_str(&format!(" missed {}x", task.missed_count));
    }
    line
}

fn due_label(task: &Task) -> String {
    match (task.due_date, task.due_time) {
        (Some(date), Some(time)) => format!("{date} {}", time.format("%H:%M")),
        (Some(date), None) => date.to_string(),
        (None, _) => "-".into(),
    }
}

fn describe(rule: &Recurrence) -> String {
    let Ok(step) = resolve_step(rule) else {
        return "(invalid rule)".into();
    };
    let mut text = match (rule.kind, step.count) {
        (RecurrenceKind::Custom, 1) => format!("every {}", lower(step.unit)),
        (RecurrenceKind::Custom, n) | (_, n @ 2..) => format!("every {n} {}s", lower(step.unit)),
        (kind, _) => lower(kind),
    };
    if let Some(end) = rule.end_date {
        text.push_str(&format!(" until {}", end.date()));
    }
    text
}

fn cell(status: DayStatus) -> char {
    match status {
        DayStatus::Completed => 'x',
        DayStatus::Missed => '!',
        DayStatus::Pending => 'o',
        DayStatus::NotDue => '.',
        DayStatus::NotApplicable => ' ',
    }
}

fn stamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn lower(value: impl Debug) -> String {
    format!("{value:?}").to_lowercase()
}
