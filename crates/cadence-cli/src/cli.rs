use cadence_core::{
    preferences::{Theme, ViewFilter},
    tasks::{IntervalUnit, Priority, RecurrenceKind},
};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    about = "Recurring tasks with reminders, missed-occurrence tracking and reports",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to running the scheduler when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the scheduler in the foreground (Ctrl-C to stop).
    Run,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Create, list and edit tasks.
    #[command(subcommand)]
    Task(TaskCommand),
    /// Advance lapsed recurring tasks and count misses now.
    Reconcile,
    /// Recurring task report and completion grid.
    Report {
        /// Days shown in the completion grid.
        #[arg(long, default_value_t = 10)]
        days: u32,
    },
    /// Show or change preferences.
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Add a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        /// Due date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Due time (HH:MM, 24h).
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,
        /// Fire a reminder at the due time.
        #[arg(long)]
        alarm: bool,
        #[command(flatten)]
        repeat: RepeatArgs,
    },
    /// List tasks; defaults to the preferred view.
    List {
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
    },
    /// Show one task with its completion history.
    Show { id: Uuid },
    /// Toggle completion. Completing a recurring task schedules the next one.
    Done { id: Uuid },
    /// Edit a task.
    Edit {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        #[arg(long, value_parser = parse_time, conflicts_with = "clear_due")]
        time: Option<NaiveTime>,
        /// Remove both due date and due time.
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        alarm: Option<bool>,
        #[command(flatten)]
        repeat: RepeatArgs,
        /// Make the task non-recurring.
        #[arg(long, conflicts_with = "repeat")]
        no_repeat: bool,
    },
    /// Delete a task.
    Delete { id: Uuid },
}

/// Recurrence rule flags shared by `add` and `edit`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatArgs {
    #[arg(long, value_enum)]
    pub repeat: Option<RepeatArg>,
    /// Every N units (default 1).
    #[arg(long, requires = "repeat", allow_negative_numbers = true)]
    pub every: Option<i64>,
    /// Unit for `--repeat custom`.
    #[arg(long, value_enum, requires = "repeat")]
    pub unit: Option<UnitArg>,
    /// Last day an occurrence may fall on (YYYY-MM-DD).
    #[arg(long, requires = "repeat")]
    pub until: Option<NaiveDate>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PrefsCommand {
    Show,
    Set {
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        #[arg(long)]
        show_completed: Option<bool>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatArg {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl From<RepeatArg> for RecurrenceKind {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Hourly => RecurrenceKind::Hourly,
            RepeatArg::Daily => RecurrenceKind::Daily,
            RepeatArg::Weekly => RecurrenceKind::Weekly,
            RepeatArg::Monthly => RecurrenceKind::Monthly,
            RepeatArg::Yearly => RecurrenceKind::Yearly,
            RepeatArg::Custom => RecurrenceKind::Custom,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitArg {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl From<UnitArg> for IntervalUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Minute => IntervalUnit::Minute,
            UnitArg::Hour => IntervalUnit::Hour,
            UnitArg::Day => IntervalUnit::Day,
            UnitArg::Week => IntervalUnit::Week,
            UnitArg::Month => IntervalUnit::Month,
            UnitArg::Year => IntervalUnit::Year,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewArg {
    Today,
    Upcoming,
    All,
}

impl From<ViewArg> for ViewFilter {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Today => ViewFilter::Today,
            ViewArg::Upcoming => ViewFilter::Upcoming,
            ViewArg::All => ViewFilter::All,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    cadence_core::tasks::parse_due_time(value).map_err(|e| e.to_string())
}
