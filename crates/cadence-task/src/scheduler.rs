use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use cadence_core::{
    alert::{AlertDispatcher, Permission},
    clock::Clock,
    preferences::{PreferencesUpdate, UserPreferences},
    tasks::{NewTask, Task, TaskRepository, TaskUpdate},
};
use chrono::{NaiveDateTime, NaiveTime};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    alarm::{deliver, AlarmTrigger, DEFAULT_WINDOW_MINUTES},
    reconcile::ReconcileReport,
    store::TaskStore,
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Timer and delivery settings of the scheduler loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub alarm_tick: Duration,
    pub alarm_window_minutes: i64,
    /// Clip played with each notification, if any.
    pub sound: Option<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            alarm_tick: Duration::from_secs(60),
            alarm_window_minutes: DEFAULT_WINDOW_MINUTES,
            sound: Some("reminder".to_string()),
        }
    }
}

/// Time left until the next local midnight.
pub fn delay_until_next_midnight(now: NaiveDateTime) -> Duration {
    now.date()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN))
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(DAY)
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Add(NewTask, Reply<Task>),
    Update(Uuid, TaskUpdate, Reply<Task>),
    Delete(Uuid, Reply<Task>),
    Toggle(Uuid, Reply<Task>),
    List(Reply<Vec<Task>>),
    Reconcile(Reply<ReconcileReport>),
    Preferences(PreferencesUpdate, Reply<UserPreferences>),
}

/// Owns the task store and drives it from three sources: user commands,
/// the alarm tick and the midnight reconciliation timer. All of them are
/// served by one task, so a reconciliation always finishes before the next
/// command is applied.
pub struct Scheduler<R: TaskRepository, C: Clock> {
    store: TaskStore<R, C>,
    dispatcher: Arc<dyn AlertDispatcher>,
    alarms: AlarmTrigger,
    settings: SchedulerSettings,
    permission: Permission,
}

impl<R, C> Scheduler<R, C>
where
    R: TaskRepository + 'static,
    C: Clock + 'static,
{
    pub fn new(
        store: TaskStore<R, C>,
        dispatcher: Arc<dyn AlertDispatcher>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            alarms: AlarmTrigger::new(settings.alarm_window_minutes),
            settings,
            permission: Permission::Denied,
        }
    }

    /// Start the loop on the current runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (commands, receiver) = mpsc::channel(32);
        let (shutdown, stopped) = oneshot::channel();
        let join = tokio::spawn(self.run(receiver, stopped));
        SchedulerHandle {
            commands,
            shutdown,
            join,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!(dispatcher = self.dispatcher.name(), "scheduler starting");
        self.refresh_permission().await;
        self.reconcile("startup").await;
        self.check_alarms().await;

        let mut alarm_tick = time::interval_at(
            Instant::now() + self.settings.alarm_tick,
            self.settings.alarm_tick,
        );
        alarm_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let midnight = time::sleep(delay_until_next_midnight(self.store.now()));
        tokio::pin!(midnight);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = alarm_tick.tick() => self.check_alarms().await,
                () = &mut midnight => {
                    self.reconcile("midnight").await;
                    midnight.as_mut().reset(Instant::now() + DAY);
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        self.handle(command).await;
                        self.check_alarms().await;
                    }
                    None => break,
                },
            }
        }
        info!("scheduler stopped");
    }

    async fn handle(&mut self, command: Command) {
        // A dropped receiver only means the caller stopped waiting.
        match command {
            Command::Add(input, reply) => {
                let _ = reply.send(self.store.add(input).await);
            }
            Command::Update(id, update, reply) => {
                let _ = reply.send(self.store.update(id, update).await);
            }
            Command::Delete(id, reply) => {
                let _ = reply.send(self.store.delete(id).await);
            }
            Command::Toggle(id, reply) => {
                let _ = reply.send(self.store.toggle_completion(id).await);
            }
            Command::List(reply) => {
                let _ = reply.send(Ok(self.store.tasks().to_vec()));
            }
            Command::Reconcile(reply) => {
                let _ = reply.send(self.store.reconcile().await);
            }
            Command::Preferences(update, reply) => {
                let result = self.store.update_preferences(update).await;
                self.refresh_permission().await;
                let _ = reply.send(result);
            }
        }
    }

    async fn refresh_permission(&mut self) {
        let enabled = self.store.preferences().enable_notifications;
        if enabled && self.permission != Permission::Granted {
            self.permission = self.dispatcher.request_permission().await;
            info!(permission = ?self.permission, "notification permission");
        }
    }

    async fn reconcile(&mut self, trigger: &'static str) {
        match self.store.reconcile().await {
            Ok(report) => debug!(
                trigger,
                advanced = report.advanced.len(),
                missed = report.missed.len(),
                skipped = report.skipped.len(),
                "reconciliation pass"
            ),
            Err(err) => error!(trigger, error = %err, "reconciliation pass failed"),
        }
    }

    async fn check_alarms(&mut self) {
        if !self.store.preferences().enable_notifications {
            return;
        }
        let reminders = self.alarms.scan(self.store.tasks(), self.store.now());
        deliver(
            self.dispatcher.as_ref(),
            self.permission,
            &reminders,
            self.settings.sound.as_deref(),
        )
        .await;
    }
}

/// Client side of a running scheduler. Dropping it also stops the loop.
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn add_task(&self, input: NewTask) -> Result<Task> {
        self.request(|reply| Command::Add(input, reply)).await
    }

    pub async fn update_task(&self, id: Uuid, update: TaskUpdate) -> Result<Task> {
        self.request(|reply| Command::Update(id, update, reply)).await
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<Task> {
        self.request(|reply| Command::Delete(id, reply)).await
    }

    pub async fn toggle_completion(&self, id: Uuid) -> Result<Task> {
        self.request(|reply| Command::Toggle(id, reply)).await
    }

    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.request(Command::List).await
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.request(Command::Reconcile).await
    }

    pub async fn update_preferences(&self, update: PreferencesUpdate) -> Result<UserPreferences> {
        self.request(|reply| Command::Preferences(update, reply)).await
    }

    /// Stop the loop and wait for it to finish; its timers go with it.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.join
            .await
            .map_err(|err| anyhow!("scheduler task failed: {err}"))
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| anyhow!("scheduler is not running"))?;
        response
            .await
            .map_err(|_| anyhow!("scheduler dropped the request"))?
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::{
        alert::{Alert, RecordingDispatcher},
        clock::FixedClock,
        storage::InMemoryStore,
        tasks::{parse_due_time, Recurrence},
    };
    use chrono::NaiveDate;

    use super::*;
    use crate::repo::KvTaskRepo;

    fn at(h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid datetime")
    }

    fn alarm_task(title: &str, time: &str) -> NewTask {
        NewTask {
            title: title.into(),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            due_time: Some(parse_due_time(time).expect("time")),
            alarm_set: true,
            ..NewTask::default()
        }
    }

    async fn start(
        backing: &InMemoryStore,
        clock: &FixedClock,
        dispatcher: &RecordingDispatcher,
    ) -> SchedulerHandle {
        start_with(backing, clock, dispatcher, SchedulerSettings::default()).await
    }

    async fn start_with(
        backing: &InMemoryStore,
        clock: &FixedClock,
        dispatcher: &RecordingDispatcher,
        settings: SchedulerSettings,
    ) -> SchedulerHandle {
        let store = TaskStore::open(KvTaskRepo::new(backing.clone()), clock.clone())
            .await
            .expect("open");
        Scheduler::new(store, Arc::new(dispatcher.clone()), settings).spawn()
    }

    fn on(day: u32, h: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .and_then(|date| date.and_hms_opt(h, min, sec))
            .expect("valid datetime")
    }

    #[test]
    fn midnight_delay_counts_to_the_next_day() {
        assert_eq!(
            delay_until_next_midnight(at(23, 30)),
            Duration::from_secs(30 * 60)
        );
        assert_eq!(delay_until_next_midnight(at(0, 0)), DAY);
        assert_eq!(
            delay_until_next_midnight(at(12, 0)),
            Duration::from_secs(12 * 60 * 60)
        );
    }

    #[tokio::test]
    async fn alarms_are_checked_at_startup() {
        let backing = InMemoryStore::new();
        let clock = FixedClock::new(at(14, 0));
        let dispatcher = RecordingDispatcher::default();
        {
            let mut store = TaskStore::open(KvTaskRepo::new(backing.clone()), clock.clone())
                .await
                .expect("open");
            store.add(alarm_task("Pills", "14:30")).await.expect("add");
        }
        clock.set(at(14, 30));

        let handle = start(&backing, &clock, &dispatcher).await;
        handle.tasks().await.expect("list");

        assert_eq!(dispatcher.notifications(), 1);
        assert!(dispatcher.alerts().contains(&Alert::Sound {
            clip: "reminder".into()
        }));
        handle.stop().await.expect("stop");
    }

    #[tokio::test(start_paused = true)]
    async fn alarm_tick_fires_reminder_that_became_due_later() {
        let backing = InMemoryStore::new();
        let clock = FixedClock::new(at(14, 0));
        let dispatcher = RecordingDispatcher::default();
        let handle = start(&backing, &clock, &dispatcher).await;

        handle
            .add_task(alarm_task("Call back", "14:31"))
            .await
            .expect("add");
        assert_eq!(dispatcher.notifications(), 0);

        clock.set(at(14, 31));
        time::sleep(Duration::from_secs(61)).await;

        assert_eq!(dispatcher.notifications(), 1);
        handle.stop().await.expect("stop");
    }

    #[tokio::test(start_paused = true)]
    async fn midnight_timer_reconciles_and_rearms_daily() {
        let backing = InMemoryStore::new();
        let clock = FixedClock::new(on(1, 23, 59, 0));
        let dispatcher = RecordingDispatcher::default();
        let task = {
            let mut store = TaskStore::open(KvTaskRepo::new(backing.clone()), clock.clone())
                .await
                .expect("open");
            store
                .add(NewTask {
                    title: "Water plants".into(),
                    due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                    recurrence: Some(Recurrence::daily()),
                    ..NewTask::default()
                })
                .await
                .expect("add")
        };
        let settings = SchedulerSettings {
            alarm_tick: Duration::from_secs(60 * 60),
            ..SchedulerSettings::default()
        };
        let handle = start_with(&backing, &clock, &dispatcher, settings).await;
        let listed = handle.tasks().await.expect("list");
        assert_eq!(listed[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 1));

        clock.set(on(2, 0, 0, 30));
        time::sleep(Duration::from_secs(61)).await;

        let listed = handle.tasks().await.expect("list");
        assert_eq!(listed[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert_eq!(listed[0].missed_count, 1);
        let saved = KvTaskRepo::new(backing.clone())
            .load_tasks()
            .await
            .expect("load");
        assert_eq!(saved[0].id, task.id);
        assert_eq!(saved[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 2));

        clock.set(on(3, 0, 0, 30));
        time::sleep(Duration::from_secs(23 * 60 * 60)).await;
        let listed = handle.tasks().await.expect("list");
        assert_eq!(listed[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 2));

        time::sleep(Duration::from_secs(60 * 60)).await;
        let listed = handle.tasks().await.expect("list");
        assert_eq!(listed[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 3));
        handle.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn commands_reconcile_before_replying() {
        let backing = InMemoryStore::new();
        let clock = FixedClock::new(at(9, 0));
        let dispatcher = RecordingDispatcher::default();
        let handle = start(&backing, &clock, &dispatcher).await;

        let task = handle
            .add_task(NewTask {
                title: "Stand-up".into(),
                due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                due_time: Some(parse_due_time("09:00").expect("time")),
                recurrence: Some(Recurrence::daily()),
                ..NewTask::default()
            })
            .await
            .expect("add");
        let toggled = handle.toggle_completion(task.id).await.expect("toggle");

        assert_eq!(toggled.due_date, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert!(!toggled.completed);
        assert_eq!(toggled.completion_history.len(), 1);
        handle.stop().await.expect("stop");

        let reopened = TaskStore::open(KvTaskRepo::new(backing.clone()), clock.clone())
            .await
            .expect("reopen");
        assert_eq!(reopened.get(task.id), Some(&toggled));
    }

    #[tokio::test]
    async fn disabled_notifications_silence_alarms() {
        let backing = InMemoryStore::new();
        let clock = FixedClock::new(at(14, 30));
        let dispatcher = RecordingDispatcher::default();
        let handle = start(&backing, &clock, &dispatcher).await;

        handle
            .update_preferences(PreferencesUpdate {
                enable_notifications: Some(false),
                ..PreferencesUpdate::default()
            })
            .await
            .expect("prefs");
        handle
            .add_task(alarm_task("Pills", "14:30"))
            .await
            .expect("add");

        assert!(dispatcher.alerts().is_empty());
        handle.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn denied_permission_uses_in_app_messages() {
        let backing = InMemoryStore::new();
        let clock = FixedClock::new(at(14, 30));
        let dispatcher = RecordingDispatcher::new(Permission::Denied);
        let handle = start(&backing, &clock, &dispatcher).await;

        handle
            .add_task(alarm_task("Pills", "14:30"))
            .await
            .expect("add");

        assert_eq!(dispatcher.notifications(), 0);
        assert_eq!(dispatcher.alerts().len(), 1);
        handle.stop().await.expect("stop");
    }
}
