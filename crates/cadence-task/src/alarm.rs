use std::collections::HashMap;

use cadence_core::{
    alert::{AlertDispatcher, Permission},
    tasks::Task,
};
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tracing::info;
use uuid::Uuid;

/// Minutes either side of the due time in which a reminder may fire.
pub const DEFAULT_WINDOW_MINUTES: i64 = 1;

pub const REMINDER_TITLE: &str = "Task Reminder";

/// A reminder ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: Uuid,
    pub body: String,
    pub due: NaiveDateTime,
}

/// Whether `task` wants a reminder at `now`: alarm on, still open, due today
/// at a time within `window_minutes` of the current minute.
pub fn is_alarm_due(task: &Task, now: NaiveDateTime, window_minutes: i64) -> bool {
    if !task.alarm_set || task.completed {
        return false;
    }
    let (Some(date), Some(time)) = (task.due_date, task.due_time) else {
        return false;
    };
    date == now.date() && (minute_of_day(now.time()) - minute_of_day(time)).abs() <= window_minutes
}

fn minute_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour() * 60 + time.minute())
}

/// Scans tasks for due reminders. Remembers the occurrence each task last
/// fired for, so an occurrence fires once even though it matches on several
/// consecutive ticks.
#[derive(Debug)]
pub struct AlarmTrigger {
    window_minutes: i64,
    fired: HashMap<Uuid, NaiveDateTime>,
}

impl Default for AlarmTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MINUTES)
    }
}

impl AlarmTrigger {
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window_minutes: window_minutes.max(0),
            fired: HashMap::new(),
        }
    }

    pub fn scan(&mut self, tasks: &[Task], now: NaiveDateTime) -> Vec<Reminder> {
        self.fired
            .retain(|id, _| tasks.iter().any(|task| task.id == *id));

        let window = self.window_minutes;
        let mut reminders = Vec::new();
        for task in tasks.iter().filter(|task| is_alarm_due(task, now, window)) {
            let Some(due) = task.occurrence().map(|occurrence| occurrence.instant()) else {
                continue;
            };
            if self.fired.get(&task.id) == Some(&due) {
                continue;
            }
            self.fired.insert(task.id, due);
            reminders.push(Reminder {
                task_id: task.id,
                body: format!("It's time for: {}", task.title),
                due,
            });
        }
        reminders
    }
}

/// Hand reminders to the dispatcher. With permission they become system
/// notifications plus a sound; without, an in-app message.
pub async fn deliver<D: AlertDispatcher + ?Sized>(
    dispatcher: &D,
    permission: Permission,
    reminders: &[Reminder],
    sound: Option<&str>,
) {
    for reminder in reminders {
        info!(task = %reminder.task_id, dispatcher = dispatcher.name(), ?permission, "firing reminder");
        match permission {
            Permission::Granted => {
                dispatcher.notify(REMINDER_TITLE, &reminder.body).await;
                if let Some(clip) = sound {
                    dispatcher.play_sound(clip).await;
                }
            }
            Permission::Denied => dispatcher.show_message(REMINDER_TITLE, &reminder.body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::{
        alert::{Alert, RecordingDispatcher},
        tasks::{parse_due_time, NewTask},
    };
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn today_at(h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid datetime")
    }

    fn alarm_task(due_time: &str) -> Task {
        Task::new(
            NewTask {
                title: "Take meds".into(),
                due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                due_time: Some(parse_due_time(due_time).expect("time")),
                alarm_set: true,
                ..NewTask::default()
            },
            today_at(8, 0),
        )
    }

    #[test]
    fn fires_once_at_due_minute_and_not_two_minutes_later() {
        let tasks = vec![alarm_task("14:30")];

        let mut trigger = AlarmTrigger::default();
        assert_eq!(trigger.scan(&tasks, today_at(14, 30)).len(), 1);

        let mut late = AlarmTrigger::default();
        assert!(late.scan(&tasks, today_at(14, 32)).is_empty());
    }

    #[test]
    fn window_covers_one_minute_either_side() {
        let task = alarm_task("14:30");
        assert!(is_alarm_due(&task, today_at(14, 29), DEFAULT_WINDOW_MINUTES));
        assert!(is_alarm_due(&task, today_at(14, 31), DEFAULT_WINDOW_MINUTES));
        assert!(!is_alarm_due(&task, today_at(14, 28), DEFAULT_WINDOW_MINUTES));
    }

    #[test]
    fn consecutive_ticks_fire_a_single_reminder() {
        let tasks = vec![alarm_task("14:30")];
        let mut trigger = AlarmTrigger::default();

        let fired: usize = [today_at(14, 29), today_at(14, 30), today_at(14, 31)]
            .into_iter()
            .map(|now| trigger.scan(&tasks, now).len())
            .sum();
        assert_eq!(fired, 1);
    }

    #[test]
    fn a_new_occurrence_fires_again() {
        let mut tasks = vec![alarm_task("14:30")];
        let mut trigger = AlarmTrigger::default();
        assert_eq!(trigger.scan(&tasks, today_at(14, 30)).len(), 1);

        tasks[0].due_date = NaiveDate::from_ymd_opt(2024, 6, 2);
        let tomorrow = today_at(14, 30) + Duration::days(1);
        assert_eq!(trigger.scan(&tasks, tomorrow).len(), 1);
    }

    #[test]
    fn skips_completed_disabled_undated_and_other_days() {
        let now = today_at(14, 30);
        let mut completed = alarm_task("14:30");
        completed.completed = true;
        let mut disabled = alarm_task("14:30");
        disabled.alarm_set = false;
        let mut no_time = alarm_task("14:30");
        no_time.due_time = None;
        let mut tomorrow = alarm_task("14:30");
        tomorrow.due_date = NaiveDate::from_ymd_opt(2024, 6, 2);

        let mut trigger = AlarmTrigger::default();
        assert!(trigger
            .scan(&[completed, disabled, no_time, tomorrow], now)
            .is_empty());
    }

    #[test]
    fn forgets_deleted_tasks() {
        let tasks = vec![alarm_task("14:30")];
        let mut trigger = AlarmTrigger::default();
        trigger.scan(&tasks, today_at(14, 30));
        trigger.scan(&[], today_at(14, 31));
        assert!(trigger.fired.is_empty());
    }

    #[tokio::test]
    async fn granted_permission_notifies_and_plays_sound() {
        let dispatcher = RecordingDispatcher::new(Permission::Granted);
        let reminders = AlarmTrigger::default().scan(&[alarm_task("09:00")], today_at(9, 0));

        deliver(&dispatcher, Permission::Granted, &reminders, Some("chime")).await;

        assert_eq!(
            dispatcher.alerts(),
            vec![
                Alert::Notification {
                    title: REMINDER_TITLE.into(),
                    body: "It's time for: Take meds".into(),
                },
                Alert::Sound {
                    clip: "chime".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn denied_permission_falls_back_to_in_app_message() {
        let dispatcher = RecordingDispatcher::new(Permission::Denied);
        let reminders = AlarmTrigger::default().scan(&[alarm_task("09:00")], today_at(9, 0));

        deliver(&dispatcher, Permission::Denied, &reminders, Some("chime")).await;

        assert_eq!(dispatcher.notifications(), 0);
        assert_eq!(
            dispatcher.alerts(),
            vec![Alert::Message {
                title: REMINDER_TITLE.into(),
                body: "It's time for: Take meds".into(),
            }]
        );
    }
}
