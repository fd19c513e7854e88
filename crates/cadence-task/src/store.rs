use anyhow::Result;
use cadence_core::{
    clock::Clock,
    preferences::{PreferencesUpdate, UserPreferences, ViewFilter},
    tasks::{NewTask, Task, TaskError, TaskRepository, TaskUpdate},
};
use chrono::NaiveDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    completion,
    reconcile::{self, ReconcileReport},
    report::{completion_grid, recurring_report, remaining_today, CompletionRow, RecurringReport},
    view::visible_tasks,
};

/// In-memory task collection with its mutation API. Every mutation runs a
/// reconciliation pass and saves the whole collection once.
pub struct TaskStore<R: TaskRepository, C: Clock> {
    repo: R,
    clock: C,
    tasks: Vec<Task>,
    preferences: UserPreferences,
}

impl<R: TaskRepository, C: Clock> TaskStore<R, C> {
    /// Load persisted state. Missing or unreadable state starts empty.
    #[instrument(skip_all)]
    pub async fn open(repo: R, clock: C) -> Result<Self> {
        let tasks = repo.load_tasks().await?;
        let preferences = repo.load_preferences().await?;
        info!(tasks = tasks.len(), "task store loaded");
        Ok(Self {
            repo,
            clock,
            tasks,
            preferences,
        })
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    /// Tasks in `filter` for today, honoring the show-completed preference.
    pub fn visible_tasks(&self, filter: ViewFilter) -> Vec<&Task> {
        visible_tasks(
            &self.tasks,
            filter,
            self.preferences.show_completed_tasks,
            self.now().date(),
        )
    }

    #[instrument(skip_all, fields(title = %input.title))]
    pub async fn add(&mut self, input: NewTask) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(TaskError::EmptyTitle.into());
        }
        let task = Task::new(input, self.now());
        let id = task.id;
        info!(task = %id, "task added");
        self.tasks.push(task);
        self.commit().await?;
        self.snapshot(id)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&mut self, id: Uuid, update: TaskUpdate) -> Result<Task> {
        let now = self.now();
        update.apply(self.find_mut(id)?, now)?;
        info!(task = %id, "task updated");
        self.commit().await?;
        self.snapshot(id)
    }

    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: Uuid) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(TaskError::NotFound { id })?;
        let removed = self.tasks.remove(index);
        info!(task = %id, title = %removed.title, "task deleted");
        self.commit().await?;
        Ok(removed)
    }

    /// Flip completion. Completing records history; a recurring task then
    /// rolls to its next occurrence in the same commit.
    #[instrument(skip(self))]
    pub async fn toggle_completion(&mut self, id: Uuid) -> Result<Task> {
        let now = self.now();
        let task = self.find_mut(id)?;
        let completed = completion::toggle_completion(task, now);
        info!(task = %id, completed, "task completion toggled");
        self.commit().await?;
        self.snapshot(id)
    }

    /// Run a reconciliation pass; saves only when something changed.
    #[instrument(skip(self))]
    pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
        let now = self.now();
        let report = reconcile::reconcile(&mut self.tasks, now);
        if report.changed() {
            self.repo.save_tasks(&self.tasks).await?;
        }
        Ok(report)
    }

    #[instrument(skip_all)]
    pub async fn update_preferences(&mut self, update: PreferencesUpdate) -> Result<UserPreferences> {
        self.preferences.apply(update);
        self.repo.save_preferences(&self.preferences).await?;
        info!(preferences = ?self.preferences, "preferences updated");
        Ok(self.preferences.clone())
    }

    pub fn recurring_report(&self) -> RecurringReport {
        recurring_report(&self.tasks)
    }

    pub fn remaining_today(&self) -> Vec<&Task> {
        remaining_today(&self.tasks, self.now().date())
    }

    pub fn completion_grid(&self, days: u32) -> Vec<CompletionRow> {
        completion_grid(&self.tasks, self.now().date(), days)
    }

    /// On-change trigger: reconcile, then persist the collection in one write.
    async fn commit(&mut self) -> Result<ReconcileReport> {
        let now = self.now();
        let report = reconcile::reconcile(&mut self.tasks, now);
        self.repo.save_tasks(&self.tasks).await?;
        Ok(report)
    }

    fn find_mut(&mut self, id: Uuid) -> Result<&mut Task, TaskError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(TaskError::NotFound { id })
    }

    fn snapshot(&self, id: Uuid) -> Result<Task> {
        Ok(self.get(id).cloned().ok_or(TaskError::NotFound { id })?)
    }
}
