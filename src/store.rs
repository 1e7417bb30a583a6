use crate::clock::{Clock, SystemClock};
use crate::haptics::{FeedbackKind, Haptics, NoHaptics};
use crate::model::{Priority, Recurrence, Task, TaskId, TaskPatch, DEFAULT_CATEGORY};
use crate::reminders::{NoReminders, ReminderHandle, Reminders};
use crate::storage::{decode_snapshot, encode_snapshot, KeyValueStore, Snapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, error, info, warn};

pub const DEFAULT_STORAGE_KEY: &str = "tasks-storage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Key the full snapshot is written under.
    pub storage_key: String,
    pub default_category: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// Side-effecting capabilities the store calls through.
pub struct Collaborators {
    pub storage: Box<dyn KeyValueStore>,
    pub reminders: Box<dyn Reminders>,
    pub haptics: Box<dyn Haptics>,
    pub clock: Box<dyn Clock>,
}

impl Collaborators {
    /// Persist through `storage`; no reminders, no haptics, system time.
    pub fn new(storage: impl KeyValueStore + 'static) -> Self {
        Collaborators {
            storage: Box::new(storage),
            reminders: Box::new(NoReminders),
            haptics: Box::new(NoHaptics),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_reminders(mut self, reminders: impl Reminders + 'static) -> Self {
        self.reminders = Box::new(reminders);
        self
    }

    pub fn with_haptics(mut self, haptics: impl Haptics + 'static) -> Self {
        self.haptics = Box::new(haptics);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }
}

/// Owner of the task list and category list.
///
/// Every mutation is applied in memory first; the snapshot flush, reminder
/// cancellation and haptic calls that follow are best-effort and their
/// failures are logged and dropped. Misuse such as an unknown id or empty
/// text is a silent no-op reported only through the return value.
pub struct TaskStore {
    tasks: Vec<Task>,
    categories: Vec<String>,
    settings: StoreSettings,
    deps: Collaborators,
}

impl TaskStore {
    /// Rehydrates from the snapshot stored under `settings.storage_key`.
    ///
    /// A read failure is returned. A blob that cannot be decoded is copied
    /// to `<key>.corrupt` and the store starts empty.
    pub fn open(settings: StoreSettings, deps: Collaborators) -> Result<Self> {
        let key = settings.storage_key.as_str();
        let stored = deps
            .storage
            .get(key)
            .with_context(|| format!("loading stored tasks under {key:?}"))?;
        let snapshot = match stored {
            None => {
                info!(key, "no stored tasks, starting fresh");
                None
            }
            Some(blob) => match decode_snapshot(&blob) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    error!(key, error = %err, "stored tasks unreadable, starting fresh");
                    let backup = format!("{key}.corrupt");
                    best_effort(
                        "back up unreadable snapshot",
                        deps.storage.set(&backup, &blob),
                    );
                    None
                }
            },
        };
        let (tasks, categories) = match snapshot {
            Some(snapshot) => (snapshot.tasks, snapshot.categories),
            None => (Vec::new(), vec![settings.default_category.clone()]),
        };
        let mut store = TaskStore {
            tasks,
            categories,
            settings,
            deps,
        };
        let known: Vec<String> = store.tasks.iter().map(|t| t.category.clone()).collect();
        for category in &known {
            store.register_category(category);
        }
        info!(
            tasks = store.tasks.len(),
            categories = store.categories.len(),
            "task store ready"
        );
        Ok(store)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn default_category(&self) -> &str {
        &self.settings.default_category
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            categories: self.categories.clone(),
        }
    }

    /// Prepends a new task and returns its id, or `None` when `text` is
    /// blank. An empty `category` falls back to the default category.
    pub fn add_task(
        &mut self,
        text: &str,
        category: &str,
        recurrence: Recurrence,
        priority: Option<Priority>,
        reminder_time: Option<DateTime<Utc>>,
    ) -> Option<TaskId> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring task with empty text");
            return None;
        }
        let category = self.normalize_category(category);
        let now = self.deps.clock.now_utc();
        let mut task = Task::new(
            self.generate_id(),
            text.to_string(),
            category.clone(),
            recurrence,
            priority.unwrap_or_default(),
            now,
        );
        if let Some(at) = reminder_time {
            task.reminder_time = Some(at);
            task.notification_id = self.schedule_reminder(text, at);
        }
        let id = task.id.clone();
        self.tasks.insert(0, task);
        self.register_category(&category);
        debug!(%id, %category, "task added");
        self.feedback(FeedbackKind::Success);
        self.flush();
        Some(id)
    }

    /// Shallow-merges `patch` into the task with `id`.
    ///
    /// Completing or reopening through a patch stamps or clears
    /// `last_completed_date` like `toggle_task`, unless the patch sets it.
    ///
    /// An outstanding reminder is cancelled first when the patch completes
    /// the task, moves or clears its reminder time, or hands in a different
    /// handle. A new future reminder time on a still-open task is scheduled
    /// unless the patch brings its own handle.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let text = patch
            .text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        let category = patch.category.as_deref().map(|c| self.normalize_category(c));
        let today = self.deps.clock.today();

        let current = &self.tasks[idx];
        let was_completed = current.is_completed;
        let completes = patch.is_completed == Some(true);
        let reminder_moved =
            matches!(&patch.reminder_time, Some(at) if *at != current.reminder_time);
        let handle_replaced =
            matches!(&patch.notification_id, Some(handle) if *handle != current.notification_id);
        let stale = current
            .notification_id
            .clone()
            .filter(|_| completes || reminder_moved || handle_replaced);
        if let Some(handle) = &stale {
            self.cancel_reminder(handle);
        }
        let brings_handle = patch.notification_id.is_some();

        let task = &mut self.tasks[idx];
        if stale.is_some() {
            task.notification_id = None;
        }
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(category) = &category {
            task.category = category.clone();
        }
        if let Some(done) = patch.is_completed {
            task.is_completed = done;
        }
        if let Some(recurrence) = patch.recurrence {
            task.recurrence = recurrence;
        }
        if let Some(priority) = patch.priority {
            task.priority = Some(priority);
        }
        if let Some(at) = patch.reminder_time {
            task.reminder_time = at;
        }
        if let Some(handle) = patch.notification_id {
            task.notification_id = handle;
        }
        match patch.last_completed_date {
            Some(day) => task.last_completed_date = day,
            None if task.is_completed && !was_completed => {
                task.last_completed_date = Some(today);
            }
            None if !task.is_completed && was_completed => task.last_completed_date = None,
            None => {}
        }

        let reschedule = match (reminder_moved && !brings_handle, task.reminder_time) {
            (true, Some(at)) if !task.is_completed => Some((task.text.clone(), at)),
            _ => None,
        };
        if let Some((title, at)) = reschedule {
            let handle = self.schedule_reminder(&title, at);
            self.tasks[idx].notification_id = handle;
        }
        if let Some(category) = &category {
            self.register_category(category);
        }
        debug!(id, "task updated");
        self.flush();
        true
    }

    /// Flips completion. Completing stamps today's calendar day and cancels
    /// the outstanding reminder; reopening clears the stamp.
    pub fn toggle_task(&mut self, id: &str) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let today = self.deps.clock.today();
        let task = &mut self.tasks[idx];
        task.is_completed = !task.is_completed;
        let stale = if task.is_completed {
            task.last_completed_date = Some(today);
            task.notification_id.take()
        } else {
            task.last_completed_date = None;
            None
        };
        let completed = task.is_completed;
        if let Some(handle) = &stale {
            self.cancel_reminder(handle);
        }
        debug!(id, completed, "task toggled");
        self.feedback(FeedbackKind::LightImpact);
        self.flush();
        true
    }

    pub fn remove_task(&mut self, id: &str) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        if let Some(handle) = self.tasks[idx].notification_id.clone() {
            self.cancel_reminder(&handle);
        }
        self.tasks.remove(idx);
        debug!(id, "task removed");
        self.feedback(FeedbackKind::MediumImpact);
        self.flush();
        true
    }

    /// Cancels every reminder and drops every task. Categories stay.
    /// Returns the number of tasks removed.
    pub fn clear_all_tasks(&mut self) -> usize {
        let handles: Vec<ReminderHandle> = self
            .tasks
            .iter()
            .filter_map(|t| t.notification_id.clone())
            .collect();
        for handle in &handles {
            self.cancel_reminder(handle);
        }
        let removed = self.tasks.len();
        self.tasks.clear();
        info!(removed, "all tasks cleared");
        self.feedback(FeedbackKind::Warning);
        if removed > 0 {
            self.flush();
        }
        removed
    }

    /// Replaces the whole list, e.g. to commit a manual reorder. The caller
    /// is trusted to pass the same tasks.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        let known: Vec<String> = self.tasks.iter().map(|t| t.category.clone()).collect();
        for category in &known {
            self.register_category(category);
        }
        debug!(tasks = self.tasks.len(), "task order replaced");
        self.feedback(FeedbackKind::Selection);
        self.flush();
    }

    /// Moves the task with `id` to `position` (clamped to the end).
    pub fn move_task(&mut self, id: &str, position: usize) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let target = position.min(self.tasks.len() - 1);
        if target == idx {
            return false;
        }
        let mut reordered = self.tasks.clone();
        let task = reordered.remove(idx);
        reordered.insert(target, task);
        self.set_tasks(reordered);
        true
    }

    /// Open tasks first, then by priority weight descending. Equal keys keep
    /// their current relative order.
    pub fn sort_tasks_by_priority(&mut self) {
        self.tasks.sort_by(|a, b| {
            a.is_completed
                .cmp(&b.is_completed)
                .then_with(|| b.priority_weight().cmp(&a.priority_weight()))
        });
        debug!("tasks sorted by priority");
        self.feedback(FeedbackKind::Selection);
        self.flush();
    }

    /// Reopens completed recurring tasks scheduled for today that were not
    /// completed today. Safe to call any number of times; returns how many
    /// tasks were reopened.
    pub fn check_daily_reset(&mut self) -> usize {
        let now = self.deps.clock.now();
        let today = self.deps.clock.today();
        let weekday = now.weekday();
        let mut reopened = 0;
        for task in &mut self.tasks {
            if task.recurrence.is_empty() || !task.is_completed {
                continue;
            }
            if task.last_completed_date == Some(today) {
                continue;
            }
            if task.recurrence.contains_weekday(weekday) {
                task.is_completed = false;
                reopened += 1;
                debug!(id = %task.id, %today, "recurring task reopened");
            }
        }
        if reopened > 0 {
            info!(reopened, %today, "daily reset applied");
            self.flush();
        }
        reopened
    }

    /// Drops handles of reminders that already fired, so they are not
    /// cancelled later. Returns how many tasks held one of `fired`.
    pub fn release_reminders(&mut self, fired: &[ReminderHandle]) -> usize {
        let mut released = 0;
        for task in &mut self.tasks {
            if task
                .notification_id
                .as_ref()
                .is_some_and(|handle| fired.contains(handle))
            {
                task.notification_id = None;
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "fired reminder handles released");
            self.flush();
        }
        released
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn normalize_category(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.settings.default_category.clone()
        } else {
            trimmed.to_string()
        }
    }

    fn register_category(&mut self, category: &str) {
        if !category.is_empty() && !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
    }

    fn generate_id(&self) -> TaskId {
        loop {
            let id: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect();
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    fn schedule_reminder(&self, title: &str, at: DateTime<Utc>) -> Option<ReminderHandle> {
        if at <= self.deps.clock.now_utc() {
            debug!(%at, "reminder time already passed, not scheduling");
            return None;
        }
        best_effort("schedule reminder", self.deps.reminders.schedule(title, at)).flatten()
    }

    fn cancel_reminder(&self, handle: &ReminderHandle) {
        best_effort("cancel reminder", self.deps.reminders.cancel(handle));
    }

    fn feedback(&self, kind: FeedbackKind) {
        best_effort("haptic feedback", self.deps.haptics.emit(kind));
    }

    fn flush(&self) {
        let blob = match encode_snapshot(&self.snapshot()) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(error = %err, "could not serialize tasks, skipping save");
                return;
            }
        };
        best_effort(
            "save tasks",
            self.deps.storage.set(&self.settings.storage_key, &blob),
        );
    }
}

fn best_effort<T>(action: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(action, error = %err, "ignoring failure");
            None
        }
    }
}
