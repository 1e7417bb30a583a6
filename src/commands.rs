use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use descaos::clock::SystemClock;
use descaos::config::Config;
use descaos::haptics::LogHaptics;
use descaos::reminders::ReminderLedger;
use descaos::storage::FileStore;
use descaos::views::{pending_count, visible, Filter, FocusQueue};
use descaos::{Collaborators, Priority, Recurrence, Task, TaskId, TaskPatch, TaskStore};
use std::path::PathBuf;
use tracing::info;

/// Resolved runtime settings shared by every command.
pub struct Session {
    pub config: Config,
    pub data_dir: PathBuf,
}

impl Session {
    pub fn new(config: Config, data_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_override {
            Some(dir) => dir,
            None => config.data_dir()?,
        };
        Ok(Session { config, data_dir })
    }

    fn ledger(&self) -> Result<ReminderLedger<FileStore>> {
        Ok(ReminderLedger::new(
            FileStore::open(&self.data_dir)?,
            SystemClock,
        ))
    }

    fn open_without_reset(&self) -> Result<TaskStore> {
        let storage = FileStore::open(&self.data_dir)?;
        let deps = Collaborators::new(storage)
            .with_reminders(self.ledger()?)
            .with_haptics(LogHaptics);
        TaskStore::open(self.config.store_settings(), deps)
            .with_context(|| format!("opening tasks in {:?}", self.data_dir))
    }

    /// Opens the store and applies the launch-time daily reset.
    fn open_store(&self) -> Result<TaskStore> {
        let mut store = self.open_without_reset()?;
        let reopened = store.check_daily_reset();
        if reopened > 0 {
            info!(reopened, "recurring tasks reopened for today");
        }
        Ok(store)
    }
}

pub fn add(
    session: &Session,
    text: String,
    category: Option<String>,
    recurrence: Option<Recurrence>,
    priority: Option<Priority>,
    remind: Option<String>,
) -> Result<()> {
    let mut store = session.open_store()?;
    let reminder = parse_remind(remind.as_deref())?;
    let id = store
        .add_task(
            &text,
            category.as_deref().unwrap_or_default(),
            recurrence.unwrap_or_default(),
            priority,
            reminder,
        )
        .ok_or_else(|| anyhow!("task text is empty"))?;
    if let Some(task) = store.task(&id) {
        println!("Added task {} to {}", id, task.category);
        if task.reminder_time.is_some() && task.notification_id.is_none() {
            println!("  (reminder time has passed, nothing scheduled)");
        }
    }
    Ok(())
}

pub fn list(session: &Session, category: Option<String>) -> Result<()> {
    let store = session.open_store()?;
    let filter = Filter::from_category(category.as_deref());
    let pending = pending_count(store.tasks());
    println!(
        "{} {}",
        pending,
        if pending == 1 { "task pending" } else { "tasks pending" }
    );
    let shown = visible(store.tasks(), &filter);
    if shown.is_empty() {
        match &filter {
            Filter::All => println!("  (all clear for today)"),
            Filter::Category(name) => println!("  (no tasks in {})", name),
        }
    }
    for task in shown {
        print_task(task);
    }
    Ok(())
}

pub fn done(session: &Session, task_id: String) -> Result<()> {
    let mut store = session.open_store()?;
    let id = resolve_id(&store, &task_id)?;
    store.toggle_task(&id);
    let state = match store.task(&id) {
        Some(task) if task.is_completed => "done",
        _ => "open",
    };
    println!("Marked task {} {}", id, state);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    session: &Session,
    task_id: String,
    text: Option<String>,
    category: Option<String>,
    recurrence: Option<Recurrence>,
    once: bool,
    priority: Option<Priority>,
    remind: Option<String>,
    clear_remind: bool,
) -> Result<()> {
    let mut store = session.open_store()?;
    let id = resolve_id(&store, &task_id)?;
    let reminder_time = if clear_remind {
        Some(None)
    } else {
        parse_remind(remind.as_deref())?.map(Some)
    };
    let patch = TaskPatch {
        text,
        category,
        recurrence: if once { Some(Recurrence::NONE) } else { recurrence },
        priority,
        reminder_time,
        ..TaskPatch::default()
    };
    if patch.is_empty() {
        bail!("nothing to change for task {}", id);
    }
    store.update_task(&id, patch);
    println!("Updated task {}", id);
    Ok(())
}

pub fn remove(session: &Session, task_id: String) -> Result<()> {
    let mut store = session.open_store()?;
    let id = resolve_id(&store, &task_id)?;
    store.remove_task(&id);
    println!("Removed task {}", id);
    Ok(())
}

pub fn clear(session: &Session, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to delete every task without --yes");
    }
    let mut store = session.open_store()?;
    let removed = store.clear_all_tasks();
    println!("Removed {} tasks", removed);
    Ok(())
}

pub fn sort(session: &Session) -> Result<()> {
    let mut store = session.open_store()?;
    store.sort_tasks_by_priority();
    for task in store.tasks() {
        print_task(task);
    }
    Ok(())
}

pub fn move_task(session: &Session, task_id: String, position: usize) -> Result<()> {
    let mut store = session.open_store()?;
    let id = resolve_id(&store, &task_id)?;
    if store.move_task(&id, position) {
        println!("Moved task {} to position {}", id, position);
    } else {
        println!("Task {} already at position {}", id, position);
    }
    Ok(())
}

pub fn reset(session: &Session) -> Result<()> {
    let mut store = session.open_without_reset()?;
    let reopened = store.check_daily_reset();
    let open = store
        .tasks()
        .iter()
        .filter(|t| t.is_recurring() && !t.is_completed)
        .count();
    println!("Reopened {} tasks, {} recurring tasks open today", reopened, open);
    Ok(())
}

pub fn focus(session: &Session, category: Option<String>, skip: usize) -> Result<()> {
    let store = session.open_store()?;
    let filter = Filter::from_category(category.as_deref());
    let mut queue = FocusQueue::new(store.tasks(), &filter);
    if queue.is_empty() {
        println!("Nothing to focus on");
        return Ok(());
    }
    for _ in 0..skip % queue.len() {
        queue.skip();
    }
    if let Some(task) = queue.current() {
        println!("Now: {}", task.text);
        println!("  id: {}  ({} in queue)", task.id, queue.len());
    }
    Ok(())
}

pub fn categories(session: &Session) -> Result<()> {
    let store = session.open_store()?;
    for category in store.categories() {
        let count = store
            .tasks()
            .iter()
            .filter(|t| &t.category == category)
            .count();
        println!("{} ({})", category, count);
    }
    Ok(())
}

pub fn reminders(session: &Session) -> Result<()> {
    let mut store = session.open_store()?;
    let ledger = session.ledger()?;
    let fired = ledger.take_due()?;
    for reminder in &fired {
        println!(
            "Reminder: {} (was due {})",
            reminder.title,
            format_remind(&reminder.trigger_at)
        );
    }
    let handles: Vec<_> = fired.into_iter().map(|reminder| reminder.handle).collect();
    store.release_reminders(&handles);
    let upcoming = ledger.pending()?;
    if upcoming.is_empty() {
        println!("No upcoming reminders");
    }
    for reminder in upcoming {
        println!("  {}  {}", format_remind(&reminder.trigger_at), reminder.title);
    }
    Ok(())
}

/// Accepts a full id or an unambiguous prefix of one.
fn resolve_id(store: &TaskStore, raw: &str) -> Result<TaskId> {
    let raw = raw.trim();
    if store.task(raw).is_some() {
        return Ok(raw.to_string());
    }
    let matches: Vec<&Task> = store
        .tasks()
        .iter()
        .filter(|t| !raw.is_empty() && t.id.starts_with(raw))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => bail!("task {} not found", raw),
        _ => bail!("task id {} is ambiguous ({} matches)", raw, matches.len()),
    }
}

fn parse_remind(input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let raw = match input {
        Some(r) => r.trim(),
        None => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y.%m.%d@%H:%M")
        .map_err(|_| anyhow!("invalid date format (use YYYY.MM.DD@hh:mm): {}", raw))?;
    let local = Local
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| anyhow!("{} does not name a single local time", raw))?;
    Ok(Some(local.with_timezone(&Utc)))
}

fn format_remind(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y.%m.%d@%H:%M").to_string()
}

fn print_task(task: &Task) {
    let mark = if task.is_completed { "x" } else { " " };
    println!("  [{}] {}: {}", mark, task.id, task.text);
    let mut details = vec![task.category.clone()];
    if let Some(priority) = task.priority {
        details.push(priority.to_string());
    }
    if task.is_recurring() {
        details.push(format!("repeats {}", task.recurrence));
    }
    if let Some(at) = task.reminder_time {
        details.push(format!("remind {}", format_remind(&at)));
    }
    println!("      {}", details.join(" · "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use descaos::storage::MemoryStore;
    use descaos::StoreSettings;

    fn store_with(texts: &[&str]) -> (TaskStore, Vec<TaskId>) {
        let mut store =
            TaskStore::open(StoreSettings::default(), Collaborators::new(MemoryStore::default()))
                .unwrap();
        let ids = texts
            .iter()
            .map(|text| {
                store
                    .add_task(text, "", Recurrence::NONE, None, None)
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn resolves_unique_prefixes() {
        let (store, ids) = store_with(&["one"]);
        let id = &ids[0];
        assert_eq!(resolve_id(&store, id).unwrap(), *id);
        assert_eq!(resolve_id(&store, &id[..3]).unwrap(), *id);
        assert!(resolve_id(&store, "").is_err());
        assert!(resolve_id(&store, "zzzzzzzzz").is_err());
    }

    #[test]
    fn reminder_format_round_trips() {
        let parsed = parse_remind(Some("2030.01.15@08:30")).unwrap().unwrap();
        assert_eq!(format_remind(&parsed), "2030.01.15@08:30");
        assert_eq!(parse_remind(Some("  ")).unwrap(), None);
        assert!(parse_remind(Some("tomorrow")).is_err());
    }
}
