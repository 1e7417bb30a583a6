use crate::clock::Clock;
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Opaque handle returned by a scheduler. The store never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderHandle(String);

impl ReminderHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        ReminderHandle(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait Reminders {
    /// Schedules a one-shot reminder. Returns `None` when `at` is not in the
    /// future and nothing was scheduled.
    fn schedule(&self, title: &str, at: DateTime<Utc>) -> Result<Option<ReminderHandle>>;

    /// Cancels a reminder. Unknown handles are ignored.
    fn cancel(&self, handle: &ReminderHandle) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoReminders;

impl Reminders for NoReminders {
    fn schedule(&self, _title: &str, _at: DateTime<Utc>) -> Result<Option<ReminderHandle>> {
        Ok(None)
    }

    fn cancel(&self, _handle: &ReminderHandle) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub handle: ReminderHandle,
    pub title: String,
    pub trigger_at: DateTime<Utc>,
}

pub const LEDGER_KEY: &str = "reminders";

/// Scheduler that keeps pending reminders in a key-value store. Reminders
/// "fire" when `take_due` collects them.
pub struct ReminderLedger<S> {
    storage: S,
    clock: Box<dyn Clock>,
}

impl<S: KeyValueStore> ReminderLedger<S> {
    pub fn new(storage: S, clock: impl Clock + 'static) -> Self {
        ReminderLedger {
            storage,
            clock: Box::new(clock),
        }
    }

    pub fn pending(&self) -> Result<Vec<ScheduledReminder>> {
        match self.storage.get(LEDGER_KEY)? {
            Some(blob) => serde_yaml::from_str(&blob).context("parsing reminder ledger"),
            None => Ok(Vec::new()),
        }
    }

    /// Removes and returns every reminder whose trigger time has passed.
    pub fn take_due(&self) -> Result<Vec<ScheduledReminder>> {
        let now = self.clock.now_utc();
        let (due, upcoming): (Vec<_>, Vec<_>) = self
            .pending()?
            .into_iter()
            .partition(|reminder| reminder.trigger_at <= now);
        if !due.is_empty() {
            self.save(&upcoming)?;
        }
        Ok(due)
    }

    fn save(&self, reminders: &[ScheduledReminder]) -> Result<()> {
        let serialized = serde_yaml::to_string(reminders).context("serializing reminder ledger")?;
        self.storage.set(LEDGER_KEY, &serialized)
    }

    fn generate_handle() -> ReminderHandle {
        let raw: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        ReminderHandle::new(raw)
    }
}

impl<S: KeyValueStore> Reminders for ReminderLedger<S> {
    fn schedule(&self, title: &str, at: DateTime<Utc>) -> Result<Option<ReminderHandle>> {
        if at <= self.clock.now_utc() {
            return Ok(None);
        }
        let mut reminders = self.pending()?;
        let handle = Self::generate_handle();
        reminders.push(ScheduledReminder {
            handle: handle.clone(),
            title: title.to_string(),
            trigger_at: at,
        });
        reminders.sort_by_key(|reminder| reminder.trigger_at);
        self.save(&reminders)?;
        debug!(%handle, %at, "reminder scheduled");
        Ok(Some(handle))
    }

    fn cancel(&self, handle: &ReminderHandle) -> Result<()> {
        let mut reminders = self.pending()?;
        let before = reminders.len();
        reminders.retain(|reminder| &reminder.handle != handle);
        if reminders.len() != before {
            self.save(&reminders)?;
            debug!(%handle, "reminder cancelled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::MemoryStore;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn ledger() -> (ReminderLedger<MemoryStore>, FixedClock) {
        let offset = FixedOffset::east_opt(0).unwrap();
        let clock = FixedClock::new(offset.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap());
        (ReminderLedger::new(MemoryStore::default(), clock.clone()), clock)
    }

    #[test]
    fn past_times_are_not_scheduled() {
        let (ledger, clock) = ledger();
        let past = clock.now_utc() - Duration::minutes(1);
        assert_eq!(ledger.schedule("late", past).unwrap(), None);
        assert!(ledger.pending().unwrap().is_empty());
    }

    #[test]
    fn cancel_removes_only_the_matching_reminder() {
        let (ledger, clock) = ledger();
        let soon = clock.now_utc() + Duration::hours(1);
        let first = ledger.schedule("first", soon).unwrap().unwrap();
        let second = ledger.schedule("second", soon).unwrap().unwrap();
        ledger.cancel(&first).unwrap();
        ledger.cancel(&ReminderHandle::new("unknown")).unwrap();
        let pending = ledger.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].handle, second);
    }

    #[test]
    fn take_due_fires_elapsed_reminders_once() {
        let (ledger, clock) = ledger();
        ledger
            .schedule("stretch", clock.now_utc() + Duration::minutes(30))
            .unwrap();
        ledger
            .schedule("sleep", clock.now_utc() + Duration::hours(14))
            .unwrap();
        assert!(ledger.take_due().unwrap().is_empty());

        clock.advance(Duration::hours(1));
        let due = ledger.take_due().unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "stretch");
        assert!(ledger.take_due().unwrap().is_empty());
        assert_eq!(ledger.pending().unwrap().len(), 1);
    }
}
