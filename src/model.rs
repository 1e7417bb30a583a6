use crate::reminders::ReminderHandle;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TaskId = String;

/// Category assigned to tasks created without one.
pub const DEFAULT_CATEGORY: &str = "Geral";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub category: String,
    pub is_completed: bool,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notification_id: Option<ReminderHandle>,
    #[serde(default)]
    pub last_completed_date: Option<CalendarDay>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: TaskId,
        text: String,
        category: String,
        recurrence: Recurrence,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Task {
            id,
            text,
            category,
            is_completed: false,
            recurrence,
            priority: Some(priority),
            reminder_time: None,
            notification_id: None,
            last_completed_date: None,
            created_at,
        }
    }

    /// Sort weight of the task's priority; tasks without one weigh 0.
    pub fn priority_weight(&self) -> u8 {
        self.priority.map(Priority::weight).unwrap_or(0)
    }

    pub fn is_recurring(&self) -> bool {
        !self.recurrence.is_empty()
    }
}

/// Partial update applied by `TaskStore::update_task`. `None` leaves a field
/// untouched; the doubly optional fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub category: Option<String>,
    pub is_completed: Option<bool>,
    pub recurrence: Option<Recurrence>,
    pub priority: Option<Priority>,
    pub reminder_time: Option<Option<DateTime<Utc>>>,
    pub notification_id: Option<Option<ReminderHandle>>,
    /// Left as `None`, a patch that opens or closes the task stamps or
    /// clears the day the same way `toggle_task` does.
    pub last_completed_date: Option<Option<CalendarDay>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("weekday index out of range: {0} (expected 0-6)")]
    WeekdayOutOfRange(u8),
    #[error("unknown weekday: {0}")]
    UnknownWeekday(String),
    #[error("unknown priority: {0} (expected high, medium or low)")]
    UnknownPriority(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(ModelError::UnknownPriority(other.to_string())),
        }
    }
}

// Snapshots written by older builds may carry no priority or one we no longer
// know; both load as "no priority" rather than failing the whole snapshot.
fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Set of weekdays a task recurs on, indexed 0=Sunday..6=Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<u8>", try_from = "Vec<u8>")]
pub struct Recurrence(u8);

impl Recurrence {
    pub const NONE: Recurrence = Recurrence(0);

    pub fn daily() -> Self {
        Recurrence(0b0111_1111)
    }

    /// Monday through Friday.
    pub fn weekdays() -> Self {
        Recurrence(0b0011_1110)
    }

    pub fn from_days<I>(days: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut recurrence = Recurrence::NONE;
        for day in days {
            recurrence.insert(day)?;
        }
        Ok(recurrence)
    }

    pub fn insert(&mut self, day: u8) -> Result<(), ModelError> {
        if day > 6 {
            return Err(ModelError::WeekdayOutOfRange(day));
        }
        self.0 |= 1 << day;
        Ok(())
    }

    pub fn contains(self, day: u8) -> bool {
        day <= 6 && self.0 & (1 << day) != 0
    }

    pub fn contains_weekday(self, weekday: Weekday) -> bool {
        self.contains(weekday.num_days_from_sunday() as u8)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn days(self) -> impl Iterator<Item = u8> {
        (0..7u8).filter(move |day| self.contains(*day))
    }
}

impl From<Recurrence> for Vec<u8> {
    fn from(recurrence: Recurrence) -> Self {
        recurrence.days().collect()
    }
}

impl TryFrom<Vec<u8>> for Recurrence {
    type Error = ModelError;

    fn try_from(days: Vec<u8>) -> Result<Self, Self::Error> {
        Recurrence::from_days(days)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        if *self == Recurrence::daily() {
            return f.write_str("daily");
        }
        if *self == Recurrence::weekdays() {
            return f.write_str("weekdays");
        }
        let names: Vec<&str> = self
            .days()
            .map(|day| WEEKDAY_NAMES[day as usize])
            .collect();
        f.write_str(&names.join(","))
    }
}

/// Accepts `none`, `daily`, `weekdays`, or a comma separated list of day
/// names (`mon,wed`) and/or indices (`1,3`).
impl FromStr for Recurrence {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => return Ok(Recurrence::NONE),
            "daily" => return Ok(Recurrence::daily()),
            "weekdays" | "mon-fri" => return Ok(Recurrence::weekdays()),
            _ => {}
        }
        let mut recurrence = Recurrence::NONE;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_ascii_lowercase();
            let day = match lower.parse::<u8>() {
                Ok(index) => index,
                Err(_) => WEEKDAY_NAMES
                    .iter()
                    .position(|name| lower.starts_with(name))
                    .map(|index| index as u8)
                    .ok_or_else(|| ModelError::UnknownWeekday(part.to_string()))?,
            };
            recurrence.insert(day)?;
        }
        Ok(recurrence)
    }
}

/// A local calendar day. Completions are compared at this granularity, never
/// as timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// The wall-clock day of `at` in its own offset.
    pub fn of<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        CalendarDay(at.date_naive())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// 0=Sunday..6=Saturday.
    pub fn weekday_index(self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(date: NaiveDate) -> Self {
        CalendarDay(date)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn recurrence_parses_names_indices_and_presets() {
        assert_eq!("daily".parse::<Recurrence>().unwrap(), Recurrence::daily());
        assert_eq!(
            "mon-fri".parse::<Recurrence>().unwrap(),
            Recurrence::weekdays()
        );
        let mixed: Recurrence = "mon, 3, Friday".parse().unwrap();
        assert_eq!(mixed.days().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(mixed.to_string(), "mon,wed,fri");
        assert_eq!(
            "funday".parse::<Recurrence>(),
            Err(ModelError::UnknownWeekday("funday".into()))
        );
        assert_eq!(
            "7".parse::<Recurrence>(),
            Err(ModelError::WeekdayOutOfRange(7))
        );
    }

    #[test]
    fn recurrence_serializes_as_sorted_day_list() {
        let recurrence = Recurrence::from_days([5, 1, 3]).unwrap();
        let yaml = serde_yaml::to_string(&recurrence).unwrap();
        let days: Vec<u8> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(days, vec![1, 3, 5]);
        assert!(serde_yaml::from_str::<Recurrence>("[1, 9]").is_err());
    }

    #[test]
    fn weekdays_preset_covers_monday_to_friday() {
        let weekdays = Recurrence::weekdays();
        assert!(!weekdays.contains_weekday(Weekday::Sun));
        assert!(weekdays.contains_weekday(Weekday::Mon));
        assert!(weekdays.contains_weekday(Weekday::Fri));
        assert!(!weekdays.contains_weekday(Weekday::Sat));
    }

    #[test]
    fn calendar_day_ignores_time_of_day() {
        let offset = FixedOffset::east_opt(-3 * 3600).unwrap();
        let morning = offset.with_ymd_and_hms(2026, 10, 20, 0, 5, 0).unwrap();
        let night = offset.with_ymd_and_hms(2026, 10, 20, 23, 55, 0).unwrap();
        assert_eq!(CalendarDay::of(&morning), CalendarDay::of(&night));
        assert_eq!(CalendarDay::of(&night).to_string(), "2026-10-20");
        assert_eq!(CalendarDay::of(&night).weekday_index(), 2);
    }

    #[test]
    fn unknown_priority_loads_as_none() {
        let yaml = "
id: abc
text: Water plants
category: Casa
is_completed: false
priority: urgent
created_at: 2026-10-19T12:00:00Z
";
        let task: Task = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(task.priority, None);
        assert_eq!(task.priority_weight(), 0);
        assert!(task.recurrence.is_empty());
        assert_eq!(task.last_completed_date, None);
    }

    #[test]
    fn priority_weights_order_high_first() {
        assert!(Priority::High.weight() > Priority::Medium.weight());
        assert!(Priority::Medium.weight() > Priority::Low.weight());
        assert_eq!("H".parse::<Priority>().unwrap(), Priority::High);
    }
}
