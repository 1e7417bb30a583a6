//! Personal to-do list core: a task store with categories, weekday
//! recurrence, priorities and reminders, persisted as a single snapshot in a
//! key-value blob store.

pub mod clock;
pub mod config;
pub mod haptics;
pub mod model;
pub mod reminders;
pub mod storage;
pub mod store;
pub mod views;

pub use model::{CalendarDay, Priority, Recurrence, Task, TaskId, TaskPatch};
pub use store::{Collaborators, StoreSettings, TaskStore};
