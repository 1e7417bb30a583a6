use crate::model::CalendarDay;
use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Source of the current wall-clock time. Day and weekday arithmetic uses
/// the offset carried by `now`.
pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    fn today(&self) -> CalendarDay {
        CalendarDay::of(&self.now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A settable clock. Clones share the same instant, so a test can keep one
/// handle and move time while the store holds the other.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Rc<Cell<DateTime<FixedOffset>>>,
}

impl FixedClock {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        FixedClock {
            instant: Rc::new(Cell::new(at)),
        }
    }

    pub fn set(&self, at: DateTime<FixedOffset>) {
        self.instant.set(at);
    }

    pub fn advance(&self, by: Duration) {
        self.instant.set(self.instant.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.instant.get()
    }
}
