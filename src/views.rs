use crate::model::Task;
use std::collections::VecDeque;

/// Category filter applied by list and focus views.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Category(String),
}

impl Filter {
    pub fn from_category(category: Option<&str>) -> Self {
        match category.map(str::trim) {
            Some(name) if !name.is_empty() => Filter::Category(name.to_string()),
            _ => Filter::All,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Category(name) => task.category == *name,
        }
    }
}

pub fn visible<'a>(tasks: &'a [Task], filter: &Filter) -> Vec<&'a Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

pub fn pending_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| !t.is_completed).count()
}

/// Open tasks matching a filter, surfaced one at a time in list order.
#[derive(Debug)]
pub struct FocusQueue<'a> {
    queue: VecDeque<&'a Task>,
}

impl<'a> FocusQueue<'a> {
    pub fn new(tasks: &'a [Task], filter: &Filter) -> Self {
        FocusQueue {
            queue: tasks
                .iter()
                .filter(|t| !t.is_completed && filter.matches(t))
                .collect(),
        }
    }

    pub fn current(&self) -> Option<&'a Task> {
        self.queue.front().copied()
    }

    /// Sends the current task to the back of the queue.
    pub fn skip(&mut self) {
        if let Some(task) = self.queue.pop_front() {
            self.queue.push_back(task);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Recurrence};
    use chrono::Utc;

    fn task(id: &str, category: &str, done: bool) -> Task {
        let mut task = Task::new(
            id.into(),
            id.into(),
            category.into(),
            Recurrence::NONE,
            Priority::Medium,
            Utc::now(),
        );
        task.is_completed = done;
        task
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", "Work", true),
            task("b", "Home", false),
            task("c", "Work", false),
            task("d", "Work", false),
        ]
    }

    #[test]
    fn filter_by_category() {
        let tasks = sample();
        let work = Filter::from_category(Some(" Work "));
        let ids: Vec<&str> = visible(&tasks, &work).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert_eq!(visible(&tasks, &Filter::from_category(Some(""))).len(), 4);
        assert_eq!(pending_count(&tasks), 3);
    }

    #[test]
    fn focus_queue_skips_in_rotation() {
        let tasks = sample();
        let mut focus = FocusQueue::new(&tasks, &Filter::Category("Work".into()));
        assert_eq!(focus.len(), 2);
        assert_eq!(focus.current().map(|t| t.id.as_str()), Some("c"));
        focus.skip();
        assert_eq!(focus.current().map(|t| t.id.as_str()), Some("d"));
        focus.skip();
        assert_eq!(focus.current().map(|t| t.id.as_str()), Some("c"));

        let empty = FocusQueue::new(&tasks, &Filter::Category("Trip".into()));
        assert!(empty.is_empty());
        assert_eq!(empty.current(), None);
    }
}
