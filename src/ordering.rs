use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{Appointment, Task};

/// Which tasks to keep by completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Done,
    Todo,
}

/// Criteria for listing tasks. Empty criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive substring of the task name.
    pub query: Option<String>,
    pub project_id: Option<String>,
    /// Keep tasks assigned to this user.
    pub user_id: Option<String>,
    pub status: StatusFilter,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(q) = &self.query {
            if !task.name.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some(p) = &self.project_id {
            if task.project_id.as_ref() != Some(p) {
                return false;
            }
        }
        if let Some(u) = &self.user_id {
            if !task.user_ids.contains(u) {
                return false;
            }
        }
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Done => task.completed,
            StatusFilter::Todo => !task.completed,
        }
    }
}

/// Open tasks first, soonest due first; tasks without a due time go last
/// within their group.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    a.completed.cmp(&b.completed).then_with(|| match (a.due_at, b.due_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Returns the matching tasks in listing order.
pub fn select_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks.iter().filter(|t| filter.matches(t)).collect();
    out.sort_by(|a, b| compare_tasks(a, b));
    out
}

/// Open appointments first, then by start time.
pub fn sort_appointments(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| a.completed.cmp(&b.completed).then(a.start_at.cmp(&b.start_at)));
}

/// Human label for the time left until `at`, e.g. `2d 3h 5m`.
pub fn time_until(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let diff = at - now;
    if diff.num_seconds() < 0 {
        return "expired".to_string();
    }
    let days = diff.num_days();
    let hours = diff.num_hours() % 24;
    let minutes = diff.num_minutes() % 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn time_until_formats_by_magnitude() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(time_until(now, now - Duration::minutes(1)), "expired");
        assert_eq!(time_until(now, now + Duration::minutes(7)), "7m");
        assert_eq!(time_until(now, now + Duration::minutes(65)), "1h 5m");
        assert_eq!(
            time_until(now, now + Duration::days(2) + Duration::hours(3) + Duration::minutes(4)),
            "2d 3h 4m"
        );
    }
}
