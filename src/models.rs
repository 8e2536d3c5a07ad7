use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of any entity.
pub type Id = String;
/// Identifier of a [`User`].
pub type UserId = String;

/// Evidence value recorded when a step is done but nobody in particular is
/// credited with it.
pub const DONE_SENTINEL: &str = "__done__";

/// A person tasks can be assigned to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// How often a project repeats. Informational only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

/// Groups tasks under a name. Carries no derivation logic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Users associated with the project.
    #[serde(default)]
    pub user_ids: Vec<UserId>,
    #[serde(default)]
    pub repeat: Repeat,
}

/// Whether a task is worked on directly or split into per-user subtasks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Single,
    Composite,
}

/// Users who completed a unit, each with the time of their completion.
///
/// Persisted as the `completedByUsers` list plus the `userCompletedAt` map.
/// The list is authoritative: a timestamp for a user not in it is dropped on
/// load, and a listed user without a timestamp keeps `None`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(from = "UserCompletionsRepr", into = "UserCompletionsRepr")]
pub struct UserCompletions(BTreeMap<UserId, Option<DateTime<Utc>>>);

impl UserCompletions {
    pub fn contains(&self, user: &str) -> bool {
        self.0.contains_key(user)
    }

    /// When `user` completed, if they did and it was recorded.
    pub fn completed_at(&self, user: &str) -> Option<DateTime<Utc>> {
        self.0.get(user).copied().flatten()
    }

    /// Adds `user`, stamping `now` only if they have no stamp yet.
    pub fn complete(&mut self, user: &str, now: DateTime<Utc>) {
        self.0.entry(user.to_string()).or_insert(None).get_or_insert(now);
    }

    pub fn withdraw(&mut self, user: &str) {
        self.0.remove(user);
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UserCompletionsRepr {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    completed_by_users: Vec<UserId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    user_completed_at: BTreeMap<UserId, DateTime<Utc>>,
}

impl From<UserCompletionsRepr> for UserCompletions {
    fn from(r: UserCompletionsRepr) -> Self {
        let at = r.user_completed_at;
        UserCompletions(
            r.completed_by_users
                .into_iter()
                .map(|u| {
                    let t = at.get(&u).copied();
                    (u, t)
                })
                .collect(),
        )
    }
}

impl From<UserCompletions> for UserCompletionsRepr {
    fn from(c: UserCompletions) -> Self {
        let user_completed_at =
            c.0.iter().filter_map(|(u, t)| t.map(|t| (u.clone(), t))).collect();
        UserCompletionsRepr { completed_by_users: c.0.into_keys().collect(), user_completed_at }
    }
}

/// Who completed a step, and when.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StepEvidence {
    #[default]
    None,
    /// Done by one user, or by [`DONE_SENTINEL`] when nobody is tracked.
    Single {
        done_by: UserId,
        completed_at: Option<DateTime<Utc>>,
    },
    /// Done by each listed user. Never empty.
    Multi { users: UserCompletions },
}

impl StepEvidence {
    /// Legacy truthy check: any evidence at all.
    pub fn is_done(&self) -> bool {
        self.done_by().is_some()
    }

    /// Legacy scalar view. Multi evidence reads as the sentinel.
    pub fn done_by(&self) -> Option<&str> {
        match self {
            StepEvidence::None => None,
            StepEvidence::Single { done_by, .. } => Some(done_by),
            StepEvidence::Multi { users } if users.is_empty() => None,
            StepEvidence::Multi { .. } => Some(DONE_SENTINEL),
        }
    }

    /// Whether `user` has an individual completion entry.
    pub fn completed_by(&self, user: &str) -> bool {
        match self {
            StepEvidence::Multi { users } => users.contains(user),
            _ => false,
        }
    }

    pub fn completed_by_users(&self) -> BTreeSet<&str> {
        match self {
            StepEvidence::Multi { users } => users.users().collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Completion time of `user`'s individual entry.
    pub fn user_completed_at(&self, user: &str) -> Option<DateTime<Utc>> {
        match self {
            StepEvidence::Multi { users } => users.completed_at(user),
            _ => None,
        }
    }

    /// Time of the scalar completion, if one was recorded.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            StepEvidence::Single { completed_at, .. } => *completed_at,
            _ => None,
        }
    }
}

/// A named unit of work inside a task or subtask.
///
/// Evidence is persisted in the flat legacy shape: `doneByUserId` (the
/// sentinel for per-user evidence), `completedAt`, `completedByUsers` and
/// `userCompletedAt`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "StepRepr", into = "StepRepr")]
pub struct Step {
    pub id: Id,
    pub name: String,
    pub evidence: StepEvidence,
}

impl Step {
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Step { id, name: name.into(), evidence: StepEvidence::None }
    }

    pub fn is_done(&self) -> bool {
        self.evidence.is_done()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepRepr {
    id: Id,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done_by_user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    users: UserCompletions,
}

impl From<StepRepr> for Step {
    fn from(r: StepRepr) -> Self {
        // Per-user entries win over the scalar, which only mirrors them.
        let evidence = match r.done_by_user_id {
            _ if !r.users.is_empty() => StepEvidence::Multi { users: r.users },
            Some(done_by) if !done_by.is_empty() => {
                StepEvidence::Single { done_by, completed_at: r.completed_at }
            }
            _ => StepEvidence::None,
        };
        Step { id: r.id, name: r.name, evidence }
    }
}

impl From<Step> for StepRepr {
    fn from(s: Step) -> Self {
        let (done_by_user_id, completed_at, users) = match s.evidence {
            StepEvidence::None => (None, None, UserCompletions::default()),
            StepEvidence::Single { done_by, completed_at } => (Some(done_by), completed_at, UserCompletions::default()),
            StepEvidence::Multi { users } => (Some(DONE_SENTINEL.to_string()), None, users),
        };
        StepRepr { id: s.id, name: s.name, done_by_user_id, completed_at, users }
    }
}

/// The share of a composite task owned by exactly one user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: Id,
    pub name: String,
    pub owner_user_id: UserId,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A work item assigned to one or more users.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Id>,
    /// Assigned users, in display order.
    pub user_ids: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    /// Worked directly on single tasks; templates for composite ones.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Subtask names expanded per user when a composite task is created.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtask_templates: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-user completion for multi-user tasks without steps.
    #[serde(flatten)]
    pub completed_by_users: UserCompletions,
}

impl Task {
    pub fn is_multi_user(&self) -> bool {
        self.user_ids.len() > 1
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|st| st.id == id)
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Lifecycle of an appointment relative to its start time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Started,
    Completed,
}

/// A reminder for something starting at a fixed time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Users to remind.
    #[serde(default)]
    pub user_ids: Vec<UserId>,
    #[serde(rename = "startTime")]
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Status as of `now`: completed wins, otherwise started once the start
    /// time has passed.
    pub fn status_at(&self, now: DateTime<Utc>) -> AppointmentStatus {
        if self.completed {
            AppointmentStatus::Completed
        } else if self.start_at < now {
            AppointmentStatus::Started
        } else {
            AppointmentStatus::Pending
        }
    }
}

/// Everything the application persists, as one snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Entities {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}
