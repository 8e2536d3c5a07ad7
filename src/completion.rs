//! Completion derivation.
//!
//! Leaf mutations ([`mark_task_step`], [`mark_subtask_step`],
//! [`set_user_completion`]) only touch the evidence they address. [`recompute`]
//! then derives every `completed` flag and `completed_at` stamp of a task from
//! that evidence. Nothing here fails: addressing an unknown ID changes nothing.

use chrono::{DateTime, Utc};

use crate::models::{Step, StepEvidence, Task, TaskKind, UserCompletions, DONE_SENTINEL};

/// Recomputes the derived completion state of `task` and its subtasks.
///
/// `completed_at` stamps are set to `now` on the transition to completed,
/// kept while the unit stays completed and cleared when it reverts.
pub fn recompute(task: &mut Task, now: DateTime<Utc>) {
    match task.kind {
        TaskKind::Single => {
            task.completed = single_task_completed(task);
        }
        TaskKind::Composite => {
            for st in &mut task.subtasks {
                // Subtasks without steps keep their explicit flag.
                if !st.steps.is_empty() {
                    let owner = st.owner_user_id.as_str();
                    st.completed = st.steps.iter().all(|s| s.evidence.done_by() == Some(owner));
                }
                stamp(&mut st.completed_at, st.completed, now);
            }
            task.completed =
                !task.subtasks.is_empty() && task.subtasks.iter().all(|st| st.completed);
        }
    }
    stamp(&mut task.completed_at, task.completed, now);
}

fn single_task_completed(task: &Task) -> bool {
    match (task.steps.is_empty(), task.is_multi_user()) {
        (false, false) => task.steps.iter().all(Step::is_done),
        (false, true) => task
            .steps
            .iter()
            .all(|s| task.user_ids.iter().all(|u| s.evidence.completed_by(u))),
        (true, true) => task.user_ids.iter().all(|u| task.completed_by_users.contains(u)),
        (true, false) => task.completed,
    }
}

fn stamp(at: &mut Option<DateTime<Utc>>, completed: bool, now: DateTime<Utc>) {
    if completed {
        at.get_or_insert(now);
    } else {
        *at = None;
    }
}

/// Whose evidence a step toggle writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credit<'a> {
    /// Scalar evidence on behalf of `who` (a user or [`DONE_SENTINEL`]).
    Scalar(&'a str),
    /// An individual entry for one of several assignees.
    User(&'a str),
}

impl Credit<'_> {
    fn grant(self, evidence: &mut StepEvidence, now: DateTime<Utc>) {
        match self {
            Credit::Scalar(who) => {
                let already =
                    matches!(&*evidence, StepEvidence::Single { done_by, .. } if done_by.as_str() == who);
                if !already {
                    *evidence = StepEvidence::Single {
                        done_by: who.to_string(),
                        completed_at: Some(now),
                    };
                }
            }
            Credit::User(user) => {
                if let StepEvidence::Multi { users } = evidence {
                    users.complete(user, now);
                } else {
                    let mut users = UserCompletions::default();
                    users.complete(user, now);
                    *evidence = StepEvidence::Multi { users };
                }
            }
        }
    }

    fn revoke(self, evidence: &mut StepEvidence) {
        if let Credit::User(user) = self {
            if let StepEvidence::Multi { users } = evidence {
                users.withdraw(user);
                if !users.is_empty() {
                    return;
                }
            }
        }
        *evidence = StepEvidence::None;
    }
}

/// Marks `steps[idx]` done or not done.
///
/// Marking the last step done also marks every preceding step done with the
/// same credit. Unmarking touches only `steps[idx]`.
fn mark_in_list(steps: &mut [Step], idx: usize, done: bool, credit: Credit<'_>, now: DateTime<Utc>) {
    if !done {
        credit.revoke(&mut steps[idx].evidence);
        return;
    }
    let first = if idx + 1 == steps.len() { 0 } else { idx };
    for step in &mut steps[first..=idx] {
        credit.grant(&mut step.evidence, now);
    }
}

/// Toggles a step that belongs to the task itself.
///
/// With several assignees and an `acting_user`, only that user's entry is
/// added or removed. Otherwise the step gets (or loses) scalar evidence.
/// Returns `false` if the step does not exist.
pub fn mark_task_step(
    task: &mut Task,
    step_id: &str,
    done: bool,
    acting_user: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    let Some(idx) = task.steps.iter().position(|s| s.id == step_id) else {
        return false;
    };
    let credit = match acting_user {
        Some(user) if task.is_multi_user() => Credit::User(user),
        _ => Credit::Scalar(DONE_SENTINEL),
    };
    mark_in_list(&mut task.steps, idx, done, credit, now);
    true
}

/// Toggles a step inside a subtask. Evidence is always the subtask owner's.
///
/// Returns `false` if the subtask or the step does not exist.
pub fn mark_subtask_step(
    task: &mut Task,
    subtask_id: &str,
    step_id: &str,
    done: bool,
    now: DateTime<Utc>,
) -> bool {
    let Some(st) = task.subtasks.iter_mut().find(|st| st.id == subtask_id) else {
        return false;
    };
    let Some(idx) = st.steps.iter().position(|s| s.id == step_id) else {
        return false;
    };
    mark_in_list(&mut st.steps, idx, done, Credit::Scalar(&st.owner_user_id), now);
    true
}

/// Records or withdraws `user`'s completion of a task without steps.
///
/// Completing twice keeps the first timestamp.
pub fn set_user_completion(task: &mut Task, user: &str, completed: bool, now: DateTime<Utc>) {
    if completed {
        task.completed_by_users.complete(user, now);
    } else {
        task.completed_by_users.withdraw(user);
    }
}
