//! The entity store and the commands that change it.
//!
//! Every command takes `&mut Store`, so commands never overlap. The
//! collection lives behind an `Arc` and is copied on write: a snapshot handed
//! out by [`Store::snapshot`] never changes underneath its holder. Each
//! mutating command ends with exactly one save, whether or not its target
//! existed. Save failures are logged and otherwise ignored; the in-memory state
//! stays authoritative.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::completion::{self, recompute};
use crate::ids::IdSupplier;
use crate::models::{
    Appointment, AppointmentStatus, Entities, Id, Project, Repeat, Step, Subtask, Task, TaskKind,
    User, UserId,
};
use crate::storage::{JsonFileStorage, Persistence};
use crate::subtasks::{clone_step_templates, generate_subtasks};

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub nickname: String,
    pub phone: Option<String>,
    pub note: Option<String>,
}

/// Fields left `None` are unchanged. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub nickname: Option<String>,
    pub phone: Option<Option<String>>,
    pub note: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub note: Option<String>,
    pub user_ids: Vec<UserId>,
    pub repeat: Repeat,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub note: Option<Option<String>>,
    pub user_ids: Option<Vec<UserId>>,
    pub repeat: Option<Repeat>,
}

/// Input for [`Store::create_task`]. Steps are given by name; the store
/// assigns their IDs.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub project_id: Option<Id>,
    pub user_ids: Vec<UserId>,
    pub note: Option<String>,
    pub kind: TaskKind,
    pub steps: Vec<String>,
    pub subtask_templates: Vec<String>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub project_id: Option<Option<Id>>,
    pub user_ids: Option<Vec<UserId>>,
    pub note: Option<Option<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    /// Only sticks on units whose completion is not derived.
    pub completed: Option<bool>,
}

/// Input for [`Store::add_subtask`]. Steps are cloned from the task's
/// templates.
#[derive(Debug, Clone, Default)]
pub struct NewSubtask {
    /// Defaults to `Subtask N`.
    pub name: Option<String>,
    pub owner_user_id: UserId,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubtaskUpdate {
    pub name: Option<String>,
    pub note: Option<Option<String>>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub title: String,
    pub content: String,
    pub user_ids: Vec<UserId>,
    pub start_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub user_ids: Option<Vec<UserId>>,
    pub start_at: Option<DateTime<Utc>>,
}

/// In-memory entity collection backed by a [`Persistence`].
pub struct Store<P: Persistence = JsonFileStorage> {
    entities: Arc<Entities>,
    persistence: P,
    ids: Box<dyn IdSupplier>,
    clock: Box<dyn Clock>,
}

impl<P: Persistence> Store<P> {
    /// Loads the initial collection, starting empty if loading fails.
    pub fn open(persistence: P, ids: impl IdSupplier + 'static, clock: impl Clock + 'static) -> Self {
        let entities = match persistence.load() {
            Ok(entities) => {
                info!(
                    tasks = entities.tasks.len(),
                    users = entities.users.len(),
                    "Loaded entities"
                );
                entities
            }
            Err(e) => {
                warn!("Failed to load entities: {}, starting empty", e);
                Entities::default()
            }
        };
        Store {
            entities: Arc::new(entities),
            persistence,
            ids: Box::new(ids),
            clock: Box::new(clock),
        }
    }

    /// The current collection. Later commands do not affect it.
    pub fn snapshot(&self) -> Arc<Entities> {
        Arc::clone(&self.entities)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn users(&self) -> &[User] {
        &self.entities.users
    }

    pub fn projects(&self) -> &[Project] {
        &self.entities.projects
    }

    pub fn tasks(&self) -> &[Task] {
        &self.entities.tasks
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.entities.appointments
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.entities.tasks.iter().find(|t| t.id == id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.entities.users.iter().find(|u| u.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.entities.projects.iter().find(|p| p.id == id)
    }

    pub fn appointment(&self, id: &str) -> Option<&Appointment> {
        self.entities.appointments.iter().find(|a| a.id == id)
    }

    /// Applies one mutation to a private copy of the collection, then saves.
    fn commit<R>(
        &mut self,
        f: impl FnOnce(&mut Entities, &mut dyn IdSupplier, DateTime<Utc>) -> R,
    ) -> R {
        let now = self.clock.now();
        let out = f(Arc::make_mut(&mut self.entities), self.ids.as_mut(), now);
        if let Err(e) = self.persistence.save(&self.entities) {
            warn!("Failed to save entities: {}", e);
        }
        out
    }

    /// Runs `f` on the task with `id` and recomputes it. Unknown IDs change
    /// nothing but still save.
    fn with_task(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut Task, &mut dyn IdSupplier, DateTime<Utc>),
    ) {
        self.commit(|entities, ids, now| match entities.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                f(task, ids, now);
                recompute(task, now);
            }
            None => debug!(task_id = id, "Task not found"),
        });
    }

    // Users

    pub fn create_user(&mut self, data: NewUser) -> User {
        self.commit(|entities, ids, _| {
            let user = User {
                id: ids.new_id(),
                nickname: data.nickname,
                phone: data.phone,
                note: data.note,
            };
            debug!(user_id = %user.id, "Created user");
            entities.users.insert(0, user.clone());
            user
        })
    }

    pub fn update_user(&mut self, id: &str, updates: UserUpdate) {
        self.commit(|entities, _, _| {
            let Some(u) = entities.users.iter_mut().find(|u| u.id == id) else {
                debug!(user_id = id, "User not found");
                return;
            };
            if let Some(n) = updates.nickname { u.nickname = n; }
            if let Some(p) = updates.phone { u.phone = p; }
            if let Some(n) = updates.note { u.note = n; }
        });
    }

    pub fn delete_user(&mut self, id: &str) {
        self.commit(|entities, _, _| entities.users.retain(|u| u.id != id));
    }

    // Projects

    pub fn create_project(&mut self, data: NewProject) -> Project {
        self.commit(|entities, ids, _| {
            let project = Project {
                id: ids.new_id(),
                name: data.name,
                note: data.note,
                user_ids: data.user_ids,
                repeat: data.repeat,
            };
            debug!(project_id = %project.id, "Created project");
            entities.projects.insert(0, project.clone());
            project
        })
    }

    pub fn update_project(&mut self, id: &str, updates: ProjectUpdate) {
        self.commit(|entities, _, _| {
            let Some(p) = entities.projects.iter_mut().find(|p| p.id == id) else {
                debug!(project_id = id, "Project not found");
                return;
            };
            if let Some(n) = updates.name { p.name = n; }
            if let Some(n) = updates.note { p.note = n; }
            if let Some(u) = updates.user_ids { p.user_ids = u; }
            if let Some(r) = updates.repeat { p.repeat = r; }
        });
    }

    pub fn delete_project(&mut self, id: &str) {
        self.commit(|entities, _, _| entities.projects.retain(|p| p.id != id));
    }

    // Tasks

    /// Creates a task. Composite tasks get their subtasks generated here.
    pub fn create_task(&mut self, data: NewTask) -> Task {
        self.commit(|entities, ids, _| {
            let steps: Vec<Step> =
                data.steps.into_iter().map(|name| Step::new(ids.new_id(), name)).collect();
            let subtasks = match data.kind {
                TaskKind::Composite => {
                    generate_subtasks(&data.user_ids, &steps, &data.subtask_templates, ids)
                }
                TaskKind::Single => Vec::new(),
            };
            let task = Task {
                id: ids.new_id(),
                name: data.name,
                project_id: data.project_id,
                user_ids: data.user_ids,
                note: data.note,
                kind: data.kind,
                steps,
                subtask_templates: data.subtask_templates,
                subtasks,
                due_at: data.due_at,
                completed: false,
                completed_at: None,
                completed_by_users: Default::default(),
            };
            debug!(task_id = %task.id, subtasks = task.subtasks.len(), "Created task");
            entities.tasks.insert(0, task.clone());
            task
        })
    }

    pub fn update_task(&mut self, id: &str, updates: TaskUpdate) {
        self.with_task(id, |t, _, _| {
            if let Some(n) = updates.name { t.name = n; }
            if let Some(p) = updates.project_id { t.project_id = p; }
            if let Some(u) = updates.user_ids { t.user_ids = u; }
            if let Some(n) = updates.note { t.note = n; }
            if let Some(d) = updates.due_at { t.due_at = d; }
            if let Some(c) = updates.completed { t.completed = c; }
        });
    }

    /// Explicitly completes or reopens a task without steps or subtasks.
    pub fn set_task_completed(&mut self, id: &str, completed: bool) {
        self.update_task(id, TaskUpdate { completed: Some(completed), ..TaskUpdate::default() });
    }

    /// Removes a task together with its subtasks.
    pub fn delete_task(&mut self, id: &str) {
        self.commit(|entities, _, _| entities.tasks.retain(|t| t.id != id));
    }

    // Subtasks

    pub fn add_subtask(&mut self, task_id: &str, data: NewSubtask) {
        self.with_task(task_id, |t, ids, _| {
            let name = data
                .name
                .unwrap_or_else(|| format!("Subtask {}", t.subtasks.len() + 1));
            let subtask = Subtask {
                id: ids.new_id(),
                name,
                owner_user_id: data.owner_user_id,
                steps: clone_step_templates(&t.steps, ids),
                completed: false,
                completed_at: None,
                note: data.note,
            };
            debug!(task_id = %t.id, subtask_id = %subtask.id, "Added subtask");
            t.subtasks.push(subtask);
        });
    }

    pub fn update_subtask(&mut self, task_id: &str, subtask_id: &str, updates: SubtaskUpdate) {
        self.with_task(task_id, |t, _, _| {
            let Some(st) = t.subtasks.iter_mut().find(|st| st.id == subtask_id) else {
                debug!(task_id, subtask_id, "Subtask not found");
                return;
            };
            if let Some(n) = updates.name { st.name = n; }
            if let Some(n) = updates.note { st.note = n; }
            if let Some(c) = updates.completed { st.completed = c; }
        });
    }

    pub fn delete_subtask(&mut self, task_id: &str, subtask_id: &str) {
        self.with_task(task_id, |t, _, _| t.subtasks.retain(|st| st.id != subtask_id));
    }

    /// Marks a step done or not done and recomputes the task.
    ///
    /// On a single task the step is one of the task's own and `subtask_id`
    /// is ignored. On a composite task `subtask_id` picks the subtask, and the
    /// step is credited to its owner whoever `acting_user` is; without it
    /// nothing changes. `acting_user` matters only for single tasks with
    /// several assignees, where it toggles that user's entry alone.
    pub fn set_step_done(
        &mut self,
        task_id: &str,
        subtask_id: Option<&str>,
        step_id: &str,
        done: bool,
        acting_user: Option<&str>,
    ) {
        self.with_task(task_id, |t, _, now| {
            let found = match (t.kind, subtask_id) {
                (TaskKind::Single, _) => {
                    completion::mark_task_step(t, step_id, done, acting_user, now)
                }
                (TaskKind::Composite, Some(sid)) => {
                    completion::mark_subtask_step(t, sid, step_id, done, now)
                }
                (TaskKind::Composite, None) => false,
            };
            if !found {
                debug!(task_id, ?subtask_id, step_id, "Step not found");
            }
        });
    }

    /// Records whether `user_id` has completed a task that has no steps.
    pub fn set_task_completed_by_user(&mut self, task_id: &str, user_id: &str, completed: bool) {
        self.with_task(task_id, |t, _, now| {
            completion::set_user_completion(t, user_id, completed, now)
        });
    }

    // Appointments

    pub fn create_appointment(&mut self, data: NewAppointment) -> Appointment {
        self.commit(|entities, ids, now| {
            let mut appointment = Appointment {
                id: ids.new_id(),
                title: data.title,
                content: data.content,
                user_ids: data.user_ids,
                start_at: data.start_at,
                status: AppointmentStatus::Pending,
                completed: false,
                completed_at: None,
            };
            appointment.status = appointment.status_at(now);
            debug!(appointment_id = %appointment.id, "Created appointment");
            entities.appointments.insert(0, appointment.clone());
            appointment
        })
    }

    pub fn update_appointment(&mut self, id: &str, updates: AppointmentUpdate) {
        self.commit(|entities, _, now| {
            let Some(a) = entities.appointments.iter_mut().find(|a| a.id == id) else {
                debug!(appointment_id = id, "Appointment not found");
                return;
            };
            if let Some(t) = updates.title { a.title = t; }
            if let Some(c) = updates.content { a.content = c; }
            if let Some(u) = updates.user_ids { a.user_ids = u; }
            if let Some(s) = updates.start_at { a.start_at = s; }
            a.status = a.status_at(now);
        });
    }

    pub fn delete_appointment(&mut self, id: &str) {
        self.commit(|entities, _, _| entities.appointments.retain(|a| a.id != id));
    }

    pub fn mark_appointment_completed(&mut self, id: &str) {
        self.commit(|entities, _, now| {
            let Some(a) = entities.appointments.iter_mut().find(|a| a.id == id) else {
                debug!(appointment_id = id, "Appointment not found");
                return;
            };
            a.completed = true;
            a.completed_at.get_or_insert(now);
            a.status = AppointmentStatus::Completed;
        });
    }
}
