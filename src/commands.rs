use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::{AppointmentStatus, Repeat, Task, TaskKind};
use crate::ordering::{select_tasks, sort_appointments, time_until, TaskFilter};
use crate::storage::Persistence;
use crate::store::{
    NewAppointment, NewProject, NewSubtask, NewTask, NewUser, ProjectUpdate, Store, SubtaskUpdate,
    TaskUpdate, UserUpdate,
};

/// Parses a timestamp given as RFC 3339, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD`.
///
/// The last two are read as local time.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::default())))
        .map_err(|e| anyhow!("Invalid time '{}': {}. Use YYYY-MM-DD [HH:MM] or RFC 3339.", s, e))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("Time '{}' does not exist in the local time zone", s))
}

pub fn parse_repeat(s: &str) -> Result<Repeat> {
    match s.to_lowercase().as_str() {
        "none" => Ok(Repeat::None),
        "daily" => Ok(Repeat::Daily),
        "weekly" => Ok(Repeat::Weekly),
        "monthly" => Ok(Repeat::Monthly),
        _ => Err(anyhow!("Unknown repeat '{}'. Supported: none, daily, weekly, monthly.", s)),
    }
}

/// Edit value for an optional field: absent keeps it, empty clears it.
pub fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.trim().is_empty() { None } else { Some(v) })
}

fn local(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::new(n).add_attribute(Attribute::Bold)).collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn nickname<P: Persistence>(store: &Store<P>, id: &str) -> String {
    store.user(id).map(|u| u.nickname.clone()).unwrap_or_else(|| id.to_string())
}

fn done_mark(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

// Users

pub fn cmd_user_add<P: Persistence>(store: &mut Store<P>, nickname: String, phone: Option<String>, note: Option<String>) {
    let user = store.create_user(NewUser { nickname, phone, note });
    println!("User added (id = {})", user.id);
}

pub fn cmd_user_list<P: Persistence>(store: &Store<P>) {
    if store.users().is_empty() {
        println!("No users found.");
        return;
    }
    let mut table = new_table();
    table.set_header(header(&["ID", "Nickname", "Phone", "Note"]));
    for u in store.users() {
        table.add_row(vec![
            Cell::new(&u.id),
            Cell::new(&u.nickname),
            Cell::new(u.phone.as_deref().unwrap_or("-")),
            Cell::new(u.note.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
}

pub fn cmd_user_edit<P: Persistence>(store: &mut Store<P>, id: &str, updates: UserUpdate) {
    if store.user(id).is_none() {
        eprintln!("User {} not found.", id);
        return;
    }
    store.update_user(id, updates);
    println!("User {} updated.", id);
}

pub fn cmd_user_remove<P: Persistence>(store: &mut Store<P>, id: &str) {
    if store.user(id).is_none() {
        eprintln!("User {} not found.", id);
        return;
    }
    store.delete_user(id);
    println!("User {} removed.", id);
}

// Projects

pub fn cmd_project_add<P: Persistence>(store: &mut Store<P>, name: String, note: Option<String>, user_ids: Vec<String>, repeat: Repeat) {
    let project = store.create_project(NewProject { name, note, user_ids, repeat });
    println!("Project added (id = {})", project.id);
}

pub fn cmd_project_list<P: Persistence>(store: &Store<P>) {
    if store.projects().is_empty() {
        println!("No projects found.");
        return;
    }
    let mut table = new_table();
    table.set_header(header(&["ID", "Name", "Repeat", "Users", "Tasks"]));
    for p in store.projects() {
        let users: Vec<String> = p.user_ids.iter().map(|u| nickname(store, u)).collect();
        let tasks = store.tasks().iter().filter(|t| t.project_id.as_ref() == Some(&p.id)).count();
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.name),
            Cell::new(format!("{:?}", p.repeat).to_lowercase()),
            Cell::new(users.join(", ")),
            Cell::new(tasks),
        ]);
    }
    println!("{table}");
}

pub fn cmd_project_edit<P: Persistence>(store: &mut Store<P>, id: &str, updates: ProjectUpdate) {
    if store.project(id).is_none() {
        eprintln!("Project {} not found.", id);
        return;
    }
    store.update_project(id, updates);
    println!("Project {} updated.", id);
}

pub fn cmd_project_remove<P: Persistence>(store: &mut Store<P>, id: &str) {
    if store.project(id).is_none() {
        eprintln!("Project {} not found.", id);
        return;
    }
    store.delete_project(id);
    println!("Project {} removed.", id);
}

// Tasks

#[allow(clippy::too_many_arguments)]
pub fn cmd_task_add<P: Persistence>(
    store: &mut Store<P>,
    name: String,
    user_ids: Vec<String>,
    project_id: Option<String>,
    note: Option<String>,
    composite: bool,
    steps: Vec<String>,
    subtask_templates: Vec<String>,
    due_at: Option<DateTime<Utc>>,
) {
    if user_ids.is_empty() {
        eprintln!("A task needs at least one user.");
        return;
    }
    let kind = if composite { TaskKind::Composite } else { TaskKind::Single };
    let task = store.create_task(NewTask {
        name,
        project_id,
        user_ids,
        note,
        kind,
        steps,
        subtask_templates,
        due_at,
    });
    println!("Task added (id = {}, {} subtasks)", task.id, task.subtasks.len());
}

pub fn cmd_task_list<P: Persistence>(store: &Store<P>, filter: &TaskFilter) {
    let tasks = select_tasks(store.tasks(), filter);
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    let now = Utc::now();
    let mut table = new_table();
    table.set_header(header(&["ID", "Name", "Type", "Users", "Progress", "Due", "Time Left", "Status"]));
    for t in tasks {
        let users: Vec<String> = t.user_ids.iter().map(|u| nickname(store, u)).collect();
        let (left, left_color) = match t.due_at {
            Some(due) if !t.completed => {
                let color = if due < now { Color::Red } else { Color::Reset };
                (time_until(now, due), color)
            }
            _ => (String::new(), Color::Reset),
        };
        let (status, status_color) = if t.completed { ("Done", Color::Green) } else { ("Pending", Color::Yellow) };
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(&t.name),
            Cell::new(format!("{:?}", t.kind).to_lowercase()),
            Cell::new(users.join(", ")),
            Cell::new(progress(t)),
            Cell::new(t.due_at.map(local).unwrap_or_default()),
            Cell::new(left).fg(left_color),
            Cell::new(status).fg(status_color),
        ]);
    }
    println!("{table}");
}

/// `done/total` over the units whose completion drives the task.
fn progress(t: &Task) -> String {
    match t.kind {
        TaskKind::Composite => {
            let done = t.subtasks.iter().filter(|st| st.completed).count();
            format!("{}/{}", done, t.subtasks.len())
        }
        TaskKind::Single if t.steps.is_empty() && t.is_multi_user() => {
            let done = t.user_ids.iter().filter(|u| t.completed_by_users.contains(u)).count();
            format!("{}/{}", done, t.user_ids.len())
        }
        TaskKind::Single if !t.steps.is_empty() => {
            let done = t.steps.iter().filter(|s| s.is_done()).count();
            format!("{}/{}", done, t.steps.len())
        }
        TaskKind::Single => String::new(),
    }
}

pub fn cmd_task_show<P: Persistence>(store: &Store<P>, id: &str) {
    let Some(t) = store.task(id) else {
        eprintln!("Task {} not found.", id);
        return;
    };
    println!("{} {} ({:?})", done_mark(t.completed), t.name, t.kind);
    if let Some(p) = t.project_id.as_deref().and_then(|p| store.project(p)) {
        println!("  project: {} ({:?})", p.name, p.repeat);
    }
    if let Some(due) = t.due_at {
        println!("  due: {}", local(due));
    }
    if let Some(at) = t.completed_at {
        println!("  completed: {}", local(at));
    }
    if let Some(note) = &t.note {
        println!("  note: {}", note);
    }
    for uid in &t.user_ids {
        match (t.completed_by_users.contains(uid), t.completed_by_users.completed_at(uid)) {
            (true, Some(at)) => println!("  user {}: done {}", nickname(store, uid), local(at)),
            (true, None) => println!("  user {}: done", nickname(store, uid)),
            _ => println!("  user {}", nickname(store, uid)),
        }
    }
    match t.kind {
        TaskKind::Single => {
            for s in &t.steps {
                let by: Vec<String> =
                    s.evidence.completed_by_users().into_iter().map(|u| nickname(store, u)).collect();
                if by.is_empty() {
                    println!("  {} {} ({})", done_mark(s.is_done()), s.name, s.id);
                } else {
                    println!("  {} {} ({}) by {}", done_mark(s.is_done()), s.name, s.id, by.join(", "));
                }
            }
        }
        TaskKind::Composite => {
            for st in &t.subtasks {
                println!("  {} {} [{}] ({})", done_mark(st.completed), st.name, nickname(store, &st.owner_user_id), st.id);
                for s in &st.steps {
                    let done = s.evidence.done_by() == Some(st.owner_user_id.as_str());
                    println!("      {} {} ({})", done_mark(done), s.name, s.id);
                }
                if let Some(note) = st.note.as_deref().filter(|n| !n.trim().is_empty()) {
                    println!("      note: {}", note);
                }
            }
        }
    }
}

/// Completes or reopens a task, for one user or as a whole.
pub fn cmd_task_done<P: Persistence>(store: &mut Store<P>, id: &str, user: Option<&str>, done: bool) {
    if store.task(id).is_none() {
        eprintln!("Task {} not found.", id);
        return;
    }
    match user {
        Some(u) => store.set_task_completed_by_user(id, u, done),
        None => store.set_task_completed(id, done),
    }
    report_task(store, id);
}

pub fn cmd_task_edit<P: Persistence>(store: &mut Store<P>, id: &str, updates: TaskUpdate) {
    if store.task(id).is_none() {
        eprintln!("Task {} not found.", id);
        return;
    }
    if updates.user_ids.as_ref().is_some_and(|u| u.is_empty()) {
        eprintln!("A task needs at least one user.");
        return;
    }
    store.update_task(id, updates);
    println!("Task {} updated.", id);
}

pub fn cmd_task_remove<P: Persistence>(store: &mut Store<P>, id: &str) {
    if store.task(id).is_none() {
        eprintln!("Task {} not found.", id);
        return;
    }
    store.delete_task(id);
    println!("Task {} removed.", id);
}

fn report_task<P: Persistence>(store: &Store<P>, id: &str) {
    if let Some(t) = store.task(id) {
        let status = if t.completed { "complete" } else { "not complete" };
        println!("Task {} is {} ({}).", id, status, progress(t));
    }
}

// Steps and subtasks

pub fn cmd_step_done<P: Persistence>(store: &mut Store<P>, task_id: &str, subtask_id: Option<&str>, step_id: &str, user: Option<&str>, done: bool) {
    let before = store.task(task_id).cloned();
    let Some(before) = before else {
        eprintln!("Task {} not found.", task_id);
        return;
    };
    store.set_step_done(task_id, subtask_id, step_id, done, user);
    if store.task(task_id) == Some(&before) {
        eprintln!("Nothing changed: step {} not found or already in that state.", step_id);
        return;
    }
    report_task(store, task_id);
}

pub fn cmd_subtask_add<P: Persistence>(store: &mut Store<P>, task_id: &str, owner: String, name: Option<String>, note: Option<String>) {
    match store.task(task_id) {
        None => {
            eprintln!("Task {} not found.", task_id);
            return;
        }
        Some(t) if t.kind != TaskKind::Composite => {
            eprintln!("Task {} is not composite.", task_id);
            return;
        }
        Some(_) => {}
    }
    store.add_subtask(task_id, NewSubtask { name, owner_user_id: owner, note });
    report_task(store, task_id);
}

pub fn cmd_subtask_edit<P: Persistence>(store: &mut Store<P>, task_id: &str, subtask_id: &str, updates: SubtaskUpdate) {
    if store.task(task_id).and_then(|t| t.subtask(subtask_id)).is_none() {
        eprintln!("Subtask {} not found in task {}.", subtask_id, task_id);
        return;
    }
    store.update_subtask(task_id, subtask_id, updates);
    report_task(store, task_id);
}

pub fn cmd_subtask_remove<P: Persistence>(store: &mut Store<P>, task_id: &str, subtask_id: &str) {
    if store.task(task_id).and_then(|t| t.subtask(subtask_id)).is_none() {
        eprintln!("Subtask {} not found in task {}.", subtask_id, task_id);
        return;
    }
    store.delete_subtask(task_id, subtask_id);
    report_task(store, task_id);
}

// Appointments

pub fn cmd_appointment_add<P: Persistence>(store: &mut Store<P>, title: String, content: String, user_ids: Vec<String>, start_at: DateTime<Utc>) {
    let a = store.create_appointment(NewAppointment { title, content, user_ids, start_at });
    println!("Appointment added (id = {})", a.id);
}

pub fn cmd_appointment_list<P: Persistence>(store: &Store<P>) {
    let mut appointments = store.appointments().to_vec();
    if appointments.is_empty() {
        println!("No appointments found.");
        return;
    }
    sort_appointments(&mut appointments);
    let now = Utc::now();
    let mut table = new_table();
    table.set_header(header(&["ID", "Title", "Start", "Time Left", "Remind", "Status", "Completed"]));
    for a in appointments {
        let users: Vec<String> = a.user_ids.iter().map(|u| nickname(store, u)).collect();
        let (status, color) = match a.status_at(now) {
            AppointmentStatus::Completed => ("completed", Color::Green),
            AppointmentStatus::Started => ("started", Color::Blue),
            AppointmentStatus::Pending => ("pending", Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&a.id),
            Cell::new(&a.title),
            Cell::new(local(a.start_at)),
            Cell::new(if a.completed { String::new() } else { time_until(now, a.start_at) }),
            Cell::new(users.join(", ")),
            Cell::new(status).fg(color),
            Cell::new(a.completed_at.map(local).unwrap_or_default()),
        ]);
    }
    println!("{table}");
}

pub fn cmd_appointment_done<P: Persistence>(store: &mut Store<P>, id: &str) {
    if store.appointment(id).is_none() {
        eprintln!("Appointment {} not found.", id);
        return;
    }
    store.mark_appointment_completed(id);
    println!("Appointment {} marked as completed.", id);
}

pub fn cmd_appointment_remove<P: Persistence>(store: &mut Store<P>, id: &str) {
    if store.appointment(id).is_none() {
        eprintln!("Appointment {} not found.", id);
        return;
    }
    store.delete_appointment(id);
    println!("Appointment {} removed.", id);
}
