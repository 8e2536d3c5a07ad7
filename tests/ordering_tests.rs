use chrono::{DateTime, Duration, TimeZone, Utc};
use crewtask::clock::{Clock, ManualClock};
use crewtask::ids::SequentialIds;
use crewtask::models::AppointmentStatus;
use crewtask::ordering::{select_tasks, sort_appointments, StatusFilter, TaskFilter};
use crewtask::storage::MemoryStorage;
use crewtask::store::{AppointmentUpdate, NewAppointment, NewTask, Store};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 10, 8, 0, 0).unwrap()
}

fn store() -> (Store<MemoryStorage>, ManualClock) {
    let clock = ManualClock::new(now());
    (Store::open(MemoryStorage::new(), SequentialIds::new("id"), clock.clone()), clock)
}

fn add(store: &mut Store<MemoryStorage>, name: &str, user: &str, due_in_days: Option<i64>) -> String {
    store
        .create_task(NewTask {
            name: name.into(),
            user_ids: vec![user.into()],
            due_at: due_in_days.map(|d| now() + Duration::days(d)),
            ..NewTask::default()
        })
        .id
}

#[test]
fn open_tasks_first_by_due_time() {
    let (mut store, _) = store();
    add(&mut store, "no due", "a", None);
    let done = add(&mut store, "finished", "a", Some(1));
    add(&mut store, "later", "a", Some(5));
    add(&mut store, "soon", "a", Some(2));
    store.set_task_completed(&done, true);

    let names: Vec<&str> =
        select_tasks(store.tasks(), &TaskFilter::default()).iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["soon", "later", "no due", "finished"]);
}

#[test]
fn filters_combine() {
    let (mut store, _) = store();
    add(&mut store, "Write Report", "a", None);
    add(&mut store, "write tests", "b", None);
    let done = add(&mut store, "Review report", "a", None);
    store.set_task_completed(&done, true);

    let by_query = TaskFilter { query: Some("REPORT".into()), ..TaskFilter::default() };
    assert_eq!(select_tasks(store.tasks(), &by_query).len(), 2);

    let todo_for_a = TaskFilter {
        user_id: Some("a".into()),
        status: StatusFilter::Todo,
        ..TaskFilter::default()
    };
    let names: Vec<&str> = select_tasks(store.tasks(), &todo_for_a).iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Write Report"]);

    let in_project = TaskFilter { project_id: Some("nope".into()), ..TaskFilter::default() };
    assert!(select_tasks(store.tasks(), &in_project).is_empty());
}

#[test]
fn appointment_status_follows_clock_and_completion() {
    let (mut store, clock) = store();
    let a = store.create_appointment(NewAppointment {
        title: "dentist".into(),
        content: String::new(),
        user_ids: vec!["a".into()],
        start_at: now() + Duration::hours(1),
    });
    assert_eq!(a.status, AppointmentStatus::Pending);

    clock.advance(Duration::hours(2));
    assert_eq!(store.appointment(&a.id).unwrap().status_at(clock.now()), AppointmentStatus::Started);

    store.mark_appointment_completed(&a.id);
    let done = store.appointment(&a.id).unwrap();
    assert!(done.completed);
    assert_eq!(done.status, AppointmentStatus::Completed);
    assert_eq!(done.completed_at, Some(now() + Duration::hours(2)));
}

#[test]
fn appointments_sort_open_first_then_by_start() {
    let (mut store, _) = store();
    for (title, hours) in [("late", 5), ("early", 1), ("middle", 3)] {
        store.create_appointment(NewAppointment {
            title: title.into(),
            content: String::new(),
            user_ids: Vec::new(),
            start_at: now() + Duration::hours(hours),
        });
    }
    let early = store.appointments().iter().find(|a| a.title == "early").unwrap().id.clone();
    store.mark_appointment_completed(&early);
    store.update_appointment(&early, AppointmentUpdate { title: Some("early (done)".into()), ..AppointmentUpdate::default() });

    let mut list = store.appointments().to_vec();
    sort_appointments(&mut list);
    let titles: Vec<&str> = list.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["middle", "late", "early (done)"]);
}
