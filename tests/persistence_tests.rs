use std::fs;

use chrono::{Duration, TimeZone, Utc};
use crewtask::clock::ManualClock;
use crewtask::error::StorageError;
use crewtask::ids::SequentialIds;
use crewtask::models::{Entities, Step, StepEvidence, TaskKind, DONE_SENTINEL};
use crewtask::storage::{JsonFileStorage, MemoryStorage, Persistence};
use crewtask::store::{NewTask, Store};

/// Storage that can load but never save.
struct ReadOnlyStorage;

impl Persistence for ReadOnlyStorage {
    fn load(&self) -> Result<Entities, StorageError> {
        Ok(Entities::default())
    }

    fn save(&mut self, _entities: &Entities) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap())
}

#[test]
fn completion_fields_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entities.json");
    let clock = clock();

    let mut store = Store::open(JsonFileStorage::new(&path), SequentialIds::new("a"), clock.clone());
    let multi = store.create_task(NewTask {
        name: "together".into(),
        user_ids: vec!["u1".into(), "u2".into()],
        steps: vec!["X".into(), "Y".into()],
        ..NewTask::default()
    });
    let composite = store.create_task(NewTask {
        name: "split".into(),
        user_ids: vec!["u1".into()],
        kind: TaskKind::Composite,
        steps: vec!["one".into(), "two".into()],
        subtask_templates: vec!["Design".into()],
        ..NewTask::default()
    });
    let solo = store.create_task(NewTask { name: "solo".into(), user_ids: vec!["u1".into()], ..NewTask::default() });

    store.set_step_done(&multi.id, None, &multi.steps[0].id, true, Some("u1"));
    clock.advance(Duration::milliseconds(1500));
    let st = &composite.subtasks[0];
    store.set_step_done(&composite.id, Some(st.id.as_str()), &st.steps[1].id, true, None);
    store.set_task_completed(&solo.id, true);

    let before = store.snapshot();
    drop(store);

    let reopened = Store::open(JsonFileStorage::new(&path), SequentialIds::new("b"), clock.clone());
    assert_eq!(*reopened.snapshot(), *before);
    assert!(reopened.task(&composite.id).unwrap().completed);
    assert!(reopened.task(&solo.id).unwrap().completed);
}

#[test]
fn snapshot_uses_camel_case_field_names() {
    let mut store = Store::open(MemoryStorage::new(), SequentialIds::new("id"), clock());
    let t = store.create_task(NewTask {
        name: "t".into(),
        user_ids: vec!["u1".into()],
        steps: vec!["A".into()],
        ..NewTask::default()
    });
    store.set_step_done(&t.id, None, &t.steps[0].id, true, None);

    let json = serde_json::to_value(store.persistence().last_saved().unwrap()).unwrap();
    let task = &json["tasks"][0];
    assert_eq!(task["type"], "single");
    assert_eq!(task["userIds"][0], "u1");
    assert_eq!(task["completed"], true);
    assert!(task["completedAt"].is_string());
    assert_eq!(task["steps"][0]["doneByUserId"], "__done__");
    assert!(task["steps"][0].get("evidence").is_none());
}

/// A snapshot written in the flat per-field shape, with per-user steps,
/// task-level per-user completion and an owner-credited subtask step.
const LEGACY_SNAPSHOT: &str = r#"{
  "projects": [
    { "id": "p1", "name": "Ops", "userIds": ["u1", "u2"], "repeat": "weekly" }
  ],
  "users": [
    { "id": "u1", "nickname": "ann" },
    { "id": "u2", "nickname": "bob", "phone": "555" }
  ],
  "tasks": [
    {
      "id": "t1", "name": "Inventory", "projectId": "p1", "userIds": ["u1", "u2"], "type": "single",
      "steps": [
        { "id": "s1", "name": "Count", "doneByUserId": "__done__",
          "completedByUsers": ["u1", "u2"],
          "userCompletedAt": { "u1": "2025-01-02T08:00:00Z", "u2": "2025-01-02T09:30:00Z" } },
        { "id": "s2", "name": "Report", "doneByUserId": "__done__",
          "completedByUsers": ["u1"], "userCompletedAt": { "u1": "2025-01-02T10:00:00Z" } },
        { "id": "s3", "name": "File" }
      ],
      "completed": false
    },
    {
      "id": "t2", "name": "Sign off", "userIds": ["u1", "u2"], "type": "single", "steps": [],
      "completed": true, "completedAt": "2025-01-03T12:00:00Z",
      "completedByUsers": ["u1", "u2"],
      "userCompletedAt": { "u1": "2025-01-03T11:00:00Z", "u2": "2025-01-03T12:00:00Z" }
    },
    {
      "id": "t3", "name": "Release", "userIds": ["u1"], "type": "composite",
      "steps": [{ "id": "tpl", "name": "Review" }],
      "subtaskTemplates": ["Design"],
      "subtasks": [
        { "id": "st1", "name": "Design", "ownerUserId": "u1",
          "steps": [{ "id": "st1-1", "name": "Review", "doneByUserId": "u1", "completedAt": "2025-01-04T07:00:00Z" }],
          "completed": true, "completedAt": "2025-01-04T07:00:00Z", "note": "ok" }
      ],
      "dueAt": "2025-01-05T00:00:00Z",
      "completed": true, "completedAt": "2025-01-04T07:00:00Z"
    }
  ],
  "appointments": [
    { "id": "a1", "title": "Standup", "content": "daily", "userIds": ["u1"],
      "startTime": "2025-01-06T09:00:00Z", "status": "pending", "completed": false }
  ]
}"#;

#[test]
fn flat_snapshot_loads_into_typed_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entities.json");
    fs::write(&path, LEGACY_SNAPSHOT).unwrap();

    let loaded = JsonFileStorage::new(&path).load().unwrap();
    let at = |h, m| Utc.with_ymd_and_hms(2025, 1, 2, h, m, 0).unwrap();

    let steps = &loaded.tasks[0].steps;
    assert_eq!(steps[0].evidence.completed_by_users().into_iter().collect::<Vec<_>>(), vec!["u1", "u2"]);
    assert_eq!(steps[0].evidence.user_completed_at("u2"), Some(at(9, 30)));
    assert_eq!(steps[0].evidence.done_by(), Some(DONE_SENTINEL));
    assert!(steps[1].evidence.completed_by("u1"));
    assert!(!steps[1].evidence.completed_by("u2"));
    assert_eq!(steps[2].evidence, StepEvidence::None);

    let sign_off = &loaded.tasks[1];
    assert!(sign_off.completed_by_users.contains("u2"));
    assert_eq!(
        sign_off.completed_by_users.completed_at("u1"),
        Some(Utc.with_ymd_and_hms(2025, 1, 3, 11, 0, 0).unwrap())
    );

    let owned = &loaded.tasks[2].subtasks[0].steps[0].evidence;
    assert_eq!(owned.done_by(), Some("u1"));
    assert_eq!(owned.completed_at(), Some(Utc.with_ymd_and_hms(2025, 1, 4, 7, 0, 0).unwrap()));
    assert_eq!(loaded.appointments[0].start_at, Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());

    let written = serde_json::to_value(&loaded).unwrap();
    let original: serde_json::Value = serde_json::from_str(LEGACY_SNAPSHOT).unwrap();
    assert_eq!(written, original);
}

#[test]
fn stray_user_timestamps_are_dropped_on_load() {
    let json = r#"{ "id": "s", "name": "X", "doneByUserId": "__done__",
        "completedByUsers": ["u1"],
        "userCompletedAt": { "u1": "2025-01-02T08:00:00Z", "ghost": "2025-01-02T08:00:00Z" } }"#;
    let step: Step = serde_json::from_str(json).unwrap();
    assert_eq!(step.evidence.completed_by_users().into_iter().collect::<Vec<_>>(), vec!["u1"]);
    assert_eq!(step.evidence.user_completed_at("ghost"), None);

    let written = serde_json::to_value(&step).unwrap();
    assert!(written["userCompletedAt"].get("ghost").is_none());
}

#[test]
fn failed_saves_keep_in_memory_state() {
    let mut store = Store::open(ReadOnlyStorage, SequentialIds::new("id"), clock());
    let t = store.create_task(NewTask { name: "t".into(), user_ids: vec!["u".into()], ..NewTask::default() });
    store.set_task_completed(&t.id, true);
    assert!(store.task(&t.id).unwrap().completed);
}

#[test]
fn unreadable_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entities.json");
    fs::write(&path, "{ \"tasks\": oops").unwrap();

    let store = Store::open(JsonFileStorage::new(&path), SequentialIds::new("id"), clock());
    assert_eq!(*store.snapshot(), Entities::default());
}

#[test]
fn every_command_writes_once() {
    let mut store = Store::open(MemoryStorage::new(), SequentialIds::new("id"), clock());
    assert_eq!(store.persistence().writes(), 0);
    let t = store.create_task(NewTask { name: "t".into(), user_ids: vec!["u".into()], steps: vec!["A".into()], ..NewTask::default() });
    assert_eq!(store.persistence().writes(), 1);
    store.set_step_done(&t.id, None, &t.steps[0].id, true, None);
    assert_eq!(store.persistence().writes(), 2);
    assert_eq!(store.persistence().last_saved(), Some(&*store.snapshot()));
}
