use super::*;
use chrono::Utc;

#[test]
fn new_event_has_no_parent_by_default() {
    let event = TaskEvent::new(TaskId::new(), EventKind::TaskReceived, Utc::now());
    assert!(event.parent_task_id.is_none());
    assert!(event.fail_stage.is_none());
}

#[test]
fn with_parent_sets_parent_task_id() {
    let parent = TaskId::new();
    let event = TaskEvent::new(TaskId::new(), EventKind::ProcessBegin, Utc::now()).with_parent(parent);
    assert_eq!(event.parent_task_id, Some(parent));
}

#[test]
fn with_fail_stage_and_message_are_chainable() {
    let event = TaskEvent::new(TaskId::new(), EventKind::TaskError, Utc::now())
        .with_fail_stage(FailStage::Processing)
        .with_message("module exited non-zero");
    assert_eq!(event.fail_stage, Some(FailStage::Processing));
    assert_eq!(event.message.as_deref(), Some("module exited non-zero"));
}

#[test]
fn event_kind_serializes_screaming_snake_case() {
    let json = serde_json::to_string(&EventKind::ProcessComplete).unwrap();
    assert_eq!(json, "\"PROCESS_COMPLETE\"");
}
