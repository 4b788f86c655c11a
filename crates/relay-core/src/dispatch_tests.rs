use super::*;

#[test]
fn target_name_one_lists_single_name() {
    let target = TargetName::One("pacs-a".to_string());
    assert_eq!(target.names(), vec!["pacs-a"]);
}

#[test]
fn target_name_many_lists_all() {
    let target = TargetName::Many(vec!["pacs-a".to_string(), "pacs-b".to_string()]);
    assert_eq!(target.names(), vec!["pacs-a", "pacs-b"]);
}

#[test]
fn new_dispatch_info_is_all_pending() {
    let info = DispatchInfo::new(TargetName::Many(vec!["pacs-a".to_string(), "pacs-b".to_string()]));
    assert_eq!(info.status.len(), 2);
    assert!(info.status.values().all(|status| status.state == TargetState::Pending));
    assert!(!info.all_succeeded());
}

#[test]
fn all_succeeded_requires_every_target() {
    let mut info = DispatchInfo::new(TargetName::One("pacs-a".to_string()));
    assert!(!info.all_succeeded());
    info.status.get_mut("pacs-a").unwrap().state = TargetState::Succeeded;
    assert!(info.all_succeeded());
}

#[test]
fn any_exhausted_checks_retry_cap() {
    let mut info = DispatchInfo::new(TargetName::One("pacs-a".to_string()));
    info.status.get_mut("pacs-a").unwrap().state = TargetState::Failed;
    info.status.get_mut("pacs-a").unwrap().retries = 2;
    assert!(!info.any_exhausted(5));
    assert!(info.any_exhausted(2));
}

#[test]
fn reset_for_restart_clears_non_succeeded_targets() {
    let mut info = DispatchInfo::new(TargetName::Many(vec!["pacs-a".to_string(), "pacs-b".to_string()]));
    info.status.get_mut("pacs-a").unwrap().state = TargetState::Succeeded;
    info.status.get_mut("pacs-b").unwrap().state = TargetState::Failed;
    info.status.get_mut("pacs-b").unwrap().retries = 4;

    info.reset_for_restart();

    assert_eq!(info.status["pacs-a"].state, TargetState::Succeeded);
    assert_eq!(info.status["pacs-b"].state, TargetState::Pending);
    assert_eq!(info.status["pacs-b"].retries, 0);
    assert!(info.status["pacs-b"].next_retry_at.is_none());
}
