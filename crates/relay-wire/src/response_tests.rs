use super::*;
use std::collections::BTreeMap;

#[test]
fn error_response_round_trips() {
    let response = Response::Error { message: "unit not found".to_string() };
    let json = serde_json::to_string(&response).unwrap();
    let back: Response = serde_json::from_str(&json).unwrap();
    assert_eq!(response, back);
}

#[test]
fn status_response_tags_correctly() {
    let response = Response::Status {
        status: DaemonStatus { uptime_secs: 10, stage_counts: BTreeMap::new(), halted_stages: vec![] },
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["type"], "Status");
}
