//! Integration tests for reply normalization and the client wire format.
//!
//! These pin the shapes clients and query transports rely on.

use serde_json::json;
use voxfleet_proto::{
    normalize, ClientEvent, ClientRecord, ClientRequest, ClientType, Feature, StatusUpdate,
};

#[test]
fn test_columnar_reply_expands_into_rows() {
    let rows = normalize(json!({ "a": [1, 2], "b": [9, 9], "raw": "x" }));
    assert_eq!(rows, vec![json!({ "a": 1, "b": 9 }), json!({ "a": 2, "b": 9 })]);
}

#[test]
fn test_flat_reply_becomes_single_row() {
    assert_eq!(normalize(json!({ "a": 1 })), vec![json!({ "a": 1 })]);
}

#[test]
fn test_sequences_pass_through_unchanged() {
    let rows = json!([{ "a": 1, "raw": "kept" }, { "a": 2 }]);
    assert_eq!(normalize(rows.clone()), rows.as_array().cloned().unwrap());
}

#[test]
fn test_scalar_fields_repeat_on_every_row() {
    let rows = normalize(json!({ "clid": [3, 4], "cid": 7 }));
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["cid"] == json!(7)));
}

#[test]
fn test_short_columns_leave_field_out() {
    let rows = normalize(json!({ "clid": [1, 2], "client_nickname": ["only-one"] }));
    assert_eq!(rows[0]["client_nickname"], json!("only-one"));
    assert!(rows[1].get("client_nickname").is_none());
}

#[test]
fn test_client_list_rows_become_records() {
    let rows = normalize(json!({
        "clid": ["5", "6"],
        "client_database_id": [50, 60],
        "client_nickname": ["alice", "serveradmin"],
        "client_type": [0, 1],
    }));
    let records: Vec<ClientRecord> = rows.iter().filter_map(ClientRecord::from_row).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].clid, 5);
    assert_eq!(records[0].cldbid, Some(50));
    assert_eq!(records[0].client_type, ClientType::Voice);
    assert!(!records[1].is_voice());
}

#[test]
fn test_status_update_wire_shape() {
    let event = ClientEvent::ServerStatusUpdated(StatusUpdate {
        server_id: 12,
        status: "online".into(),
        onlines: 3,
        previous_status: None,
        previous_onlines: None,
    });
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(
        wire,
        json!({
            "event": "serverStatusUpdated",
            "data": { "serverId": 12, "status": "online", "onlines": 3 }
        })
    );
}

#[test]
fn test_manage_server_request_parses() {
    let req: ClientRequest = serde_json::from_str(
        r#"{"event":"manage_server","data":{"serverId":42}}"#,
    )
    .unwrap();
    assert_eq!(req, ClientRequest::ManageServer { server_id: 42 });
}

#[test]
fn test_welcome_lists_features_lowercase() {
    let event = ClientEvent::Welcome {
        connection: "c1".into(),
        user: "alice".into(),
        features: vec![Feature::Server, Feature::Rank],
    };
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(wire["data"]["features"], json!(["server", "rank"]));
}
