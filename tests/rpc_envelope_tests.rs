use bookmux::rpc::{
    InboundFrame, QueryValue, RequestEnvelope, ResponseEnvelope, RpcMethod, RpcRequest,
    RpcResultStatus,
};
use serde_json::json;

#[test]
fn request_envelope_matches_wire_shape() {
    let envelope = RpcRequest::get("/tags")
        .with_value("shape", "flat")
        .with_value("pattern", "wo")
        .into_envelope(3);

    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(
        value,
        json!({
            "id": 3,
            "path": "/tags",
            "method": "GET",
            "values": {"pattern": "wo", "shape": "flat"}
        })
    );
}

#[test]
fn list_values_and_bodies_serialize() {
    let envelope = RpcRequest::post("/bookmarks")
        .with_value("tag_id", vec!["1".to_string(), "2".to_string()])
        .with_body(json!({"url": "https://example.com"}))
        .into_envelope(9);

    let text = envelope.to_json().unwrap();
    let parsed = RequestEnvelope::from_json(&text).unwrap();

    assert_eq!(parsed.method, RpcMethod::Post);
    assert_eq!(
        parsed.values.unwrap()["tag_id"],
        QueryValue::Multiple(vec!["1".into(), "2".into()])
    );
    assert_eq!(parsed.body, Some(json!({"url": "https://example.com"})));
}

#[test]
fn response_without_body_decodes_as_null() {
    let response = ResponseEnvelope::from_json(r#"{"id": 4, "status": 200}"#).unwrap();
    assert_eq!(response.body, json!(null));
    assert!(RpcResultStatus::from_status(response.status).is_success());
}

#[test]
fn only_200_is_success() {
    assert!(RpcResultStatus::from(200).is_success());
    for status in [201, 204, 400, 404, 500] {
        assert_eq!(RpcResultStatus::from(status), RpcResultStatus::Fail(status));
        assert_eq!(RpcResultStatus::from(status).value(), status);
    }
}

#[test]
fn inbound_frames_keep_the_id_of_a_bad_envelope() {
    let good = InboundFrame::from_json(r#"{"id": 2, "status": 404, "body": "gone"}"#).unwrap();
    assert_eq!(
        good,
        InboundFrame::Response(ResponseEnvelope::new(2, 404, json!("gone")))
    );

    let bad = InboundFrame::from_json(r#"{"id": 3, "status": "teapot"}"#).unwrap();
    assert_eq!(bad.id(), 3);
    assert!(matches!(bad, InboundFrame::Malformed { .. }));

    assert!(InboundFrame::from_json(r#"{"status": 200}"#).is_err());
    assert!(InboundFrame::from_json("not json").is_err());
}
