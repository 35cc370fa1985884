mod common;

use bookmux::model::{BookmarkData, NewTag, TagNode, TagUpdate};
use bookmux::optimistic::{MutationError, TagEdit, TagTreeMirror, commit_tag_edit};
use bookmux::rpc::{QueryValue, RpcMethod, RpcRequest};
use bookmux_tokio_rpc_client::{RpcClient, RpcClientError};
use common::MockServer;
use serde_json::json;
use std::sync::{Arc, Mutex};

async fn connected_client(server: &mut MockServer) -> Arc<RpcClient> {
    let client = RpcClient::connect(server.config()).await.unwrap();
    server.next_handshake().await;
    Arc::new(client)
}

fn value<'a>(request: &'a bookmux::rpc::RequestEnvelope, key: &str) -> &'a QueryValue {
    &request.values.as_ref().expect("request has no values")[key]
}

#[tokio::test]
async fn responses_complete_their_own_callers_in_any_order() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    // Use up ids 1..=4 first.
    for _ in 1..=4 {
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call(RpcRequest::get("/tags")).await }
        });
        server.answer(200, json!(null)).await;
        call.await.unwrap().unwrap();
    }

    let mut calls = Vec::new();
    let mut ids = Vec::new();
    for bookmark_id in [1, 2, 3] {
        calls.push(tokio::spawn({
            let client = client.clone();
            async move { client.get_bookmark_by_id(bookmark_id).await }
        }));
        let request = server.next_request().await;
        assert_eq!(request.path, format!("/bookmarks/{bookmark_id}"));
        ids.push(request.id);
    }
    assert_eq!(ids, vec![5, 6, 7]);

    let tree_call = tokio::spawn({
        let client = client.clone();
        async move { client.get_tags_tree().await }
    });
    let tree_request = server.next_request().await;
    assert_eq!(tree_request.id, 8);
    assert_eq!(tree_request.path, "/tags");
    assert_eq!(tree_request.method, RpcMethod::Get);

    let bookmark = |id: u64| json!({"id": id, "url": format!("https://example.com/{id}")});
    server.respond(6, 200, bookmark(2));
    server.respond(5, 200, bookmark(1));
    server.respond(8, 200, json!({"id": 1, "names": [""], "subtags": []}));
    server.respond(7, 200, bookmark(3));

    for (expected, call) in [1, 2, 3].into_iter().zip(calls) {
        let bookmark = call.await.unwrap().unwrap();
        assert_eq!(bookmark.id, expected);
        assert_eq!(bookmark.url, format!("https://example.com/{expected}"));
    }
    let tree = tree_call.await.unwrap().unwrap();
    assert_eq!(tree.id, 1);
    assert!(tree.subtags().is_empty());
}

#[tokio::test]
async fn rejected_move_reverts_the_tree_and_surfaces_the_body() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let root = TagNode::new(1, vec![String::new()]).with_subtags(vec![
        TagNode::new(5, vec!["work".into()])
            .with_subtags(vec![TagNode::new(42, vec!["projects".into()])]),
        TagNode::new(7, vec!["home".into()]),
    ]);
    let mirror = Mutex::new(TagTreeMirror::from_tag_tree(&root).unwrap());
    let snapshot = mirror.lock().unwrap().clone();

    let edit = TagEdit::Move {
        key: "42".into(),
        new_parent: "7".into(),
    };
    let (result, request) = tokio::join!(
        commit_tag_edit(client.as_ref(), &mirror, edit),
        server.answer(500, json!({"status": 500, "message": "internal error"}))
    );

    assert_eq!(request.method, RpcMethod::Put);
    assert_eq!(request.path, "/tags/42");
    assert_eq!(request.body, Some(json!({"parentTagID": 7})));

    let err = result.unwrap_err();
    assert!(matches!(err, MutationError::Rejected(_)));
    assert_eq!(err.error_body().unwrap()["message"], "internal error");

    let mirror = mirror.lock().unwrap();
    assert_eq!(*mirror, snapshot);
    assert_eq!(mirror.parent_of("42"), Some("5"));
    assert!(!mirror.is_pending("42"));
}

#[tokio::test]
async fn accepted_move_stays_applied_when_the_refetch_fails() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let root = TagNode::new(1, vec![String::new()]).with_subtags(vec![
        TagNode::new(5, vec!["work".into()])
            .with_subtags(vec![TagNode::new(42, vec!["projects".into()])]),
        TagNode::new(7, vec!["home".into()]),
    ]);
    let mirror = Mutex::new(TagTreeMirror::from_tag_tree(&root).unwrap());

    let edit = TagEdit::Move {
        key: "42".into(),
        new_parent: "7".into(),
    };
    let (result, write) = tokio::join!(
        commit_tag_edit(client.as_ref(), &mirror, edit),
        server.answer(200, json!(null))
    );
    assert_eq!(write.method, RpcMethod::Put);
    assert_eq!(write.path, "/tags/42");
    assert_eq!(result.unwrap(), 42);

    let (refetch, read) = tokio::join!(
        client.get_tag("42"),
        server.answer(503, json!({"status": 503, "message": "busy"}))
    );
    assert_eq!(read.path, "/tags/42");
    assert!(matches!(
        refetch,
        Err(RpcClientError::Application { status: 503, .. })
    ));

    let mirror = mirror.lock().unwrap();
    assert_eq!(mirror.parent_of("42"), Some("7"));
    assert!(mirror.pending_keys().is_empty());
}

#[tokio::test]
async fn add_tag_with_intermediary_returns_the_stored_tag() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let add = client.add_tag("5", NewTag::new(["work"]).create_intermediary(true));
    let script = async {
        let create = server.answer(200, json!({"tagID": 11})).await;
        let fetch = server
            .answer(200, json!({"id": 11, "names": ["work"], "parentTagID": 10}))
            .await;
        (create, fetch)
    };
    let (tag, (create, fetch)) = tokio::join!(add, script);

    assert_eq!(create.method, RpcMethod::Post);
    assert_eq!(create.path, "/tags/5");
    assert_eq!(
        create.body,
        Some(json!({"names": ["work"], "createIntermediary": true}))
    );

    assert_eq!(fetch.path, "/tags/11");
    assert_eq!(value(&fetch, "shape"), &QueryValue::from("single"));

    let tag = tag.unwrap();
    assert_eq!(tag.id, 11);
    assert_eq!(tag.parent_tag_id, Some(10));
}

#[tokio::test]
async fn update_by_path_resolves_the_id_before_writing() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let update = client.update_tag("/work/projects", TagUpdate::rename(["proj"]));
    let script = async {
        let resolve = server
            .answer(200, json!({"id": 42, "names": ["projects"]}))
            .await;
        let write = server.answer(200, json!(null)).await;
        let fetch = server.answer(200, json!({"id": 42, "names": ["proj"]})).await;
        (resolve, write, fetch)
    };
    let (tag, (resolve, write, fetch)) = tokio::join!(update, script);

    assert_eq!(resolve.path, "/tags/work/projects");
    assert_eq!(write.method, RpcMethod::Put);
    assert_eq!(write.path, "/tags/42");
    assert_eq!(write.body, Some(json!({"names": ["proj"]})));
    assert_eq!(fetch.path, "/tags/42");
    assert_eq!(tag.unwrap().names, vec!["proj".to_string()]);
}

#[tokio::test]
async fn pattern_search_sends_the_flat_shape() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let (matches, request) = tokio::join!(
        client.get_tags_by_pattern("wo", true),
        server.answer(
            200,
            json!([
                {"path": "/work", "id": 5, "description": "", "newTagsCnt": 0},
                {"path": "/wo", "id": 0, "newTagsCnt": 1}
            ])
        )
    );
    assert_eq!(request.path, "/tags");
    assert_eq!(value(&request, "shape"), &QueryValue::from("flat"));
    assert_eq!(value(&request, "pattern"), &QueryValue::from("wo"));
    assert_eq!(value(&request, "allow_new"), &QueryValue::from("1"));

    let matches = matches.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].tag.id, 5);
    assert!(matches[1].is_new());

    let (_, request) = tokio::join!(
        client.get_tags_by_pattern("wo", false),
        server.answer(200, json!([]))
    );
    assert!(!request.values.unwrap().contains_key("allow_new"));
}

#[tokio::test]
async fn bookmark_operations_use_their_wire_shapes() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let (tagged, request) = tokio::join!(
        client.get_tagged_bookmarks([3, 4]),
        server.answer(
            200,
            json!([{"id": 1, "url": "https://a.example", "tagIDs": [3, 4]}])
        )
    );
    assert_eq!(request.path, "/bookmarks");
    assert_eq!(
        value(&request, "tag_id"),
        &QueryValue::Multiple(vec!["3".into(), "4".into()])
    );
    assert!(tagged.unwrap()[0].is_tagged_with(4));

    let (by_url, request) = tokio::join!(
        client.get_bookmarks_by_url("https://a.example"),
        server.answer(200, json!([]))
    );
    assert_eq!(
        value(&request, "url"),
        &QueryValue::Multiple(vec!["https://a.example".into()])
    );
    assert!(by_url.unwrap().is_empty());

    let data = BookmarkData::new("https://b.example")
        .with_title("B")
        .with_tags([3]);
    let add = client.add_bookmark(data);
    let script = async {
        let create = server.answer(200, json!({"bookmarkID": 9})).await;
        let fetch = server
            .answer(
                200,
                json!({"id": 9, "url": "https://b.example", "title": "B", "tagIDs": [3]}),
            )
            .await;
        (create, fetch)
    };
    let (bookmark, (create, fetch)) = tokio::join!(add, script);
    assert_eq!(create.method, RpcMethod::Post);
    assert_eq!(
        create.body,
        Some(json!({"url": "https://b.example", "title": "B", "tagIDs": [3]}))
    );
    assert_eq!(fetch.path, "/bookmarks/9");
    assert_eq!(bookmark.unwrap().title, "B");

    let update = client.update_bookmark(9, BookmarkData::new("https://b.example").with_comment("c"));
    let script = async {
        let write = server.answer(200, json!(null)).await;
        let fetch = server
            .answer(200, json!({"id": 9, "url": "https://b.example", "comment": "c"}))
            .await;
        (write, fetch)
    };
    let (bookmark, (write, _)) = tokio::join!(update, script);
    assert_eq!(write.method, RpcMethod::Put);
    assert_eq!(write.path, "/bookmarks/9");
    assert_eq!(bookmark.unwrap().comment, "c");
}

#[tokio::test]
async fn error_statuses_fail_with_the_server_body() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let (result, _) = tokio::join!(
        client.get_tag("missing"),
        server.answer(404, json!({"status": 404, "message": "no such tag"}))
    );

    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.application_body().unwrap()["message"], "no such tag");

    // The raw call hands back any status untouched.
    let (response, _) = tokio::join!(
        client.call(RpcRequest::get("/tags/missing")),
        server.answer(404, json!({"status": 404}))
    );
    assert_eq!(response.unwrap().status, 404);
}

#[tokio::test]
async fn malformed_bodies_are_decode_errors() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let (result, _) = tokio::join!(
        client.get_bookmark_by_id(1),
        server.answer(200, json!({"unexpected": true}))
    );
    assert!(matches!(result, Err(RpcClientError::Decode(_))));
}

#[tokio::test]
async fn stale_and_garbage_frames_are_ignored() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.get_bookmark_by_id(3).await }
    });
    let request = server.next_request().await;

    server.send_raw("not json");
    server.respond(999, 200, json!({"id": 999, "url": "https://stale.example"}));
    server.respond(request.id, 200, json!({"id": 3, "url": "https://c.example"}));
    // A second answer for the same id changes nothing.
    server.respond(request.id, 200, json!({"id": 4, "url": "https://d.example"}));

    let bookmark = call.await.unwrap().unwrap();
    assert_eq!(bookmark.id, 3);
}

#[tokio::test]
async fn malformed_response_fails_the_call_instead_of_hanging() {
    let mut server = MockServer::start().await;
    let client = connected_client(&mut server).await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.get_tags_tree().await }
    });
    let request = server.next_request().await;

    server.send_raw(format!(r#"{{"id": {}, "status": "ok", "body": {{}}}}"#, request.id));

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        RpcClientError::MalformedResponse { id, .. } if id == request.id
    ));
    assert!(client.is_open());
}
