//! DifyClient against a mock backend.

use bytes::Bytes;
use dify_client::{DifyClient, DifyError, ResponseMode, WorkflowRunRequest};
use futures::StreamExt;
use mockito::{Matcher, Server};
use serde_json::{json, Map};

fn run_request(mode: ResponseMode) -> WorkflowRunRequest {
    let mut inputs = Map::new();
    inputs.insert("query".to_string(), json!("summarize"));
    WorkflowRunRequest::new(inputs, mode, "tester")
}

#[tokio::test]
async fn upload_accepts_created_and_parses_metadata() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/files/upload")
        .match_header("authorization", "Bearer app-key")
        .match_body(Matcher::Regex("name=\"user\"\\s+tester".to_string()))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id": "f-1", "name": "report.pdf", "size": 11, "extension": "pdf",
                "mime_type": "application/pdf", "created_by": "u", "created_at": 1700000000}"#,
        )
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let resp = client
        .upload_file(Bytes::from_static(b"hello world"), "report.pdf", "tester")
        .await
        .unwrap();

    assert_eq!(resp.id, "f-1");
    assert_eq!(resp.extension, "pdf");
    assert_eq!(resp.size, 11);
    mock.assert_async().await;
}

#[tokio::test]
async fn upload_surfaces_backend_error_message() {
    let mut server = Server::new_async().await;
    let _upload = server
        .mock("POST", "/v1/files/upload")
        .with_status(413)
        .with_body(r#"{"error": "file_too_large"}"#)
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let err = client
        .upload_file(Bytes::from_static(b"x"), "a.txt", "tester")
        .await
        .unwrap_err();

    assert!(matches!(err, DifyError::Backend { status: 413, .. }));
    assert_eq!(err.to_string(), "file_too_large");
}

#[tokio::test]
async fn upload_malformed_success_body_is_parse_error() {
    let mut server = Server::new_async().await;
    let _upload = server
        .mock("POST", "/v1/files/upload")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let err = client
        .upload_file(Bytes::from_static(b"x"), "a.txt", "tester")
        .await
        .unwrap_err();

    assert!(matches!(err, DifyError::Parse(_)));
}

#[tokio::test]
async fn run_workflow_returns_raw_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/workflows/run")
        .match_header("authorization", "Bearer app-key")
        .match_body(Matcher::PartialJson(json!({
            "response_mode": "blocking",
            "user": "tester",
            "inputs": {"query": "summarize"}
        })))
        .with_status(200)
        .with_body(r#"{"data": {"outputs": {"text": "ok"}}}"#)
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let body = client
        .run_workflow(&run_request(ResponseMode::Blocking))
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["data"]["outputs"]["text"], "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn run_workflow_requires_exactly_200() {
    let mut server = Server::new_async().await;
    let _workflow = server
        .mock("POST", "/v1/workflows/run")
        .with_status(201)
        .with_body("created")
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let err = client
        .run_workflow(&run_request(ResponseMode::Blocking))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(201));
    assert!(err.to_string().contains("created"));
}

#[tokio::test]
async fn stream_forces_streaming_mode_and_relays_bytes_verbatim() {
    let sse = "data: {\"event\": \"workflow_started\"}\n\ndata: {\"event\": \"workflow_finished\"}\n\n";
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/workflows/run")
        .match_body(Matcher::PartialJson(json!({"response_mode": "streaming"})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse)
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let mut stream = client
        .stream_workflow(run_request(ResponseMode::Blocking))
        .await
        .unwrap();

    let mut relayed = Vec::new();
    while let Some(chunk) = stream.next().await {
        relayed.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(relayed, sse.as_bytes());
    mock.assert_async().await;
}

#[tokio::test]
async fn stream_non_200_fails_before_any_bytes() {
    let mut server = Server::new_async().await;
    let _workflow = server
        .mock("POST", "/v1/workflows/run")
        .with_status(400)
        .with_body(r#"{"error": "invalid inputs"}"#)
        .create_async()
        .await;

    let client = DifyClient::new(&server.url(), "app-key");
    let err = match client.stream_workflow(run_request(ResponseMode::Streaming)).await {
        Ok(_) => panic!("expected stream setup to fail"),
        Err(e) => e,
    };

    assert_eq!(err.to_string(), "invalid inputs");
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let client = DifyClient::new("http://127.0.0.1:1", "app-key");
    let err = client
        .run_workflow(&run_request(ResponseMode::Blocking))
        .await
        .unwrap_err();

    assert!(matches!(err, DifyError::Network(_)));
}
