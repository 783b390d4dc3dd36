//! Integration tests for the `/api/v1/job` workflow proxy.

mod common;

use adreel_workflow::TransportError;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Request, StatusCode};
use common::{body_json, build_test_app, get, post_bytes, send, START_URL};
use reqwest::Method;
use serde_json::json;

const RESUME: &str = "https://engine.example.com/webhook-waiting/8812";

fn resume_query() -> String {
    format!("/api/v1/job?resume={RESUME}")
}

// ---------------------------------------------------------------------------
// GET
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_read_wraps_plain_text_body() {
    let app = build_test_app();
    app.transport.reply(200, "plain text");

    let response = get(&app, "/api/v1/job").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "success": true,
            "status": 200,
            "data": { "message": "plain text" },
            "videoUrl": null,
            "workflowStatus": null,
        })
    );

    let calls = app.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, START_URL);
    assert_eq!(calls[0].method, Method::GET);
}

#[tokio::test]
async fn resume_read_targets_pointer_and_reports_message() {
    let app = build_test_app();
    app.transport
        .reply(200, r#"[{"video_url":"http://x/a.mp4","status":"done"}]"#);

    let json = body_json(get(&app, &resume_query()).await).await;

    assert_eq!(app.transport.calls()[0].target, RESUME);
    assert_eq!(json["videoUrl"], "http://x/a.mp4");
    assert_eq!(json["workflowStatus"], "done");
    assert_eq!(json["message"], "Workflow resumed successfully");
}

#[tokio::test]
async fn resume_url_alias_is_accepted() {
    let app = build_test_app();
    app.transport.reply(502, "bad gateway");

    let uri = format!("/api/v1/job?resumeUrl={RESUME}");
    let response = get(&app, &uri).await;

    // Upstream errors are still a structured envelope, not a proxy failure.
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], 502);
    assert_eq!(json["message"], "Workflow resume failed");
    assert_eq!(app.transport.calls()[0].target, RESUME);
}

#[tokio::test]
async fn resume_takes_precedence_over_resume_url() {
    let app = build_test_app();
    app.transport.reply(200, "{}");

    let uri = format!(
        "/api/v1/job?resumeUrl=https://engine.example.com/other&resume={RESUME}"
    );
    get(&app, &uri).await;

    assert_eq!(app.transport.calls()[0].target, RESUME);
}

#[tokio::test]
async fn repeated_resume_is_a_bad_request() {
    let app = build_test_app();

    let response = get(&app, "/api/v1/job?resume=a&resume=b").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("resume"));
    assert!(json.get("code").is_none());
    assert!(app.transport.calls().is_empty());
}

#[tokio::test]
async fn empty_resume_falls_back_to_start_endpoint() {
    let app = build_test_app();
    app.transport.reply(200, "{}");

    get(&app, "/api/v1/job?resume=").await;

    assert_eq!(app.transport.calls()[0].target, START_URL);
}

// ---------------------------------------------------------------------------
// POST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn json_submit_is_forwarded_with_its_content_type() {
    let app = build_test_app();
    app.transport.reply(200, r#"{"status":"queued"}"#);

    let payload = br#"{"action":"generate_video","generationId":"42"}"#.to_vec();
    let response = post_bytes(
        &app,
        "/api/v1/job",
        Some("application/json"),
        payload.clone(),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["workflowStatus"], "queued");
    assert!(json.get("message").is_none());

    let call = &app.transport.calls()[0];
    assert_eq!(call.method, Method::POST);
    assert_eq!(call.target, START_URL);
    assert_eq!(call.headers["content-type"], "application/json");
    assert_eq!(call.body.as_deref(), Some(payload.as_slice()));
}

#[tokio::test]
async fn multipart_submit_round_trips_bytes_and_boundary() {
    let app = build_test_app();
    app.transport.reply(200, r#"{"videoUrl":"https://cdn.example.com/v.mp4"}"#);

    let content_type = "multipart/form-data; boundary=XyZ123";
    let mut body = Vec::new();
    body.extend_from_slice(
        b"--XyZ123\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\nFresh lemonade\r\n",
    );
    body.extend_from_slice(
        b"--XyZ123\r\nContent-Disposition: form-data; name=\"image\"; filename=\"glass.jpg\"\r\n\
Content-Type: image/jpeg\r\n\r\n",
    );
    body.extend_from_slice(&[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46, 0x00, 0xff, 0xd9]);
    body.extend_from_slice(b"\r\n--XyZ123--\r\n");

    let response = post_bytes(&app, "/api/v1/job", Some(content_type), body.clone()).await;

    assert_eq!(body_json(response).await["videoUrl"], "https://cdn.example.com/v.mp4");
    let call = &app.transport.calls()[0];
    assert_eq!(call.body.as_deref(), Some(body.as_slice()));
    assert_eq!(call.headers["content-type"], content_type);
}

#[tokio::test]
async fn non_utf8_content_type_is_forwarded_byte_for_byte() {
    let app = build_test_app();
    app.transport.reply(200, "{}");

    let content_type = HeaderValue::from_bytes(b"text/plain; title=caf\xe9").unwrap();
    let request = Request::post("/api/v1/job")
        .header(CONTENT_TYPE, content_type.clone())
        .body(Body::from("note"))
        .unwrap();

    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let call = &app.transport.calls()[0];
    assert_eq!(call.headers[CONTENT_TYPE], content_type);
    assert_eq!(call.body.as_deref(), Some(b"note".as_slice()));
}

#[tokio::test]
async fn resume_submit_405_falls_back_to_single_get() {
    let app = build_test_app();
    app.transport
        .reply(405, "Method Not Allowed")
        .reply(200, r#"{"video_url":"https://cdn.example.com/final.mp4","status":"finished"}"#);

    let response = post_bytes(
        &app,
        &resume_query(),
        Some("application/json"),
        b"{}".to_vec(),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["status"], 200);
    assert_eq!(json["videoUrl"], "https://cdn.example.com/final.mp4");

    let calls = app.transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].method.clone(), calls[1].method.clone()), (Method::POST, Method::GET));
    assert!(calls.iter().all(|c| c.target == RESUME));
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_returns_500_with_error() {
    let app = build_test_app();
    app.transport
        .fail(TransportError::Request("dns error: no such host".into()));

    let response = get(&app, "/api/v1/job").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "HTTP request failed: dns error: no such host" })
    );
}

#[tokio::test]
async fn submit_timeout_returns_500_with_error() {
    let app = build_test_app();
    app.transport
        .fail(TransportError::Timeout("operation timed out".into()));

    let response = post_bytes(&app, "/api/v1/job", None, b"raw".to_vec()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Request timed out: operation timed out");
    assert!(json.get("code").is_none());
}
