//! HTTP API tests.
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::*;
use tower::ServiceExt;

async fn upload(harness: &TestHarness, parts: &[(&str, &str, &[u8])]) -> serde_json::Value {
    let response = harness
        .router()
        .oneshot(
            Request::post("/api/items")
                .header(header::CONTENT_TYPE, multipart_content_type())
                .body(multipart_body(parts))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_to_json(response.into_body()).await
}

async fn send(harness: &TestHarness, request: Request<Body>) -> axum::response::Response {
    harness.router().oneshot(request).await.unwrap()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_200() {
    let harness = TestHarness::new();
    let response = send(&harness, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// One-shot conversion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn convert_returns_data_urls() {
    let harness = TestHarness::new();
    let png = png_bytes(8, 6);

    let response = send(
        &harness,
        Request::post("/api/convert")
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart_body(&[
                ("images", "IMG_0001.png", &png),
                ("images", "holiday.PNG", &png),
            ]))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "IMG_0001.jpg");
    assert_eq!(results[1]["name"], "holiday.jpg");

    let data_url = results[0]["dataUrl"].as_str().unwrap();
    let payload = data_url.strip_prefix("data:image/jpeg;base64,").unwrap();
    let jpeg = STANDARD.decode(payload).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    // Nothing is added to the working set.
    assert!(harness.ctx.batch.is_empty());
}

#[tokio::test]
async fn convert_without_images_is_400() {
    let harness = TestHarness::new();

    let response = send(
        &harness,
        Request::post("/api/convert")
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart_body(&[("other", "notes.txt", b"hello")]))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_to_string(response.into_body()).await, "No images uploaded");
}

#[tokio::test]
async fn convert_garbage_is_500() {
    let harness = TestHarness::new();
    let png = png_bytes(2, 2);

    let response = send(
        &harness,
        Request::post("/api/convert")
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart_body(&[
                ("images", "ok.png", &png),
                ("images", "broken.heic", b"definitely not an image"),
            ]))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_to_string(response.into_body()).await, "Conversion error");
}

// ---------------------------------------------------------------------------
// Working set
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_then_list_items() {
    let harness = TestHarness::new();

    let queued = upload(&harness, &[("images", "IMG_0001.HEIC", b"one"), ("images", "b.heif", b"two")]).await;
    assert_eq!(queued.as_array().unwrap().len(), 2);
    assert_eq!(queued[0]["status"], "idle");
    assert_eq!(queued[0]["progress"], 0);

    let response = send(&harness, Request::get("/api/items").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let items = body_to_json(response.into_body()).await;
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["source_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["IMG_0001.HEIC", "b.heif"]);
}

#[tokio::test]
async fn upload_over_capacity_is_409() {
    let mut config = heicforge::config::Config::default();
    config.batch.capacity = 1;
    let harness = TestHarness::with_codec(config, std::sync::Arc::new(EchoCodec));

    let response = send(
        &harness,
        Request::post("/api/items")
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart_body(&[("images", "a.heic", b"a"), ("images", "b.heic", b"b")]))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "capacity_exceeded");
    assert_eq!(harness.ctx.batch.len(), 1);
}

#[tokio::test]
async fn convert_item_and_download() {
    let harness = TestHarness::new();
    let queued = upload(&harness, &[("images", "IMG_0001.HEIC", b"jpeg-bytes")]).await;
    let id = queued[0]["id"].as_str().unwrap().to_string();

    let response = send(
        &harness,
        Request::post(format!("/api/items/{}/convert", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let item = body_to_json(response.into_body()).await;
    assert_eq!(item["status"], "done");
    assert_eq!(item["progress"], 100);
    assert_eq!(item["result"]["output_name"], "IMG_0001.jpg");
    assert_eq!(item["result"]["size_bytes"], 10);

    let response = send(
        &harness,
        Request::get(format!("/api/items/{}/download", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"IMG_0001.jpg\""
    );
    assert_eq!(&body_bytes(response.into_body()).await[..], b"jpeg-bytes");
}

#[tokio::test]
async fn failed_item_reports_error_and_has_no_download() {
    let harness = TestHarness::new();
    let queued = upload(&harness, &[("images", "bad.heic", b"fail please")]).await;
    let id = queued[0]["id"].as_str().unwrap().to_string();

    let response = send(
        &harness,
        Request::post(format!("/api/items/{}/convert", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let item = body_to_json(response.into_body()).await;
    assert_eq!(item["status"], "error");
    assert_eq!(item["progress"], 0);
    assert!(item["error"].as_str().unwrap().contains("refusing to convert"));
    assert!(item["result"].is_null());

    let response = send(
        &harness,
        Request::get(format!("/api/items/{}/download", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let harness = TestHarness::new();

    let response = send(
        &harness,
        Request::post(format!("/api/items/{}/convert", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &harness,
        Request::post("/api/items/not-a-uuid/convert")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn convert_all_returns_summary() {
    let harness = TestHarness::new();
    upload(
        &harness,
        &[
            ("images", "1.heic", b"one"),
            ("images", "2.heic", b"fail two"),
            ("images", "3.heic", b"three"),
        ],
    )
    .await;

    let response = send(
        &harness,
        Request::post("/api/convert-all?concurrency=2")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let summary = body_to_json(response.into_body()).await;
    assert_eq!(summary["queued"], 3);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["skipped"], 0);

    let counts = harness.ctx.batch.counts();
    assert_eq!(counts.done, 2);
    assert_eq!(counts.error, 1);
}

#[tokio::test]
async fn convert_all_with_zero_concurrency_is_400() {
    let harness = TestHarness::new();
    upload(&harness, &[("images", "1.heic", b"one")]).await;

    let response = send(
        &harness,
        Request::post("/api/convert-all?concurrency=0")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_and_remove() {
    let harness = TestHarness::new();
    let queued = upload(&harness, &[("images", "1.heic", b"one"), ("images", "2.heic", b"two")]).await;
    let first = queued[0]["id"].as_str().unwrap().to_string();

    let response = send(
        &harness,
        Request::delete(format!("/api/items/{}", first))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.ctx.batch.len(), 1);

    let response = send(
        &harness,
        Request::delete(format!("/api/items/{}", first))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&harness, Request::delete("/api/items").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["removed"], 1);
    assert!(harness.ctx.batch.is_empty());
}

#[tokio::test]
async fn events_stream_is_sse() {
    let harness = TestHarness::new();
    let response = send(&harness, Request::get("/api/events").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
}
