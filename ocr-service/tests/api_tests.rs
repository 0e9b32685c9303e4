mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::Engine as _;
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    app_with, body_json, create_test_png, file_part, get_request, json_request,
    multipart_request, test_app, test_config, text_part, FakeFactory,
};

#[tokio::test]
async fn file_upload_returns_one_detail_per_line() {
    let (app, _) = test_app();
    let png = create_test_png(200, 300);

    let response = app
        .oneshot(multipart_request(
            "/api/v1/ocr/file",
            &[file_part("file", "scan.png", &png), text_part("lang", "ch")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["lang"], "ch");
    assert_eq!(json["data"]["text"], "ch line 1 ch line 2 ch line 3");
    assert_eq!(json["data"]["details"].as_array().unwrap().len(), 3);
    assert_eq!(json["data"]["word_count"], 3);
    assert_eq!(json["data"]["image_width"], 200);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn file_upload_defaults_language() {
    let mut config = test_config();
    config.ocr.default_lang = "en".to_string();
    let (app, _) = app_with(config, Arc::new(FakeFactory::new()));
    let png = create_test_png(100, 100);

    let response = app
        .oneshot(multipart_request("/api/v1/ocr/file", &[file_part("file", "a.png", &png)]))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["data"]["lang"], "en");
}

#[tokio::test]
async fn blank_image_reports_no_text_found() {
    let (app, _) = test_app();
    let png = create_test_png(50, 50);

    let response = app
        .oneshot(multipart_request("/api/v1/ocr/file", &[file_part("file", "a.png", &png)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["avg_confidence"], 0.0);
    assert_eq!(json["data"]["message"], "No text found");
}

#[tokio::test]
async fn unsupported_extension_is_415() {
    let (app, _) = test_app();

    let response = app
        .oneshot(multipart_request(
            "/api/v1/ocr/file",
            &[file_part("file", "anim.gif", b"GIF89a")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error_type"], "unsupported_format");
}

#[tokio::test]
async fn corrupt_image_is_422() {
    let (app, _) = test_app();

    let response = app
        .oneshot(multipart_request(
            "/api/v1/ocr/file",
            &[file_part("file", "broken.png", b"\x89PNG not really")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "corrupt_image");
}

#[tokio::test]
async fn missing_file_field_is_400() {
    let (app, _) = test_app();

    let response = app
        .oneshot(multipart_request("/api/v1/ocr/file", &[text_part("lang", "en")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "invalid_request");
}

#[tokio::test]
async fn unselected_file_is_400() {
    let (app, state) = test_app();

    let response = app
        .oneshot(multipart_request("/api/v1/ocr/file", &[file_part("file", "", b"")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "invalid_request");
    assert_eq!(json["error"], "Invalid request: No file selected");
    assert_eq!(state.models.stats().snapshot().total_requests, 0);
}

#[tokio::test]
async fn several_files_on_single_endpoint_is_400() {
    let (app, state) = test_app();
    let png = create_test_png(100, 100);

    let response = app
        .oneshot(multipart_request(
            "/api/v1/ocr/file",
            &[file_part("file", "a.png", &png), file_part("file", "b.png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "invalid_request");
    assert!(json["error"].as_str().unwrap().contains("/api/v1/ocr/batch"));
    assert_eq!(state.models.stats().snapshot().total_requests, 0);
}

#[tokio::test]
async fn oversized_remote_image_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poster.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 64 * 1024])
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.server.max_content_length = 1024;
    let (app, state) = app_with(config, Arc::new(FakeFactory::new()));

    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/url",
            json!({ "url": format!("{}/poster.png", server.uri()) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "fetch_error");
    assert!(json["error"].as_str().unwrap().contains("download limit"));
    assert_eq!(state.models.stats().snapshot().failed_requests, 1);
}

#[tokio::test]
async fn url_request_fetches_and_recognizes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/receipt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(create_test_png(120, 200))
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let (app, _) = test_app();
    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/url",
            json!({ "url": format!("{}/receipt", server.uri()), "lang": "en" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["text"], "en line 1 en line 2");
}

#[tokio::test]
async fn unreachable_url_is_fetch_error() {
    let (app, state) = test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/url",
            json!({ "url": "http://127.0.0.1:1/image.png" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error_type"], "fetch_error");

    let snap = state.models.stats().snapshot();
    assert_eq!(snap.total_requests, 1);
    assert_eq!(snap.failed_requests, 1);
}

#[tokio::test]
async fn upstream_error_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (app, _) = test_app();
    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/url",
            json!({ "url": format!("{}/x.png", server.uri()) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn slow_upstream_times_out_as_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(create_test_png(10, 10))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.performance.fetch_timeout_secs = 1;
    let (app, _) = app_with(config, Arc::new(FakeFactory::new()));

    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/url",
            json!({ "url": format!("{}/slow.png", server.uri()) }),
        ))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["error_type"], "fetch_error");
}

#[tokio::test]
async fn invalid_url_is_400() {
    let (app, _) = test_app();

    let response = app
        .oneshot(json_request("/api/v1/ocr/url", json!({ "url": "not-a-url" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn base64_request_with_data_url() {
    let (app, _) = test_app();
    let encoded = base64::engine::general_purpose::STANDARD.encode(create_test_png(80, 100));

    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/base64",
            json!({ "image": format!("data:image/png;base64,{encoded}"), "lang": "en" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["text"], "en line 1");
}

#[tokio::test]
async fn batch_over_limit_is_rejected_before_processing() {
    let factory = Arc::new(FakeFactory::new());
    let (app, state) = app_with(test_config(), factory.clone());
    let encoded = base64::engine::general_purpose::STANDARD.encode(create_test_png(10, 10));

    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/batch",
            json!({ "images": vec![encoded; 4] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error_type"], "batch_too_large");
    assert_eq!(factory.builds(), 0);
    assert_eq!(state.models.stats().snapshot().total_requests, 0);
}

#[tokio::test]
async fn batch_at_limit_is_accepted() {
    let (app, _) = test_app();
    let encoded = base64::engine::general_purpose::STANDARD.encode(create_test_png(10, 100));

    let response = app
        .oneshot(json_request(
            "/api/v1/ocr/batch",
            json!({ "images": vec![encoded; 3], "lang": "en" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 3);
    assert_eq!(json["data"]["succeeded"], 3);
}

#[tokio::test]
async fn multipart_batch_isolates_corrupt_item() {
    let (app, state) = test_app();
    let one_line = create_test_png(60, 100);
    let two_lines = create_test_png(60, 200);

    let response = app
        .oneshot(multipart_request(
            "/api/v1/ocr/batch",
            &[
                file_part("files", "first.png", &one_line),
                file_part("files", "broken.jpg", b"definitely not a jpeg"),
                file_part("files", "third.png", &two_lines),
                text_part("lang", "en"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);

    let data = &json["data"];
    assert_eq!(data["total"], 3);
    assert_eq!(data["succeeded"], 2);
    assert_eq!(data["failed"], 1);

    let results = data["results"].as_array().unwrap();
    assert_eq!(results[0]["text"], "en line 1");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["index"], 1);
    assert_eq!(results[1]["error_type"], "corrupt_image");
    assert_eq!(results[2]["text"], "en line 1 en line 2");

    let snap = state.models.stats().snapshot();
    assert_eq!(snap.total_requests, 3);
    assert_eq!(snap.successful_requests, 2);
    assert_eq!(snap.failed_requests, 1);
}

#[tokio::test]
async fn empty_batch_is_400() {
    let (app, _) = test_app();

    let response = app
        .oneshot(json_request("/api/v1/ocr/batch", json!({ "images": [] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn engine_load_failure_is_503() {
    let (app, _) = test_app();
    let png = create_test_png(10, 10);

    let response = app
        .oneshot(multipart_request(
            "/api/v1/ocr/file",
            &[file_part("file", "a.png", &png), text_part("lang", "missing")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "engine_load_error");
}

#[tokio::test]
async fn slow_inference_times_out() {
    let mut config = test_config();
    config.performance.request_timeout_secs = 1;
    let factory = Arc::new(FakeFactory::new().with_inference_delay(Duration::from_millis(1500)));
    let (app, _) = app_with(config, factory);
    let png = create_test_png(10, 10);

    let response = app
        .oneshot(multipart_request("/api/v1/ocr/file", &[file_part("file", "a.png", &png)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "engine_inference_error");
}

#[tokio::test]
async fn warm_requests_do_not_reload_models() {
    let factory = Arc::new(FakeFactory::new());
    let (app, _) = app_with(test_config(), factory.clone());
    let png = create_test_png(10, 100);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(multipart_request(
                "/api/v1/ocr/file",
                &[file_part("file", "a.png", &png), text_part("use_gpu", "true")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get_request("/api/v1/models")).await.unwrap();
    let json = body_json(response).await;

    // GPU requests fall back to the CPU engine on this backend
    assert_eq!(json["data"]["loaded_models"], json!(["ch_cpu"]));
    assert_eq!(json["data"]["models"][0]["device"], "cpu");
    assert_eq!(json["data"]["stats"]["models_loaded"], 1);
    assert_eq!(factory.builds(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_load_each_model_once() {
    let factory = Arc::new(FakeFactory::new());
    let (app, state) = app_with(test_config(), factory.clone());
    let png = Arc::new(create_test_png(10, 100));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            let png = Arc::clone(&png);
            let lang = if i % 2 == 0 { "ch" } else { "en" };
            tokio::spawn(async move {
                app.oneshot(multipart_request(
                    "/api/v1/ocr/file",
                    &[file_part("file", "a.png", &png), text_part("lang", lang)],
                ))
                .await
                .unwrap()
                .status()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(factory.builds(), 2);
    assert_eq!(state.models.stats().models_loaded(), 2);
    assert_eq!(state.models.loaded_keys(), vec!["ch_cpu", "en_cpu"]);
}

#[tokio::test]
async fn stats_report_success_rate() {
    let (app, _) = test_app();
    let png = create_test_png(10, 100);

    app.clone()
        .oneshot(multipart_request("/api/v1/ocr/file", &[file_part("file", "a.png", &png)]))
        .await
        .unwrap();
    app.clone()
        .oneshot(multipart_request(
            "/api/v1/ocr/file",
            &[file_part("file", "a.png", b"garbage")],
        ))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/api/v1/stats")).await.unwrap();
    let json = body_json(response).await;

    assert_eq!(json["data"]["total_requests"], 2);
    assert_eq!(json["data"]["successful_requests"], 1);
    assert_eq!(json["data"]["failed_requests"], 1);
    assert_eq!(json["data"]["success_rate"], 50.0);
    assert!(json["data"]["uptime"].as_f64().unwrap() >= 0.0);
}
