use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::setup_test_app;

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app();

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["providers"], 0);
}

#[tokio::test]
async fn geocode_without_providers_is_a_clean_no_match() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/v1/geocode",
            serde_json::json!({"address": "Rua A, 10, Maceió, AL"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["match_level"], "no_match");
    assert_eq!(json["lat"], 0.0);
}

#[tokio::test]
async fn empty_address_returns_400() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/v1/geocode",
            serde_json::json!({"address": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn oversized_address_returns_400() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/v1/geocode",
            serde_json::json!({"address": "x".repeat(600)}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_reports_processed_and_total() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/v1/geocode/batch",
            serde_json::json!({"addresses": ["Maceió, AL", "Arapiraca, AL"]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["processed"], 2);
    assert_eq!(json["total"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn batch_enforces_server_side_ceiling() {
    let app = setup_test_app();
    let addresses: Vec<String> = (0..80).map(|i| format!("Rua {i}, Maceió")).collect();

    let response = app
        .oneshot(post_json(
            "/v1/geocode/batch",
            serde_json::json!({"addresses": addresses, "max_results": 500}),
        ))
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["processed"], 50);
    assert_eq!(json["total"], 80);
}

#[tokio::test]
async fn batch_honors_caller_max_results() {
    let app = setup_test_app();
    let addresses: Vec<String> = (0..10).map(|i| format!("Rua {i}, Maceió")).collect();

    let response = app
        .oneshot(post_json(
            "/v1/geocode/batch",
            serde_json::json!({"addresses": addresses, "max_results": 3}),
        ))
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["processed"], 3);
    assert_eq!(json["total"], 10);
}

#[tokio::test]
async fn batch_marks_blank_addresses_instead_of_dropping_them() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/v1/geocode/batch",
            serde_json::json!({"addresses": ["", "Maceió, AL"]}),
        ))
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let results = json["results"].as_array().unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["match_level"], "error");
    assert!(results[0]["error_detail"].as_str().unwrap().contains("empty"));
    assert_eq!(results[1]["match_level"], "no_match");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
