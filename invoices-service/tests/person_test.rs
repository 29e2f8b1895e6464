//! Person CRUD integration tests.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{create_person, person_payload, read_json, TestApp};
use serde_json::json;
use tower::util::ServiceExt;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;

#[tokio::test]
async fn create_person_returns_created_record() {
    let app = TestApp::new();

    let response = app
        .post("/api/persons", person_payload("Alpha s.r.o.", "12345678"))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert!(body["_id"].as_i64().unwrap() > 0);
    assert_eq!(body["name"], "Alpha s.r.o.");
    assert_eq!(body["identificationNumber"], "12345678");
    assert_eq!(body["accountNumber"], "123456789");
    assert_eq!(body["bankCode"], "0800");
    assert_eq!(body["country"], "CZECHIA");
    // The soft-delete marker is a storage detail, not payload.
    assert!(body.get("hidden").is_none());
}

#[tokio::test]
async fn create_person_defaults_country_when_omitted() {
    let app = TestApp::new();

    let mut payload = person_payload("Beta a.s.", "22222222");
    payload.as_object_mut().unwrap().remove("country");

    let response = app.post("/api/persons", payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["country"], "CZECHIA");
}

#[tokio::test]
async fn create_person_rejects_unknown_country() {
    let app = TestApp::new();

    let mut payload = person_payload("Gamma", "33333333");
    payload["country"] = json!("MORAVIA");

    let response = app.post("/api/persons", payload).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_person_rejects_blank_name_and_bad_mail() {
    let app = TestApp::new();

    let mut blank_name = person_payload("", "44444444");
    blank_name["name"] = json!("");
    let response = app.post("/api/persons", blank_name).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"].as_str().unwrap().contains("name"));

    let mut bad_mail = person_payload("Delta", "55555555");
    bad_mail["mail"] = json!("not-an-email");
    let response = app.post("/api/persons", bad_mail).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_person_rejects_malformed_json() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/persons")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_person_returns_record_or_404() {
    let app = TestApp::new();
    let id = create_person(&app, "Alpha s.r.o.", "12345678").await;

    let response = app.get(&format!("/api/persons/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["_id"], id);

    let response = app.get("/api/persons/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error"], "Person not found");
}

#[tokio::test]
async fn update_person_archives_original_and_creates_replacement() {
    let app = TestApp::new();
    let original_id = create_person(&app, "Old Name", "12345678").await;

    let mut payload = person_payload("New Name", "12345678");
    payload["note"] = json!("after update");
    let response = app.put(&format!("/api/persons/{original_id}"), payload).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let replacement_id = body["_id"].as_i64().unwrap();
    assert_ne!(replacement_id, original_id);
    assert_eq!(body["name"], "New Name");

    // The original row is archived, only the replacement is visible.
    let response = app.get(&format!("/api/persons/{original_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/api/persons").await;
    let list = read_json(response).await;
    let ids: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [replacement_id]);
}

#[tokio::test]
async fn update_unknown_person_returns_404() {
    let app = TestApp::new();

    let response = app
        .put("/api/persons/999", person_payload("Ghost", "99999999"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_person_archives_and_is_not_repeatable() {
    let app = TestApp::new();
    let id = create_person(&app, "Alpha s.r.o.", "12345678").await;

    let response = app.delete(&format!("/api/persons/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/persons/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The row is already archived, a second delete finds nothing.
    let response = app.delete(&format!("/api/persons/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_persons_excludes_archived() {
    let app = TestApp::new();
    let kept = create_person(&app, "Kept", "11111111").await;
    let dropped = create_person(&app, "Dropped", "22222222").await;

    app.delete(&format!("/api/persons/{dropped}")).await;

    let response = app.get("/api/persons").await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = read_json(response).await;
    let ids: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [kept]);
}

#[tokio::test]
async fn trailing_slash_routes_are_normalized() {
    let app = TestApp::new();
    create_person(&app, "Alpha s.r.o.", "12345678").await;

    // The server wraps the router exactly like this on startup.
    let normalized = NormalizePathLayer::trim_trailing_slash().layer(app.router());

    let response = normalized
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/persons/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await.as_array().unwrap().len(), 1);

    let response = normalized
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/persons/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(person_payload("Beta a.s.", "22222222").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}
