//! Test helper module for invoices-service integration tests.
//!
//! Suites drive the real router over the in-memory store with a fixed
//! clock, so they are deterministic and need no running Postgres.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use invoices_service::services::{FixedClock, InMemoryStore};
use invoices_service::startup::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

/// The fixed calendar date every suite runs under.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_today(today())
    }

    pub fn with_today(today: NaiveDate) -> Self {
        let state = AppState {
            store: Arc::new(InMemoryStore::new()),
            clock: Arc::new(FixedClock(today)),
        };
        Self {
            router: build_router(state),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response<Body> {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str) -> Response<Body> {
        self.request(Method::POST, uri, None).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Response<Body> {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.request(Method::DELETE, uri, None).await
    }
}

/// Reads the whole response body as JSON.
pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A valid person payload. The identification number doubles as the
/// distinguishing knob between fixtures.
pub fn person_payload(name: &str, identification_number: &str) -> Value {
    json!({
        "name": name,
        "identificationNumber": identification_number,
        "taxNumber": format!("CZ{identification_number}"),
        "accountNumber": "123456789",
        "bankCode": "0800",
        "iban": "CZ6508000000192000145399",
        "telephone": "+420777123456",
        "mail": "info@example.com",
        "street": "Dlouha 1",
        "zip": "11000",
        "city": "Praha",
        "country": "CZECHIA",
        "note": "fixture"
    })
}

pub async fn create_person(app: &TestApp, name: &str, identification_number: &str) -> i64 {
    let response = app
        .post("/api/persons", person_payload(name, identification_number))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await["_id"].as_i64().unwrap()
}

/// A valid invoice payload issued in March of the fixture year, with both
/// party references in the bare-id form.
pub fn invoice_payload(
    number: &str,
    seller_id: i64,
    buyer_id: i64,
    product: &str,
    price: &str,
) -> Value {
    json!({
        "invoiceNumber": number,
        "seller": seller_id,
        "buyer": buyer_id,
        "issued": "2024-03-10",
        "dueDate": "2024-04-10",
        "product": product,
        "price": price,
        "vat": 21,
        "note": "fixture"
    })
}

pub async fn create_invoice(app: &TestApp, payload: Value) -> i64 {
    let response = app.post("/api/invoices", payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await["_id"].as_i64().unwrap()
}
