//! Invoice CRUD integration tests, including the append-only update
//! behavior and party embedding.

mod common;

use axum::http::StatusCode;
use common::{create_invoice, create_person, invoice_payload, person_payload, read_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn create_invoice_embeds_both_parties() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;

    let response = app
        .post(
            "/api/invoices",
            invoice_payload("2024001", seller, buyer, "Paper", "150.00"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert!(body["_id"].as_i64().unwrap() > 0);
    assert_eq!(body["invoiceNumber"], "2024001");
    assert_eq!(body["seller"]["_id"], seller);
    assert_eq!(body["seller"]["name"], "Seller s.r.o.");
    assert_eq!(body["buyer"]["_id"], buyer);
    assert_eq!(body["issued"], "2024-03-10");
    assert_eq!(body["dueDate"], "2024-04-10");
    assert_eq!(body["product"], "Paper");
    // Prices stay in the string domain.
    assert_eq!(body["price"], "150.00");
    assert_eq!(body["vat"], 21);
}

#[tokio::test]
async fn create_invoice_accepts_person_objects_as_references() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;

    let mut payload = invoice_payload("2024002", 0, 0, "Ink", "90.00");
    payload["seller"] = json!({ "_id": seller });
    // A whole person object works too, only the id is read.
    let mut buyer_object = person_payload("Buyer a.s.", "22222222");
    buyer_object["_id"] = json!(buyer);
    payload["buyer"] = buyer_object;

    let response = app.post("/api/invoices", payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["seller"]["_id"], seller);
    assert_eq!(body["buyer"]["_id"], buyer);
}

#[tokio::test]
async fn create_invoice_rejects_unknown_parties() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;

    let response = app
        .post(
            "/api/invoices",
            invoice_payload("2024003", 999, seller, "Paper", "10.00"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Unknown seller reference"));

    let response = app
        .post(
            "/api/invoices",
            invoice_payload("2024003", seller, 999, "Paper", "10.00"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Unknown buyer reference"));
}

#[tokio::test]
async fn create_invoice_rejects_blank_fields_and_bad_dates() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;

    let mut blank_number = invoice_payload("", seller, buyer, "Paper", "10.00");
    blank_number["invoiceNumber"] = json!("");
    let response = app.post("/api/invoices", blank_number).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad_date = invoice_payload("2024004", seller, buyer, "Paper", "10.00");
    bad_date["issued"] = json!("2024-13-40");
    let response = app.post("/api/invoices", bad_date).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn price_accepts_string_or_number_and_answers_string() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;

    let response = app
        .post(
            "/api/invoices",
            invoice_payload("2024005", seller, buyer, "Paper", "1234.56"),
        )
        .await;
    assert_eq!(read_json(response).await["price"], "1234.56");

    let mut numeric = invoice_payload("2024006", seller, buyer, "Paper", "0");
    numeric["price"] = json!(99.5);
    let response = app.post("/api/invoices", numeric).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["price"], "99.5");
}

#[tokio::test]
async fn get_invoice_returns_record_or_404() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;
    let id = create_invoice(
        &app,
        invoice_payload("2024007", seller, buyer, "Paper", "10.00"),
    )
    .await;

    let response = app.get(&format!("/api/invoices/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["_id"], id);

    let response = app.get("/api/invoices/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error"], "Invoice not found");
}

#[tokio::test]
async fn update_invoice_inserts_new_row_and_keeps_original() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;
    let original = create_invoice(
        &app,
        invoice_payload("2024008", seller, buyer, "Paper", "10.00"),
    )
    .await;

    let response = app
        .put(
            &format!("/api/invoices/{original}"),
            invoice_payload("2024008", seller, buyer, "Recycled paper", "12.00"),
        )
        .await;
    // The body landed as a new row, which is what 201 reports.
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    let revision = body["_id"].as_i64().unwrap();
    assert_ne!(revision, original);
    assert_eq!(body["product"], "Recycled paper");

    // The addressed row is still active and unchanged.
    let response = app.get(&format!("/api/invoices/{original}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["product"], "Paper");

    let response = app.get("/api/invoices").await;
    assert_eq!(read_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn update_unknown_invoice_returns_404() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;

    let response = app
        .put(
            "/api/invoices/999",
            invoice_payload("2024009", seller, buyer, "Paper", "10.00"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoices_keep_resolving_archived_person_revisions() {
    let app = TestApp::new();
    let seller = create_person(&app, "Original Seller", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;
    let id = create_invoice(
        &app,
        invoice_payload("2024010", seller, buyer, "Paper", "10.00"),
    )
    .await;

    // Updating archives the referenced row; the invoice keeps its snapshot.
    let response = app
        .put(
            &format!("/api/persons/{seller}"),
            person_payload("Renamed Seller", "11111111"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/api/invoices/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["seller"]["_id"], seller);
    assert_eq!(body["seller"]["name"], "Original Seller");
}

#[tokio::test]
async fn product_listing_is_distinct_sorted_and_active_only() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;

    create_invoice(
        &app,
        invoice_payload("2024011", seller, buyer, "Paper", "10.00"),
    )
    .await;
    create_invoice(
        &app,
        invoice_payload("2024012", seller, buyer, "Ink", "20.00"),
    )
    .await;
    create_invoice(
        &app,
        invoice_payload("2024013", seller, buyer, "Paper", "30.00"),
    )
    .await;
    let archived = create_invoice(
        &app,
        invoice_payload("2024014", seller, buyer, "Ghost toner", "40.00"),
    )
    .await;
    app.delete(&format!("/api/invoices/{archived}")).await;

    let response = app.get("/api/invoices/product").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!(["Ink", "Paper"]));

    // Alias route answers the same.
    let response = app.get("/api/invoices/products").await;
    assert_eq!(read_json(response).await, json!(["Ink", "Paper"]));
}
