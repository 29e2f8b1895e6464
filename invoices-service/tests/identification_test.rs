//! Identification-number lookup integration tests.

mod common;

use axum::http::StatusCode;
use common::{create_invoice, create_person, invoice_payload, person_payload, read_json, TestApp};

async fn looked_up_ids(app: &TestApp, uri: &str) -> Vec<i64> {
    let response = app.get(uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["_id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn lookups_split_sales_purchases_and_union() {
    let app = TestApp::new();
    let first = create_person(&app, "First s.r.o.", "11111111").await;
    let second = create_person(&app, "Second a.s.", "22222222").await;

    let sale = create_invoice(
        &app,
        invoice_payload("2024001", first, second, "Paper", "10.00"),
    )
    .await;
    let purchase = create_invoice(
        &app,
        invoice_payload("2024002", second, first, "Ink", "20.00"),
    )
    .await;

    assert_eq!(
        looked_up_ids(&app, "/api/identification/11111111/sales").await,
        [sale]
    );
    assert_eq!(
        looked_up_ids(&app, "/api/identification/11111111/purchases").await,
        [purchase]
    );
    assert_eq!(
        looked_up_ids(&app, "/api/identification/11111111/both").await,
        [sale, purchase]
    );
}

#[tokio::test]
async fn unknown_identification_number_returns_404() {
    let app = TestApp::new();
    create_person(&app, "First s.r.o.", "11111111").await;

    for side in ["sales", "purchases", "both"] {
        let response = app.get(&format!("/api/identification/00000000/{side}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            read_json(response).await["error"],
            "No person found with given identification number"
        );
    }
}

#[tokio::test]
async fn lookups_cover_only_active_person_revisions() {
    let app = TestApp::new();
    let original = create_person(&app, "Original", "11111111").await;
    let counterparty = create_person(&app, "Counterparty", "22222222").await;

    let old_sale = create_invoice(
        &app,
        invoice_payload("2024001", original, counterparty, "Paper", "10.00"),
    )
    .await;

    // The update keeps the identification number but archives the old row.
    let response = app
        .put(
            &format!("/api/persons/{original}"),
            person_payload("Renamed", "11111111"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let revision = read_json(response).await["_id"].as_i64().unwrap();

    let new_sale = create_invoice(
        &app,
        invoice_payload("2024002", revision, counterparty, "Ink", "20.00"),
    )
    .await;

    // Only invoices of the active revision match; the pre-update invoice
    // hangs off the archived row.
    let ids = looked_up_ids(&app, "/api/identification/11111111/sales").await;
    assert_eq!(ids, [new_sale]);
    assert!(!ids.contains(&old_sale));
}

#[tokio::test]
async fn archived_invoices_drop_out_of_lookups() {
    let app = TestApp::new();
    let seller = create_person(&app, "Seller s.r.o.", "11111111").await;
    let buyer = create_person(&app, "Buyer a.s.", "22222222").await;
    let id = create_invoice(
        &app,
        invoice_payload("2024001", seller, buyer, "Paper", "10.00"),
    )
    .await;

    app.delete(&format!("/api/invoices/{id}")).await;

    // The person still exists, so this is an empty 200 rather than a 404.
    let ids = looked_up_ids(&app, "/api/identification/11111111/sales").await;
    assert!(ids.is_empty());
}
