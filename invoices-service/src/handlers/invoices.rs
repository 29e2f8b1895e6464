//! Invoice handlers: filtered listing, versioned updates, soft deletion and
//! restore, credit notes, products, and the revenue reports.
//!
//! An invoice PUT is append-only: the original row stays active and the body
//! is inserted as a new row, so history is the set of rows sharing an
//! invoice number.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::handlers::persons::PersonResponse;
use crate::models::{Invoice, InvoiceFilter, NewInvoice, PartyRole};
use crate::services::metrics::{ARCHIVE_TRANSITIONS_TOTAL, INVOICES_CREATED_TOTAL};
use crate::services::statistics::{self, RevenueByCompany};
use crate::services::store::{expand_parties, InvoiceStore, InvoiceWithParties};
use crate::startup::AppState;
use service_core::error::AppError;
use service_core::extract::ValidJson;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Person reference on invoice writes: either a bare id or an object
/// carrying `_id` (a full person object works too, only the id is read).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum PersonRef {
    Id(i64),
    Embedded {
        #[serde(rename = "_id")]
        id: i64,
    },
}

impl PersonRef {
    pub fn id(&self) -> i64 {
        match self {
            PersonRef::Id(id) => *id,
            PersonRef::Embedded { id } => *id,
        }
    }
}

/// Invoice payload for both create and update.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    #[validate(length(min = 1, message = "invoice number must not be empty"))]
    pub invoice_number: String,
    pub seller: PersonRef,
    pub buyer: PersonRef,
    pub issued: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(length(min = 1, message = "product must not be empty"))]
    pub product: String,
    pub price: Decimal,
    pub vat: i32,
    pub note: Option<String>,
}

/// Invoice response with both parties embedded. Prices serialize as decimal
/// strings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    #[serde(rename = "_id")]
    pub id: i64,
    pub invoice_number: String,
    pub seller: PersonResponse,
    pub buyer: PersonResponse,
    pub issued: NaiveDate,
    pub due_date: NaiveDate,
    pub product: String,
    pub price: Decimal,
    pub vat: i32,
    pub note: Option<String>,
}

impl From<InvoiceWithParties> for InvoiceResponse {
    fn from(row: InvoiceWithParties) -> Self {
        Self {
            id: row.invoice.id,
            invoice_number: row.invoice.invoice_number,
            seller: PersonResponse::from(row.seller),
            buyer: PersonResponse::from(row.buyer),
            issued: row.invoice.issued,
            due_date: row.invoice.due_date,
            product: row.invoice.product,
            price: row.invoice.price,
            vat: row.invoice.vat,
            note: row.invoice.note,
        }
    }
}

/// Query parameters of the global statistics endpoint.
#[derive(Debug, Deserialize)]
pub struct StatisticsParams {
    pub include_archived: Option<String>,
}

impl StatisticsParams {
    fn include_archived(&self) -> bool {
        matches!(self.include_archived.as_deref(), Some("1" | "true" | "True"))
    }
}

/// Global statistics response. Sums are JSON numbers here, unlike invoice
/// prices.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatisticsResponse {
    pub current_year_sum: f64,
    pub all_time_sum: f64,
    pub invoices_count: i64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Checks both party references against the person table (archived rows
/// count: history rows keep referencing them). Unknown ids are a client
/// error, not a 404.
async fn resolve_parties(
    store: &dyn InvoiceStore,
    seller: PersonRef,
    buyer: PersonRef,
) -> Result<(i64, i64), AppError> {
    let seller_id = seller.id();
    let buyer_id = buyer.id();
    let known = store.persons_by_ids(&[seller_id, buyer_id]).await?;
    if !known.contains_key(&seller_id) {
        return Err(AppError::bad_request(format!(
            "Unknown seller reference {seller_id}"
        )));
    }
    if !known.contains_key(&buyer_id) {
        return Err(AppError::bad_request(format!(
            "Unknown buyer reference {buyer_id}"
        )));
    }
    Ok((seller_id, buyer_id))
}

fn new_invoice(req: InvoiceRequest, seller_id: i64, buyer_id: i64) -> NewInvoice {
    NewInvoice {
        invoice_number: req.invoice_number,
        seller_id,
        buyer_id,
        issued: req.issued,
        due_date: req.due_date,
        product: req.product,
        price: req.price,
        vat: req.vat,
        note: req.note,
    }
}

async fn expanded_response(
    store: &dyn InvoiceStore,
    invoice: Invoice,
) -> Result<InvoiceResponse, AppError> {
    let mut expanded = expand_parties(store, vec![invoice]).await?;
    expanded
        .pop()
        .map(InvoiceResponse::from)
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Party expansion yielded no row")))
}

async fn expanded_list(
    store: &dyn InvoiceStore,
    invoices: Vec<Invoice>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let expanded = expand_parties(store, invoices).await?;
    Ok(Json(
        expanded.into_iter().map(InvoiceResponse::from).collect(),
    ))
}

// ============================================================================
// Invoice Handlers
// ============================================================================

/// List active invoices through the filter engine.
///
/// GET /api/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let filter = InvoiceFilter::from_params(&params);
    let invoices = state.store.list_invoices(&filter).await?;
    expanded_list(state.store.as_ref(), invoices).await
}

/// Create an invoice.
///
/// POST /api/invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let (seller_id, buyer_id) = resolve_parties(state.store.as_ref(), req.seller, req.buyer).await?;
    let invoice = state
        .store
        .create_invoice(&new_invoice(req, seller_id, buyer_id))
        .await?;
    INVOICES_CREATED_TOTAL
        .with_label_values(&["standard"])
        .inc();

    let response = expanded_response(state.store.as_ref(), invoice).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get an active invoice by id.
///
/// GET /api/invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .store
        .find_active_invoice(id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;
    Ok(Json(expanded_response(state.store.as_ref(), invoice).await?))
}

/// Update an invoice by inserting a new row; the addressed row stays active
/// and untouched, which is why this answers 201 rather than 200.
///
/// PUT /api/invoices/:id
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    state
        .store
        .find_active_invoice(id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    let (seller_id, buyer_id) = resolve_parties(state.store.as_ref(), req.seller, req.buyer).await?;
    let invoice = state
        .store
        .create_invoice(&new_invoice(req, seller_id, buyer_id))
        .await?;
    INVOICES_CREATED_TOTAL
        .with_label_values(&["standard"])
        .inc();

    let response = expanded_response(state.store.as_ref(), invoice).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Archive an invoice.
///
/// DELETE /api/invoices/:id
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.archive_invoice(id).await? {
        return Err(AppError::not_found("Invoice not found"));
    }
    ARCHIVE_TRANSITIONS_TOTAL
        .with_label_values(&["invoice", "archived"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// List archived invoices.
///
/// GET /api/invoices/archived
pub async fn list_archived(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let invoices = state.store.list_archived_invoices().await?;
    expanded_list(state.store.as_ref(), invoices).await
}

/// Restore an archived invoice. Only `hidden` ever changed, so the restored
/// row equals its pre-archive state.
///
/// POST /api/invoices/:id/restore
pub async fn restore_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .store
        .unarchive_invoice(id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found in archive"))?;
    ARCHIVE_TRANSITIONS_TOTAL
        .with_label_values(&["invoice", "restored"])
        .inc();
    Ok(Json(expanded_response(state.store.as_ref(), invoice).await?))
}

/// Cut a credit note off an active invoice. Per the endpoint's contract any
/// failure, a missing source invoice included, answers 400.
///
/// POST /api/invoices/:id/create_credit_note
pub async fn create_credit_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    match create_credit_note_inner(&state, id).await {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(err) => {
            let message = match &err {
                AppError::NotFound(reason)
                | AppError::BadRequest(reason) => {
                    format!("Failed to create credit note: {reason}")
                }
                AppError::ValidationError(reason) => {
                    format!("Failed to create credit note: {reason}")
                }
                _ => {
                    tracing::error!(error = ?err, invoice_id = id, "Credit note creation failed");
                    "Failed to create credit note".to_string()
                }
            };
            Err(AppError::bad_request(message))
        }
    }
}

async fn create_credit_note_inner(
    state: &AppState,
    id: i64,
) -> Result<InvoiceResponse, AppError> {
    let source = state
        .store
        .find_active_invoice(id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    let input = NewInvoice::credit_note(&source, state.clock.today());
    let credit_note = state.store.create_invoice(&input).await?;
    INVOICES_CREATED_TOTAL
        .with_label_values(&["credit_note"])
        .inc();

    expanded_response(state.store.as_ref(), credit_note).await
}

/// Distinct products of active invoices, for dropdowns.
///
/// GET /api/invoices/product (alias: /api/invoices/products)
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let products = state.store.distinct_products().await?;
    Ok(Json(products))
}

/// Global invoice sums; archived rows join in on request.
///
/// GET /api/invoices/statistics
pub async fn invoice_statistics(
    State(state): State<AppState>,
    Query(params): Query<StatisticsParams>,
) -> Result<Json<InvoiceStatisticsResponse>, AppError> {
    let totals = state
        .store
        .invoice_statistics(params.include_archived(), state.clock.today().year())
        .await?;

    Ok(Json(InvoiceStatisticsResponse {
        current_year_sum: statistics::to_amount(totals.current_year_sum),
        all_time_sum: statistics::to_amount(totals.all_time_sum),
        invoices_count: totals.invoices_count,
    }))
}

/// Per-company revenue over the recent-year window.
///
/// GET /api/invoices/revenue_by_company
pub async fn revenue_by_company(
    State(state): State<AppState>,
) -> Result<Json<RevenueByCompany>, AppError> {
    let current_year = state.clock.today().year();
    let first_year = statistics::window_start(current_year);
    let years = statistics::recent_years(current_year);

    let persons = state.store.list_active_persons().await?;
    let all_time = state.store.revenue_by_seller().await?;
    let yearly = state
        .store
        .totals_by_party_and_year(PartyRole::Seller, first_year, current_year)
        .await?;

    Ok(Json(statistics::build_revenue_by_company(
        &years, persons, &all_time, &yearly,
    )))
}
