//! Identification-number lookups: invoices where a person identified by an
//! identification number sold, bought, or either.
//!
//! Person update history means several active rows can share one
//! identification number; the lookup matches invoices against all of them.

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::handlers::invoices::InvoiceResponse;
use crate::services::store::expand_parties;
use crate::startup::AppState;
use service_core::error::AppError;

enum LookupSide {
    Sales,
    Purchases,
    Both,
}

async fn lookup(
    state: &AppState,
    identification_number: &str,
    side: LookupSide,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let persons = state
        .store
        .persons_by_identification(identification_number)
        .await?;
    if persons.is_empty() {
        return Err(AppError::not_found(
            "No person found with given identification number",
        ));
    }

    let ids: Vec<i64> = persons.iter().map(|p| p.id).collect();
    let (seller_ids, buyer_ids): (&[i64], &[i64]) = match side {
        LookupSide::Sales => (&ids, &[]),
        LookupSide::Purchases => (&[], &ids),
        LookupSide::Both => (&ids, &ids),
    };

    let invoices = state.store.invoices_by_party(seller_ids, buyer_ids).await?;
    let expanded = expand_parties(state.store.as_ref(), invoices).await?;
    Ok(Json(
        expanded.into_iter().map(InvoiceResponse::from).collect(),
    ))
}

/// Invoices sold by the matched persons.
///
/// GET /api/identification/:ic/sales
pub async fn sales(
    State(state): State<AppState>,
    Path(identification_number): Path<String>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    lookup(&state, &identification_number, LookupSide::Sales).await
}

/// Invoices bought by the matched persons.
///
/// GET /api/identification/:ic/purchases
pub async fn purchases(
    State(state): State<AppState>,
    Path(identification_number): Path<String>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    lookup(&state, &identification_number, LookupSide::Purchases).await
}

/// Union of sales and purchases.
///
/// GET /api/identification/:ic/both
pub async fn both(
    State(state): State<AppState>,
    Path(identification_number): Path<String>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    lookup(&state, &identification_number, LookupSide::Both).await
}
