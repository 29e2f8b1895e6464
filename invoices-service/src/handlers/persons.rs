//! Person handlers: CRUD with soft deletion plus the per-person
//! revenue/expense report.
//!
//! A person PUT never edits the stored row. It archives the original and
//! inserts a replacement, so the identification number is the stable
//! identity across the history, not the row id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Country, NewPerson, PartyRole, Person};
use crate::services::metrics::ARCHIVE_TRANSITIONS_TOTAL;
use crate::services::statistics::{self, PersonStatistics};
use crate::startup::AppState;
use service_core::error::AppError;
use service_core::extract::ValidJson;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Person payload for both create and update.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "identification number must not be empty"))]
    pub identification_number: String,
    pub tax_number: Option<String>,
    #[validate(length(min = 1, message = "account number must not be empty"))]
    pub account_number: String,
    #[validate(length(min = 1, message = "bank code must not be empty"))]
    pub bank_code: String,
    pub iban: Option<String>,
    #[validate(length(min = 1, message = "telephone must not be empty"))]
    pub telephone: String,
    #[validate(email(message = "mail must be a valid email address"))]
    pub mail: String,
    #[validate(length(min = 1, message = "street must not be empty"))]
    pub street: String,
    #[validate(length(min = 1, message = "zip must not be empty"))]
    pub zip: String,
    #[validate(length(min = 1, message = "city must not be empty"))]
    pub city: String,
    #[serde(default)]
    pub country: Country,
    pub note: Option<String>,
}

impl PersonRequest {
    fn into_new_person(self) -> NewPerson {
        NewPerson {
            name: self.name,
            identification_number: self.identification_number,
            tax_number: self.tax_number,
            account_number: self.account_number,
            bank_code: self.bank_code,
            iban: self.iban,
            telephone: self.telephone,
            mail: self.mail,
            street: self.street,
            zip: self.zip,
            city: self.city,
            country: self.country.as_str().to_string(),
            note: self.note,
        }
    }
}

/// Person response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonResponse {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub identification_number: String,
    pub tax_number: Option<String>,
    pub account_number: String,
    pub bank_code: String,
    pub iban: Option<String>,
    pub telephone: String,
    pub mail: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub country: Country,
    pub note: Option<String>,
}

impl From<Person> for PersonResponse {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            name: person.name,
            identification_number: person.identification_number,
            tax_number: person.tax_number,
            account_number: person.account_number,
            bank_code: person.bank_code,
            iban: person.iban,
            telephone: person.telephone,
            mail: person.mail,
            street: person.street,
            zip: person.zip,
            city: person.city,
            country: Country::from_string(&person.country),
            note: person.note,
        }
    }
}

// ============================================================================
// Person Handlers
// ============================================================================

/// List active persons.
///
/// GET /api/persons
pub async fn list_persons(
    State(state): State<AppState>,
) -> Result<Json<Vec<PersonResponse>>, AppError> {
    let persons = state.store.list_active_persons().await?;
    Ok(Json(persons.into_iter().map(PersonResponse::from).collect()))
}

/// Create a person.
///
/// POST /api/persons
pub async fn create_person(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<PersonRequest>,
) -> Result<(StatusCode, Json<PersonResponse>), AppError> {
    let person = state.store.create_person(&req.into_new_person()).await?;
    Ok((StatusCode::CREATED, Json(PersonResponse::from(person))))
}

/// Get an active person by id.
///
/// GET /api/persons/:id
pub async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PersonResponse>, AppError> {
    let person = state
        .store
        .find_active_person(id)
        .await?
        .ok_or_else(|| AppError::not_found("Person not found"))?;
    Ok(Json(PersonResponse::from(person)))
}

/// Update a person: archive the original row and insert the replacement.
///
/// PUT /api/persons/:id
pub async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<PersonRequest>,
) -> Result<Json<PersonResponse>, AppError> {
    state
        .store
        .find_active_person(id)
        .await?
        .ok_or_else(|| AppError::not_found("Person not found"))?;

    state.store.archive_person(id).await?;
    ARCHIVE_TRANSITIONS_TOTAL
        .with_label_values(&["person", "archived"])
        .inc();

    let replacement = state.store.create_person(&req.into_new_person()).await?;
    Ok(Json(PersonResponse::from(replacement)))
}

/// Archive a person. Invoices referencing the row keep resolving it.
///
/// DELETE /api/persons/:id
pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.archive_person(id).await? {
        return Err(AppError::not_found("Person not found"));
    }
    ARCHIVE_TRANSITIONS_TOTAL
        .with_label_values(&["person", "archived"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// Per-person revenue and expense report over the recent-year window.
///
/// GET /api/persons/statistics
pub async fn person_statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<PersonStatistics>>, AppError> {
    let current_year = state.clock.today().year();
    let first_year = statistics::window_start(current_year);
    let years = statistics::recent_years(current_year);

    let persons = state.store.list_active_persons().await?;
    let all_time = state.store.revenue_by_seller().await?;
    let revenue_yearly = state
        .store
        .totals_by_party_and_year(PartyRole::Seller, first_year, current_year)
        .await?;
    let expense_yearly = state
        .store
        .totals_by_party_and_year(PartyRole::Buyer, first_year, current_year)
        .await?;

    Ok(Json(statistics::build_person_statistics(
        &years,
        persons,
        &all_time,
        &revenue_yearly,
        &expense_yearly,
    )))
}
