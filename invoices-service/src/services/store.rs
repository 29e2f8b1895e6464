//! Storage seam for invoices-service.
//!
//! Handlers depend on this trait, never on a concrete backend: production
//! wiring injects the Postgres [`Database`](super::Database), tests inject
//! the [`InMemoryStore`](super::InMemoryStore).

use crate::models::{
    Invoice, InvoiceFilter, InvoiceTotals, NewInvoice, NewPerson, PartyRole, Person, PersonTotal,
    PersonYearTotal,
};
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // --- persons ---

    /// Inserts an active person row.
    async fn create_person(&self, input: &NewPerson) -> Result<Person, AppError>;

    /// Looks up a person, excluding archived rows.
    async fn find_active_person(&self, id: i64) -> Result<Option<Person>, AppError>;

    /// All active persons, id order.
    async fn list_active_persons(&self) -> Result<Vec<Person>, AppError>;

    /// Archives an active person; false when no active row matched.
    async fn archive_person(&self, id: i64) -> Result<bool, AppError>;

    /// Active persons with exactly this identification number, id order.
    /// Update history can legitimately yield several rows.
    async fn persons_by_identification(
        &self,
        identification_number: &str,
    ) -> Result<Vec<Person>, AppError>;

    /// Batch lookup with no hidden filter: serves both write-time reference
    /// resolution and read-time nesting, which must see archived persons.
    async fn persons_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Person>, AppError>;

    // --- invoices ---

    /// Inserts an active invoice row.
    async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError>;

    /// Looks up an invoice, excluding archived rows.
    async fn find_active_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError>;

    /// Active invoices satisfying every predicate of `filter`, id order,
    /// truncated to its limit.
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError>;

    /// Archived invoices, id order.
    async fn list_archived_invoices(&self) -> Result<Vec<Invoice>, AppError>;

    /// Archives an active invoice; false when no active row matched.
    async fn archive_invoice(&self, id: i64) -> Result<bool, AppError>;

    /// Restores an archived invoice; None when no archived row matched.
    async fn unarchive_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError>;

    /// Active invoices whose seller is in `seller_ids` or whose buyer is in
    /// `buyer_ids`, id order. An empty slice matches nothing on that side.
    async fn invoices_by_party(
        &self,
        seller_ids: &[i64],
        buyer_ids: &[i64],
    ) -> Result<Vec<Invoice>, AppError>;

    /// Distinct products of active invoices, ordered.
    async fn distinct_products(&self) -> Result<Vec<String>, AppError>;

    // --- aggregates ---

    /// Global sums and count; archived rows join in only when asked.
    /// `current_year_sum` covers invoices issued in or after `current_year`.
    async fn invoice_statistics(
        &self,
        include_archived: bool,
        current_year: i32,
    ) -> Result<InvoiceTotals, AppError>;

    /// All-time price sum per seller over active invoices.
    async fn revenue_by_seller(&self) -> Result<Vec<PersonTotal>, AppError>;

    /// Price sum per person and issue year over active invoices, for the
    /// given role side, restricted to the inclusive year range.
    async fn totals_by_party_and_year(
        &self,
        role: PartyRole,
        first_year: i32,
        last_year: i32,
    ) -> Result<Vec<PersonYearTotal>, AppError>;
}

/// An invoice together with its resolved parties.
#[derive(Debug, Clone)]
pub struct InvoiceWithParties {
    pub invoice: Invoice,
    pub seller: Person,
    pub buyer: Person,
}

/// Resolves sellers and buyers for a batch of invoices with one store
/// lookup. Archived persons resolve here too; a dangling reference is a
/// data-integrity failure, not a 404.
pub async fn expand_parties(
    store: &dyn InvoiceStore,
    invoices: Vec<Invoice>,
) -> Result<Vec<InvoiceWithParties>, AppError> {
    if invoices.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<i64> = invoices
        .iter()
        .flat_map(|invoice| [invoice.seller_id, invoice.buyer_id])
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let persons = store.persons_by_ids(&ids).await?;
    let resolve = |invoice_id: i64, person_id: i64| {
        persons.get(&person_id).cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Invoice {} references missing person {}",
                invoice_id,
                person_id
            ))
        })
    };

    invoices
        .into_iter()
        .map(|invoice| {
            let seller = resolve(invoice.id, invoice.seller_id)?;
            let buyer = resolve(invoice.id, invoice.buyer_id)?;
            Ok(InvoiceWithParties {
                invoice,
                seller,
                buyer,
            })
        })
        .collect()
}
