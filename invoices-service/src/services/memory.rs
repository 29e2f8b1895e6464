//! In-memory store: the reference implementation of [`InvoiceStore`].
//!
//! Backs the integration test suite and local experimentation. Keeps the
//! same observable semantics as the Postgres store, including foreign-key
//! enforcement on invoice creation and id-ordered listings.

use crate::models::{
    Invoice, InvoiceFilter, InvoiceTotals, NewInvoice, NewPerson, PartyRole, Person, PersonTotal,
    PersonYearTotal,
};
use crate::services::search;
use crate::services::store::InvoiceStore;
use async_trait::async_trait;
use chrono::Datelike;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    persons: BTreeMap<i64, Person>,
    invoices: BTreeMap<i64, Invoice>,
    next_person_id: i64,
    next_invoice_id: i64,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, AppError> {
        self.inner
            .read()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, AppError> {
        self.inner
            .write()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Store lock poisoned")))
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }

    // --- persons ---

    async fn create_person(&self, input: &NewPerson) -> Result<Person, AppError> {
        let mut inner = self.write()?;
        inner.next_person_id += 1;
        let person = Person {
            id: inner.next_person_id,
            name: input.name.clone(),
            identification_number: input.identification_number.clone(),
            tax_number: input.tax_number.clone(),
            account_number: input.account_number.clone(),
            bank_code: input.bank_code.clone(),
            iban: input.iban.clone(),
            telephone: input.telephone.clone(),
            mail: input.mail.clone(),
            street: input.street.clone(),
            zip: input.zip.clone(),
            city: input.city.clone(),
            country: input.country.clone(),
            note: input.note.clone(),
            hidden: false,
        };
        inner.persons.insert(person.id, person.clone());
        Ok(person)
    }

    async fn find_active_person(&self, id: i64) -> Result<Option<Person>, AppError> {
        let inner = self.read()?;
        Ok(inner.persons.get(&id).filter(|p| !p.hidden).cloned())
    }

    async fn list_active_persons(&self) -> Result<Vec<Person>, AppError> {
        let inner = self.read()?;
        Ok(inner
            .persons
            .values()
            .filter(|p| !p.hidden)
            .cloned()
            .collect())
    }

    async fn archive_person(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.write()?;
        match inner.persons.get_mut(&id) {
            Some(person) if !person.hidden => {
                person.hidden = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn persons_by_identification(
        &self,
        identification_number: &str,
    ) -> Result<Vec<Person>, AppError> {
        let inner = self.read()?;
        Ok(inner
            .persons
            .values()
            .filter(|p| !p.hidden && p.identification_number == identification_number)
            .cloned()
            .collect())
    }

    async fn persons_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Person>, AppError> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.persons.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    // --- invoices ---

    async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let mut inner = self.write()?;
        if !inner.persons.contains_key(&input.seller_id)
            || !inner.persons.contains_key(&input.buyer_id)
        {
            return Err(AppError::bad_request("Unknown seller or buyer reference"));
        }

        inner.next_invoice_id += 1;
        let invoice = Invoice {
            id: inner.next_invoice_id,
            invoice_number: input.invoice_number.clone(),
            seller_id: input.seller_id,
            buyer_id: input.buyer_id,
            issued: input.issued,
            due_date: input.due_date,
            product: input.product.clone(),
            price: input.price,
            vat: input.vat,
            note: input.note.clone(),
            hidden: false,
        };
        inner.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn find_active_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let inner = self.read()?;
        Ok(inner.invoices.get(&id).filter(|i| !i.hidden).cloned())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let inner = self.read()?;
        let mut matched = Vec::new();
        for invoice in inner.invoices.values().filter(|i| !i.hidden) {
            let seller = inner.persons.get(&invoice.seller_id).ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Invoice {} references missing person {}",
                    invoice.id,
                    invoice.seller_id
                ))
            })?;
            let buyer = inner.persons.get(&invoice.buyer_id).ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Invoice {} references missing person {}",
                    invoice.id,
                    invoice.buyer_id
                ))
            })?;
            if search::matches_filter(filter, invoice, seller, buyer) {
                matched.push(invoice.clone());
            }
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn list_archived_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let inner = self.read()?;
        Ok(inner
            .invoices
            .values()
            .filter(|i| i.hidden)
            .cloned()
            .collect())
    }

    async fn archive_invoice(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.write()?;
        match inner.invoices.get_mut(&id) {
            Some(invoice) if !invoice.hidden => {
                invoice.hidden = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unarchive_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let mut inner = self.write()?;
        match inner.invoices.get_mut(&id) {
            Some(invoice) if invoice.hidden => {
                invoice.hidden = false;
                Ok(Some(invoice.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn invoices_by_party(
        &self,
        seller_ids: &[i64],
        buyer_ids: &[i64],
    ) -> Result<Vec<Invoice>, AppError> {
        let inner = self.read()?;
        Ok(inner
            .invoices
            .values()
            .filter(|i| {
                !i.hidden && (seller_ids.contains(&i.seller_id) || buyer_ids.contains(&i.buyer_id))
            })
            .cloned()
            .collect())
    }

    async fn distinct_products(&self) -> Result<Vec<String>, AppError> {
        let inner = self.read()?;
        let products: BTreeSet<String> = inner
            .invoices
            .values()
            .filter(|i| !i.hidden)
            .map(|i| i.product.clone())
            .collect();
        Ok(products.into_iter().collect())
    }

    // --- aggregates ---

    async fn invoice_statistics(
        &self,
        include_archived: bool,
        current_year: i32,
    ) -> Result<InvoiceTotals, AppError> {
        let inner = self.read()?;
        let mut totals = InvoiceTotals {
            current_year_sum: Decimal::ZERO,
            all_time_sum: Decimal::ZERO,
            invoices_count: 0,
        };
        for invoice in inner
            .invoices
            .values()
            .filter(|i| include_archived || !i.hidden)
        {
            totals.all_time_sum += invoice.price;
            totals.invoices_count += 1;
            if invoice.issued.year() >= current_year {
                totals.current_year_sum += invoice.price;
            }
        }
        Ok(totals)
    }

    async fn revenue_by_seller(&self) -> Result<Vec<PersonTotal>, AppError> {
        let inner = self.read()?;
        let mut totals: BTreeMap<i64, Decimal> = BTreeMap::new();
        for invoice in inner.invoices.values().filter(|i| !i.hidden) {
            *totals.entry(invoice.seller_id).or_default() += invoice.price;
        }
        Ok(totals
            .into_iter()
            .map(|(person_id, total)| PersonTotal { person_id, total })
            .collect())
    }

    async fn totals_by_party_and_year(
        &self,
        role: PartyRole,
        first_year: i32,
        last_year: i32,
    ) -> Result<Vec<PersonYearTotal>, AppError> {
        let inner = self.read()?;
        let mut totals: BTreeMap<(i64, i32), Decimal> = BTreeMap::new();
        for invoice in inner.invoices.values().filter(|i| !i.hidden) {
            let year = invoice.issued.year();
            if year < first_year || year > last_year {
                continue;
            }
            let person_id = match role {
                PartyRole::Seller => invoice.seller_id,
                PartyRole::Buyer => invoice.buyer_id,
            };
            *totals.entry((person_id, year)).or_default() += invoice.price;
        }
        Ok(totals
            .into_iter()
            .map(|((person_id, year), total)| PersonYearTotal {
                person_id,
                year,
                total,
            })
            .collect())
    }
}
