//! Invoice model and the typed listing filter.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Suffix appended to the source invoice number when a credit note is cut.
pub const CREDIT_NOTE_SUFFIX: &str = "-CN";

/// Days of payment terms granted on a freshly issued credit note.
const CREDIT_NOTE_TERMS_DAYS: i64 = 14;

/// Invoice row. Updates never touch an existing row: a PUT inserts a new row
/// and history is the set of rows sharing an `invoice_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub issued: NaiveDate,
    pub due_date: NaiveDate,
    pub product: String,
    pub price: Decimal,
    pub vat: i32,
    pub note: Option<String>,
    pub hidden: bool,
}

/// Input for inserting an invoice row.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub issued: NaiveDate,
    pub due_date: NaiveDate,
    pub product: String,
    pub price: Decimal,
    pub vat: i32,
    pub note: Option<String>,
}

impl NewInvoice {
    /// Derives the credit note for `source`: negated price, suffixed number,
    /// issue date of `today` with two weeks of terms, and a note pointing
    /// back at the source invoice.
    pub fn credit_note(source: &Invoice, today: NaiveDate) -> Self {
        Self {
            invoice_number: format!("{}{}", source.invoice_number, CREDIT_NOTE_SUFFIX),
            seller_id: source.seller_id,
            buyer_id: source.buyer_id,
            issued: today,
            due_date: today + chrono::Duration::days(CREDIT_NOTE_TERMS_DAYS),
            product: format!("Credit note for: {}", source.product),
            price: -source.price,
            vat: source.vat,
            note: Some(format!("Credit note for invoice {}", source.invoice_number)),
        }
    }
}

/// Typed predicate set for invoice listing. All present predicates AND
/// together over active rows; `limit` truncates after everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceFilter {
    /// Exact match on the buyer's row id.
    pub buyer_id: Option<i64>,
    /// Exact match on the seller's row id.
    pub seller_id: Option<i64>,
    /// Exact, case-sensitive product match.
    pub product: Option<String>,
    /// Substring match on the buyer's identification number.
    pub buyer_ic: Option<String>,
    /// Substring match on the seller's identification number.
    pub seller_ic: Option<String>,
    /// Diacritic- and case-insensitive product substring match.
    pub product_search: Option<String>,
    /// Inclusive lower price bound.
    pub min_price: Option<Decimal>,
    /// Inclusive upper price bound.
    pub max_price: Option<Decimal>,
    /// Result truncation, applied after all filtering.
    pub limit: Option<usize>,
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
}

impl InvoiceFilter {
    /// Builds a filter from raw query parameters. Lenient by contract:
    /// absent, empty, and unparseable values impose no constraint, and
    /// unknown parameters are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            buyer_id: param(params, "buyerID").and_then(|s| s.parse().ok()),
            seller_id: param(params, "sellerID").and_then(|s| s.parse().ok()),
            product: param(params, "product").map(str::to_string),
            buyer_ic: param(params, "buyerIC").map(str::to_string),
            seller_ic: param(params, "sellerIC").map(str::to_string),
            product_search: param(params, "productSearch").map(str::to_string),
            min_price: param(params, "minPrice").and_then(|s| s.parse().ok()),
            max_price: param(params, "maxPrice").and_then(|s| s.parse().ok()),
            limit: param(params, "limit")
                .and_then(|s| s.parse::<i64>().ok())
                .filter(|n| *n >= 0)
                .map(|n| n as usize),
        }
    }

    /// True when no predicate beyond the active-row baseline is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_invoice() -> Invoice {
        Invoice {
            id: 7,
            invoice_number: "2024001".to_string(),
            seller_id: 1,
            buyer_id: 2,
            issued: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            product: "Consulting".to_string(),
            price: Decimal::new(10000, 2),
            vat: 21,
            note: None,
            hidden: false,
        }
    }

    #[test]
    fn parses_every_known_parameter() {
        let filter = InvoiceFilter::from_params(&params(&[
            ("buyerID", "2"),
            ("sellerID", "1"),
            ("product", "Consulting"),
            ("buyerIC", "1234"),
            ("sellerIC", "5678"),
            ("productSearch", "cafe"),
            ("minPrice", "10.50"),
            ("maxPrice", "99.99"),
            ("limit", "5"),
        ]));

        assert_eq!(filter.buyer_id, Some(2));
        assert_eq!(filter.seller_id, Some(1));
        assert_eq!(filter.product.as_deref(), Some("Consulting"));
        assert_eq!(filter.buyer_ic.as_deref(), Some("1234"));
        assert_eq!(filter.seller_ic.as_deref(), Some("5678"));
        assert_eq!(filter.product_search.as_deref(), Some("cafe"));
        assert_eq!(filter.min_price, Some("10.50".parse().unwrap()));
        assert_eq!(filter.max_price, Some("99.99".parse().unwrap()));
        assert_eq!(filter.limit, Some(5));
    }

    #[test]
    fn unparseable_values_are_absent_constraints() {
        let filter = InvoiceFilter::from_params(&params(&[
            ("buyerID", "abc"),
            ("minPrice", "cheap"),
            ("maxPrice", "1e3"),
            ("limit", "-2"),
        ]));

        assert!(filter.is_empty());
    }

    #[test]
    fn empty_strings_and_unknown_keys_are_ignored() {
        let filter = InvoiceFilter::from_params(&params(&[
            ("product", ""),
            ("buyerIC", ""),
            ("sort", "price"),
        ]));

        assert!(filter.is_empty());
    }

    #[test]
    fn limit_zero_is_kept() {
        let filter = InvoiceFilter::from_params(&params(&[("limit", "0")]));
        assert_eq!(filter.limit, Some(0));
    }

    #[test]
    fn credit_note_negates_price_and_suffixes_number() {
        let source = sample_invoice();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let note = NewInvoice::credit_note(&source, today);

        assert_eq!(note.invoice_number, "2024001-CN");
        assert_eq!(note.price, Decimal::new(-10000, 2));
        assert_eq!(note.product, "Credit note for: Consulting");
        assert_eq!(note.issued, today);
        assert_eq!(note.due_date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(note.vat, source.vat);
        assert_eq!(note.seller_id, source.seller_id);
        assert_eq!(note.buyer_id, source.buyer_id);
        assert_eq!(note.note.as_deref(), Some("Credit note for invoice 2024001"));
    }
}
