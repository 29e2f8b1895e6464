//! Product search support: diacritic folding and filter evaluation.
//!
//! The SQL engine has no accent folding, so the `productSearch` predicate is
//! always evaluated here in application code, over candidates the store has
//! already narrowed down with its native predicates.

use crate::models::{Invoice, InvoiceFilter, Person};
use unicode_normalization::UnicodeNormalization;

/// Folds a string for accent- and case-insensitive comparison: NFD
/// decomposition, combining marks stripped, lowercased.
pub fn fold_diacritics(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Substring test with `fold_diacritics` applied to both sides.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    fold_diacritics(haystack).contains(&fold_diacritics(needle))
}

/// Escapes `%`, `_` and the escape character itself so a user-supplied
/// needle can sit inside a `LIKE '%…%' ESCAPE '!'` pattern.
pub fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '!') {
            out.push('!');
        }
        out.push(c);
    }
    out
}

/// The product-search predicate alone; vacuously true when the filter
/// carries none.
pub fn matches_product_search(filter: &InvoiceFilter, product: &str) -> bool {
    match &filter.product_search {
        Some(needle) => contains_folded(product, needle),
        None => true,
    }
}

/// Full filter predicate over one invoice and its joined parties. The
/// in-memory store runs rows through this directly; the SQL store pushes
/// everything except the product search into the query and must stay
/// equivalent.
pub fn matches_filter(
    filter: &InvoiceFilter,
    invoice: &Invoice,
    seller: &Person,
    buyer: &Person,
) -> bool {
    if let Some(id) = filter.buyer_id {
        if invoice.buyer_id != id {
            return false;
        }
    }
    if let Some(id) = filter.seller_id {
        if invoice.seller_id != id {
            return false;
        }
    }
    if let Some(product) = &filter.product {
        if invoice.product != *product {
            return false;
        }
    }
    if let Some(needle) = &filter.buyer_ic {
        if !buyer.identification_number.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(needle) = &filter.seller_ic {
        if !seller.identification_number.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(min) = filter.min_price {
        if invoice.price < min {
            return false;
        }
    }
    if let Some(max) = filter.max_price {
        if invoice.price > max {
            return false;
        }
    }
    matches_product_search(filter, &invoice.product)
}
