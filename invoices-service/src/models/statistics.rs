//! Aggregate row shapes produced by the store.

use rust_decimal::Decimal;
use sqlx::FromRow;

/// Which side of an invoice a person sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    Seller,
    Buyer,
}

/// Global invoice totals.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct InvoiceTotals {
    pub current_year_sum: Decimal,
    pub all_time_sum: Decimal,
    pub invoices_count: i64,
}

/// All-time price sum for one person in one role.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PersonTotal {
    pub person_id: i64,
    pub total: Decimal,
}

/// Price sum for one person, one role, one issue year.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PersonYearTotal {
    pub person_id: i64,
    pub year: i32,
    pub total: Decimal,
}
