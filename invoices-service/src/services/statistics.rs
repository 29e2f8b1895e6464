//! Statistics assembly: pure shaping of store aggregates into report
//! responses. No I/O here; the store hands in grouped sums and this module
//! window-fills them, so it stays unit-testable on its own.

use crate::models::{Person, PersonTotal, PersonYearTotal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Years covered by the per-year report windows, current year included.
const YEAR_WINDOW: i32 = 5;

/// First year of the window ending at `current_year`.
pub fn window_start(current_year: i32) -> i32 {
    current_year - (YEAR_WINDOW - 1)
}

/// The inclusive report window, oldest year first.
pub fn recent_years(current_year: i32) -> Vec<i32> {
    (window_start(current_year)..=current_year).collect()
}

/// Money crosses to the JSON number domain exactly here.
pub fn to_amount(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn zero_filled(years: &[i32]) -> BTreeMap<i32, f64> {
    years.iter().map(|year| (*year, 0.0)).collect()
}

fn fill_window(
    years: &[i32],
    person_id: i64,
    yearly: &[PersonYearTotal],
) -> BTreeMap<i32, f64> {
    let mut per_year = zero_filled(years);
    for row in yearly.iter().filter(|row| row.person_id == person_id) {
        if let Some(slot) = per_year.get_mut(&row.year) {
            *slot = to_amount(row.total);
        }
    }
    per_year
}

/// Report ordering: by name, ties broken by id. Plain string order, no
/// locale collation.
pub fn order_by_name(mut persons: Vec<Person>) -> Vec<Person> {
    persons.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    persons
}

/// One company's slice of the revenue report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRevenue {
    pub person_id: i64,
    pub person_name: String,
    pub revenue: f64,
    pub revenue_per_year: BTreeMap<i32, f64>,
}

/// Response shape of the per-company revenue report.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueByCompany {
    pub years: Vec<i32>,
    pub companies: Vec<CompanyRevenue>,
}

/// One entry of the per-person revenue/expense report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonStatistics {
    pub person_id: i64,
    pub person_name: String,
    pub revenue: f64,
    pub revenue_per_year: BTreeMap<i32, f64>,
    pub expenses_per_year: BTreeMap<i32, f64>,
}

/// Builds the revenue report: every person appears, zero-filled across the
/// whole window, even without a single invoice.
pub fn build_revenue_by_company(
    years: &[i32],
    persons: Vec<Person>,
    all_time: &[PersonTotal],
    yearly: &[PersonYearTotal],
) -> RevenueByCompany {
    let totals: HashMap<i64, Decimal> = all_time
        .iter()
        .map(|row| (row.person_id, row.total))
        .collect();

    let companies = order_by_name(persons)
        .into_iter()
        .map(|person| CompanyRevenue {
            revenue: totals.get(&person.id).copied().map(to_amount).unwrap_or(0.0),
            revenue_per_year: fill_window(years, person.id, yearly),
            person_id: person.id,
            person_name: person.name,
        })
        .collect();

    RevenueByCompany {
        years: years.to_vec(),
        companies,
    }
}

/// Builds the per-person report with both role sides of the same window.
pub fn build_person_statistics(
    years: &[i32],
    persons: Vec<Person>,
    all_time: &[PersonTotal],
    revenue_yearly: &[PersonYearTotal],
    expense_yearly: &[PersonYearTotal],
) -> Vec<PersonStatistics> {
    let totals: HashMap<i64, Decimal> = all_time
        .iter()
        .map(|row| (row.person_id, row.total))
        .collect();

    order_by_name(persons)
        .into_iter()
        .map(|person| PersonStatistics {
            revenue: totals.get(&person.id).copied().map(to_amount).unwrap_or(0.0),
            revenue_per_year: fill_window(years, person.id, revenue_yearly),
            expenses_per_year: fill_window(years, person.id, expense_yearly),
            person_id: person.id,
            person_name: person.name,
        })
        .collect()
}
