//! Person model: the companies and individuals invoices are written between.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Country a person is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Country {
    #[default]
    #[serde(rename = "CZECHIA")]
    Czechia,
    #[serde(rename = "SLOVAKIA")]
    Slovakia,
}

impl Country {
    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Czechia => "CZECHIA",
            Country::Slovakia => "SLOVAKIA",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "SLOVAKIA" => Country::Slovakia,
            _ => Country::Czechia,
        }
    }
}

/// Person row. Soft-deleted rows keep `hidden = true` and drop out of every
/// normal read path; invoices may still reference them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Person {
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
    pub country: String,
    pub note: Option<String>,
    pub hidden: bool,
}

/// Input for inserting a person row. Rows always start out active.
#[derive(Debug, Clone)]
pub struct NewPerson {
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
    pub country: String,
    pub note: Option<String>,
}
