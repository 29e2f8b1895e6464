//! Domain models for invoices-service.

mod invoice;
mod person;
mod statistics;

pub use invoice::{CREDIT_NOTE_SUFFIX, Invoice, InvoiceFilter, NewInvoice};
pub use person::{Country, NewPerson, Person};
pub use statistics::{InvoiceTotals, PartyRole, PersonTotal, PersonYearTotal};
