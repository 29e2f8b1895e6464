//! Services module for invoices-service.

pub mod clock;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod search;
pub mod statistics;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use database::Database;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{expand_parties, InvoiceStore, InvoiceWithParties};
