//! service-core: infrastructure shared by the invoice records services.
//!
//! Holds the pieces that are service-agnostic: the error taxonomy and its
//! HTTP mapping, the base configuration section, request-id and HTTP-metrics
//! middleware, and the validated-JSON extractor.
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;

pub use error::AppError;
