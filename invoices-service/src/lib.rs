//! Invoices Service - Invoice and person records over HTTP with JSON.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
