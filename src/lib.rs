//! Quoteline Library
//!
//! Client-side composition core for ERP quotations: an owned in-memory line
//! store, a load/save reconciliation engine against the quotation service,
//! and a pure presentation projector shared by the interactive table view
//! and the PDF export.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod client;
pub mod config;
pub mod dto;
pub mod errors;
pub mod events;
pub mod models;
pub mod pdf;
pub mod projector;
pub mod reconcile;
pub mod session;
pub mod store;

pub use client::{HttpQuotationClient, LineEdit, QuotationApi};
pub use errors::ServiceError;
pub use models::{
    CatalogItem, LineId, LineKind, QuotationHeader, QuotationLine, QuotationStatus, RawMaterial,
};
pub use session::QuotationSession;
pub use store::LineStore;
