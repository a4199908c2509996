//! Domain logic for trace search and export
//!
//! - `query` - criteria, SQL compilation, row counting and paging
//! - `export` - streaming bulk export to spreadsheet or delimited files
//! - `service` - async facade running both off the runtime threads

pub mod export;
pub mod query;
pub mod service;

pub use service::{CountReport, Navigated, ServiceError, TraceQueryService};
