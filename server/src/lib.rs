//! SMT trace log search, paging and bulk export

pub mod app;
pub mod core;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod utils;
