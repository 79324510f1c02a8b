//! Input/output helpers.
//!
//! - dataset CSV ingest + validation (`ingest`)
//! - report exports (JSON/CSV) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
