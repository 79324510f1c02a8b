//! Terminal reporting for fits and datasets.

pub mod format;

pub use format::*;
