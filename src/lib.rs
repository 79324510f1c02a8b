//! `grainfit` library crate.
//!
//! The binary (`grainfit`) is a thin wrapper around this library so that:
//!
//! - the resolver is testable without spawning processes
//! - front-ends (CLI today) only deal with presentation
//! - the numeric core stays free of I/O

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
