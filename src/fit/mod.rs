//! Mixture fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate and trim a sample into a fitting window
//! - run basin hopping over local SQP solves, then a final refinement
//! - derive the report (series, MSE, per-component statistics)
//! - notify observers and honour cancellation

pub mod basin_hopping;
pub mod objective;
pub mod observer;
pub mod report;
pub mod resolver;
pub mod sqp;
pub mod validate;
pub mod window;

pub use observer::*;
pub use resolver::*;
pub use window::*;
