//! Component distribution families and the mixture model.
//!
//! Families are implemented as small, pure functions so that the optimizer
//! can stay generic over the parameter vector.

pub mod mixture;
pub mod normal;
pub mod weibull;

pub use mixture::*;
