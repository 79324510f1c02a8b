//! Numerical utilities: least squares, QP subproblems and monotone interpolation.

pub mod interp;
pub mod lstsq;
pub mod qp;

pub use interp::*;
pub use lstsq::*;
pub use qp::*;
