//! Mathematical utilities: least squares and fit-domain conditioning.

pub mod ols;
pub mod window;

pub use ols::*;
pub use window::*;
