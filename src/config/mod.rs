//! Configuration constants for the storage core.
//!
//! Everything lives in [`constants`]; import from there rather than
//! redefining values locally.

mod constants;

pub use constants::*;
