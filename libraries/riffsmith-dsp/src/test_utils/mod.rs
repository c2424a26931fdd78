//! Test utilities for the guitar chain
//!
//! Signal generators and analysis helpers shared by unit tests, integration
//! tests and benches (enable the `test-utils` feature outside this crate).

pub mod analysis;
pub mod signals;

pub use analysis::*;
pub use signals::*;
