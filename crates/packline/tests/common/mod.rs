//! Shared helpers for packline integration tests.
//!
//! - `TestHarness`: a file-backed store in a temp directory
//! - `SheetBuilder`: order and mapping sheets as grids, CSV or XLSX bytes

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
