//! Canonical order-line records and the closed vocabularies they use.

pub mod channel;
pub mod line;

pub use channel::{Channel, ALL_STOCK, GENERAL};
pub use line::{master_sku, Category, LineRevision, LineStatus, OrderLine};
