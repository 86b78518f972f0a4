//! Catalog products as seen by the order core.
//!
//! Catalog CRUD lives elsewhere; this crate only models the product snapshot that order
//! placement reads (price, stock, active flag) and the capability checks it relies on.

pub mod product;

pub use product::{Product, StockError};
