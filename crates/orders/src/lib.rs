//! Orders domain module.
//!
//! This crate contains the business rules for placing and reading orders, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage). Storage adapters
//! and the transactional placement engine live in `storefront-infra`.

pub mod cart;
pub mod error;
pub mod order;
pub mod order_number;
pub mod placement;

pub use cart::{CartLine, ShippingInfo};
pub use error::OrderError;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
pub use order_number::{OrderNumber, OrderNumberGenerator, RandomOrderNumbers};
pub use placement::plan_order;
