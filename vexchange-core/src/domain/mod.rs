//! Domain types for the virtual exchange.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;

pub use bar::Bar;
pub use fill::{FeeRole, Fill};
pub use ids::OrderId;
pub use order::{Disposition, Order, OrderKind, OrderRequest, OrderStatus, RejectReason, Side};
