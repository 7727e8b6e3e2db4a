use crate::domain::ids::OrderId;
use crate::domain::order::{OrderKind, Side};
use serde::{Deserialize, Serialize};

/// Fee role of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRole {
    /// Resting order filled by incoming price movement.
    Maker,
    /// Order executing immediately against the current price.
    Taker,
}

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub clock: usize,
    pub side: Side,
    pub kind: OrderKind,
    pub size: f64,
    /// Price the notional was computed at.
    pub price: f64,
    pub fee: f64,
    pub fee_role: FeeRole,
    pub position_delta: f64,
    pub cash_delta: f64,
}
