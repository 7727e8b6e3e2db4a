//! Order types and the order lifecycle.

use super::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an order. Long buys exposure, short sells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderKind {
    /// Fill immediately at the reference price.
    Market,
    /// Rest until the price moves through `price` in the order's favor, fill at `price`.
    Limit { price: f64 },
    /// Rest until the price moves through `price` against the order, fill at the
    /// triggering price.
    Stop { price: f64 },
}

impl OrderKind {
    /// Resting price for limit/stop orders, `None` for market.
    pub fn price(&self) -> Option<f64> {
        match self {
            OrderKind::Market => None,
            OrderKind::Limit { price } | OrderKind::Stop { price } => Some(*price),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit { .. } => "limit",
            OrderKind::Stop { .. } => "stop",
        }
    }
}

/// An order as submitted by the caller, before an identifier is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: Side,
    #[serde(flatten)]
    pub kind: OrderKind,
    pub size: f64,
}

impl OrderRequest {
    pub fn market(side: Side, size: f64) -> Self {
        Self {
            side,
            kind: OrderKind::Market,
            size,
        }
    }

    pub fn limit(side: Side, size: f64, price: f64) -> Self {
        Self {
            side,
            kind: OrderKind::Limit { price },
            size,
        }
    }

    pub fn stop(side: Side, size: f64, price: f64) -> Self {
        Self {
            side,
            kind: OrderKind::Stop { price },
            size,
        }
    }

    /// Checks the request is well-formed: positive finite size and, for
    /// resting orders, a positive finite price.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(format!("size must be positive and finite, got {}", self.size));
        }
        if let Some(price) = self.kind.price() {
            if !(price.is_finite() && price > 0.0) {
                return Err(format!(
                    "{} price must be positive and finite, got {price}",
                    self.kind.label()
                ));
            }
        }
        Ok(())
    }
}

/// Order lifecycle states. `Open` transitions exactly once to one of the
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    /// Filled.
    Closed,
    Canceled,
    Rejected,
}

/// Terminal set an order is withdrawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Closed,
    Canceled,
    Rejected(RejectReason),
}

impl Disposition {
    pub fn status(self) -> OrderStatus {
        match self {
            Disposition::Closed => OrderStatus::Closed,
            Disposition::Canceled => OrderStatus::Canceled,
            Disposition::Rejected(_) => OrderStatus::Rejected,
        }
    }
}

/// Which margin gate refused the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Initial margin check at submission.
    InitialMargin,
    /// Projected post-fill balance would go negative.
    Settlement,
}

/// A single order in the order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub kind: OrderKind,
    pub size: f64,
    pub status: OrderStatus,
    /// Clock at submission.
    pub submitted_at: usize,
    /// Clock at which the order left the open set.
    pub closed_at: Option<usize>,
    pub reject_reason: Option<RejectReason>,
}

impl Order {
    pub fn new(id: OrderId, request: OrderRequest, clock: usize) -> Self {
        Self {
            id,
            side: request.side,
            kind: request.kind,
            size: request.size,
            status: OrderStatus::Open,
            submitted_at: clock,
            closed_at: None,
            reject_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Whether the order is executable at `price`.
    ///
    /// Limit long: resting >= price. Limit short: resting <= price.
    /// Stop long: resting <= price. Stop short: resting >= price.
    /// Market orders are always executable.
    pub fn is_triggered(&self, price: f64) -> bool {
        match (self.kind, self.side) {
            (OrderKind::Market, _) => true,
            (OrderKind::Limit { price: resting }, Side::Long) => resting >= price,
            (OrderKind::Limit { price: resting }, Side::Short) => resting <= price,
            (OrderKind::Stop { price: resting }, Side::Long) => resting <= price,
            (OrderKind::Stop { price: resting }, Side::Short) => resting >= price,
        }
    }
}
