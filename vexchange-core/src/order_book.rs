//! Order book: owns every order and computes fee-adjusted fills.
//!
//! The book manages:
//! - Sequential id assignment (from 1, never reused)
//! - The open set, iterated in submission order
//! - Exactly-once transition from open to closed / canceled / rejected
//! - Fill computation (position and cash deltas, fees) and the fill log
//!
//! The book does NOT consult balances or margin. Whether a fill may be
//! applied is the controller's decision, made against the ledger.

use crate::domain::{
    Disposition, FeeRole, Fill, Order, OrderId, OrderKind, OrderRequest, OrderStatus, Side,
};
use crate::ledger::FeeSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price and rate used for the fee of a triggered stop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopFeeBasis {
    /// Taker rate on the triggering price, the same basis as the notional.
    #[default]
    Trigger,
    /// Maker rate on the resting stop price while the notional uses the
    /// triggering price.
    Resting,
}

/// Preview of a fill, computed without touching the book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillQuote {
    pub side: Side,
    pub size: f64,
    /// Price the notional is computed at.
    pub price: f64,
    pub fee: f64,
    pub fee_role: FeeRole,
    /// `+size` for long, `-size` for short.
    pub position_delta: f64,
    /// `-(size * price) - fee` for long, `size * price - fee` for short.
    pub cash_delta: f64,
}

impl FillQuote {
    /// Cash leg in the form `Ledger::can_settle` expects: spent for long
    /// (notional plus fee), received for short (notional minus fee).
    pub fn cash_leg(&self) -> f64 {
        -self.side.sign() * self.cash_delta
    }
}

/// The order book: open set plus the three terminal sets.
#[derive(Debug, Clone)]
pub struct OrderBook {
    fees: FeeSchedule,
    stop_fee_basis: StopFeeBasis,
    next_id: u64,
    /// Clock used to stamp withdrawals and fills.
    clock: usize,
    /// Open orders. Ids are monotonic, so key order is submission order.
    open: BTreeMap<OrderId, Order>,
    closed: Vec<Order>,
    canceled: Vec<Order>,
    rejected: Vec<Order>,
    fills: Vec<Fill>,
}

impl OrderBook {
    pub fn new(fees: FeeSchedule, stop_fee_basis: StopFeeBasis) -> Self {
        Self {
            fees,
            stop_fee_basis,
            next_id: 1,
            clock: 0,
            open: BTreeMap::new(),
            closed: Vec::new(),
            canceled: Vec::new(),
            rejected: Vec::new(),
            fills: Vec::new(),
        }
    }

    pub fn fees(&self) -> FeeSchedule {
        self.fees
    }

    /// Move the book's clock forward. Called by the controller every tick.
    pub fn set_clock(&mut self, clock: usize) {
        self.clock = clock;
    }

    // ── Submission and withdrawal ──────────────────────────────────────

    /// Store a new open order stamped with `clock`. No margin or matching
    /// evaluation happens here.
    pub fn submit(&mut self, request: OrderRequest, clock: usize) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        self.clock = clock;
        self.open.insert(id, Order::new(id, request, clock));
        id
    }

    /// Move an open order into the terminal set named by `disposition`.
    ///
    /// Returns `false` (and does nothing) if `id` is not open, so a second
    /// withdrawal of the same order is harmless.
    pub fn withdraw(&mut self, id: OrderId, disposition: Disposition) -> bool {
        let Some(mut order) = self.open.remove(&id) else {
            return false;
        };
        order.status = disposition.status();
        order.closed_at = Some(self.clock);
        match disposition {
            Disposition::Closed => self.closed.push(order),
            Disposition::Canceled => self.canceled.push(order),
            Disposition::Rejected(reason) => {
                order.reject_reason = Some(reason);
                self.rejected.push(order);
            }
        }
        true
    }

    // ── Fills ──────────────────────────────────────────────────────────

    /// Compute the fill an open order would get at `reference_price`, by type:
    /// - market: notional and taker fee at the reference price
    /// - limit: notional and maker fee at the resting price
    /// - stop: notional at the reference price, fee per `StopFeeBasis`
    pub fn quote(&self, id: OrderId, reference_price: f64) -> Option<FillQuote> {
        let order = self.open.get(&id)?;
        let (price, fee_price, fee_role) = match order.kind {
            OrderKind::Market => (reference_price, reference_price, FeeRole::Taker),
            OrderKind::Limit { price } => (price, price, FeeRole::Maker),
            OrderKind::Stop { price } => match self.stop_fee_basis {
                StopFeeBasis::Trigger => (reference_price, reference_price, FeeRole::Taker),
                StopFeeBasis::Resting => (reference_price, price, FeeRole::Maker),
            },
        };
        Some(self.build_quote(order, price, fee_price, fee_role))
    }

    fn build_quote(&self, order: &Order, price: f64, fee_price: f64, fee_role: FeeRole) -> FillQuote {
        let sign = order.side.sign();
        let fee = self.fees.fee(order.size, fee_price, fee_role);
        FillQuote {
            side: order.side,
            size: order.size,
            price,
            fee,
            fee_role,
            position_delta: sign * order.size,
            cash_delta: -sign * order.size * price - fee,
        }
    }

    /// Fill a market order at `reference_price` with the taker fee.
    /// Returns `(position_delta, cash_delta)`, or `(0, 0)` if `id` is not open.
    pub fn fill_market(&mut self, id: OrderId, reference_price: f64) -> (f64, f64) {
        let quote = self.open.get(&id).map(|order| {
            self.build_quote(order, reference_price, reference_price, FeeRole::Taker)
        });
        self.commit(id, quote)
    }

    /// Fill a limit order at its resting price with the maker fee.
    pub fn fill_limit(&mut self, id: OrderId) -> (f64, f64) {
        let quote = self.open.get(&id).and_then(|order| {
            let price = order.kind.price()?;
            Some(self.build_quote(order, price, price, FeeRole::Maker))
        });
        self.commit(id, quote)
    }

    /// Fill a stop order: notional at the triggering `reference_price`, fee per
    /// the configured `StopFeeBasis`.
    pub fn fill_stop(&mut self, id: OrderId, reference_price: f64) -> (f64, f64) {
        let quote = self
            .open
            .get(&id)
            .filter(|order| matches!(order.kind, OrderKind::Stop { .. }))
            .and_then(|_| self.quote(id, reference_price));
        self.commit(id, quote)
    }

    /// Type-dispatched fill.
    pub fn fill(&mut self, id: OrderId, reference_price: f64) -> (f64, f64) {
        match self.open.get(&id).map(|o| o.kind) {
            Some(OrderKind::Market) => self.fill_market(id, reference_price),
            Some(OrderKind::Limit { .. }) => self.fill_limit(id),
            Some(OrderKind::Stop { .. }) => self.fill_stop(id, reference_price),
            None => (0.0, 0.0),
        }
    }

    fn commit(&mut self, id: OrderId, quote: Option<FillQuote>) -> (f64, f64) {
        let Some(quote) = quote else {
            return (0.0, 0.0);
        };
        let Some(kind) = self.open.get(&id).map(|o| o.kind) else {
            return (0.0, 0.0);
        };
        self.fills.push(Fill {
            order_id: id,
            clock: self.clock,
            side: quote.side,
            kind,
            size: quote.size,
            price: quote.price,
            fee: quote.fee,
            fee_role: quote.fee_role,
            position_delta: quote.position_delta,
            cash_delta: quote.cash_delta,
        });
        self.withdraw(id, Disposition::Closed);
        (quote.position_delta, quote.cash_delta)
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Look up an order in any set.
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.open.get(&id).or_else(|| {
            self.closed
                .iter()
                .chain(&self.canceled)
                .chain(&self.rejected)
                .find(|o| o.id == id)
        })
    }

    pub fn status_of(&self, id: OrderId) -> Option<OrderStatus> {
        self.get(id).map(|o| o.status)
    }

    /// Open orders in submission order.
    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.open.values()
    }

    /// Snapshot of open ids, for scans that withdraw while iterating.
    pub fn open_ids(&self) -> Vec<OrderId> {
        self.open.keys().copied().collect()
    }

    pub fn is_open(&self, id: OrderId) -> bool {
        self.open.contains_key(&id)
    }

    pub fn closed_orders(&self) -> &[Order] {
        &self.closed
    }

    pub fn canceled_orders(&self) -> &[Order] {
        &self.canceled
    }

    pub fn rejected_orders(&self) -> &[Order] {
        &self.rejected
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
