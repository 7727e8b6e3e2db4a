//! Simulation controller: drives the feed, the order book and the ledger.
//!
//! Each `tick()` runs one step:
//!
//! 1. Advance the feed (`DataExhausted` ends the run)
//! 2. Read the new reference price (the bar's close)
//! 3. Scan a snapshot of the open orders; every triggered order is quoted,
//!    gated with `can_settle`, then filled or rejected
//! 4. Check maintenance margin; liquidate only if `auto_liquidate` is set
//!
//! Margin rejections never surface as errors. They move the order into the
//! rejected set with a `RejectReason` and show up in the returned reports.

use crate::config::{ConfigError, SimConfig};
use crate::domain::{
    Bar, Disposition, Fill, Order, OrderId, OrderKind, OrderRequest, RejectReason, Side,
};
use crate::error::SimError;
use crate::feed::MarketFeed;
use crate::ledger::{Ledger, SettlementMode};
use crate::order_book::OrderBook;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What happened to a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Market order executed immediately.
    Filled,
    /// Limit/stop order waiting in the open set.
    Resting,
    Rejected(RejectReason),
}

/// Result of `Simulator::receive_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub id: OrderId,
    pub outcome: SubmissionOutcome,
}

impl Submission {
    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, SubmissionOutcome::Rejected(_))
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub clock: usize,
    pub price: f64,
    /// Resting orders filled this tick, in scan order.
    pub filled: Vec<OrderId>,
    /// Triggered orders that failed the settlement gate.
    pub rejected: Vec<OrderId>,
    /// Result of the maintenance margin check after all fills.
    pub maintenance_ok: bool,
    /// Liquidation order submitted this tick, if any.
    pub liquidation: Option<Submission>,
}

/// Read-only projection of the simulator for presentation and logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub clock: usize,
    /// `None` before the first tick.
    pub price: Option<f64>,
    /// `cash + asset * price`, `None` before the first tick.
    pub total_asset_value: Option<f64>,
    pub net_position: f64,
    pub cash_balance: f64,
    pub asset_balance: f64,
    pub open_orders: usize,
    pub closed_orders: usize,
    pub canceled_orders: usize,
    pub rejected_orders: usize,
}

/// One isolated simulator instance: feed, ledger and book plus the engine
/// switches from `SimConfig`.
#[derive(Debug, Clone)]
pub struct Simulator {
    feed: MarketFeed,
    ledger: Ledger,
    book: OrderBook,
    settlement: SettlementMode,
    auto_liquidate: bool,
    lookahead_window: usize,
}

impl Simulator {
    /// Build a simulator over `bars`. The config is validated first.
    pub fn new(bars: Vec<Bar>, config: &SimConfig) -> Result<Self, ConfigError> {
        Self::from_feed(MarketFeed::new(bars), config)
    }

    pub fn from_feed(feed: MarketFeed, config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ledger = Ledger::new(config.account.cash, config.account.asset, config.margin)
            .with_position(config.account.position);
        let mut book = OrderBook::new(config.fees, config.engine.stop_fee_basis);
        book.set_clock(feed.clock());
        Ok(Self {
            feed,
            ledger,
            book,
            settlement: config.engine.settlement,
            auto_liquidate: config.engine.auto_liquidate,
            lookahead_window: config.engine.lookahead_window,
        })
    }

    // ── Run setup ──────────────────────────────────────────────────────

    /// Reposition the replay clock.
    pub fn set_clock(&mut self, clock: usize) -> Result<(), SimError> {
        self.feed.set_clock(clock)?;
        self.book.set_clock(clock);
        Ok(())
    }

    /// Overwrite any of the balances for a run reset. `None` leaves a field
    /// unchanged. Negative balances are refused.
    pub fn set_balances(
        &mut self,
        cash_balance: Option<f64>,
        asset_balance: Option<f64>,
        position: Option<f64>,
    ) -> Result<(), SimError> {
        if let Some(cash) = cash_balance {
            self.ledger.set_cash_balance(cash)?;
        }
        if let Some(asset) = asset_balance {
            self.ledger.set_asset_balance(asset)?;
        }
        if let Some(position) = position {
            self.ledger.set_position(position);
        }
        Ok(())
    }

    pub fn set_auto_liquidate(&mut self, enabled: bool) {
        self.auto_liquidate = enabled;
    }

    // ── Orders ─────────────────────────────────────────────────────────

    /// Accept an order at the current clock.
    ///
    /// The id is assigned before the initial margin check, so a rejected
    /// order stays visible in the rejected set. Market orders execute
    /// immediately at the reference price; limit/stop orders rest.
    pub fn receive_order(&mut self, request: OrderRequest) -> Result<Submission, SimError> {
        request.validate().map_err(SimError::InvalidOrder)?;
        let price = self.feed.price().ok_or(SimError::FeedNotStarted)?;

        let id = self.book.submit(request, self.feed.clock());

        if !self.ledger.can_open(request.size, price, price) {
            self.reject(id, RejectReason::InitialMargin);
            return Ok(Submission {
                id,
                outcome: SubmissionOutcome::Rejected(RejectReason::InitialMargin),
            });
        }

        let outcome = match request.kind {
            OrderKind::Market => match self.execute(id, price)? {
                None => SubmissionOutcome::Filled,
                Some(reason) => SubmissionOutcome::Rejected(reason),
            },
            OrderKind::Limit { .. } | OrderKind::Stop { .. } => {
                debug!(order_id = %id, side = %request.side, kind = request.kind.label(), "order resting");
                SubmissionOutcome::Resting
            }
        };
        Ok(Submission { id, outcome })
    }

    /// Withdraw an open order as canceled. Returns `false` if it was not open.
    pub fn cancel_order(&mut self, id: OrderId) -> bool {
        let canceled = self.book.withdraw(id, Disposition::Canceled);
        if canceled {
            debug!(order_id = %id, "order canceled");
        }
        canceled
    }

    // ── Time ───────────────────────────────────────────────────────────

    /// Advance one bar and run the matching pass.
    pub fn tick(&mut self) -> Result<TickReport, SimError> {
        let price = self.feed.advance()?.close;
        let clock = self.feed.clock();
        self.book.set_clock(clock);

        let mut report = TickReport {
            clock,
            price,
            filled: Vec::new(),
            rejected: Vec::new(),
            maintenance_ok: true,
            liquidation: None,
        };

        for id in self.book.open_ids() {
            let triggered = self
                .book
                .get(id)
                .is_some_and(|order| order.is_open() && order.is_triggered(price));
            if !triggered {
                continue;
            }
            match self.execute(id, price)? {
                None => report.filled.push(id),
                Some(_) => report.rejected.push(id),
            }
        }

        let position = self.ledger.net_position();
        report.maintenance_ok = self.ledger.can_maintain(position, price);
        if !report.maintenance_ok {
            warn!(
                clock,
                price,
                position,
                equity = self.ledger.total_value(price),
                auto_liquidate = self.auto_liquidate,
                "maintenance margin breached"
            );
            if self.auto_liquidate {
                report.liquidation = self.liquidate()?;
            }
        }

        Ok(report)
    }

    /// Close the whole net position with an opposite-side market order routed
    /// through `receive_order`. Returns `None` when flat.
    ///
    /// A rejected liquidation is returned as-is and not retried.
    pub fn liquidate(&mut self) -> Result<Option<Submission>, SimError> {
        let position = self.ledger.net_position();
        if position == 0.0 {
            return Ok(None);
        }
        let side = if position > 0.0 { Side::Short } else { Side::Long };
        info!(position, side = %side, "liquidating net position");
        let submission = self.receive_order(OrderRequest::market(side, position.abs()))?;
        if submission.is_rejected() {
            warn!(order_id = %submission.id, position, "liquidation order rejected; position left open");
        }
        Ok(Some(submission))
    }

    /// Quote, gate and apply one fill. Returns the rejection reason if the
    /// settlement gate refused it.
    fn execute(&mut self, id: OrderId, price: f64) -> Result<Option<RejectReason>, SimError> {
        let Some(quote) = self.book.quote(id, price) else {
            return Ok(None);
        };
        let asset_leg = self.settlement.asset_leg(quote.size);
        if !self.ledger.can_settle(quote.cash_leg(), asset_leg, quote.side) {
            self.reject(id, RejectReason::Settlement);
            return Ok(Some(RejectReason::Settlement));
        }

        let (position_delta, cash_delta) = self.book.fill(id, price);
        let asset_delta = match self.settlement {
            SettlementMode::Margin => 0.0,
            SettlementMode::Spot => position_delta,
        };
        self.ledger.apply_fill(cash_delta, asset_delta)?;
        self.ledger.apply_position(position_delta);
        debug!(
            order_id = %id,
            side = %quote.side,
            size = quote.size,
            price = quote.price,
            fee = quote.fee,
            cash = self.ledger.cash_balance(),
            position = self.ledger.net_position(),
            "order filled"
        );
        Ok(None)
    }

    fn reject(&mut self, id: OrderId, reason: RejectReason) {
        self.book.withdraw(id, Disposition::Rejected(reason));
        debug!(order_id = %id, ?reason, "order rejected");
    }

    // ── Read access ────────────────────────────────────────────────────

    pub fn clock(&self) -> usize {
        self.feed.clock()
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.feed.current_bar()
    }

    pub fn current_price(&self) -> Option<f64> {
        self.feed.price()
    }

    /// The next bars after the current one, up to the configured window.
    pub fn lookahead(&self) -> &[Bar] {
        self.feed.lookahead(self.lookahead_window)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn feed(&self) -> &MarketFeed {
        &self.feed
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.book.get(id)
    }

    pub fn fills(&self) -> &[Fill] {
        self.book.fills()
    }

    pub fn status(&self) -> StatusSnapshot {
        let price = self.feed.price();
        StatusSnapshot {
            clock: self.feed.clock(),
            price,
            total_asset_value: price.map(|p| self.ledger.total_value(p)),
            net_position: self.ledger.net_position(),
            cash_balance: self.ledger.cash_balance(),
            asset_balance: self.ledger.asset_balance(),
            open_orders: self.book.open_count(),
            closed_orders: self.book.closed_orders().len(),
            canceled_orders: self.book.canceled_orders().len(),
            rejected_orders: self.book.rejected_orders().len(),
        }
    }
}
