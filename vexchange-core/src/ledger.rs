//! Margin & balance ledger.
//!
//! Tracks cash, asset collateral and net position, and answers the margin
//! questions the controller asks before and after fills. All mutation goes
//! through `apply_fill` and `apply_position`; the setters exist for
//! initializing or resetting a run.
//!
//! `asset_balance` is cash-equivalent collateral valued at the reference
//! price. `net_position` is the signed derivatives exposure and is not tied
//! to the asset balance unless the settlement mode says so.

use crate::domain::{FeeRole, Side};
use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Maker/taker fee rates, as fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub maker_fee_rate: f64,
    pub taker_fee_rate: f64,
}

impl FeeSchedule {
    pub fn new(maker_fee_rate: f64, taker_fee_rate: f64) -> Self {
        Self {
            maker_fee_rate,
            taker_fee_rate,
        }
    }

    pub fn rate(&self, role: FeeRole) -> f64 {
        match role {
            FeeRole::Maker => self.maker_fee_rate,
            FeeRole::Taker => self.taker_fee_rate,
        }
    }

    /// `fee = size * price * rate(role)`
    pub fn fee(&self, size: f64, price: f64, role: FeeRole) -> f64 {
        size * price * self.rate(role)
    }
}

/// Initial and maintenance margin requirements, as fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginRates {
    pub initial_margin_rate: f64,
    pub maintenance_margin_rate: f64,
}

impl Default for MarginRates {
    fn default() -> Self {
        Self {
            initial_margin_rate: 1.0,
            maintenance_margin_rate: 0.5,
        }
    }
}

/// How a fill settles against the asset balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    /// Fills move cash only; the position is pure exposure.
    #[default]
    Margin,
    /// Fills also move the asset balance by the position delta.
    Spot,
}

impl SettlementMode {
    /// Unsigned asset leg of a fill of `size`.
    pub fn asset_leg(self, size: f64) -> f64 {
        match self {
            SettlementMode::Margin => 0.0,
            SettlementMode::Spot => size,
        }
    }
}

/// Account balances plus margin parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    cash_balance: f64,
    asset_balance: f64,
    net_position: f64,
    rates: MarginRates,
}

impl Ledger {
    pub fn new(cash_balance: f64, asset_balance: f64, rates: MarginRates) -> Self {
        Self {
            cash_balance,
            asset_balance,
            net_position: 0.0,
            rates,
        }
    }

    pub fn with_position(mut self, net_position: f64) -> Self {
        self.net_position = net_position;
        self
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash_balance
    }

    pub fn asset_balance(&self) -> f64 {
        self.asset_balance
    }

    pub fn net_position(&self) -> f64 {
        self.net_position
    }

    pub fn rates(&self) -> MarginRates {
        self.rates
    }

    /// `cash + asset * reference_price`
    pub fn total_margin_available(&self, reference_price: f64) -> f64 {
        self.cash_balance + self.asset_balance * reference_price
    }

    /// Total account value at `reference_price`. Same formula as the margin
    /// available, reported under its own name for status snapshots.
    pub fn total_value(&self, reference_price: f64) -> f64 {
        self.total_margin_available(reference_price)
    }

    fn balances_non_negative(&self) -> bool {
        self.cash_balance >= 0.0 && self.asset_balance >= 0.0
    }

    /// Advisory pre-trade gate: is there enough collateral to post initial
    /// margin on `order_size * order_price`?
    pub fn can_open(&self, order_size: f64, order_price: f64, reference_price: f64) -> bool {
        let required = order_size * order_price * self.rates.initial_margin_rate;
        self.total_margin_available(reference_price) >= required && self.balances_non_negative()
    }

    /// Binding pre-fill gate. Projects the unsigned fill legs onto the current
    /// balances without mutating anything.
    ///
    /// Long spends cash (cash leg negated); short gives up asset (asset leg
    /// negated). True iff both projected balances are >= 0.
    pub fn can_settle(&self, order_cash_delta: f64, order_btc_delta: f64, side: Side) -> bool {
        let (cash_leg, asset_leg) = match side {
            Side::Long => (-order_cash_delta, order_btc_delta),
            Side::Short => (order_cash_delta, -order_btc_delta),
        };
        self.cash_balance + cash_leg >= 0.0 && self.asset_balance + asset_leg >= 0.0
    }

    /// Apply signed balance deltas. Refuses (and leaves state untouched) if
    /// either balance would go negative.
    pub fn apply_fill(&mut self, cash_delta: f64, btc_delta: f64) -> Result<(), SimError> {
        let cash = self.cash_balance + cash_delta;
        let asset = self.asset_balance + btc_delta;
        if cash < 0.0 || asset < 0.0 {
            return Err(SimError::NegativeBalance { cash, asset });
        }
        self.cash_balance = cash;
        self.asset_balance = asset;
        Ok(())
    }

    /// Net position is unconstrained.
    pub fn apply_position(&mut self, position_delta: f64) {
        self.net_position += position_delta;
    }

    /// Maintenance gate, evaluated once per tick after fills. False is the
    /// liquidation trigger.
    pub fn can_maintain(&self, position: f64, reference_price: f64) -> bool {
        let required = position.abs() * reference_price * self.rates.maintenance_margin_rate;
        self.total_margin_available(reference_price) >= required && self.balances_non_negative()
    }

    pub fn set_cash_balance(&mut self, cash_balance: f64) -> Result<(), SimError> {
        if cash_balance < 0.0 {
            return Err(SimError::NegativeBalance {
                cash: cash_balance,
                asset: self.asset_balance,
            });
        }
        self.cash_balance = cash_balance;
        Ok(())
    }

    pub fn set_asset_balance(&mut self, asset_balance: f64) -> Result<(), SimError> {
        if asset_balance < 0.0 {
            return Err(SimError::NegativeBalance {
                cash: self.cash_balance,
                asset: asset_balance,
            });
        }
        self.asset_balance = asset_balance;
        Ok(())
    }

    pub fn set_position(&mut self, net_position: f64) {
        self.net_position = net_position;
    }
}
