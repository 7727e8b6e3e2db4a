//! Bar: the fundamental market data unit.

use serde::{Deserialize, Serialize};

/// OHLCV bar for one fixed interval of the replayed series.
///
/// `volatility` and `atr` are carried through from the source unchanged; the
/// simulator itself only reads `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
}

impl Bar {
    /// Bar with OHLCV only.
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            volatility: None,
            atr: None,
        }
    }

    /// Flat bar where every price equals `price`. Handy for tests and replays
    /// built from a close-only series.
    pub fn flat(price: f64) -> Self {
        Self::new(price, price, price, price, 0.0)
    }

    /// Basic OHLCV sanity check: finite fields, high >= low, high >= open/close,
    /// low <= open/close, positive open/close, non-negative volume.
    pub fn is_sane(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}
