//! Error taxonomy for the simulation core.
//!
//! Margin rejections and unknown order ids are deliberately absent: a
//! rejection is recorded on the order itself (`RejectReason`), and operations
//! on an id that is not open are no-ops.

use thiserror::Error;

/// Errors from feed, ledger and controller operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// The feed has no bar at the next clock. Fatal to the current run.
    #[error("market data exhausted: clock {clock} has no next bar (series length {len})")]
    DataExhausted { clock: usize, len: usize },

    /// A mutation would have driven a balance negative. Indicates a caller
    /// skipped the `can_settle` gate.
    #[error("balance would go negative: cash={cash}, asset={asset}")]
    NegativeBalance { cash: f64, asset: f64 },

    /// No bar has been replayed yet, so there is no reference price.
    #[error("feed not started: advance the clock before trading")]
    FeedNotStarted,

    #[error("clock {clock} is outside the series (length {len})")]
    InvalidClock { clock: usize, len: usize },

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

impl SimError {
    /// Whether the run must stop. Only invalid requests are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimError::InvalidOrder(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_is_fatal_invalid_order_is_not() {
        assert!(SimError::DataExhausted { clock: 3, len: 3 }.is_fatal());
        assert!(SimError::NegativeBalance { cash: -1.0, asset: 0.0 }.is_fatal());
        assert!(!SimError::InvalidOrder("size".into()).is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        let msg = SimError::DataExhausted { clock: 3, len: 3 }.to_string();
        assert!(msg.contains("clock 3"));
    }
}
