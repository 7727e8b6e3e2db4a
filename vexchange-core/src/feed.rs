//! Market feed: replays a bar series one clock step at a time.
//!
//! Clock 0 is "before the first bar". After `k` successful advances the
//! current bar is `bars[k - 1]`, so a series of N bars allows exactly N
//! advances before `DataExhausted`.

use crate::domain::Bar;
use crate::error::SimError;

/// Replay of a fixed bar series behind a discrete clock.
#[derive(Debug, Clone)]
pub struct MarketFeed {
    bars: Vec<Bar>,
    clock: usize,
}

impl MarketFeed {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, clock: 0 }
    }

    /// Build a feed from close prices only (flat bars).
    pub fn from_closes(closes: &[f64]) -> Self {
        Self::new(closes.iter().map(|&c| Bar::flat(c)).collect())
    }

    pub fn clock(&self) -> usize {
        self.clock
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars not yet replayed.
    pub fn remaining(&self) -> usize {
        self.bars.len() - self.clock
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Step the clock forward by one bar.
    ///
    /// On `DataExhausted` the clock is left where it was.
    pub fn advance(&mut self) -> Result<&Bar, SimError> {
        let next = self.clock + 1;
        if next > self.bars.len() {
            return Err(SimError::DataExhausted {
                clock: self.clock,
                len: self.bars.len(),
            });
        }
        self.clock = next;
        Ok(&self.bars[next - 1])
    }

    /// Reposition the replay. `0` rewinds to before the first bar.
    pub fn set_clock(&mut self, clock: usize) -> Result<(), SimError> {
        if clock > self.bars.len() {
            return Err(SimError::InvalidClock {
                clock,
                len: self.bars.len(),
            });
        }
        self.clock = clock;
        Ok(())
    }

    /// Bar at the current clock, `None` before the first advance.
    pub fn current_bar(&self) -> Option<&Bar> {
        self.clock.checked_sub(1).and_then(|i| self.bars.get(i))
    }

    /// Reference price: the current bar's close.
    pub fn price(&self) -> Option<f64> {
        self.current_bar().map(|b| b.close)
    }

    /// Up to `n` bars after the current one. Empty at the tail.
    pub fn lookahead(&self, n: usize) -> &[Bar] {
        let start = self.clock.min(self.bars.len());
        let end = start.saturating_add(n).min(self.bars.len());
        &self.bars[start..end]
    }
}
