//! Scripted replays and batch runs.
//!
//! An order script schedules submissions and cancellations by clock:
//!
//! ```toml
//! [[orders]]
//! clock = 3
//! side = "long"
//! kind = "limit"
//! price = 101.5
//! size = 2.0
//!
//! [[cancels]]
//! clock = 8
//! id = 1
//! ```
//!
//! Actions scheduled at clock `c` run right after the tick that reaches `c`,
//! cancels first, then orders in file order. The replay ends when the feed is
//! exhausted.

use crate::config::{ConfigError, SimConfig};
use crate::domain::{Bar, Fill, OrderId, OrderRequest};
use crate::error::SimError;
use crate::simulator::{Simulator, StatusSnapshot, Submission, TickReport};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from loading or running a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse script TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid script: {0}")]
    Invalid(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sim(#[from] SimError),
}

/// An order to submit at `clock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    pub clock: usize,
    #[serde(flatten)]
    pub request: OrderRequest,
}

/// A cancellation of order `id` at `clock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCancel {
    pub clock: usize,
    pub id: u64,
}

/// Deterministic order flow for a replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderScript {
    pub orders: Vec<ScheduledOrder>,
    pub cancels: Vec<ScheduledCancel>,
}

impl OrderScript {
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ScriptError> {
        let script: OrderScript = toml::from_str(content)?;
        script.validate()?;
        Ok(script)
    }

    /// Clock 0 is before the first bar, where there is no price to trade at.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if let Some(order) = self.orders.iter().find(|o| o.clock == 0) {
            return Err(ScriptError::Invalid(format!(
                "order {:?} scheduled at clock 0; the first tradable clock is 1",
                order.request
            )));
        }
        if self.cancels.iter().any(|c| c.clock == 0) {
            return Err(ScriptError::Invalid(
                "cancel scheduled at clock 0; the first tradable clock is 1".into(),
            ));
        }
        Ok(())
    }

    fn by_clock(&self) -> BTreeMap<usize, (Vec<OrderId>, Vec<OrderRequest>)> {
        let mut schedule: BTreeMap<usize, (Vec<OrderId>, Vec<OrderRequest>)> = BTreeMap::new();
        for cancel in &self.cancels {
            schedule.entry(cancel.clock).or_default().0.push(OrderId(cancel.id));
        }
        for order in &self.orders {
            schedule.entry(order.clock).or_default().1.push(order.request);
        }
        schedule
    }
}

/// Outcome of one scripted replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub config_fingerprint: String,
    pub ticks: usize,
    pub margin_breaches: usize,
    pub submissions: Vec<Submission>,
    pub liquidations: Vec<Submission>,
    pub fills: Vec<Fill>,
    pub final_status: StatusSnapshot,
}

/// Replay `script` against `sim` until the feed is exhausted.
pub fn run_script(
    sim: &mut Simulator,
    script: &OrderScript,
    config_fingerprint: String,
) -> Result<RunSummary, SimError> {
    run_script_with(sim, script, config_fingerprint, |_, _| {})
}

/// Like `run_script`, calling `observe` after every tick once that tick's
/// scheduled actions have been applied.
pub fn run_script_with<F>(
    sim: &mut Simulator,
    script: &OrderScript,
    config_fingerprint: String,
    mut observe: F,
) -> Result<RunSummary, SimError>
where
    F: FnMut(&TickReport, &StatusSnapshot),
{
    let mut schedule = script.by_clock();
    let mut ticks = 0;
    let mut margin_breaches = 0;
    let mut submissions = Vec::new();
    let mut liquidations = Vec::new();

    loop {
        let report = match sim.tick() {
            Ok(report) => report,
            Err(SimError::DataExhausted { clock, .. }) => {
                info!(clock, ticks, "replay finished");
                break;
            }
            Err(e) => return Err(e),
        };
        ticks += 1;
        if !report.maintenance_ok {
            margin_breaches += 1;
        }
        if let Some(liquidation) = report.liquidation {
            liquidations.push(liquidation);
        }

        if let Some((cancels, orders)) = schedule.remove(&report.clock) {
            for id in cancels {
                if !sim.cancel_order(id) {
                    warn!(order_id = %id, clock = report.clock, "cancel of an order that is not open");
                }
            }
            for request in orders {
                match sim.receive_order(request) {
                    Ok(submission) => submissions.push(submission),
                    Err(e) if !e.is_fatal() => {
                        warn!(clock = report.clock, error = %e, "skipping scheduled order");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        observe(&report, &sim.status());
    }

    if !schedule.is_empty() {
        warn!(
            pending = schedule.len(),
            "script actions scheduled past the end of the series were not applied"
        );
    }

    Ok(RunSummary {
        config_fingerprint,
        ticks,
        margin_breaches,
        submissions,
        liquidations,
        fills: sim.fills().to_vec(),
        final_status: sim.status(),
    })
}

/// Run the same bars and script under several configs, one isolated
/// simulator per config, in parallel. Results come back in config order.
pub fn run_batch(
    bars: &[Bar],
    configs: &[SimConfig],
    script: &OrderScript,
) -> Vec<Result<RunSummary, ScriptError>> {
    configs
        .par_iter()
        .map(|config| -> Result<RunSummary, ScriptError> {
            let mut sim = Simulator::new(bars.to_vec(), config)?;
            Ok(run_script(&mut sim, script, config.fingerprint())?)
        })
        .collect()
}
