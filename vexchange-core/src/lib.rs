//! vexchange core: a deterministic, single-threaded virtual exchange.
//!
//! This crate replays a bar series and simulates an account against it:
//! - Market feed with a discrete clock and lookahead window
//! - Margin & balance ledger (initial/maintenance margin, settlement gate)
//! - Order book with market, limit and stop orders and maker/taker fees
//! - Simulation controller running one matching pass per tick
//! - TOML configuration, CSV/synthetic bar ingestion, scripted replays

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod order_book;
pub mod script;
pub mod simulator;

pub use config::{ConfigError, SimConfig};
pub use domain::{Bar, Fill, Order, OrderId, OrderKind, OrderRequest, OrderStatus, Side};
pub use error::SimError;
pub use feed::MarketFeed;
pub use ledger::{FeeSchedule, Ledger, MarginRates, SettlementMode};
pub use order_book::{OrderBook, StopFeeBasis};
pub use simulator::{Simulator, StatusSnapshot, Submission, SubmissionOutcome, TickReport};
