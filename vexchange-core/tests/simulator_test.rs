//! Integration tests for the simulation step.
//!
//! Tests:
//! 1. End-to-end scenarios: market fill, resting limit trigger, feed exhaustion
//! 2. Trigger boundaries for limit and stop orders
//! 3. Fee roles: maker for limits, taker for market orders
//! 4. Rejection paths: initial margin, settlement gate at trigger time
//! 5. Maintenance margin and opt-in liquidation

use vexchange_core::domain::RejectReason;
use vexchange_core::{
    Bar, FeeSchedule, MarginRates, MarketFeed, OrderRequest, OrderStatus, Side, SimConfig,
    SimError, Simulator, StopFeeBasis, SubmissionOutcome,
};

/// Helper: config with the given cash and rates, no asset, zero maker fee.
fn config(cash: f64, initial_margin_rate: f64, maker: f64, taker: f64) -> SimConfig {
    let mut config = SimConfig::default();
    config.account.cash = cash;
    config.margin = MarginRates {
        initial_margin_rate,
        maintenance_margin_rate: initial_margin_rate / 2.0,
    };
    config.fees = FeeSchedule::new(maker, taker);
    config
}

/// Helper: simulator over flat bars at `closes`, already ticked once.
fn started(closes: &[f64], config: &SimConfig) -> Simulator {
    let mut sim = Simulator::from_feed(MarketFeed::from_closes(closes), config).unwrap();
    sim.tick().unwrap();
    sim
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ──────────────────────────────────────────────
// End-to-end scenarios
// ──────────────────────────────────────────────

#[test]
fn market_long_fills_at_reference_with_taker_fee() {
    let mut sim = started(&[100.0], &config(10_000.0, 0.1, 0.0, 0.001));

    let sub = sim.receive_order(OrderRequest::market(Side::Long, 1.0)).unwrap();

    assert_eq!(sub.outcome, SubmissionOutcome::Filled);
    assert_eq!(sim.ledger().net_position(), 1.0);
    assert!(approx(sim.ledger().cash_balance(), 9_899.9));
    assert_eq!(sim.ledger().asset_balance(), 0.0);
    assert_eq!(sim.book().closed_orders().len(), 1);
    assert_eq!(sim.book().closed_orders()[0].id, sub.id);
    assert_eq!(sim.book().open_count(), 0);
}

#[test]
fn resting_short_limit_triggers_when_price_reaches_it() {
    let maker = 0.0002;
    let mut sim = started(&[105.0, 112.0], &config(10_000.0, 0.1, maker, 0.001));

    let sub = sim
        .receive_order(OrderRequest::limit(Side::Short, 2.0, 110.0))
        .unwrap();
    assert_eq!(sub.outcome, SubmissionOutcome::Resting);
    assert_eq!(sim.ledger().net_position(), 0.0);

    let report = sim.tick().unwrap();
    assert_eq!(report.price, 112.0);
    assert_eq!(report.filled, vec![sub.id]);

    assert_eq!(sim.ledger().net_position(), -2.0);
    let expected_cash = 10_000.0 + 220.0 - 220.0 * maker;
    assert!(approx(sim.ledger().cash_balance(), expected_cash));

    let fill = &sim.fills()[0];
    assert_eq!(fill.price, 110.0);
    assert!(approx(fill.fee, 220.0 * maker));
}

#[test]
fn three_bar_feed_exhausts_on_fourth_advance() {
    let mut feed = MarketFeed::from_closes(&[1.0, 2.0, 3.0]);
    assert_eq!(feed.clock(), 0);
    for _ in 0..3 {
        feed.advance().unwrap();
    }
    assert!(matches!(
        feed.advance(),
        Err(SimError::DataExhausted { clock: 3, len: 3 })
    ));
}

#[test]
fn tick_propagates_exhaustion() {
    let mut sim = started(&[100.0], &SimConfig::default());
    let err = sim.tick().unwrap_err();
    assert!(matches!(err, SimError::DataExhausted { .. }));
    assert!(err.is_fatal());
}

// ──────────────────────────────────────────────
// Trigger boundaries
// ──────────────────────────────────────────────

#[test]
fn long_limit_waits_until_price_at_or_below() {
    let mut sim = started(&[105.0, 103.0, 101.0, 100.0, 99.0], &config(10_000.0, 0.1, 0.0, 0.0));
    let sub = sim.receive_order(OrderRequest::limit(Side::Long, 1.0, 100.0)).unwrap();

    for _ in 0..2 {
        let report = sim.tick().unwrap();
        assert!(report.filled.is_empty(), "filled early at {}", report.price);
        assert_eq!(sim.order(sub.id).unwrap().status, OrderStatus::Open);
    }

    // exactly equal triggers
    let report = sim.tick().unwrap();
    assert_eq!(report.price, 100.0);
    assert_eq!(report.filled, vec![sub.id]);
    assert_eq!(sim.order(sub.id).unwrap().closed_at, Some(4));
}

#[test]
fn stop_orders_fill_at_triggering_price() {
    let mut sim = started(&[100.0, 99.0, 103.0], &config(10_000.0, 0.1, 0.0, 0.001));
    let buy_stop = sim.receive_order(OrderRequest::stop(Side::Long, 1.0, 102.0)).unwrap();

    assert!(sim.tick().unwrap().filled.is_empty());
    let report = sim.tick().unwrap();
    assert_eq!(report.filled, vec![buy_stop.id]);

    let fill = &sim.fills()[0];
    assert_eq!(fill.price, 103.0);
    // default basis: taker rate on the triggering price
    assert!(approx(fill.fee, 103.0 * 0.001));
}

#[test]
fn resting_stop_fee_basis_charges_maker_on_stop_price() {
    let mut cfg = config(10_000.0, 0.1, 0.0002, 0.001);
    cfg.engine.stop_fee_basis = StopFeeBasis::Resting;
    let mut sim = started(&[100.0, 95.0], &cfg);
    sim.receive_order(OrderRequest::stop(Side::Short, 1.0, 97.0)).unwrap();
    sim.tick().unwrap();

    let fill = &sim.fills()[0];
    assert_eq!(fill.price, 95.0);
    assert!(approx(fill.fee, 97.0 * 0.0002));
    assert!(approx(sim.ledger().cash_balance(), 10_000.0 + 95.0 - 97.0 * 0.0002));
}

#[test]
fn orders_fill_in_submission_order_within_a_tick() {
    let mut sim = started(&[100.0, 90.0], &config(10_000.0, 0.1, 0.0, 0.0));
    let a = sim.receive_order(OrderRequest::limit(Side::Long, 1.0, 95.0)).unwrap();
    let b = sim.receive_order(OrderRequest::limit(Side::Long, 1.0, 92.0)).unwrap();
    let c = sim.receive_order(OrderRequest::limit(Side::Long, 1.0, 80.0)).unwrap();

    let report = sim.tick().unwrap();
    assert_eq!(report.filled, vec![a.id, b.id]);
    assert!(sim.book().is_open(c.id));
}

// ──────────────────────────────────────────────
// Fees
// ──────────────────────────────────────────────

#[test]
fn limit_fills_pay_maker_market_fills_pay_taker() {
    let maker = 0.0005;
    let taker = 0.002;
    let mut sim = started(&[100.0, 95.0], &config(10_000.0, 0.1, maker, taker));

    sim.receive_order(OrderRequest::market(Side::Long, 3.0)).unwrap();
    sim.receive_order(OrderRequest::limit(Side::Long, 2.0, 96.0)).unwrap();
    sim.tick().unwrap();

    let fills = sim.fills();
    assert_eq!(fills.len(), 2);
    assert!(approx(fills[0].fee, 3.0 * 100.0 * taker));
    assert!(approx(fills[1].fee, 2.0 * 96.0 * maker));
}

// ──────────────────────────────────────────────
// Rejections
// ──────────────────────────────────────────────

#[test]
fn market_order_failing_initial_margin_changes_nothing() {
    let mut sim = started(&[100.0], &config(50.0, 1.0, 0.0, 0.001));
    let before = sim.ledger().clone();

    let sub = sim.receive_order(OrderRequest::market(Side::Long, 1.0)).unwrap();

    assert_eq!(sub.outcome, SubmissionOutcome::Rejected(RejectReason::InitialMargin));
    assert_eq!(sim.ledger(), &before);
    assert_eq!(sim.book().rejected_orders().len(), 1);
    assert_eq!(sim.book().rejected_orders()[0].id, sub.id);
}

#[test]
fn triggered_order_failing_settlement_is_rejected_not_left_open() {
    let mut sim = started(&[100.0, 100.0, 98.0], &config(1_000.0, 0.1, 0.0, 0.0));
    let limit = sim.receive_order(OrderRequest::limit(Side::Long, 5.0, 99.0)).unwrap();
    assert_eq!(limit.outcome, SubmissionOutcome::Resting);

    // Spend most of the cash before the limit triggers.
    sim.tick().unwrap();
    sim.receive_order(OrderRequest::market(Side::Long, 8.0)).unwrap();
    assert!(approx(sim.ledger().cash_balance(), 200.0));

    let report = sim.tick().unwrap();
    assert_eq!(report.rejected, vec![limit.id]);
    let order = sim.order(limit.id).unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(order.reject_reason, Some(RejectReason::Settlement));
    assert_eq!(sim.ledger().net_position(), 8.0);
}

#[test]
fn double_cancel_leaves_one_entry() {
    let mut sim = started(&[100.0], &SimConfig::default());
    let sub = sim.receive_order(OrderRequest::limit(Side::Long, 1.0, 90.0)).unwrap();
    assert!(sim.cancel_order(sub.id));
    assert!(!sim.cancel_order(sub.id));
    assert_eq!(sim.book().canceled_orders().len(), 1);
    assert_eq!(sim.status().canceled_orders, 1);
}

// ──────────────────────────────────────────────
// Maintenance margin and liquidation
// ──────────────────────────────────────────────

/// Short 10 @ 100 with 100 cash and 10% initial margin leaves 1100 cash.
/// At 250 with 50% maintenance the requirement is 1250, a breach.
fn breached(auto_liquidate: bool) -> Simulator {
    let mut cfg = SimConfig::default();
    cfg.account.cash = 100.0;
    cfg.margin = MarginRates {
        initial_margin_rate: 0.1,
        maintenance_margin_rate: 0.5,
    };
    cfg.fees = FeeSchedule::new(0.0, 0.0);
    cfg.engine.auto_liquidate = auto_liquidate;
    let mut sim = started(&[100.0, 200.0, 250.0], &cfg);
    let sub = sim.receive_order(OrderRequest::market(Side::Short, 10.0)).unwrap();
    assert_eq!(sub.outcome, SubmissionOutcome::Filled);
    assert!(approx(sim.ledger().cash_balance(), 1_100.0));
    sim
}

#[test]
fn maintenance_breach_is_reported_but_not_acted_on_by_default() {
    let mut sim = breached(false);

    let ok = sim.tick().unwrap(); // 10 * 200 * 0.5 = 1000 <= 1100
    assert!(ok.maintenance_ok);

    let report = sim.tick().unwrap();
    assert!(!report.maintenance_ok);
    assert_eq!(report.liquidation, None);
    assert_eq!(sim.ledger().net_position(), -10.0);
    assert_eq!(sim.book().open_count(), 0);
}

#[test]
fn auto_liquidation_closes_position_when_enabled() {
    let mut sim = breached(true);
    assert!(sim.tick().unwrap().liquidation.is_none());

    // buy back 10 @ 250 out of 1100 cash: settlement refuses it
    let report = sim.tick().unwrap();
    assert!(!report.maintenance_ok);
    let liquidation = report.liquidation.expect("liquidation submitted");
    assert_eq!(
        liquidation.outcome,
        SubmissionOutcome::Rejected(RejectReason::Settlement)
    );
    assert_eq!(sim.ledger().net_position(), -10.0);

    let mut cfg = SimConfig::default();
    cfg.account.cash = 2_000.0;
    cfg.margin = MarginRates {
        initial_margin_rate: 0.1,
        maintenance_margin_rate: 3.0,
    };
    cfg.fees = FeeSchedule::new(0.0, 0.0);
    cfg.engine.auto_liquidate = true;
    let mut sim = started(&[100.0, 105.0], &cfg);
    sim.receive_order(OrderRequest::market(Side::Short, 10.0)).unwrap();
    assert!(approx(sim.ledger().cash_balance(), 3_000.0));

    // 10 * 105 * 3.0 = 3150 > 3000, so buy back 10 @ 105
    let report = sim.tick().unwrap();
    assert!(!report.maintenance_ok);
    let liquidation = report.liquidation.expect("liquidation submitted");
    assert_eq!(liquidation.outcome, SubmissionOutcome::Filled);
    assert_eq!(sim.ledger().net_position(), 0.0);
    assert!(approx(sim.ledger().cash_balance(), 3_000.0 - 1_050.0));
}

#[test]
fn liquidation_that_cannot_settle_is_reported_not_retried() {
    let mut cfg = SimConfig::default();
    cfg.account.cash = 0.0;
    cfg.margin = MarginRates {
        initial_margin_rate: 0.0,
        maintenance_margin_rate: 0.1,
    };
    let mut sim = started(&[100.0], &cfg);
    // carried-in short with no cash to buy it back
    sim.set_balances(None, None, Some(-5.0)).unwrap();

    let sub = sim.liquidate().unwrap().unwrap();
    assert_eq!(sub.outcome, SubmissionOutcome::Rejected(RejectReason::Settlement));
    assert_eq!(sim.ledger().net_position(), -5.0);
    assert_eq!(sim.book().rejected_orders().len(), 1);
}

// ──────────────────────────────────────────────
// Setup helpers
// ──────────────────────────────────────────────

#[test]
fn set_clock_rewinds_replay() {
    let bars: Vec<Bar> = [10.0, 20.0, 30.0].iter().map(|&c| Bar::flat(c)).collect();
    let mut sim = Simulator::new(bars, &SimConfig::default()).unwrap();
    sim.set_clock(2).unwrap();
    assert_eq!(sim.current_price(), Some(20.0));
    assert_eq!(sim.tick().unwrap().price, 30.0);
    assert!(sim.set_clock(4).is_err());
}
