//! Property tests for the risk and position invariants.
//!
//! 1. Sizing never divides by less than the price-risk floor
//! 2. Notional never exceeds the position cap
//!    and a stop under the floor sizes exactly as the floor
//! 3. Booked P&L stays within the clamp bound
//! 4. A second open leaves the manager untouched
//! 5. Equity stays finite over arbitrary price paths

mod common;

use chrono::NaiveDate;
use common::{AlwaysEnter, context, make_candles};
use proptest::prelude::*;
use scalptrader::domain::position::ExitReason;
use scalptrader::domain::position_manager::PositionManager;
use scalptrader::domain::risk::{RiskParams, clamp_pnl, size_position};
use scalptrader::domain::runner::run_backtest;
use scalptrader::domain::signal::Side;

fn arb_price() -> impl Strategy<Value = f64> {
    1.0..10_000.0_f64
}

fn arb_risk() -> impl Strategy<Value = RiskParams> {
    (
        1_000.0..1_000_000.0_f64,
        0.001..0.1_f64,
        0.0001..0.05_f64,
        0.01..1.0_f64,
        1.0..50.0_f64,
    )
        .prop_map(|(capital, risk, floor, fraction, multiple)| RiskParams {
            initial_capital: capital,
            risk_per_trade: risk,
            min_price_risk_floor: floor,
            max_position_fraction: fraction,
            max_pnl_multiple: multiple,
            ..Default::default()
        })
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

proptest! {
    /// Position size is bounded by risk / (floor * price) for any stop distance.
    #[test]
    fn sizing_respects_price_risk_floor(
        params in arb_risk(),
        price in arb_price(),
        distance in 0.0..100.0_f64,
    ) {
        let sizing = size_position(&params, price, distance);
        let floor = params.min_price_risk_floor * price;
        prop_assert!(sizing.price_risk >= floor);
        prop_assert!(sizing.size <= params.risk_amount() / floor * (1.0 + 1e-12));
        prop_assert!(sizing.size.is_finite());
    }

    /// Notional never exceeds max_position_fraction * capital.
    #[test]
    fn sizing_respects_position_cap(
        params in arb_risk(),
        price in arb_price(),
        distance in 0.0..100.0_f64,
    ) {
        let sizing = size_position(&params, price, distance);
        prop_assert!(sizing.size * price <= params.max_notional());
    }

    /// Every stop distance under the floor sizes exactly like the floor.
    #[test]
    fn sub_floor_distance_sizes_as_floor(
        params in arb_risk(),
        price in arb_price(),
        fraction in 0.0..1.0_f64,
    ) {
        let floor = params.min_price_risk_floor * price;
        let distance = floor * fraction;
        prop_assume!(distance < floor);
        let below = size_position(&params, price, distance);
        let at = size_position(&params, price, floor);
        prop_assert_eq!(below.size, at.size);
        prop_assert_eq!(below.price_risk, floor);
    }

    /// Any raw P&L, including non-finite values, books within the bound.
    #[test]
    fn pnl_clamp_bounds_every_value(
        params in arb_risk(),
        raw in prop_oneof![
            -1e12..1e12_f64,
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ],
    ) {
        let risk_amount = params.risk_amount();
        let (booked, clamp) = clamp_pnl(&params, raw, risk_amount);
        let limit = params.max_pnl_multiple * risk_amount;
        prop_assert!(booked.is_finite());
        prop_assert!(booked.abs() <= limit);
        if raw.is_finite() && raw.abs() <= limit {
            prop_assert_eq!(booked, raw);
            prop_assert!(clamp.is_none());
        }
    }

    /// Opening over an open position is rejected and changes nothing.
    #[test]
    fn no_double_open(
        first in arb_side(),
        second in arb_side(),
        entry in 10.0..500.0_f64,
        retry in 10.0..500.0_f64,
    ) {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap().and_hms_opt(9, 30, 0).unwrap();
        let mut pm = PositionManager::new(RiskParams::default());
        pm.open(first, entry, ts).unwrap();
        let position = pm.position().cloned();
        let capital = pm.capital().clone();

        prop_assert!(pm.open(second, retry, ts).is_err());
        prop_assert_eq!(pm.position().cloned(), position);
        prop_assert_eq!(pm.capital(), &capital);

        let outcome = pm.close(entry, ts, ExitReason::Signal).unwrap();
        prop_assert_eq!(outcome.trade.side, first);
        prop_assert!(pm.position().is_none());
    }

    /// Arbitrary positive price paths never yield a non-finite equity point.
    #[test]
    fn equity_stays_finite(
        closes in prop::collection::vec(1.0..1_000.0_f64, 2..120),
        side in arb_side(),
    ) {
        let candles = make_candles(&closes);
        let result = run_backtest(
            Box::new(AlwaysEnter(side)),
            context(RiskParams::default()),
            candles.iter().copied().map(Ok),
        )
        .unwrap();
        prop_assert!(result.final_capital.is_finite());
        prop_assert!(result.equity_curve.iter().all(|p| p.equity.is_finite()));
        let limit = RiskParams::default().max_pnl_multiple * RiskParams::default().risk_amount();
        prop_assert!(result.trades.iter().all(|t| t.pnl.abs() <= limit));
    }
}
