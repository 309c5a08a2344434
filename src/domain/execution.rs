//! Fill simulation: opening and closing positions at bar closes.
//!
//! Fills are at the raw close. Fees and slippage enter only through the
//! [`CostModel`] when the trade's net return is computed, so stop and target
//! levels are measured from the same price the trade ledger reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::cost::CostModel;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitReason, Position, Side, Trade};
use crate::domain::strategy::EntryMode;

/// When a signal is filled relative to the bar that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTiming {
    /// Fill at the close of the signal bar.
    SameBarClose,
    /// Fill at the close of the following bar.
    #[default]
    NextBarClose,
}

impl fmt::Display for ExecutionTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTiming::SameBarClose => write!(f, "same_bar_close"),
            ExecutionTiming::NextBarClose => write!(f, "next_bar_close"),
        }
    }
}

impl std::str::FromStr for ExecutionTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "same_bar_close" | "same" => Ok(ExecutionTiming::SameBarClose),
            "next_bar_close" | "next" => Ok(ExecutionTiming::NextBarClose),
            other => Err(format!("unknown execution timing '{other}'")),
        }
    }
}

/// Opens a position at `bar.close` under `mode`.
///
/// Stop and take-profit are placed at entry ∓/± their level distance. A level
/// measured in ATR is left unset when no ATR is available for the bar. A
/// trailing stop with a non-positive arm threshold starts armed.
pub fn open_position(
    side: Side,
    bar: &Bar,
    index: usize,
    mode: &EntryMode,
    atr: Option<f64>,
    entry_tags: Vec<String>,
) -> Position {
    let protection = mode.protection;
    let entry = bar.close;
    let toward_loss = |d: f64| match side {
        Side::Long => entry - d,
        Side::Short => entry + d,
    };
    let toward_gain = |d: f64| match side {
        Side::Long => entry + d,
        Side::Short => entry - d,
    };

    let stop_price = protection
        .stop_loss
        .and_then(|level| level.distance(entry, atr))
        .map(toward_loss);
    let take_profit_price = protection
        .take_profit
        .and_then(|level| level.distance(entry, atr))
        .map(toward_gain);

    Position {
        side,
        entry_price: entry,
        entry_index: index,
        entry_time: bar.close_time,
        entry_atr: atr,
        stop_price,
        take_profit_price,
        extreme: entry,
        armed: protection.trailing.is_some_and(|t| t.arm_pct <= 0.0),
        locked: false,
        mode: mode.name.clone(),
        protection,
        entry_tags,
    }
}

/// Closes `position` at `bar.close`, compounding `equity` by the net return.
pub fn close_position(
    position: Position,
    bar: &Bar,
    index: usize,
    reason: ExitReason,
    cost: &CostModel,
    equity: &mut f64,
) -> Trade {
    let gross_return = position.gross_return(bar.close);
    let net_return = cost.net_return(gross_return);
    *equity *= 1.0 + net_return;

    Trade {
        side: position.side,
        entry_index: position.entry_index,
        exit_index: index,
        entry_time: position.entry_time,
        entry_price: position.entry_price,
        exit_time: bar.close_time,
        exit_price: bar.close,
        gross_return,
        net_return,
        equity_after: *equity,
        mode: position.mode,
        entry_tags: position.entry_tags,
        reason,
    }
}

/// Net return the position would realize if closed at `price`.
pub fn mark_to_market(position: &Position, price: f64, cost: &CostModel) -> f64 {
    cost.net_return(position.gross_return(price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{Level, StrategyConfig, TrailingStop};

    fn single(strategy: &StrategyConfig) -> EntryMode {
        strategy.entry_modes().remove(0)
    }
    use chrono::{TimeZone, Utc};

    fn bar(close: f64) -> Bar {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Bar {
            open_time: t,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            close_time: t,
        }
    }

    #[test]
    fn atr_levels_straddle_entry() {
        let strategy = StrategyConfig::hybrid();
        let long = open_position(Side::Long, &bar(100.0), 5, &single(&strategy), Some(2.0), vec![]);
        assert_eq!(long.stop_price, Some(97.0));
        assert_eq!(long.take_profit_price, Some(104.0));
        assert_eq!(long.extreme, 100.0);
        assert_eq!(long.mode, "hybrid");
        assert_eq!(long.protection, strategy.protection());

        let short = open_position(Side::Short, &bar(100.0), 5, &single(&strategy), Some(2.0), vec![]);
        assert_eq!(short.stop_price, Some(103.0));
        assert_eq!(short.take_profit_price, Some(96.0));
    }

    #[test]
    fn atr_levels_need_atr() {
        let strategy = StrategyConfig::hybrid();
        let p = open_position(Side::Long, &bar(100.0), 0, &single(&strategy), None, vec![]);
        assert!(p.stop_price.is_none());
        assert!(p.take_profit_price.is_none());
    }

    #[test]
    fn fraction_levels_and_arming() {
        let mut strategy = StrategyConfig::mean_reversion(20, 2.0);
        strategy.stop_loss = Some(Level::Fraction(0.05));
        strategy.trailing = Some(TrailingStop {
            arm_pct: 0.0,
            drop: Level::Fraction(0.01),
        });
        let p = open_position(Side::Long, &bar(200.0), 0, &single(&strategy), None, vec![]);
        assert_eq!(p.stop_price, Some(190.0));
        assert!(p.armed);
    }

    #[test]
    fn close_compounds_equity() {
        let strategy = StrategyConfig::mean_reversion(20, 2.0);
        let cost = CostModel::new(5.0, 5.0).unwrap();
        let p = open_position(Side::Long, &bar(100.0), 0, &single(&strategy), None, vec!["BB_CROSS".into()]);
        let mut equity = 1.0;
        let trade = close_position(p, &bar(110.0), 3, ExitReason::TakeProfit, &cost, &mut equity);
        assert!((trade.gross_return - 0.1).abs() < 1e-12);
        assert!((trade.net_return - 0.098).abs() < 1e-12);
        assert!((equity - 1.098).abs() < 1e-12);
        assert_eq!(trade.equity_after, equity);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.reason_tags(), "BB_CROSS;TAKE_PROFIT");
    }

    #[test]
    fn mark_to_market_is_net() {
        let strategy = StrategyConfig::mean_reversion(20, 2.0);
        let p = open_position(Side::Short, &bar(100.0), 0, &single(&strategy), None, vec![]);
        let cost = CostModel::new(10.0, 0.0).unwrap();
        assert!((mark_to_market(&p, 80.0, &cost) - (0.25 - 0.002)).abs() < 1e-12);
    }

    #[test]
    fn timing_parses() {
        assert_eq!("next".parse::<ExecutionTiming>(), Ok(ExecutionTiming::NextBarClose));
        assert_eq!(
            "same_bar_close".parse::<ExecutionTiming>(),
            Ok(ExecutionTiming::SameBarClose)
        );
        assert!("later".parse::<ExecutionTiming>().is_err());
    }

    #[test]
    fn mode_levels_apply_and_name_the_trade() {
        let strategy = StrategyConfig::regime_switch();
        let modes = strategy.entry_modes();
        let tr = open_position(Side::Long, &bar(100.0), 0, &modes[0], Some(2.0), vec![]);
        let rg = open_position(Side::Short, &bar(100.0), 0, &modes[1], Some(2.0), vec![]);
        assert_eq!(tr.take_profit_price, Some(106.0));
        assert!((rg.take_profit_price.unwrap() - 97.6).abs() < 1e-12);
        assert_eq!(tr.stop_price, Some(97.0));
        assert_eq!(rg.stop_price, Some(103.0));
        assert!(tr.armed && rg.armed);

        let mut equity = 1.0;
        let trade = close_position(tr, &bar(101.0), 1, ExitReason::TakeProfit, &CostModel::zero(), &mut equity);
        assert_eq!(trade.mode, "TR");
    }
}
