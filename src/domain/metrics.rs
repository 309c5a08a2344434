//! Run summary statistics.

use serde::{Deserialize, Serialize};

use crate::domain::backtest::BacktestResult;
use crate::domain::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub symbol: String,
    pub interval: String,
    pub params: String,
    pub bars: usize,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: f64,
    pub avg_trade_ret_pct: f64,
    pub equity_multiple: f64,
    pub max_drawdown_pct: f64,
    pub open_position_ret_pct: Option<f64>,
    /// Sum of winning net returns over the absolute sum of losing ones;
    /// `None` without losses.
    pub profit_factor: Option<f64>,
}

/// Win/loss tallies over closed trades.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: f64,
    pub avg_trade_ret_pct: f64,
    pub profit_factor: Option<f64>,
}

impl TradeStats {
    pub fn compute(trades: &[Trade]) -> Self {
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total = 0.0_f64;

        for trade in trades {
            let net = trade.net_return;
            total += net;
            if trade.is_win() {
                wins += 1;
                total_wins += net;
            } else {
                losses += 1;
                total_losses += net.abs();
            }
        }

        let count = trades.len();
        let win_rate_pct = if count > 0 {
            wins as f64 / count as f64 * 100.0
        } else {
            0.0
        };
        let avg_trade_ret_pct = if count > 0 {
            total / count as f64 * 100.0
        } else {
            0.0
        };
        let profit_factor = (total_losses > 0.0).then(|| total_wins / total_losses);

        TradeStats {
            trades: count,
            wins,
            losses,
            win_rate_pct,
            avg_trade_ret_pct,
            profit_factor,
        }
    }
}

impl Summary {
    pub fn from_run(
        symbol: &str,
        interval: &str,
        params: impl Into<String>,
        result: &BacktestResult,
    ) -> Self {
        let stats = TradeStats::compute(&result.trades);
        Summary {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            params: params.into(),
            bars: result.bars,
            trades: stats.trades,
            wins: stats.wins,
            losses: stats.losses,
            win_rate_pct: stats.win_rate_pct,
            avg_trade_ret_pct: stats.avg_trade_ret_pct,
            equity_multiple: result.equity_multiple,
            max_drawdown_pct: max_drawdown(&result.equity_curve) * 100.0,
            open_position_ret_pct: result.open_position_ret.map(|r| r * 100.0),
            profit_factor: stats.profit_factor,
        }
    }
}

/// Largest peak-to-trough decline of a multiplier curve, as a fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }
    max_dd
}
