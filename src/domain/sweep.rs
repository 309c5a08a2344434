//! Grid search over strategy parameters.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, warn};

use crate::domain::backtest::run_backtest_with_higher;
use crate::domain::cost::CostModel;
use crate::domain::error::RegimetraderError;
use crate::domain::metrics::{TradeStats, max_drawdown};
use crate::domain::ohlcv::{Bar, validate_bars};
use crate::domain::signal::{SignalComponent, SignalRule};
use crate::domain::strategy::StrategyConfig;

pub const DEFAULT_MIN_TRADES: usize = 5;

/// Values to try for each swept parameter. An empty list keeps the base
/// strategy's value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SweepGrid {
    pub bb_periods: Vec<usize>,
    pub bb_ks: Vec<f64>,
    pub cooldowns: Vec<usize>,
    /// Trend EMA lengths for the trend filter.
    pub ema_trends: Vec<usize>,
    /// RSI level at or below which longs may enter.
    pub rsi_long_max: Vec<f64>,
    /// Minimum band width as a fraction of close.
    pub band_width_min: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepCandidate {
    pub label: String,
    pub bb_period: usize,
    pub bb_k: f64,
    pub cooldown: usize,
    pub ema_trend: usize,
    pub rsi_long_max: Option<f64>,
    pub band_width_min: Option<f64>,
    pub config: StrategyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridPoint {
    bb_period: usize,
    bb_k: f64,
    cooldown: usize,
    ema_trend: usize,
    rsi_long_max: Option<f64>,
    band_width_min: Option<f64>,
}

/// Every point crossed with every value; an empty axis leaves `points` as is.
fn expand<T>(points: Vec<GridPoint>, values: &[T], set: impl Fn(&mut GridPoint, &T)) -> Vec<GridPoint> {
    if values.is_empty() {
        return points;
    }
    let mut out = Vec::with_capacity(points.len() * values.len());
    for point in &points {
        for value in values {
            let mut next = *point;
            set(&mut next, value);
            out.push(next);
        }
    }
    out
}

/// Sets the RSI buy threshold. When the rule counts an RSI confirmation, only
/// confirmations change and a required RSI (an exhaustion gate) keeps its
/// level; otherwise the required RSI is the threshold.
fn set_rsi_long_max(rule: &mut SignalRule, value: f64) {
    let is_rsi = |c: &SignalComponent| matches!(c, SignalComponent::Rsi { .. });
    let targets = if rule.confirmations.iter().any(is_rsi) {
        &mut rule.confirmations
    } else {
        &mut rule.required
    };
    for component in targets.iter_mut() {
        if let SignalComponent::Rsi { long_max, .. } = component {
            *long_max = value;
        }
    }
}

fn set_band_width(rule: &mut SignalRule, value: f64) {
    let mut found = false;
    for component in rule.required.iter_mut().chain(rule.confirmations.iter_mut()) {
        if let SignalComponent::BandWidth { min_pct } = component {
            *min_pct = value;
            found = true;
        }
    }
    if !found && value > 0.0 {
        rule.required.push(SignalComponent::BandWidth { min_pct: value });
    }
}

impl SweepGrid {
    pub fn size(&self) -> usize {
        [
            self.bb_periods.len(),
            self.bb_ks.len(),
            self.cooldowns.len(),
            self.ema_trends.len(),
            self.rsi_long_max.len(),
            self.band_width_min.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Cartesian product of the grid applied to clones of `base`, with the
    /// first axis (BB period) outermost.
    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<SweepCandidate> {
        let origin = GridPoint {
            bb_period: base.indicators.bb_period,
            bb_k: base.indicators.bb_k,
            cooldown: base.cooldown_bars,
            ema_trend: base.indicators.ema_trend,
            rsi_long_max: None,
            band_width_min: None,
        };
        let mut points = vec![origin];
        points = expand(points, &self.bb_periods, |p, &v| p.bb_period = v);
        points = expand(points, &self.bb_ks, |p, &v| p.bb_k = v);
        points = expand(points, &self.cooldowns, |p, &v| p.cooldown = v);
        points = expand(points, &self.ema_trends, |p, &v| p.ema_trend = v);
        points = expand(points, &self.rsi_long_max, |p, &v| p.rsi_long_max = Some(v));
        points = expand(points, &self.band_width_min, |p, &v| p.band_width_min = Some(v));

        points
            .into_iter()
            .map(|point| {
                let mut config = base.clone();
                config.indicators.bb_period = point.bb_period;
                config.indicators.bb_k = point.bb_k;
                config.indicators.ema_trend = point.ema_trend;
                config.cooldown_bars = point.cooldown;
                if let Some(v) = point.rsi_long_max {
                    set_rsi_long_max(&mut config.entry, v);
                }
                if let Some(v) = point.band_width_min {
                    set_band_width(&mut config.entry, v);
                }

                let mut label = format!(
                    "bb={} k={:.2} cd={}",
                    point.bb_period, point.bb_k, point.cooldown
                );
                if !self.ema_trends.is_empty() {
                    label.push_str(&format!(" ema={}", point.ema_trend));
                }
                if let Some(v) = point.rsi_long_max {
                    label.push_str(&format!(" rsi={v}"));
                }
                if let Some(v) = point.band_width_min {
                    label.push_str(&format!(" bw={v:.4}"));
                }
                SweepCandidate {
                    label,
                    bb_period: point.bb_period,
                    bb_k: point.bb_k,
                    cooldown: point.cooldown,
                    ema_trend: point.ema_trend,
                    rsi_long_max: point.rsi_long_max,
                    band_width_min: point.band_width_min,
                    config,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub params: String,
    pub bb_period: usize,
    pub bb_k: f64,
    pub cooldown: usize,
    pub ema_trend: usize,
    pub rsi_long_max: Option<f64>,
    pub band_width_min: Option<f64>,
    pub trades: usize,
    pub win_rate_pct: f64,
    pub avg_trade_ret_pct: f64,
    pub equity_multiple: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Ranked best first.
    pub rows: Vec<SweepRow>,
    pub evaluated: usize,
    /// Candidates that failed validation or could not run.
    pub rejected: usize,
}

impl SweepResult {
    pub fn best(&self) -> Option<&SweepRow> {
        self.rows.first()
    }
}

fn evaluate(
    bars: &[Bar],
    higher: Option<&[Bar]>,
    candidate: &SweepCandidate,
    cost: &CostModel,
) -> Option<SweepRow> {
    let result = match run_backtest_with_higher(bars, higher, &candidate.config, cost) {
        Ok(result) => result,
        Err(e) => {
            warn!(params = %candidate.label, error = %e, "sweep candidate rejected");
            return None;
        }
    };
    let stats = TradeStats::compute(&result.trades);
    Some(SweepRow {
        params: candidate.label.clone(),
        bb_period: candidate.bb_period,
        bb_k: candidate.bb_k,
        cooldown: candidate.cooldown,
        ema_trend: candidate.ema_trend,
        rsi_long_max: candidate.rsi_long_max,
        band_width_min: candidate.band_width_min,
        trades: stats.trades,
        win_rate_pct: stats.win_rate_pct,
        avg_trade_ret_pct: stats.avg_trade_ret_pct,
        equity_multiple: result.equity_multiple,
        max_drawdown_pct: max_drawdown(&result.equity_curve) * 100.0,
    })
}

/// Equity multiple descending, then drawdown ascending, then label.
fn rank(a: &SweepRow, b: &SweepRow) -> Ordering {
    b.equity_multiple
        .total_cmp(&a.equity_multiple)
        .then(a.max_drawdown_pct.total_cmp(&b.max_drawdown_pct))
        .then_with(|| a.params.cmp(&b.params))
}

/// Runs every candidate in parallel over the shared bars and keeps those
/// with at least `min_trades` trades.
pub fn run_sweep(
    bars: &[Bar],
    candidates: &[SweepCandidate],
    cost: &CostModel,
    min_trades: usize,
) -> Result<SweepResult, RegimetraderError> {
    run_sweep_with_higher(bars, None, candidates, cost, min_trades)
}

/// [`run_sweep`] with higher-interval bars shared by every candidate's bias.
pub fn run_sweep_with_higher(
    bars: &[Bar],
    higher: Option<&[Bar]>,
    candidates: &[SweepCandidate],
    cost: &CostModel,
    min_trades: usize,
) -> Result<SweepResult, RegimetraderError> {
    validate_bars(bars)?;
    if let Some(higher) = higher {
        validate_bars(higher)?;
    }
    cost.validate()?;

    let evaluated: Vec<Option<SweepRow>> = candidates
        .par_iter()
        .map(|candidate| evaluate(bars, higher, candidate, cost))
        .collect();

    let rejected = evaluated.iter().filter(|r| r.is_none()).count();
    let mut rows: Vec<SweepRow> = evaluated
        .into_iter()
        .flatten()
        .filter(|row| row.trades >= min_trades)
        .collect();
    rows.sort_by(rank);

    info!(
        candidates = candidates.len(),
        kept = rows.len(),
        rejected,
        "sweep finished"
    );
    Ok(SweepResult {
        rows,
        evaluated: candidates.len(),
        rejected,
    })
}
