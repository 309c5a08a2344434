//! Month-by-month walk-forward over regime picks.
//!
//! Every month is classified from earlier months only, then traded in
//! isolation: the picked strategy starts flat on the first bar of the month
//! and sees no bars outside it. Neutral months earn the month's buy-and-hold
//! multiple.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::backtest::run_backtest;
use crate::domain::cost::CostModel;
use crate::domain::error::RegimetraderError;
use crate::domain::metrics::{TradeStats, max_drawdown};
use crate::domain::ohlcv::{Bar, buy_and_hold_multiple, validate_bars};
use crate::domain::regime::{
    PeriodId, Policy, RegimeClassifier, RegimeConfig, SkipReason, month_stat, split_periods,
};
use crate::domain::strategy::StrategyConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardConfig {
    pub regime: RegimeConfig,
    pub mean_reversion: StrategyConfig,
    pub momentum: StrategyConfig,
    pub cost: CostModel,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig {
            regime: RegimeConfig::default(),
            mean_reversion: StrategyConfig::mean_reversion(16, 2.4),
            momentum: StrategyConfig::momentum(10, 40),
            cost: CostModel::default(),
        }
    }
}

impl WalkForwardConfig {
    pub fn strategy_for(&self, policy: Policy) -> Option<&StrategyConfig> {
        match policy {
            Policy::MeanReversion => Some(&self.mean_reversion),
            Policy::Momentum => Some(&self.momentum),
            Policy::Neutral => None,
        }
    }

    pub fn validate(&self) -> Result<(), RegimetraderError> {
        self.regime.validate()?;
        for (name, strategy) in [("mean_reversion", &self.mean_reversion), ("momentum", &self.momentum)] {
            strategy.validate()?;
            if strategy.needs_bias() {
                return Err(RegimetraderError::invalid(
                    name,
                    "walk-forward policies trade one period's bars and cannot read a higher-timeframe bias",
                ));
            }
        }
        self.cost.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRow {
    pub period: PeriodId,
    pub policy: Policy,
    pub multiplier: f64,
    pub buyhold_multiplier: f64,
    pub trades: usize,
    pub win_rate_pct: f64,
    pub max_drawdown_pct: f64,
    pub strategy_cumulative: f64,
    pub buyhold_cumulative: f64,
    /// Set when the picked strategy sat the period out flat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkippedPeriod {
    pub period: PeriodId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardResult {
    pub rows: Vec<PeriodRow>,
    pub skipped: Vec<SkippedPeriod>,
    pub strategy_cumulative: f64,
    pub buyhold_cumulative: f64,
    /// Strategy over buy-and-hold cumulative multiple.
    pub ratio: f64,
}

impl WalkForwardResult {
    /// The last `n` traded periods.
    pub fn last(&self, n: usize) -> &[PeriodRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    pub fn policy_count(&self, policy: Policy) -> usize {
        self.rows.iter().filter(|r| r.policy == policy).count()
    }
}

pub fn run_walk_forward(
    bars: &[Bar],
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, RegimetraderError> {
    validate_bars(bars)?;
    config.validate()?;
    let classifier = RegimeClassifier::new(config.regime)?;

    let periods = split_periods(bars);
    let stats: Vec<_> = periods
        .iter()
        .map(|(id, slice)| month_stat(*id, slice))
        .collect();

    let mut rows = Vec::new();
    let mut skipped = Vec::new();
    let mut strategy_cumulative = 1.0;
    let mut buyhold_cumulative = 1.0;

    for (target, (period, slice)) in periods.iter().enumerate() {
        let pick = match classifier.pick(&stats, target) {
            Ok(pick) => pick,
            Err(reason) => {
                warn!(period = %period, %reason, "period skipped");
                skipped.push(SkippedPeriod {
                    period: *period,
                    reason,
                });
                continue;
            }
        };

        let buyhold_multiplier = buy_and_hold_multiple(slice);
        let mut note = None;
        let (multiplier, stats_row, drawdown) = match config.strategy_for(pick.policy) {
            None => (buyhold_multiplier, TradeStats::default(), 0.0),
            Some(strategy) if slice.len() < strategy.warmup_bars() => {
                // the month still counts: flat for the strategy, held for buy-and-hold
                let text = format!(
                    "period has {} bars, warm-up needs {}; held flat",
                    slice.len(),
                    strategy.warmup_bars()
                );
                warn!(period = %period, policy = %pick.policy, reason = %text, "strategy idle");
                note = Some(text);
                (1.0, TradeStats::default(), 0.0)
            }
            Some(strategy) => {
                let result = run_backtest(slice, strategy, &config.cost)?;
                (
                    result.equity_multiple,
                    TradeStats::compute(&result.trades),
                    max_drawdown(&result.equity_curve),
                )
            }
        };

        strategy_cumulative *= multiplier;
        buyhold_cumulative *= buyhold_multiplier;
        info!(
            period = %period,
            policy = %pick.policy,
            multiplier,
            buyhold_multiplier,
            trades = stats_row.trades,
            "period traded"
        );
        rows.push(PeriodRow {
            period: *period,
            policy: pick.policy,
            multiplier,
            buyhold_multiplier,
            trades: stats_row.trades,
            win_rate_pct: stats_row.win_rate_pct,
            max_drawdown_pct: drawdown * 100.0,
            strategy_cumulative,
            buyhold_cumulative,
            note,
        });
    }

    Ok(WalkForwardResult {
        rows,
        skipped,
        strategy_cumulative,
        buyhold_cumulative,
        ratio: strategy_cumulative / buyhold_cumulative,
    })
}
