//! Calendar-month regime classification.
//!
//! Each month is summarized by its realized volatility and net trend. The
//! month before a target is classified against quantiles of the months before
//! it, so a pick never sees data from the target month or later.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::RegimetraderError;
use crate::domain::ohlcv::Bar;

/// A UTC calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodId {
    pub year: i32,
    pub month: u32,
}

impl PeriodId {
    pub fn of(time: DateTime<Utc>) -> Self {
        PeriodId {
            year: time.year(),
            month: time.month(),
        }
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthStat {
    pub period: PeriodId,
    /// Population std of close-to-close returns inside the month.
    pub realized_vol: f64,
    /// Last close over first close, minus one.
    pub net_trend: f64,
    pub bar_count: usize,
}

/// Contiguous runs of bars sharing a calendar month of `open_time`.
pub fn split_periods(bars: &[Bar]) -> Vec<(PeriodId, &[Bar])> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        let boundary = i == bars.len()
            || PeriodId::of(bars[i].open_time) != PeriodId::of(bars[start].open_time);
        if boundary {
            out.push((PeriodId::of(bars[start].open_time), &bars[start..i]));
            start = i;
        }
    }
    out
}

pub fn month_stat(period: PeriodId, bars: &[Bar]) -> MonthStat {
    let returns: Vec<f64> = bars
        .windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();
    let realized_vol = if returns.is_empty() {
        0.0
    } else {
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt()
    };
    let net_trend = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => last.close / first.close - 1.0,
        _ => 0.0,
    };
    MonthStat {
        period,
        realized_vol,
        net_trend,
        bar_count: bars.len(),
    }
}

pub fn month_stats(bars: &[Bar]) -> Vec<MonthStat> {
    split_periods(bars)
        .into_iter()
        .map(|(period, slice)| month_stat(period, slice))
        .collect()
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    MeanReversion,
    Momentum,
    /// Hold the asset for the period.
    Neutral,
}

impl Policy {
    pub fn tag(&self) -> &'static str {
        match self {
            Policy::MeanReversion => "BB",
            Policy::Momentum => "EMA",
            Policy::Neutral => "BH",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Why a period received no pick. Not an error: the period is left out of
/// the cumulative products and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NoPriorPeriod,
    InsufficientTraining { available: usize, required: usize },
    TooFewBars { bars: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPriorPeriod => write!(f, "no prior period"),
            SkipReason::InsufficientTraining {
                available,
                required,
            } => write!(f, "training window has {available} periods, need {required}"),
            SkipReason::TooFewBars { bars, minimum } => {
                write!(f, "previous period has {bars} bars, need {minimum}")
            }
        }
    }
}

fn check_quantile(name: &str, q: f64) -> Result<(), RegimetraderError> {
    if (0.0..=1.0).contains(&q) {
        Ok(())
    } else {
        Err(RegimetraderError::invalid(name, "quantile must lie in [0, 1]"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeConfig {
    pub train_periods: usize,
    pub min_bars: usize,
    pub vol_quantile: f64,
    pub trend_quantile_mr: f64,
    pub trend_quantile_mom: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            train_periods: 9,
            min_bars: 850,
            vol_quantile: 0.35,
            trend_quantile_mr: 0.30,
            trend_quantile_mom: 0.65,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), RegimetraderError> {
        if self.train_periods == 0 {
            return Err(RegimetraderError::invalid(
                "train_periods",
                "training window must be positive",
            ));
        }
        check_quantile("vol_quantile", self.vol_quantile)?;
        check_quantile("trend_quantile_mr", self.trend_quantile_mr)?;
        check_quantile("trend_quantile_mom", self.trend_quantile_mom)?;
        if self.trend_quantile_mr > self.trend_quantile_mom {
            return Err(RegimetraderError::invalid(
                "trend_quantile_mr",
                "must not exceed trend_quantile_mom",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimePick {
    pub period: PeriodId,
    pub policy: Policy,
    pub q_vol: f64,
    pub q_mr: f64,
    pub q_mom: f64,
    pub previous: MonthStat,
}

#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Result<Self, RegimetraderError> {
        config.validate()?;
        Ok(RegimeClassifier { config })
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Picks a policy for `stats[target]` from the month before it and the
    /// `train_periods` months before that.
    pub fn pick(&self, stats: &[MonthStat], target: usize) -> Result<RegimePick, SkipReason> {
        let cfg = &self.config;
        if target == 0 || target >= stats.len() {
            return Err(SkipReason::NoPriorPeriod);
        }
        let prev_index = target - 1;
        if prev_index < cfg.train_periods {
            return Err(SkipReason::InsufficientTraining {
                available: prev_index,
                required: cfg.train_periods,
            });
        }
        let previous = stats[prev_index];
        if previous.bar_count < cfg.min_bars {
            return Err(SkipReason::TooFewBars {
                bars: previous.bar_count,
                minimum: cfg.min_bars,
            });
        }

        let train = &stats[prev_index - cfg.train_periods..prev_index];
        let vols: Vec<f64> = train.iter().map(|s| s.realized_vol).collect();
        let trends: Vec<f64> = train.iter().map(|s| s.net_trend.abs()).collect();
        // train is non-empty since train_periods >= 1
        let q_vol = quantile(&vols, cfg.vol_quantile).unwrap_or(f64::INFINITY);
        let q_mr = quantile(&trends, cfg.trend_quantile_mr).unwrap_or(0.0);
        let q_mom = quantile(&trends, cfg.trend_quantile_mom).unwrap_or(f64::INFINITY);

        let trend = previous.net_trend.abs();
        let policy = if previous.realized_vol >= q_vol && trend <= q_mr {
            Policy::MeanReversion
        } else if previous.realized_vol >= q_vol && trend >= q_mom {
            Policy::Momentum
        } else {
            Policy::Neutral
        };

        Ok(RegimePick {
            period: stats[target].period,
            policy,
            q_vol,
            q_mr,
            q_mom,
            previous,
        })
    }
}
