//! Higher-timeframe bias.
//!
//! A bias rule turns a coarser bar series (for example 1h under 15m bars)
//! into a bullish/not-bullish flag per higher bar. [`align_bias`] carries
//! each flag forward onto the base bars: a base bar sees the flag of the
//! latest higher bar that had closed by the base bar's own close, never one
//! still forming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::RegimetraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_helpers::{IndicatorSnapshot, compute_indicators};
use crate::domain::ohlcv::{Bar, validate_bars};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BiasRule {
    /// Fast EMA above slow EMA of the higher closes.
    EmaStack { fast: usize, slow: usize },
    /// Higher close above its simple moving average.
    CloseAboveSma { period: usize },
}

impl BiasRule {
    pub fn indicators(&self) -> Vec<IndicatorType> {
        match *self {
            BiasRule::EmaStack { fast, slow } => {
                vec![IndicatorType::Ema(fast), IndicatorType::Ema(slow)]
            }
            BiasRule::CloseAboveSma { period } => vec![IndicatorType::Sma(period)],
        }
    }

    /// `Some(true)` when bullish at higher bar `i`, `None` while warming up.
    fn evaluate(&self, bars: &[Bar], snapshot: &IndicatorSnapshot, i: usize) -> Option<bool> {
        match *self {
            BiasRule::EmaStack { fast, slow } => {
                let f = snapshot.simple(&IndicatorType::Ema(fast), i)?;
                let s = snapshot.simple(&IndicatorType::Ema(slow), i)?;
                Some(f > s)
            }
            BiasRule::CloseAboveSma { period } => {
                let sma = snapshot.simple(&IndicatorType::Sma(period), i)?;
                Some(bars[i].close > sma)
            }
        }
    }

    pub fn validate(&self) -> Result<(), RegimetraderError> {
        for indicator in self.indicators() {
            for (name, window) in indicator.windows() {
                if window == 0 {
                    return Err(RegimetraderError::invalid(name, "window must be positive"));
                }
            }
        }
        if let BiasRule::EmaStack { fast, slow } = *self {
            if fast >= slow {
                return Err(RegimetraderError::invalid(
                    "bias_fast",
                    "fast EMA must be shorter than slow EMA",
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for BiasRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiasRule::EmaStack { fast, slow } => write!(f, "ema_stack({fast},{slow})"),
            BiasRule::CloseAboveSma { period } => write!(f, "close_above_sma({period})"),
        }
    }
}

/// Rule names as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasRuleKind {
    EmaStack,
    CloseAboveSma,
}

impl FromStr for BiasRuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ema_stack" | "ema" => Ok(BiasRuleKind::EmaStack),
            "close_above_sma" | "sma" => Ok(BiasRuleKind::CloseAboveSma),
            other => Err(format!("unknown bias rule '{other}'")),
        }
    }
}

/// Where the bias comes from: the higher interval to load and the rule
/// applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HigherTimeframe {
    pub interval: String,
    pub rule: BiasRule,
}

impl HigherTimeframe {
    pub fn validate(&self) -> Result<(), RegimetraderError> {
        if self.interval.trim().is_empty() {
            return Err(RegimetraderError::invalid(
                "bias_interval",
                "interval must not be empty",
            ));
        }
        self.rule.validate()
    }
}

/// Bias flag per higher bar.
pub fn bias_series(higher: &[Bar], rule: &BiasRule) -> Result<Vec<Option<bool>>, RegimetraderError> {
    validate_bars(higher)?;
    rule.validate()?;
    let snapshot = compute_indicators(higher, &rule.indicators())?;
    Ok((0..higher.len())
        .map(|i| rule.evaluate(higher, &snapshot, i))
        .collect())
}

/// Forward-fills `flags` (one per `higher` bar) onto `base`. Base bars before
/// the first higher close get `None`.
pub fn align_bias(base: &[Bar], higher: &[Bar], flags: &[Option<bool>]) -> Vec<Option<bool>> {
    let mut out = Vec::with_capacity(base.len());
    let mut next = 0;
    let mut current = None;
    for bar in base {
        while next < higher.len() && higher[next].close_time <= bar.close_time {
            current = flags.get(next).copied().flatten();
            next += 1;
        }
        out.push(current);
    }
    out
}

/// Bias for every base bar under `timeframe`'s rule.
pub fn aligned_bias(
    base: &[Bar],
    higher: &[Bar],
    timeframe: &HigherTimeframe,
) -> Result<Vec<Option<bool>>, RegimetraderError> {
    let flags = bias_series(higher, &timeframe.rule)?;
    let aligned = align_bias(base, higher, &flags);
    tracing::debug!(
        interval = %timeframe.interval,
        rule = %timeframe.rule,
        higher_bars = higher.len(),
        bullish = aligned.iter().filter(|b| **b == Some(true)).count(),
        "higher-timeframe bias aligned"
    );
    Ok(aligned)
}
