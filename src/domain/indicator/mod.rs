//! Technical indicator implementations.
//!
//! Each indicator exposes a raw numeric function over `&[f64]` plus a
//! `calculate_*` wrapper producing an [`IndicatorSeries`] index-aligned to the
//! input bars:
//! - `IndicatorPoint`: one point, `valid == false` during warm-up
//! - `IndicatorValue`: enum for the different output shapes
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: a sequence of points, one per bar

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

/// How true range is smoothed into ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    /// EMA with alpha = 2/(n+1), seeded from the first true range.
    Ema,
    /// Plain rolling mean over n true ranges.
    RollingMean,
}

/// Dynamic Bollinger multiplier settings. Ratios are stored x100 so the type
/// can be hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicK {
    pub vol_window: usize,
    pub vol_ema: usize,
    pub ratio_min_x100: u32,
    pub ratio_max_x100: u32,
}

impl DynamicK {
    pub fn ratio_min(&self) -> f64 {
        self.ratio_min_x100 as f64 / 100.0
    }

    pub fn ratio_max(&self) -> f64 {
        self.ratio_max_x100 as f64 / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr {
        period: usize,
        smoothing: AtrSmoothing,
    },
    VolumeSma(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
        dynamic: Option<DynamicK>,
    },
}

impl IndicatorType {
    /// Number of bars needed before the first valid value.
    pub fn lookback(&self) -> usize {
        match *self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::VolumeSma(n) => n,
            IndicatorType::Rsi(n) => n + 1,
            IndicatorType::Atr { period, .. } => period,
            IndicatorType::Macd { slow, signal, .. } => (slow + signal).saturating_sub(1),
            IndicatorType::Stochastic { k_period, d_period } => {
                (k_period + d_period).saturating_sub(1)
            }
            IndicatorType::Bollinger { period, .. } => period,
        }
    }

    /// Window lengths that must be positive.
    pub fn windows(&self) -> Vec<(&'static str, usize)> {
        match *self {
            IndicatorType::Sma(n) => vec![("sma_period", n)],
            IndicatorType::Ema(n) => vec![("ema_period", n)],
            IndicatorType::Rsi(n) => vec![("rsi_period", n)],
            IndicatorType::Atr { period, .. } => vec![("atr_period", period)],
            IndicatorType::VolumeSma(n) => vec![("volume_ma", n)],
            IndicatorType::Macd { fast, slow, signal } => vec![
                ("macd_fast", fast),
                ("macd_slow", slow),
                ("macd_signal", signal),
            ],
            IndicatorType::Stochastic { k_period, d_period } => {
                vec![("stoch_k", k_period), ("stoch_d", d_period)]
            }
            IndicatorType::Bollinger {
                period, dynamic, ..
            } => {
                let mut w = vec![("bb_period", period)];
                if let Some(d) = dynamic {
                    w.push(("bb_vol_window", d.vol_window));
                    w.push(("bb_vol_ema", d.vol_ema));
                }
                w
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Builds a series from values aligned to the tail of `len` bars; the
    /// leading `len - tail.len()` points are invalid.
    pub fn from_tail(indicator_type: IndicatorType, len: usize, tail: Vec<IndicatorValue>) -> Self {
        let pad = len.saturating_sub(tail.len());
        let mut values = Vec::with_capacity(len);
        let blank = tail.first().copied().unwrap_or(IndicatorValue::Simple(0.0));
        values.extend((0..pad).map(|_| IndicatorPoint {
            valid: false,
            value: blank,
        }));
        values.extend(tail.into_iter().map(|value| IndicatorPoint { valid: true, value }));
        Self {
            indicator_type,
            values,
        }
    }

    /// Builds a full-length series whose points become valid at `first_valid`.
    pub fn from_full(
        indicator_type: IndicatorType,
        first_valid: usize,
        values: Vec<IndicatorValue>,
    ) -> Self {
        let values = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| IndicatorPoint {
                valid: i >= first_valid,
                value,
            })
            .collect();
        Self {
            indicator_type,
            values,
        }
    }

    /// The value at bar `index`, or `None` during warm-up.
    pub fn get(&self, index: usize) -> Option<IndicatorValue> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr { period, smoothing } => match smoothing {
                AtrSmoothing::Ema => write!(f, "ATR({})", period),
                AtrSmoothing::RollingMean => write!(f, "ATR_MEAN({})", period),
            },
            IndicatorType::VolumeSma(period) => write!(f, "VOL_SMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCH({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
                dynamic,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                match dynamic {
                    Some(_) => write!(f, "BB_DYN({},{:.2})", period, mult),
                    None => write!(f, "BB({},{:.2})", period, mult),
                }
            }
        }
    }
}

/// Converts a float multiplier to the hashed x100 representation.
pub fn to_x100(value: f64) -> u32 {
    (value * 100.0).round().max(0.0) as u32
}
