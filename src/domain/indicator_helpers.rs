//! Indicator snapshot: every series a strategy needs, computed once and
//! index-aligned to the bars.

use std::collections::HashMap;

use crate::domain::error::RegimetraderError;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::macd::calculate_macd;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::{calculate_sma, calculate_volume_sma};
use crate::domain::indicator::stochastic::calculate_stochastic;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Extra bars beyond the longest window, so the previous value of every
/// series is defined on the first tradable bar.
pub const WARMUP_MARGIN: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSnapshot {
    pub fn get(&self, indicator: &IndicatorType, index: usize) -> Option<IndicatorValue> {
        self.series.get(indicator).and_then(|s| s.get(index))
    }

    pub fn simple(&self, indicator: &IndicatorType, index: usize) -> Option<f64> {
        match self.get(indicator, index)? {
            IndicatorValue::Simple(v) => Some(v),
            _ => None,
        }
    }

    /// (upper, middle, lower)
    pub fn bands(&self, indicator: &IndicatorType, index: usize) -> Option<(f64, f64, f64)> {
        match self.get(indicator, index)? {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => Some((upper, middle, lower)),
            _ => None,
        }
    }

    /// (line, signal)
    pub fn macd(&self, indicator: &IndicatorType, index: usize) -> Option<(f64, f64)> {
        match self.get(indicator, index)? {
            IndicatorValue::Macd { line, signal, .. } => Some((line, signal)),
            _ => None,
        }
    }

    /// (%K, %D)
    pub fn stochastic(&self, indicator: &IndicatorType, index: usize) -> Option<(f64, f64)> {
        match self.get(indicator, index)? {
            IndicatorValue::Stochastic { k, d } => Some((k, d)),
            _ => None,
        }
    }

    pub fn series(&self, indicator: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Bars required before the first tradable bar for a set of indicators.
pub fn required_bars(indicators: &[IndicatorType]) -> usize {
    indicators.iter().map(|t| t.lookback()).max().unwrap_or(0) + WARMUP_MARGIN
}

pub fn calculate_indicator(bars: &[Bar], indicator: &IndicatorType) -> IndicatorSeries {
    match *indicator {
        IndicatorType::Sma(n) => calculate_sma(bars, n),
        IndicatorType::Ema(n) => calculate_ema(bars, n),
        IndicatorType::Rsi(n) => calculate_rsi(bars, n),
        IndicatorType::Atr { period, smoothing } => calculate_atr(bars, period, smoothing),
        IndicatorType::VolumeSma(n) => calculate_volume_sma(bars, n),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        IndicatorType::Stochastic { k_period, d_period } => {
            calculate_stochastic(bars, k_period, d_period)
        }
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
            dynamic,
        } => calculate_bollinger(bars, period, stddev_mult_x100, dynamic),
    }
}

/// Computes every requested indicator, failing when a window is zero or the
/// history is shorter than the longest window plus [`WARMUP_MARGIN`].
pub fn compute_indicators(
    bars: &[Bar],
    indicators: &[IndicatorType],
) -> Result<IndicatorSnapshot, RegimetraderError> {
    for indicator in indicators {
        for (name, window) in indicator.windows() {
            if window == 0 {
                return Err(RegimetraderError::invalid(name, "window must be positive"));
            }
        }
        let minimum = indicator.lookback() + WARMUP_MARGIN;
        if bars.len() < minimum {
            return Err(RegimetraderError::InsufficientData {
                context: indicator.to_string(),
                bars: bars.len(),
                minimum,
            });
        }
    }

    let series = indicators
        .iter()
        .map(|t| (*t, calculate_indicator(bars, t)))
        .collect();
    Ok(IndicatorSnapshot { series })
}
