//! Simple Moving Average.
//!
//! Output of [`sma`] is aligned to the tail: length = N - period + 1, and
//! `out[j]` covers `values[j..j + period]`.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }
    out
}

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let tail = sma(&closes, period)
        .into_iter()
        .map(IndicatorValue::Simple)
        .collect();
    IndicatorSeries::from_tail(IndicatorType::Sma(period), bars.len(), tail)
}

/// SMA over bar volume, used by the volume-surge signal.
pub fn calculate_volume_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let tail = sma(&volumes, period)
        .into_iter()
        .map(IndicatorValue::Simple)
        .collect();
    IndicatorSeries::from_tail(IndicatorType::VolumeSma(period), bars.len(), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_is_tail_aligned() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 2.0).abs() < 1e-12);
        assert!((out[1] - 3.0).abs() < 1e-12);
        assert!((out[2] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sma_period_equal_to_len() {
        let out = sma(&[2.0, 4.0], 2);
        assert_eq!(out, vec![3.0]);
    }

    #[test]
    fn sma_too_short_or_zero_period() {
        assert!(sma(&[1.0, 2.0], 3).is_empty());
        assert!(sma(&[1.0, 2.0], 0).is_empty());
    }
}
