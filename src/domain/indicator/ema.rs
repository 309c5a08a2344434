//! Exponential Moving Average.
//!
//! alpha = 2/(n+1), out[0] = v[0], out[i] = alpha*v[i] + (1-alpha)*out[i-1].
//! Seeding from the first value means every index is defined; the series
//! wrapper still marks the first (n-1) points as warm-up.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    smooth(values, alpha)
}

/// First-value-seeded exponential smoothing with an explicit alpha.
pub fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema(&closes, period)
        .into_iter()
        .map(IndicatorValue::Simple)
        .collect();
    IndicatorSeries::from_full(
        IndicatorType::Ema(period),
        period.saturating_sub(1),
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seeded_from_first_value() {
        // alpha = 0.5
        let out = ema(&[10.0, 20.0, 30.0], 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 10.0).abs() < 1e-12);
        assert!((out[1] - 15.0).abs() < 1e-12);
        assert!((out[2] - 22.5).abs() < 1e-12);
    }

    #[test]
    fn ema_length_matches_input_and_is_deterministic() {
        let input: Vec<f64> = (0..50).map(|i| (i as f64 * 0.7).sin() * 5.0 + 100.0).collect();
        let a = ema(&input, 9);
        let b = ema(&input, 9);
        assert_eq!(a.len(), input.len());
        assert_eq!(a, b);
    }

    #[test]
    fn ema_of_constant_is_constant() {
        let out = ema(&[7.0; 10], 4);
        assert!(out.iter().all(|v| (v - 7.0).abs() < 1e-12));
    }

    #[test]
    fn ema_empty_input() {
        assert!(ema(&[], 5).is_empty());
    }
}
