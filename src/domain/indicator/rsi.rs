//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! Gains and losses of close-to-close changes (the first bar counts as a zero
//! change) are smoothed with alpha = 1/n, seeded from the first value.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss); when avg_loss == 0 the RSI is
//! 50 (neutral).
//!
//! Warmup: first n bars are invalid.

use crate::domain::indicator::ema::smooth;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const NEUTRAL_RSI: f64 = 50.0;

pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }

    let mut gains = Vec::with_capacity(values.len());
    let mut losses = Vec::with_capacity(values.len());
    gains.push(0.0);
    losses.push(0.0);
    for w in values.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let alpha = 1.0 / period as f64;
    let avg_gain = smooth(&gains, alpha);
    let avg_loss = smooth(&losses, alpha);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(&g, &l)| {
            if l == 0.0 {
                NEUTRAL_RSI
            } else {
                100.0 - 100.0 / (1.0 + g / l)
            }
        })
        .collect()
}

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = rsi(&closes, period)
        .into_iter()
        .map(IndicatorValue::Simple)
        .collect();
    IndicatorSeries::from_full(IndicatorType::Rsi(period), period, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_is_neutral() {
        let out = rsi(&[10.0; 20], 14);
        assert_eq!(out.len(), 20);
        assert!(out.iter().all(|&v| v == NEUTRAL_RSI));
    }

    #[test]
    fn only_gains_default_to_neutral() {
        // avg_loss stays exactly zero, so the neutral default applies
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&prices, 14);
        assert_eq!(out[19], NEUTRAL_RSI);
    }

    #[test]
    fn falling_series_goes_low() {
        let mut prices: Vec<f64> = vec![100.0, 101.0];
        prices.extend((0..30).map(|i| 100.0 - i as f64));
        let out = rsi(&prices, 14);
        assert!(out[31] < 10.0, "rsi {}", out[31]);
    }

    #[test]
    fn hand_computed_two_step() {
        // changes 0, +2, -1, -1 with alpha 0.5
        // avg gains 0, 1, 0.5, 0.25; avg losses 0, 0, 0.5, 0.75 → rs = 1/3
        let out = rsi(&[10.0, 12.0, 11.0, 10.0], 2);
        assert!((out[3] - 25.0).abs() < 1e-12);
    }

    #[test]
    fn rsi_stays_in_range() {
        let prices: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0 + (i as f64 * 0.05).cos() * 3.0)
            .collect();
        for v in rsi(&prices, 14) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
