//! MACD (Moving Average Convergence Divergence).
//!
//! line = EMA(close, fast) - EMA(close, slow), signal = EMA(line, signal_n),
//! histogram = line - signal. All EMAs are first-value seeded.

use crate::domain::indicator::ema::ema;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<(f64, f64, f64)> {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    line.iter()
        .zip(signal_line.iter())
        .map(|(&l, &s)| (l, s, l - s))
        .collect()
}

pub fn calculate_macd(bars: &[Bar], fast: usize, slow: usize, signal: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = macd(&closes, fast, slow, signal)
        .into_iter()
        .map(|(line, signal, histogram)| IndicatorValue::Macd {
            line,
            signal,
            histogram,
        })
        .collect();
    IndicatorSeries::from_full(
        IndicatorType::Macd { fast, slow, signal },
        (slow + signal).saturating_sub(2),
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_prices_give_zero_macd() {
        let out = macd(&[50.0; 40], 12, 26, 9);
        assert_eq!(out.len(), 40);
        for (line, signal, hist) in out {
            assert!(line.abs() < 1e-12);
            assert!(signal.abs() < 1e-12);
            assert!(hist.abs() < 1e-12);
        }
    }

    #[test]
    fn rising_prices_give_positive_line() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let out = macd(&prices, 12, 26, 9);
        let (line, signal, hist) = out[59];
        assert!(line > 0.0);
        assert!((hist - (line - signal)).abs() < 1e-12);
    }
}
