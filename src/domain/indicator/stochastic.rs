//! Stochastic oscillator.
//!
//! %K = (close - lowest_low_n) / (highest_high_n - lowest_low_n) × 100, 50 when
//! the range is flat. %D = SMA(%K, d).

use crate::domain::indicator::sma::sma;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Tail-aligned %K, length N - k_period + 1.
pub fn percent_k(bars: &[Bar], k_period: usize) -> Vec<f64> {
    if k_period == 0 || bars.len() < k_period {
        return Vec::new();
    }
    bars.windows(k_period)
        .map(|window| {
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let close = window[k_period - 1].close;
            let range = highest - lowest;
            if range > 0.0 {
                (close - lowest) / range * 100.0
            } else {
                50.0
            }
        })
        .collect()
}

pub fn calculate_stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let k = percent_k(bars, k_period);
    let d = sma(&k, d_period);
    // %D is shorter than %K by d-1; align both to the tail
    let skip = k.len().saturating_sub(d.len());
    let tail = k[skip..]
        .iter()
        .zip(d.iter())
        .map(|(&k, &d)| IndicatorValue::Stochastic { k, d })
        .collect();
    IndicatorSeries::from_tail(
        IndicatorType::Stochastic { k_period, d_period },
        bars.len(),
        tail,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        let t = Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap();
        Bar {
            open_time: t,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            close_time: t,
        }
    }

    #[test]
    fn percent_k_at_extremes() {
        let bars = vec![
            make_bar(0, 10.0, 5.0, 6.0),
            make_bar(1, 12.0, 6.0, 7.0),
            make_bar(2, 11.0, 7.0, 12.0),
        ];
        let k = percent_k(&bars, 3);
        assert_eq!(k.len(), 1);
        // (12 - 5) / (12 - 5)
        assert!((k[0] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn flat_range_is_midpoint() {
        let bars: Vec<Bar> = (0..4).map(|i| make_bar(i, 5.0, 5.0, 5.0)).collect();
        assert!(percent_k(&bars, 2).iter().all(|&v| v == 50.0));
    }

    #[test]
    fn series_alignment() {
        let bars: Vec<Bar> = (0..10)
            .map(|i| make_bar(i, 10.0 + i as f64, 5.0, 7.0 + i as f64))
            .collect();
        let series = calculate_stochastic(&bars, 4, 3);
        assert_eq!(series.values.len(), 10);
        // first valid index = 4 + 3 - 2
        assert!(series.get(4).is_none());
        assert!(series.get(5).is_some());
    }
}
