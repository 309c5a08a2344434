//! Average True Range.
//!
//! TR[0] = high - low, TR[i] = max(high-low, |high-prev_close|, |low-prev_close|).
//! Smoothed either by a first-value-seeded EMA(n) or a plain rolling mean.

use crate::domain::indicator::ema::ema;
use crate::domain::indicator::sma::sma;
use crate::domain::indicator::{AtrSmoothing, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize, smoothing: AtrSmoothing) -> IndicatorSeries {
    let tr = true_ranges(bars);
    let indicator_type = IndicatorType::Atr { period, smoothing };
    match smoothing {
        AtrSmoothing::Ema => {
            let values = ema(&tr, period)
                .into_iter()
                .map(IndicatorValue::Simple)
                .collect();
            IndicatorSeries::from_full(indicator_type, period.saturating_sub(1), values)
        }
        AtrSmoothing::RollingMean => {
            let tail = sma(&tr, period)
                .into_iter()
                .map(IndicatorValue::Simple)
                .collect();
            IndicatorSeries::from_tail(indicator_type, bars.len(), tail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        let t = Utc.timestamp_opt(1_700_000_000 + i * 3600, 0).unwrap();
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

    fn simple(series: &IndicatorSeries, i: usize) -> Option<f64> {
        match series.get(i) {
            Some(IndicatorValue::Simple(v)) => Some(v),
            _ => None,
        }
    }

    #[test]
    fn first_true_range_is_high_low() {
        let bars = vec![make_bar(0, 12.0, 8.0, 10.0), make_bar(1, 11.0, 10.5, 10.8)];
        let tr = true_ranges(&bars);
        assert_eq!(tr, vec![4.0, 0.5]);
    }

    #[test]
    fn rolling_mean_variant() {
        let bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 11.0, 9.0, 10.0)).collect();
        let series = calculate_atr(&bars, 3, AtrSmoothing::RollingMean);
        assert_eq!(series.values.len(), 5);
        assert_eq!(simple(&series, 1), None);
        assert!((simple(&series, 2).unwrap() - 2.0).abs() < 1e-12);
        assert!((simple(&series, 4).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ema_variant_tracks_range_change() {
        let mut bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 11.0, 9.0, 10.0)).collect();
        bars.push(make_bar(5, 14.0, 10.0, 12.0));
        let series = calculate_atr(&bars, 3, AtrSmoothing::Ema);
        // TR jumps from 2 to 4; alpha = 0.5 → 3
        assert!((simple(&series, 4).unwrap() - 2.0).abs() < 1e-12);
        assert!((simple(&series, 5).unwrap() - 3.0).abs() < 1e-12);
    }
}
