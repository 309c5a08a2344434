//! Bollinger Bands.
//!
//! - Middle: SMA(close, p)
//! - Upper/Lower: middle ± k × population StdDev(close, p)
//!
//! The dynamic variant scales k per bar by rv / EMA(rv), clipped to
//! [ratio_min, ratio_max], where rv is the rolling std of close-to-close
//! returns. While rv or its EMA is undefined (or the EMA is zero) the ratio
//! is 1.0.

use crate::domain::indicator::ema::smooth;
use crate::domain::indicator::sma::sma;
use crate::domain::indicator::stddev::rolling_std;
use crate::domain::indicator::{DynamicK, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Full-length multiplier scale for the dynamic variant.
pub fn dynamic_ratio(closes: &[f64], dynamic: &DynamicK) -> Vec<f64> {
    let n = closes.len();
    let mut ratio = vec![1.0; n];
    if n < 2 || dynamic.vol_window == 0 {
        return ratio;
    }

    let returns: Vec<f64> = closes
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let rv = rolling_std(&returns, dynamic.vol_window);
    if rv.is_empty() {
        return ratio;
    }
    let alpha = 2.0 / (dynamic.vol_ema as f64 + 1.0);
    let rv_ema = smooth(&rv, alpha);

    // rv[j] covers returns[j..j + w], i.e. ends at bar j + w
    let offset = dynamic.vol_window;
    for (j, (&v, &base)) in rv.iter().zip(rv_ema.iter()).enumerate() {
        if base > 0.0 {
            ratio[j + offset] = (v / base).clamp(dynamic.ratio_min(), dynamic.ratio_max());
        }
    }
    ratio
}

pub fn calculate_bollinger(
    bars: &[Bar],
    period: usize,
    stddev_mult_x100: u32,
    dynamic: Option<DynamicK>,
) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let k = stddev_mult_x100 as f64 / 100.0;
    let mid = sma(&closes, period);
    let sd = rolling_std(&closes, period);
    let scale = match &dynamic {
        Some(d) => dynamic_ratio(&closes, d),
        None => vec![1.0; closes.len()],
    };

    let offset = period.saturating_sub(1);
    let tail = mid
        .iter()
        .zip(sd.iter())
        .enumerate()
        .map(|(j, (&m, &s))| {
            let k_i = k * scale[j + offset];
            IndicatorValue::Bollinger {
                upper: m + k_i * s,
                middle: m,
                lower: m - k_i * s,
            }
        })
        .collect();

    IndicatorSeries::from_tail(
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
            dynamic,
        },
        bars.len(),
        tail,
    )
}
