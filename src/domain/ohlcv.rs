//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::RegimetraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Rejects sequences whose open times are not strictly increasing.
pub fn validate_bars(bars: &[Bar]) -> Result<(), RegimetraderError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].open_time <= pair[0].open_time {
            return Err(RegimetraderError::DataGap {
                index: i + 1,
                previous: pair[0].open_time.to_rfc3339(),
                current: pair[1].open_time.to_rfc3339(),
            });
        }
    }
    Ok(())
}

pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// close_last / close_first, or 1.0 when fewer than two bars.
pub fn buy_and_hold_multiple(bars: &[Bar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if bars.len() > 1 && first.close > 0.0 => {
            last.close / first.close
        }
        _ => 1.0,
    }
}
