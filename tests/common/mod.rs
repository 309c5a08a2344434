#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
pub use regimetrader::domain::ohlcv::Bar;
use regimetrader::domain::error::RegimetraderError;
use regimetrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub const CSV_HEADER: &str = "open_time,open,high,low,close,volume,close_time";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_bar(open_time: DateTime<Utc>, close: f64) -> Bar {
    Bar {
        open_time,
        open: close,
        high: close * 1.002,
        low: close * 0.998,
        close,
        volume: 100.0,
        close_time: open_time + Duration::minutes(59),
    }
}

/// Hourly bars starting at [`start_time`].
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start_time() + Duration::hours(i as i64), c))
        .collect()
}

/// `cycles` repetitions of 40 bars at 100 with a two-bar dip to 95 at
/// offsets 30 and 31.
pub fn dip_cycles(cycles: usize) -> Vec<f64> {
    (0..cycles * 40)
        .map(|i| match i % 40 {
            30 | 31 => 95.0,
            _ => 100.0,
        })
        .collect()
}

pub fn linear_rise(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

/// One calendar month of hourly bars per entry of `highs`, starting
/// January 2023. Closes alternate between 100 and that month's high, so
/// every month ends on its high.
pub fn monthly_bars(highs: &[f64], per_month: usize) -> Vec<Bar> {
    let mut bars = Vec::new();
    for (m, &high) in highs.iter().enumerate() {
        let start = Utc
            .with_ymd_and_hms(2023 + (m / 12) as i32, (m % 12) as u32 + 1, 1, 0, 0, 0)
            .unwrap();
        for i in 0..per_month {
            let close = if i % 2 == 0 { 100.0 } else { high };
            bars.push(make_bar(start + Duration::hours(i as i64), close));
        }
    }
    bars
}

/// Writes `bars` as `<dir>/<symbol>_<interval>.csv` in the input format.
pub fn write_bars_csv(dir: &Path, symbol: &str, interval: &str, bars: &[Bar]) {
    let mut content = String::from(CSV_HEADER);
    content.push('\n');
    for b in bars {
        writeln!(
            content,
            "{},{},{},{},{},{},{}",
            b.open_time.timestamp_millis(),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume,
            b.close_time.timestamp_millis()
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{symbol}_{interval}.csv")), content).unwrap();
}

/// 15m bars: a sine swing over a drift that rises then falls, with
/// volume above its average on every third bar.
pub fn quarter_hour_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let open_time = start_time() + Duration::minutes(15 * i as i64);
            let drift = 0.01 * if i < n / 2 { i as f64 } else { (n - i) as f64 };
            let close = 100.0 + drift + 5.0 * (i as f64 / 15.0).sin();
            Bar {
                open_time,
                open: close,
                high: close + 0.3,
                low: close - 0.3,
                close,
                volume: 100.0 + (i % 3) as f64 * 20.0,
                close_time: open_time + Duration::minutes(15) - Duration::milliseconds(1),
            }
        })
        .collect()
}

/// Groups of four 15m bars as 1h bars.
pub fn hourly(bars: &[Bar]) -> Vec<Bar> {
    bars.chunks_exact(4)
        .map(|c| Bar {
            open_time: c[0].open_time,
            open: c[0].open,
            high: c.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            low: c.iter().map(|b| b.low).fold(f64::MAX, f64::min),
            close: c[3].close,
            volume: c.iter().map(|b| b.volume).sum(),
            close_time: c[3].close_time,
        })
        .collect()
}

/// Bars keyed by symbol, with optional per-interval series that take
/// precedence for that interval.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub by_interval: HashMap<(String, String), Vec<Bar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            by_interval: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_interval_bars(mut self, symbol: &str, interval: &str, bars: Vec<Bar>) -> Self {
        self.by_interval
            .insert((symbol.to_string(), interval.to_string()), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, RegimetraderError> {
        self.by_interval
            .get(&(symbol.to_string(), interval.to_string()))
            .or_else(|| self.data.get(symbol))
            .cloned()
            .ok_or_else(|| RegimetraderError::Data {
                reason: format!("no {interval} bars for {symbol}"),
            })
    }
}
