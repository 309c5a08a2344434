//! CSV file bar data adapter.
//!
//! Reads `<base_path>/<SYMBOL>_<interval>.csv` with header
//! `open_time,open,high,low,close,volume,close_time`, timestamps in epoch
//! milliseconds. Rows are taken in file order; out-of-order rows are
//! rejected rather than sorted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::RegimetraderError;
use crate::domain::ohlcv::{Bar, validate_bars};
use crate::ports::data_port::DataPort;

#[derive(Debug, Deserialize)]
struct BarRecord {
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    close_time: i64,
}

fn from_millis(ms: i64, row: usize) -> Result<DateTime<Utc>, RegimetraderError> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| RegimetraderError::Data {
        reason: format!("row {row}: timestamp {ms} out of range"),
    })
}

impl BarRecord {
    fn into_bar(self, row: usize) -> Result<Bar, RegimetraderError> {
        Ok(Bar {
            open_time: from_millis(self.open_time, row)?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            close_time: from_millis(self.close_time, row)?,
        })
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, RegimetraderError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| RegimetraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (i, record) in rdr.deserialize::<BarRecord>().enumerate() {
            let record = record.map_err(|e| RegimetraderError::Data {
                reason: format!("{}: {}", path.display(), e),
            })?;
            bars.push(record.into_bar(i + 1)?);
        }

        validate_bars(&bars)?;
        Ok(bars)
    }
}
