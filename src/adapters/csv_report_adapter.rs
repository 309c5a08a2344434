//! CSV and JSON report writer.
//!
//! Files land in the output directory as `<stem>_summary.json`,
//! `<stem>_trades.csv`, `<stem>_walkforward.csv` (plus
//! `<stem>_walkforward_last<N>.csv`) and `<stem>_sweep.csv`.

use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::domain::error::RegimetraderError;
use crate::domain::metrics::Summary;
use crate::domain::position::{Side, Trade};
use crate::domain::regime::PeriodId;
use crate::domain::sweep::SweepResult;
use crate::domain::walk_forward::{PeriodRow, WalkForwardResult};
use crate::ports::report_port::ReportPort;

const SKIPPED: &str = "SKIPPED";

#[derive(Debug, Serialize)]
struct LedgerRow {
    side: Side,
    mode: String,
    entry_time: String,
    entry_price: f64,
    exit_time: String,
    exit_price: f64,
    gross_ret_pct: f64,
    net_ret_pct: f64,
    equity: f64,
    reasons: String,
}

impl From<&Trade> for LedgerRow {
    fn from(t: &Trade) -> Self {
        LedgerRow {
            side: t.side,
            mode: t.mode.clone(),
            entry_time: t.entry_time.to_rfc3339(),
            entry_price: t.entry_price,
            exit_time: t.exit_time.to_rfc3339(),
            exit_price: t.exit_price,
            gross_ret_pct: t.gross_return * 100.0,
            net_ret_pct: t.net_return * 100.0,
            equity: t.equity_after,
            reasons: t.reason_tags(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PeriodRecord {
    period: String,
    policy: String,
    multiplier: Option<f64>,
    buyhold_multiplier: Option<f64>,
    trades: Option<usize>,
    win_rate_pct: Option<f64>,
    max_drawdown_pct: Option<f64>,
    strategy_cumulative: Option<f64>,
    buyhold_cumulative: Option<f64>,
    note: String,
}

impl From<&PeriodRow> for PeriodRecord {
    fn from(r: &PeriodRow) -> Self {
        PeriodRecord {
            period: r.period.to_string(),
            policy: r.policy.to_string(),
            multiplier: Some(r.multiplier),
            buyhold_multiplier: Some(r.buyhold_multiplier),
            trades: Some(r.trades),
            win_rate_pct: Some(r.win_rate_pct),
            max_drawdown_pct: Some(r.max_drawdown_pct),
            strategy_cumulative: Some(r.strategy_cumulative),
            buyhold_cumulative: Some(r.buyhold_cumulative),
            note: r.note.clone().unwrap_or_default(),
        }
    }
}

pub struct CsvReportAdapter {
    output_dir: PathBuf,
}

impl CsvReportAdapter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn path(&self, stem: &str, suffix: &str) -> Result<PathBuf, RegimetraderError> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(format!("{stem}_{suffix}")))
    }

    fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RegimetraderError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Traded and skipped periods interleaved in calendar order.
fn period_records(result: &WalkForwardResult) -> Vec<PeriodRecord> {
    let mut keyed: Vec<(PeriodId, PeriodRecord)> = result
        .rows
        .iter()
        .map(|r| (r.period, PeriodRecord::from(r)))
        .collect();
    keyed.extend(result.skipped.iter().map(|s| {
        (
            s.period,
            PeriodRecord {
                period: s.period.to_string(),
                policy: SKIPPED.to_string(),
                multiplier: None,
                buyhold_multiplier: None,
                trades: None,
                win_rate_pct: None,
                max_drawdown_pct: None,
                strategy_cumulative: None,
                buyhold_cumulative: None,
                note: s.reason.to_string(),
            },
        )
    }));
    keyed.sort_by_key(|(period, _)| *period);
    keyed.into_iter().map(|(_, record)| record).collect()
}

impl ReportPort for CsvReportAdapter {
    fn write_summary(&self, stem: &str, summary: &Summary) -> Result<(), RegimetraderError> {
        let path = self.path(stem, "summary.json")?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, summary)?;
        Ok(())
    }

    fn write_ledger(&self, stem: &str, trades: &[Trade]) -> Result<(), RegimetraderError> {
        let rows: Vec<LedgerRow> = trades.iter().map(LedgerRow::from).collect();
        Self::write_rows(&self.path(stem, "trades.csv")?, &rows)
    }

    fn write_walk_forward(
        &self,
        stem: &str,
        result: &WalkForwardResult,
        last_periods: usize,
    ) -> Result<(), RegimetraderError> {
        Self::write_rows(&self.path(stem, "walkforward.csv")?, &period_records(result))?;
        if last_periods > 0 {
            let tail: Vec<PeriodRecord> =
                result.last(last_periods).iter().map(PeriodRecord::from).collect();
            let suffix = format!("walkforward_last{last_periods}.csv");
            Self::write_rows(&self.path(stem, &suffix)?, &tail)?;
        }
        Ok(())
    }

    fn write_sweep(&self, stem: &str, result: &SweepResult) -> Result<(), RegimetraderError> {
        Self::write_rows(&self.path(stem, "sweep.csv")?, &result.rows)
    }
}
