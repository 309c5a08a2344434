//! Report output port trait.

use crate::domain::error::RegimetraderError;
use crate::domain::metrics::Summary;
use crate::domain::position::Trade;
use crate::domain::sweep::SweepResult;
use crate::domain::walk_forward::WalkForwardResult;

/// Port for writing run results. `stem` names the run, e.g.
/// `SOLUSDT_15m_hybrid`; adapters derive file names from it.
pub trait ReportPort {
    fn write_summary(&self, stem: &str, summary: &Summary) -> Result<(), RegimetraderError>;

    fn write_ledger(&self, stem: &str, trades: &[Trade]) -> Result<(), RegimetraderError>;

    fn write_walk_forward(
        &self,
        stem: &str,
        result: &WalkForwardResult,
        last_periods: usize,
    ) -> Result<(), RegimetraderError>;

    fn write_sweep(&self, stem: &str, result: &SweepResult) -> Result<(), RegimetraderError>;
}
