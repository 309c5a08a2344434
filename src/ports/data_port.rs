//! Bar data access port trait.

use crate::domain::error::RegimetraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Every bar for `symbol` at `interval`, oldest first, validated for
    /// strictly increasing open times.
    fn fetch_bars(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, RegimetraderError>;
}
