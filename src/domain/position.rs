//! Open position state and closed trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::strategy::Protection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Why a trade was closed, in exit-priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    /// Stop hit after profit-lock moved it past entry.
    LockedStop,
    TakeProfit,
    TrailingStop,
    /// Opposing signal; carries the tags of the components that fired.
    Signal(Vec<String>),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP"),
            ExitReason::LockedStop => write!(f, "LOCKED_STOP"),
            ExitReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            ExitReason::TrailingStop => write!(f, "TRAIL"),
            ExitReason::Signal(tags) => {
                let joined: Vec<String> = tags.iter().map(|t| format!("{t}_EXIT")).collect();
                write!(f, "{}", joined.join(";"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    /// ATR on the entry bar, when the strategy tracks one.
    pub entry_atr: Option<f64>,
    pub stop_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// Peak close for longs, trough close for shorts.
    pub extreme: f64,
    pub armed: bool,
    pub locked: bool,
    /// Entry mode that opened the position.
    pub mode: String,
    /// Trailing stop and profit lock of that mode.
    pub protection: Protection,
    pub entry_tags: Vec<String>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    /// exit/entry - 1 for longs, entry/exit - 1 for shorts.
    pub fn gross_return(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => price / self.entry_price - 1.0,
            Side::Short => self.entry_price / price - 1.0,
        }
    }

    pub fn update_extreme(&mut self, close: f64) {
        match self.side {
            Side::Long => self.extreme = self.extreme.max(close),
            Side::Short => self.extreme = self.extreme.min(close),
        }
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        match (self.stop_price, self.side) {
            (Some(stop), Side::Long) => price <= stop,
            (Some(stop), Side::Short) => price >= stop,
            (None, _) => false,
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        match (self.take_profit_price, self.side) {
            (Some(tp), Side::Long) => price >= tp,
            (Some(tp), Side::Short) => price <= tp,
            (None, _) => false,
        }
    }

    /// True when price has retraced at least `distance` from the extreme.
    pub fn retraced(&self, price: f64, distance: f64) -> bool {
        match self.side {
            Side::Long => price <= self.extreme - distance,
            Side::Short => price >= self.extreme + distance,
        }
    }

    /// Moves the stop toward `candidate` only if that tightens it. Returns
    /// whether the stop changed.
    pub fn ratchet_stop(&mut self, candidate: f64) -> bool {
        let tighter = match (self.stop_price, self.side) {
            (None, _) => true,
            (Some(stop), Side::Long) => candidate > stop,
            (Some(stop), Side::Short) => candidate < stop,
        };
        if tighter {
            self.stop_price = Some(candidate);
        }
        tighter
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub gross_return: f64,
    pub net_return: f64,
    /// Running equity multiple after this trade closed.
    pub equity_after: f64,
    pub mode: String,
    pub entry_tags: Vec<String>,
    pub reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.net_return > 0.0
    }

    /// Entry components and exit reason joined with `;`.
    pub fn reason_tags(&self) -> String {
        let mut tags = self.entry_tags.clone();
        tags.push(self.reason.to_string());
        tags.join(";")
    }
}
