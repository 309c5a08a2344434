//! Signal components and confirmation counting.
//!
//! A [`SignalComponent`] answers one question for a side at a bar: does this
//! indicator condition favor entering that side? Rules combine components:
//! every `required` component must hold and at least `min_confirmations` of
//! the `confirmations` must hold. Exit rules are evaluated for the opposite
//! side of the open position.
//!
//! Cross conditions compare bar `i` with bar `i - 1` and are `false` at
//! index 0 or when any input is still warming up.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_helpers::IndicatorSnapshot;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Side;
use crate::domain::strategy::IndicatorParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalComponent {
    /// Close above a rising trend EMA (long) or below a falling one (short).
    TrendEma,
    /// Fast EMA above slow EMA (long) or below (short).
    EmaStack,
    /// Fast EMA crosses above (long) or below (short) the slow EMA.
    EmaCross,
    /// Close below the lower band (long) or above the upper band (short).
    BandTouch,
    /// Close crosses out through the lower (long) or upper (short) band.
    BandCross,
    /// Close crosses back inside from below the lower (long) or above the
    /// upper (short) band.
    BandReentry,
    /// Close crosses below (long) or above (short) the middle band.
    MidReversion,
    /// Close crosses above (long) or below (short) the middle band.
    MidCross,
    /// Band width as a fraction of close is at least `min_pct`.
    BandWidth { min_pct: f64 },
    /// RSI at or below `long_max` (long) or at or above `short_min` (short).
    Rsi { long_max: f64, short_min: f64 },
    /// MACD line crosses above (long) or below (short) its signal line.
    MacdCross,
    /// %K crosses %D upward below `long_max` (long) or downward above
    /// `short_min` (short).
    StochasticCross { long_max: f64, short_min: f64 },
    /// Volume above `mult` times its moving average.
    VolumeSurge { mult: f64 },
    /// Higher timeframe bullish (long) or not bullish (short).
    HigherTrend,
    /// Higher timeframe not bullish, for either side.
    HigherRange,
}

/// Read-only view of the data a component needs at a bar.
pub struct SignalContext<'a> {
    pub bars: &'a [Bar],
    pub snapshot: &'a IndicatorSnapshot,
    pub params: &'a IndicatorParams,
    /// Higher-timeframe bias aligned to `bars`; empty when the strategy has
    /// none, which makes every bias component false.
    pub bias: &'a [Option<bool>],
}

fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a <= prev_b && a > b
}

fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a >= prev_b && a < b
}

impl SignalComponent {
    pub fn tag(&self) -> &'static str {
        match self {
            SignalComponent::TrendEma => "TREND_EMA",
            SignalComponent::EmaStack => "EMA_STACK",
            SignalComponent::EmaCross => "EMA_CROSS",
            SignalComponent::BandTouch => "BB_TOUCH",
            SignalComponent::BandCross => "BB_CROSS",
            SignalComponent::BandReentry => "BB_REENTRY",
            SignalComponent::MidReversion => "BB_MID",
            SignalComponent::MidCross => "BB_MID_CROSS",
            SignalComponent::BandWidth { .. } => "BB_WIDTH",
            SignalComponent::Rsi { .. } => "RSI",
            SignalComponent::MacdCross => "MACD_CROSS",
            SignalComponent::StochasticCross { .. } => "STOCH_CROSS",
            SignalComponent::VolumeSurge { .. } => "VOL_SURGE",
            SignalComponent::HigherTrend => "HTF_TREND",
            SignalComponent::HigherRange => "HTF_RANGE",
        }
    }

    /// Parses a component name as written in config files, with default
    /// thresholds.
    pub fn from_name(name: &str) -> Option<SignalComponent> {
        let component = match name.trim().to_ascii_lowercase().as_str() {
            "trend_ema" => SignalComponent::TrendEma,
            "ema_stack" => SignalComponent::EmaStack,
            "ema_cross" => SignalComponent::EmaCross,
            "band_touch" => SignalComponent::BandTouch,
            "band_cross" => SignalComponent::BandCross,
            "band_reentry" => SignalComponent::BandReentry,
            "mid_reversion" => SignalComponent::MidReversion,
            "mid_cross" => SignalComponent::MidCross,
            "band_width" => SignalComponent::BandWidth { min_pct: 0.006 },
            "rsi" => SignalComponent::Rsi {
                long_max: 35.0,
                short_min: 65.0,
            },
            "macd_cross" => SignalComponent::MacdCross,
            "stoch_cross" => SignalComponent::StochasticCross {
                long_max: 20.0,
                short_min: 80.0,
            },
            "volume_surge" => SignalComponent::VolumeSurge { mult: 1.3 },
            "higher_trend" => SignalComponent::HigherTrend,
            "higher_range" => SignalComponent::HigherRange,
            _ => return None,
        };
        Some(component)
    }

    pub fn indicators(&self, p: &IndicatorParams) -> Vec<IndicatorType> {
        match self {
            SignalComponent::TrendEma => vec![p.ema_trend()],
            SignalComponent::EmaStack | SignalComponent::EmaCross => {
                vec![p.ema_fast(), p.ema_slow()]
            }
            SignalComponent::BandTouch
            | SignalComponent::BandCross
            | SignalComponent::BandReentry
            | SignalComponent::MidReversion
            | SignalComponent::MidCross
            | SignalComponent::BandWidth { .. } => vec![p.bollinger()],
            SignalComponent::Rsi { .. } => vec![p.rsi()],
            SignalComponent::MacdCross => vec![p.macd()],
            SignalComponent::StochasticCross { .. } => vec![p.stochastic()],
            SignalComponent::VolumeSurge { .. } => vec![p.volume_sma()],
            SignalComponent::HigherTrend | SignalComponent::HigherRange => Vec::new(),
        }
    }

    /// Reads the higher-timeframe bias rather than an indicator.
    pub fn needs_bias(&self) -> bool {
        matches!(self, SignalComponent::HigherTrend | SignalComponent::HigherRange)
    }

    pub fn holds(&self, side: Side, ctx: &SignalContext<'_>, i: usize) -> bool {
        if i == 0 || i >= ctx.bars.len() {
            return false;
        }
        self.evaluate(side, ctx, i).unwrap_or(false)
    }

    fn evaluate(&self, side: Side, ctx: &SignalContext<'_>, i: usize) -> Option<bool> {
        let snap = ctx.snapshot;
        let p = ctx.params;
        let c = ctx.bars[i].close;
        let c_prev = ctx.bars[i - 1].close;

        let result = match self {
            SignalComponent::TrendEma => {
                let t = p.ema_trend();
                let (e, e_prev) = (snap.simple(&t, i)?, snap.simple(&t, i - 1)?);
                match side {
                    Side::Long => c > e && e > e_prev,
                    Side::Short => c < e && e < e_prev,
                }
            }
            SignalComponent::EmaStack => {
                let fast = snap.simple(&p.ema_fast(), i)?;
                let slow = snap.simple(&p.ema_slow(), i)?;
                match side {
                    Side::Long => fast > slow,
                    Side::Short => fast < slow,
                }
            }
            SignalComponent::EmaCross => {
                let (f, fp) = (
                    snap.simple(&p.ema_fast(), i)?,
                    snap.simple(&p.ema_fast(), i - 1)?,
                );
                let (s, sp) = (
                    snap.simple(&p.ema_slow(), i)?,
                    snap.simple(&p.ema_slow(), i - 1)?,
                );
                match side {
                    Side::Long => crossed_above(fp, sp, f, s),
                    Side::Short => crossed_below(fp, sp, f, s),
                }
            }
            SignalComponent::BandTouch => {
                let (up, _, lo) = snap.bands(&p.bollinger(), i)?;
                match side {
                    Side::Long => c < lo,
                    Side::Short => c > up,
                }
            }
            SignalComponent::BandCross => {
                let (up, _, lo) = snap.bands(&p.bollinger(), i)?;
                let (up_prev, _, lo_prev) = snap.bands(&p.bollinger(), i - 1)?;
                match side {
                    Side::Long => crossed_below(c_prev, lo_prev, c, lo),
                    Side::Short => crossed_above(c_prev, up_prev, c, up),
                }
            }
            SignalComponent::BandReentry => {
                let (up, _, lo) = snap.bands(&p.bollinger(), i)?;
                let (up_prev, _, lo_prev) = snap.bands(&p.bollinger(), i - 1)?;
                match side {
                    Side::Long => c_prev < lo_prev && c > lo,
                    Side::Short => c_prev > up_prev && c < up,
                }
            }
            SignalComponent::MidReversion => {
                let (_, mid, _) = snap.bands(&p.bollinger(), i)?;
                let (_, mid_prev, _) = snap.bands(&p.bollinger(), i - 1)?;
                match side {
                    Side::Long => crossed_below(c_prev, mid_prev, c, mid),
                    Side::Short => crossed_above(c_prev, mid_prev, c, mid),
                }
            }
            SignalComponent::MidCross => {
                let (_, mid, _) = snap.bands(&p.bollinger(), i)?;
                let (_, mid_prev, _) = snap.bands(&p.bollinger(), i - 1)?;
                match side {
                    Side::Long => crossed_above(c_prev, mid_prev, c, mid),
                    Side::Short => crossed_below(c_prev, mid_prev, c, mid),
                }
            }
            SignalComponent::BandWidth { min_pct } => {
                let (up, _, lo) = snap.bands(&p.bollinger(), i)?;
                c > 0.0 && (up - lo) / c >= *min_pct
            }
            SignalComponent::Rsi {
                long_max,
                short_min,
            } => {
                let r = snap.simple(&p.rsi(), i)?;
                match side {
                    Side::Long => r <= *long_max,
                    Side::Short => r >= *short_min,
                }
            }
            SignalComponent::MacdCross => {
                let (line, sig) = snap.macd(&p.macd(), i)?;
                let (line_prev, sig_prev) = snap.macd(&p.macd(), i - 1)?;
                match side {
                    Side::Long => crossed_above(line_prev, sig_prev, line, sig),
                    Side::Short => crossed_below(line_prev, sig_prev, line, sig),
                }
            }
            SignalComponent::StochasticCross {
                long_max,
                short_min,
            } => {
                let (k, d) = snap.stochastic(&p.stochastic(), i)?;
                let (k_prev, d_prev) = snap.stochastic(&p.stochastic(), i - 1)?;
                match side {
                    Side::Long => crossed_above(k_prev, d_prev, k, d) && k < *long_max,
                    Side::Short => crossed_below(k_prev, d_prev, k, d) && k > *short_min,
                }
            }
            SignalComponent::VolumeSurge { mult } => {
                let avg = snap.simple(&p.volume_sma(), i)?;
                ctx.bars[i].volume > mult * avg
            }
            SignalComponent::HigherTrend => {
                let bullish = (*ctx.bias.get(i)?)?;
                match side {
                    Side::Long => bullish,
                    Side::Short => !bullish,
                }
            }
            SignalComponent::HigherRange => !(*ctx.bias.get(i)?)?,
        };
        Some(result)
    }
}

/// Gates plus counted confirmations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalRule {
    pub required: Vec<SignalComponent>,
    pub confirmations: Vec<SignalComponent>,
    pub min_confirmations: usize,
}

impl SignalRule {
    /// Every component must hold.
    pub fn all_of(components: Vec<SignalComponent>) -> Self {
        Self {
            required: components,
            confirmations: Vec::new(),
            min_confirmations: 0,
        }
    }

    /// At least one component must hold.
    pub fn any_of(components: Vec<SignalComponent>) -> Self {
        Self {
            required: Vec::new(),
            confirmations: components,
            min_confirmations: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.confirmations.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &SignalComponent> {
        self.required.iter().chain(self.confirmations.iter())
    }

    /// Number of confirmations holding for `side` at bar `i`.
    pub fn confirmation_count(&self, side: Side, ctx: &SignalContext<'_>, i: usize) -> usize {
        self.confirmations
            .iter()
            .filter(|c| c.holds(side, ctx, i))
            .count()
    }

    /// Tags of the confirming components when the rule fires, else `None`.
    pub fn fires(&self, side: Side, ctx: &SignalContext<'_>, i: usize) -> Option<Vec<String>> {
        if self.is_empty() {
            return None;
        }
        if !self.required.iter().all(|c| c.holds(side, ctx, i)) {
            return None;
        }
        let confirmed: Vec<&SignalComponent> = self
            .confirmations
            .iter()
            .filter(|c| c.holds(side, ctx, i))
            .collect();
        if confirmed.len() < self.min_confirmations {
            return None;
        }
        let mut tags: Vec<String> = self.required.iter().map(|c| c.tag().to_string()).collect();
        for c in confirmed {
            let tag = c.tag().to_string();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Some(tags)
    }
}
