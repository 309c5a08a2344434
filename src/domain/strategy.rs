//! Strategy configuration and composition.
//!
//! A strategy is data: indicator windows, an entry rule, an exit rule,
//! protective levels and timing. A strategy may instead list several entry
//! modes, each with its own rule and protective levels; the first mode that
//! fires opens the position and its levels stay with it until the exit. The
//! named presets reproduce the classic variants (band mean reversion, EMA
//! momentum, the gated hybrid, the confirmation-counting eclectic strategy
//! and the trend/range regime switch) without any per-strategy code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::bias::{BiasRule, HigherTimeframe};
use crate::domain::error::RegimetraderError;
use crate::domain::execution::ExecutionTiming;
use crate::domain::indicator::{AtrSmoothing, DynamicK, IndicatorType, to_x100};
use crate::domain::indicator_helpers::required_bars;
use crate::domain::signal::{SignalComponent, SignalRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicBand {
    pub vol_window: usize,
    pub vol_ema: usize,
    pub ratio_min: f64,
    pub ratio_max: f64,
}

/// Window lengths shared by every component of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub bb_period: usize,
    pub bb_k: f64,
    pub bb_dynamic: Option<DynamicBand>,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub atr_smoothing: AtrSmoothing,
    pub ema_trend: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub volume_ma: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            bb_period: 20,
            bb_k: 2.0,
            bb_dynamic: None,
            rsi_period: 14,
            atr_period: 14,
            atr_smoothing: AtrSmoothing::Ema,
            ema_trend: 200,
            ema_fast: 9,
            ema_slow: 21,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stoch_k: 14,
            stoch_d: 3,
            volume_ma: 50,
        }
    }
}

impl IndicatorParams {
    pub fn bollinger(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bb_period,
            stddev_mult_x100: to_x100(self.bb_k),
            dynamic: self.bb_dynamic.as_ref().map(|d| DynamicK {
                vol_window: d.vol_window,
                vol_ema: d.vol_ema,
                ratio_min_x100: to_x100(d.ratio_min),
                ratio_max_x100: to_x100(d.ratio_max),
            }),
        }
    }

    pub fn rsi(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    pub fn atr(&self) -> IndicatorType {
        IndicatorType::Atr {
            period: self.atr_period,
            smoothing: self.atr_smoothing,
        }
    }

    pub fn ema_trend(&self) -> IndicatorType {
        IndicatorType::Ema(self.ema_trend)
    }

    pub fn ema_fast(&self) -> IndicatorType {
        IndicatorType::Ema(self.ema_fast)
    }

    pub fn ema_slow(&self) -> IndicatorType {
        IndicatorType::Ema(self.ema_slow)
    }

    pub fn macd(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    pub fn stochastic(&self) -> IndicatorType {
        IndicatorType::Stochastic {
            k_period: self.stoch_k,
            d_period: self.stoch_d,
        }
    }

    pub fn volume_sma(&self) -> IndicatorType {
        IndicatorType::VolumeSma(self.volume_ma)
    }
}

/// A distance from a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Level {
    /// Multiple of ATR.
    Atr(f64),
    /// Fraction of the reference price.
    Fraction(f64),
}

impl Level {
    /// Absolute distance from `reference`; `None` when ATR is required but
    /// unavailable.
    pub fn distance(&self, reference: f64, atr: Option<f64>) -> Option<f64> {
        match *self {
            Level::Atr(mult) => atr.map(|a| mult * a),
            Level::Fraction(f) => Some(reference * f),
        }
    }

    pub fn uses_atr(&self) -> bool {
        matches!(self, Level::Atr(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    /// Unrealized gain that arms the trail; 0 arms it at entry.
    pub arm_pct: f64,
    /// Retracement from the peak (trough) that exits while armed.
    pub drop: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LockTrigger {
    /// Close moves this many ATRs past entry.
    Atr(f64),
    /// Close reaches the upper band (long) or lower band (short).
    Band,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitLock {
    pub trigger: LockTrigger,
    /// Locked stop sits at least this many ATRs past entry.
    pub lock_mult: f64,
}

/// Protective exits a position carries from its entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Protection {
    pub stop_loss: Option<Level>,
    pub take_profit: Option<Level>,
    pub trailing: Option<TrailingStop>,
    pub profit_lock: Option<ProfitLock>,
}

impl Protection {
    pub fn needs_atr(&self) -> bool {
        self.stop_loss.is_some_and(|l| l.uses_atr())
            || self.take_profit.is_some_and(|l| l.uses_atr())
            || self.trailing.is_some_and(|t| t.drop.uses_atr())
            || self.profit_lock.is_some()
    }

    pub fn needs_bands(&self) -> bool {
        self.profit_lock
            .is_some_and(|l| l.trigger == LockTrigger::Band)
    }

    fn validate(&self) -> Result<(), RegimetraderError> {
        if let Some(level) = self.stop_loss {
            validate_level("stop_loss", level, true)?;
        }
        if let Some(level) = self.take_profit {
            validate_level("take_profit", level, false)?;
        }
        if let Some(trail) = self.trailing {
            if trail.arm_pct < 0.0 {
                return Err(RegimetraderError::invalid(
                    "trail_arm_pct",
                    "must be non-negative",
                ));
            }
            validate_level("trail_drop", trail.drop, true)?;
        }
        if let Some(lock) = self.profit_lock {
            if lock.lock_mult <= 0.0 {
                return Err(RegimetraderError::invalid("lock_mult", "must be positive"));
            }
            if let LockTrigger::Atr(trigger) = lock.trigger {
                if lock.lock_mult >= trigger {
                    return Err(RegimetraderError::invalid(
                        "lock_mult",
                        "locked stop must sit below the lock trigger",
                    ));
                }
            }
            if let Some(Level::Atr(tp)) = self.take_profit {
                if lock.lock_mult >= tp {
                    return Err(RegimetraderError::invalid(
                        "lock_mult",
                        "locked stop would sit beyond take-profit",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One way into a position. The mode's name is recorded on the position and
/// the trade it becomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMode {
    pub name: String,
    pub entry: SignalRule,
    pub allow_short: bool,
    pub protection: Protection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub indicators: IndicatorParams,
    pub entry: SignalRule,
    pub exit: SignalRule,
    pub stop_loss: Option<Level>,
    pub take_profit: Option<Level>,
    pub trailing: Option<TrailingStop>,
    pub profit_lock: Option<ProfitLock>,
    pub cooldown_bars: usize,
    pub allow_short: bool,
    pub signal_timing: ExecutionTiming,
    /// Entry modes tried in order; empty means the single mode built from
    /// `entry`, `allow_short` and the protective fields above.
    #[serde(default)]
    pub modes: Vec<EntryMode>,
    #[serde(default)]
    pub higher_timeframe: Option<HigherTimeframe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    MeanReversion,
    Momentum,
    Hybrid,
    Eclectic,
    RegimeSwitch,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean_reversion" | "bb" => Ok(Preset::MeanReversion),
            "momentum" | "ema" => Ok(Preset::Momentum),
            "hybrid" => Ok(Preset::Hybrid),
            "eclectic" => Ok(Preset::Eclectic),
            "regime_switch" | "switch" => Ok(Preset::RegimeSwitch),
            other => Err(format!("unknown strategy preset '{other}'")),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::MeanReversion => "mean_reversion",
            Preset::Momentum => "momentum",
            Preset::Hybrid => "hybrid",
            Preset::Eclectic => "eclectic",
            Preset::RegimeSwitch => "regime_switch",
        };
        write!(f, "{name}")
    }
}

impl StrategyConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::MeanReversion => Self::mean_reversion(20, 2.0),
            Preset::Momentum => Self::momentum(9, 21),
            Preset::Hybrid => Self::hybrid(),
            Preset::Eclectic => Self::eclectic(),
            Preset::RegimeSwitch => Self::regime_switch(),
        }
    }

    /// Long when close crosses under the lower band, out when it crosses back
    /// above the middle band. Signals fill on the next bar's close.
    pub fn mean_reversion(bb_period: usize, bb_k: f64) -> Self {
        StrategyConfig {
            name: Preset::MeanReversion.to_string(),
            indicators: IndicatorParams {
                bb_period,
                bb_k,
                ..IndicatorParams::default()
            },
            entry: SignalRule::all_of(vec![SignalComponent::BandCross]),
            exit: SignalRule::any_of(vec![SignalComponent::MidReversion]),
            stop_loss: None,
            take_profit: None,
            trailing: None,
            profit_lock: None,
            cooldown_bars: 0,
            allow_short: false,
            signal_timing: ExecutionTiming::NextBarClose,
            modes: Vec::new(),
            higher_timeframe: None,
        }
    }

    /// Long on a fast/slow EMA cross with RSI not overbought; out on the
    /// opposite cross or RSI at the sell threshold.
    pub fn momentum(ema_fast: usize, ema_slow: usize) -> Self {
        StrategyConfig {
            name: Preset::Momentum.to_string(),
            indicators: IndicatorParams {
                ema_fast,
                ema_slow,
                ..IndicatorParams::default()
            },
            entry: SignalRule::all_of(vec![
                SignalComponent::EmaCross,
                SignalComponent::Rsi {
                    long_max: 60.0,
                    short_min: 40.0,
                },
            ]),
            exit: SignalRule::any_of(vec![
                SignalComponent::EmaCross,
                SignalComponent::Rsi {
                    long_max: 40.0,
                    short_min: 60.0,
                },
            ]),
            stop_loss: None,
            take_profit: None,
            trailing: None,
            profit_lock: None,
            cooldown_bars: 0,
            allow_short: false,
            signal_timing: ExecutionTiming::NextBarClose,
            modes: Vec::new(),
            higher_timeframe: None,
        }
    }

    /// Band re-entry gated by RSI, volume and trend with ATR stop and target.
    pub fn hybrid() -> Self {
        let rsi = SignalComponent::Rsi {
            long_max: 35.0,
            short_min: 65.0,
        };
        StrategyConfig {
            name: Preset::Hybrid.to_string(),
            indicators: IndicatorParams::default(),
            entry: SignalRule::all_of(vec![
                SignalComponent::BandReentry,
                rsi.clone(),
                SignalComponent::VolumeSurge { mult: 1.3 },
                SignalComponent::TrendEma,
            ]),
            exit: SignalRule::any_of(vec![rsi, SignalComponent::BandReentry]),
            stop_loss: Some(Level::Atr(1.5)),
            take_profit: Some(Level::Atr(2.0)),
            trailing: None,
            profit_lock: None,
            cooldown_bars: 1,
            allow_short: false,
            signal_timing: ExecutionTiming::SameBarClose,
            modes: Vec::new(),
            higher_timeframe: None,
        }
    }

    /// Confirmation counting over trend, bands, RSI, MACD and stochastic with
    /// an RSI exhaustion gate and a percentage trailing stop.
    pub fn eclectic() -> Self {
        let confirmations = vec![
            SignalComponent::EmaStack,
            SignalComponent::BandTouch,
            SignalComponent::Rsi {
                long_max: 35.0,
                short_min: 65.0,
            },
            SignalComponent::MacdCross,
            SignalComponent::StochasticCross {
                long_max: 20.0,
                short_min: 80.0,
            },
        ];
        let exhaustion = SignalComponent::Rsi {
            long_max: 75.0,
            short_min: 25.0,
        };
        StrategyConfig {
            name: Preset::Eclectic.to_string(),
            indicators: IndicatorParams {
                ema_fast: 50,
                ema_slow: 200,
                volume_ma: 20,
                ..IndicatorParams::default()
            },
            entry: SignalRule {
                required: vec![
                    SignalComponent::EmaStack,
                    SignalComponent::VolumeSurge { mult: 0.9 },
                    exhaustion.clone(),
                ],
                confirmations: confirmations.clone(),
                min_confirmations: 2,
            },
            exit: SignalRule {
                required: vec![SignalComponent::VolumeSurge { mult: 1.3 }, exhaustion],
                confirmations,
                min_confirmations: 2,
            },
            stop_loss: None,
            take_profit: None,
            trailing: Some(TrailingStop {
                arm_pct: 0.02,
                drop: Level::Fraction(0.01),
            }),
            profit_lock: None,
            cooldown_bars: 2,
            allow_short: false,
            signal_timing: ExecutionTiming::SameBarClose,
            modes: Vec::new(),
            higher_timeframe: None,
        }
    }

    /// Trend and range modes keyed off a 1h EMA stack. In an uptrend, a
    /// close crossing above the middle band goes long with a wide target, a
    /// trailing stop and a band-triggered profit lock. Otherwise band touches
    /// fade either way with a near target. Both need volume at its average
    /// and share an ATR stop.
    pub fn regime_switch() -> Self {
        let stop = Some(Level::Atr(1.5));
        let volume = SignalComponent::VolumeSurge { mult: 1.0 };
        let trend = EntryMode {
            name: "TR".to_string(),
            entry: SignalRule::all_of(vec![
                SignalComponent::HigherTrend,
                SignalComponent::MidCross,
                volume.clone(),
            ]),
            allow_short: false,
            protection: Protection {
                stop_loss: stop,
                take_profit: Some(Level::Atr(3.0)),
                trailing: Some(TrailingStop {
                    arm_pct: 0.0,
                    drop: Level::Atr(2.0),
                }),
                profit_lock: Some(ProfitLock {
                    trigger: LockTrigger::Band,
                    lock_mult: 0.5,
                }),
            },
        };
        let range = EntryMode {
            name: "RG".to_string(),
            entry: SignalRule::all_of(vec![
                SignalComponent::HigherRange,
                SignalComponent::BandTouch,
                volume,
            ]),
            allow_short: true,
            protection: Protection {
                stop_loss: stop,
                take_profit: Some(Level::Atr(1.2)),
                trailing: Some(TrailingStop {
                    arm_pct: 0.0,
                    drop: Level::Atr(1.5),
                }),
                profit_lock: None,
            },
        };
        StrategyConfig {
            name: Preset::RegimeSwitch.to_string(),
            indicators: IndicatorParams {
                bb_period: 20,
                bb_k: 2.0,
                bb_dynamic: Some(DynamicBand {
                    vol_window: 20,
                    vol_ema: 30,
                    ratio_min: 0.8,
                    ratio_max: 1.6,
                }),
                atr_smoothing: AtrSmoothing::RollingMean,
                volume_ma: 20,
                ..IndicatorParams::default()
            },
            entry: SignalRule::default(),
            exit: SignalRule::default(),
            stop_loss: None,
            take_profit: None,
            trailing: None,
            profit_lock: None,
            cooldown_bars: 1,
            allow_short: true,
            signal_timing: ExecutionTiming::SameBarClose,
            modes: vec![trend, range],
            higher_timeframe: Some(HigherTimeframe {
                interval: "1h".to_string(),
                rule: BiasRule::EmaStack { fast: 20, slow: 50 },
            }),
        }
    }

    /// Protective fields of the single-mode form.
    pub fn protection(&self) -> Protection {
        Protection {
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            trailing: self.trailing,
            profit_lock: self.profit_lock,
        }
    }

    /// The modes entries are tried in, in order.
    pub fn entry_modes(&self) -> Vec<EntryMode> {
        if !self.modes.is_empty() {
            return self.modes.clone();
        }
        vec![EntryMode {
            name: self.name.clone(),
            entry: self.entry.clone(),
            allow_short: self.allow_short,
            protection: self.protection(),
        }]
    }

    fn rules(&self) -> impl Iterator<Item = &SignalRule> {
        [&self.entry, &self.exit]
            .into_iter()
            .chain(self.modes.iter().map(|m| &m.entry))
    }

    fn components(&self) -> impl Iterator<Item = &SignalComponent> {
        self.rules().flat_map(|r| r.components())
    }

    fn protections(&self) -> impl Iterator<Item = Protection> + '_ {
        std::iter::once(self.protection()).chain(self.modes.iter().map(|m| m.protection))
    }

    /// True when a rule reads the higher-timeframe bias.
    pub fn needs_bias(&self) -> bool {
        self.components().any(|c| c.needs_bias())
    }

    /// Every indicator the rules and protective levels read, without
    /// duplicates.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        let p = &self.indicators;
        let mut out: Vec<IndicatorType> = Vec::new();
        let mut push = |t: IndicatorType| {
            if !out.contains(&t) {
                out.push(t);
            }
        };
        for component in self.components() {
            for t in component.indicators(p) {
                push(t);
            }
        }
        if self.protections().any(|pr| pr.needs_atr()) {
            push(p.atr());
        }
        if self.protections().any(|pr| pr.needs_bands()) {
            push(p.bollinger());
        }
        out
    }

    /// Bars consumed before the first tradable bar.
    pub fn warmup_bars(&self) -> usize {
        required_bars(&self.required_indicators())
    }

    pub fn validate(&self) -> Result<(), RegimetraderError> {
        let p = &self.indicators;

        if self.modes.is_empty() && self.entry.is_empty() {
            return Err(RegimetraderError::invalid(
                "entry",
                "entry rule needs at least one component",
            ));
        }
        validate_rule("entry", &self.entry)?;
        validate_rule("exit", &self.exit)?;
        for mode in &self.modes {
            if mode.name.trim().is_empty() {
                return Err(RegimetraderError::invalid("mode", "mode name must not be empty"));
            }
            if mode.entry.is_empty() {
                return Err(RegimetraderError::invalid(
                    &mode.name,
                    "entry rule needs at least one component",
                ));
            }
            validate_rule(&mode.name, &mode.entry)?;
        }

        for indicator in self.required_indicators() {
            for (name, window) in indicator.windows() {
                if window == 0 {
                    return Err(RegimetraderError::invalid(name, "window must be positive"));
                }
            }
        }

        if p.bb_k <= 0.0 {
            return Err(RegimetraderError::invalid("bb_k", "k must be positive"));
        }
        if let Some(d) = &p.bb_dynamic {
            if d.ratio_min <= 0.0 || d.ratio_min > d.ratio_max {
                return Err(RegimetraderError::invalid(
                    "bb_ratio_min",
                    "need 0 < ratio_min <= ratio_max",
                ));
            }
        }

        let uses = |pred: fn(&SignalComponent) -> bool| self.components().any(pred);
        if uses(|c| matches!(c, SignalComponent::EmaCross | SignalComponent::EmaStack))
            && p.ema_fast >= p.ema_slow
        {
            return Err(RegimetraderError::invalid(
                "ema_fast",
                "fast EMA must be shorter than slow EMA",
            ));
        }
        if uses(|c| matches!(c, SignalComponent::MacdCross)) && p.macd_fast >= p.macd_slow {
            return Err(RegimetraderError::invalid(
                "macd_fast",
                "fast EMA must be shorter than slow EMA",
            ));
        }

        for protection in self.protections() {
            protection.validate()?;
        }

        match &self.higher_timeframe {
            Some(tf) => tf.validate()?,
            None if self.needs_bias() => {
                return Err(RegimetraderError::invalid(
                    "bias_interval",
                    "higher-timeframe components need a bias interval",
                ));
            }
            None => {}
        }
        Ok(())
    }
}

fn validate_rule(name: &str, rule: &SignalRule) -> Result<(), RegimetraderError> {
    if rule.min_confirmations > rule.confirmations.len() {
        return Err(RegimetraderError::invalid(
            name,
            format!(
                "min_confirmations {} exceeds {} confirmation components",
                rule.min_confirmations,
                rule.confirmations.len()
            ),
        ));
    }
    for component in rule.components() {
        match component {
            SignalComponent::Rsi {
                long_max,
                short_min,
            }
            | SignalComponent::StochasticCross {
                long_max,
                short_min,
            } => {
                if !(0.0..=100.0).contains(long_max) || !(0.0..=100.0).contains(short_min) {
                    return Err(RegimetraderError::invalid(
                        component.tag(),
                        "oscillator thresholds must lie in [0, 100]",
                    ));
                }
            }
            SignalComponent::VolumeSurge { mult } if *mult <= 0.0 => {
                return Err(RegimetraderError::invalid(
                    component.tag(),
                    "volume multiple must be positive",
                ));
            }
            SignalComponent::BandWidth { min_pct } if *min_pct < 0.0 => {
                return Err(RegimetraderError::invalid(
                    component.tag(),
                    "minimum band width must be non-negative",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_level(name: &str, level: Level, below_entry: bool) -> Result<(), RegimetraderError> {
    match level {
        Level::Atr(m) if m <= 0.0 => Err(RegimetraderError::invalid(name, "ATR multiple must be positive")),
        Level::Fraction(f) if f <= 0.0 => Err(RegimetraderError::invalid(name, "fraction must be positive")),
        Level::Fraction(f) if below_entry && f >= 1.0 => {
            Err(RegimetraderError::invalid(name, "fraction must be below 1"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for preset in [
            Preset::MeanReversion,
            Preset::Momentum,
            Preset::Hybrid,
            Preset::Eclectic,
            Preset::RegimeSwitch,
        ] {
            let s = StrategyConfig::preset(preset);
            assert!(s.validate().is_ok(), "{preset} should validate");
            assert_eq!(s.name, preset.to_string());
        }
    }

    #[test]
    fn preset_parses_aliases() {
        assert_eq!("bb".parse::<Preset>(), Ok(Preset::MeanReversion));
        assert_eq!("EMA".parse::<Preset>(), Ok(Preset::Momentum));
        assert!("unknown".parse::<Preset>().is_err());
    }

    #[test]
    fn hybrid_warmup_covers_trend_ema() {
        let s = StrategyConfig::hybrid();
        let indicators = s.required_indicators();
        assert!(indicators.contains(&IndicatorType::Ema(200)));
        assert!(indicators.contains(&s.indicators.atr()));
        assert_eq!(s.warmup_bars(), 202);
    }

    #[test]
    fn mean_reversion_needs_only_bands() {
        let s = StrategyConfig::mean_reversion(16, 2.4);
        assert_eq!(s.required_indicators(), vec![s.indicators.bollinger()]);
        assert_eq!(s.warmup_bars(), 18);
    }

    #[test]
    fn rejects_non_positive_k() {
        let s = StrategyConfig::mean_reversion(20, 0.0);
        assert!(matches!(
            s.validate(),
            Err(RegimetraderError::InvalidParameter { name, .. }) if name == "bb_k"
        ));
    }

    #[test]
    fn rejects_zero_window() {
        let s = StrategyConfig::mean_reversion(0, 2.0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_inverted_emas() {
        let s = StrategyConfig::momentum(40, 10);
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_lock_beyond_take_profit() {
        let mut s = StrategyConfig::hybrid();
        s.profit_lock = Some(ProfitLock {
            trigger: LockTrigger::Band,
            lock_mult: 2.5,
        });
        assert!(s.validate().is_err());
        s.profit_lock = Some(ProfitLock {
            trigger: LockTrigger::Atr(1.0),
            lock_mult: 1.2,
        });
        assert!(s.validate().is_err());
        s.profit_lock = Some(ProfitLock {
            trigger: LockTrigger::Atr(1.5),
            lock_mult: 0.5,
        });
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_unreachable_confirmation_count() {
        let mut s = StrategyConfig::eclectic();
        s.entry.min_confirmations = 6;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_bad_levels() {
        let mut s = StrategyConfig::hybrid();
        s.stop_loss = Some(Level::Fraction(1.5));
        assert!(s.validate().is_err());
        s.stop_loss = Some(Level::Atr(-1.0));
        assert!(s.validate().is_err());
    }

    #[test]
    fn level_distance() {
        assert_eq!(Level::Atr(2.0).distance(100.0, Some(1.5)), Some(3.0));
        assert_eq!(Level::Atr(2.0).distance(100.0, None), None);
        assert_eq!(Level::Fraction(0.05).distance(200.0, None), Some(10.0));
    }

    #[test]
    fn regime_switch_modes_carry_their_own_levels() {
        let s = StrategyConfig::regime_switch();
        let modes = s.entry_modes();
        let names: Vec<&str> = modes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["TR", "RG"]);
        assert!(!modes[0].allow_short);
        assert!(modes[1].allow_short);
        assert_eq!(modes[0].protection.take_profit, Some(Level::Atr(3.0)));
        assert_eq!(modes[1].protection.take_profit, Some(Level::Atr(1.2)));
        assert!(modes[0].protection.needs_bands());
        assert!(!modes[1].protection.needs_bands());
        assert!(s.needs_bias());

        let indicators = s.required_indicators();
        assert!(indicators.contains(&s.indicators.bollinger()));
        assert!(indicators.contains(&IndicatorType::Atr {
            period: 14,
            smoothing: AtrSmoothing::RollingMean
        }));
        assert!(indicators.contains(&IndicatorType::VolumeSma(20)));
    }

    #[test]
    fn single_mode_comes_from_top_level_fields() {
        let s = StrategyConfig::hybrid();
        let modes = s.entry_modes();
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].name, "hybrid");
        assert_eq!(modes[0].entry, s.entry);
        assert_eq!(modes[0].protection, s.protection());
        assert!(!s.needs_bias());
    }

    #[test]
    fn bias_components_need_a_higher_timeframe() {
        let mut s = StrategyConfig::regime_switch();
        s.higher_timeframe = None;
        assert!(matches!(
            s.validate(),
            Err(RegimetraderError::InvalidParameter { name, .. }) if name == "bias_interval"
        ));
    }

    #[test]
    fn mode_levels_are_validated() {
        let mut s = StrategyConfig::regime_switch();
        s.modes[1].protection.take_profit = Some(Level::Atr(-1.0));
        assert!(s.validate().is_err());

        let mut s = StrategyConfig::regime_switch();
        s.modes[0].entry = SignalRule::default();
        assert!(s.validate().is_err());

        let mut s = StrategyConfig::regime_switch();
        s.modes.clear();
        assert!(s.validate().is_err());
    }
}
