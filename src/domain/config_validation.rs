//! Configuration validation and construction.
//!
//! Reads the INI sections through [`ConfigPort`], validates every value
//! before a run starts and builds the typed configs the engines take. Every
//! problem is reported as `ConfigInvalid` or `ConfigMissing` naming the
//! section and key.

use std::str::FromStr;

use crate::domain::bias::{BiasRule, BiasRuleKind, HigherTimeframe};
use crate::domain::cost::CostModel;
use crate::domain::error::RegimetraderError;
use crate::domain::execution::ExecutionTiming;
use crate::domain::indicator::AtrSmoothing;
use crate::domain::regime::RegimeConfig;
use crate::domain::signal::{SignalComponent, SignalRule};
use crate::domain::strategy::{
    DynamicBand, EntryMode, Level, LockTrigger, Preset, ProfitLock, Protection, StrategyConfig,
    TrailingStop,
};
use crate::domain::sweep::{DEFAULT_MIN_TRADES, SweepGrid};
use crate::domain::walk_forward::WalkForwardConfig;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LAST_PERIODS: usize = 12;

/// Where to read bars and write reports, plus trading costs.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub symbol: String,
    pub interval: String,
    pub data_dir: String,
    pub output_dir: String,
    pub cost: CostModel,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RegimetraderError {
    RegimetraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn has(config: &dyn ConfigPort, section: &str, key: &str) -> bool {
    config
        .get_string(section, key)
        .is_some_and(|v| !v.trim().is_empty())
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, RegimetraderError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| invalid(section, key, format!("{key} must be non-negative")))
}

fn parse_value<T: FromStr>(section: &str, key: &str, raw: &str) -> Result<T, RegimetraderError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim())))
}

/// Comma-separated list; a missing key gives an empty list.
fn get_list<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<T>, RegimetraderError> {
    match config.get_string(section, key) {
        None => Ok(Vec::new()),
        Some(raw) => raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_value(section, key, s))
            .collect(),
    }
}

fn get_components(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<SignalComponent>, RegimetraderError> {
    let names: Vec<String> = get_list(config, section, key)?;
    names
        .iter()
        .map(|name| {
            SignalComponent::from_name(name)
                .ok_or_else(|| invalid(section, key, format!("unknown signal component '{name}'")))
        })
        .collect()
}

pub fn build_cost_model(config: &dyn ConfigPort) -> Result<CostModel, RegimetraderError> {
    let fee_bps = config.get_double("backtest", "fee_bps", 5.0);
    if fee_bps < 0.0 {
        return Err(invalid("backtest", "fee_bps", "fee_bps must be non-negative"));
    }
    let slip_bps = config.get_double("backtest", "slip_bps", 5.0);
    if slip_bps < 0.0 {
        return Err(invalid("backtest", "slip_bps", "slip_bps must be non-negative"));
    }
    CostModel::new(fee_bps, slip_bps)
}

pub fn build_backtest_settings(
    config: &dyn ConfigPort,
) -> Result<BacktestSettings, RegimetraderError> {
    let symbol = match config.get_string("backtest", "symbol") {
        Some(s) if !s.trim().is_empty() => s.trim().to_uppercase(),
        _ => {
            return Err(RegimetraderError::ConfigMissing {
                section: "backtest".to_string(),
                key: "symbol".to_string(),
            });
        }
    };
    let interval = config
        .get_string("backtest", "interval")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "15m".to_string());
    let data_dir = config
        .get_string("backtest", "data_dir")
        .unwrap_or_else(|| "data".to_string());
    let output_dir = config
        .get_string("backtest", "output_dir")
        .unwrap_or_else(|| "output".to_string());

    Ok(BacktestSettings {
        symbol,
        interval,
        data_dir,
        output_dir,
        cost: build_cost_model(config)?,
    })
}

/// Overrides thresholds of every component of one kind in a rule.
fn apply_thresholds(
    config: &dyn ConfigPort,
    section: &str,
    prefix: &str,
    rule: &mut SignalRule,
) -> Result<(), RegimetraderError> {
    let key = |name: &str| format!("{prefix}_{name}");
    let read = |name: &str| -> Result<Option<f64>, RegimetraderError> {
        let k = key(name);
        match config.get_string(section, &k) {
            Some(raw) if !raw.trim().is_empty() => parse_value(section, &k, &raw).map(Some),
            _ => Ok(None),
        }
    };
    let rsi_long = read("rsi_long_max")?;
    let rsi_short = read("rsi_short_min")?;
    let stoch_long = read("stoch_long_max")?;
    let stoch_short = read("stoch_short_min")?;
    let volume_mult = read("volume_mult")?;
    let band_width = read("band_width_pct")?;

    for component in rule.required.iter_mut().chain(rule.confirmations.iter_mut()) {
        match component {
            SignalComponent::Rsi {
                long_max,
                short_min,
            } => {
                *long_max = rsi_long.unwrap_or(*long_max);
                *short_min = rsi_short.unwrap_or(*short_min);
            }
            SignalComponent::StochasticCross {
                long_max,
                short_min,
            } => {
                *long_max = stoch_long.unwrap_or(*long_max);
                *short_min = stoch_short.unwrap_or(*short_min);
            }
            SignalComponent::VolumeSurge { mult } => *mult = volume_mult.unwrap_or(*mult),
            SignalComponent::BandWidth { min_pct } => {
                *min_pct = band_width.map_or(*min_pct, |p| p / 100.0)
            }
            _ => {}
        }
    }
    Ok(())
}

fn build_rule(
    config: &dyn ConfigPort,
    section: &str,
    prefix: &str,
    base: &SignalRule,
) -> Result<SignalRule, RegimetraderError> {
    let required_key = format!("{prefix}_required");
    let confirm_key = format!("{prefix}_confirmations");
    let min_key = format!("{prefix}_min_confirmations");

    let mut rule = if has(config, section, &required_key) || has(config, section, &confirm_key) {
        let required = get_components(config, section, &required_key)?;
        let confirmations = get_components(config, section, &confirm_key)?;
        let default_min = if required.is_empty() && !confirmations.is_empty() {
            1
        } else {
            0
        };
        SignalRule {
            required,
            confirmations,
            min_confirmations: get_usize(config, section, &min_key, default_min)?,
        }
    } else {
        let mut rule = base.clone();
        if has(config, section, &min_key) {
            rule.min_confirmations = get_usize(config, section, &min_key, rule.min_confirmations)?;
        }
        rule
    };
    apply_thresholds(config, section, prefix, &mut rule)?;
    Ok(rule)
}

fn build_level(
    config: &dyn ConfigPort,
    section: &str,
    name: &str,
    base: Option<Level>,
) -> Result<Option<Level>, RegimetraderError> {
    let atr_key = format!("{name}_atr");
    let pct_key = format!("{name}_pct");
    match (has(config, section, &atr_key), has(config, section, &pct_key)) {
        (true, true) => Err(invalid(
            section,
            name,
            format!("set only one of {atr_key} and {pct_key}"),
        )),
        (true, false) => {
            let m = config.get_double(section, &atr_key, 0.0);
            Ok((m > 0.0).then_some(Level::Atr(m)))
        }
        (false, true) => {
            let p = config.get_double(section, &pct_key, 0.0);
            Ok((p > 0.0).then_some(Level::Fraction(p / 100.0)))
        }
        (false, false) => Ok(base),
    }
}

/// Stop, target, trailing stop and profit lock under `prefix` (empty for
/// the top-level fields, `tr_` style for a mode).
fn build_protection(
    config: &dyn ConfigPort,
    section: &str,
    prefix: &str,
    base: Protection,
) -> Result<Protection, RegimetraderError> {
    let mut out = base;
    out.stop_loss = build_level(config, section, &format!("{prefix}stop_loss"), base.stop_loss)?;
    out.take_profit =
        build_level(config, section, &format!("{prefix}take_profit"), base.take_profit)?;

    let arm_key = format!("{prefix}trail_arm_pct");
    if has(config, section, &arm_key) {
        let arm_pct = config.get_double(section, &arm_key, 0.0) / 100.0;
        let drop_key = format!("{prefix}trail_drop");
        let drop = build_level(config, section, &drop_key, None)?
            .or(base.trailing.map(|t| t.drop))
            .ok_or_else(|| {
                invalid(
                    section,
                    &format!("{drop_key}_pct"),
                    "trailing stop needs a _pct or _atr drop",
                )
            })?;
        out.trailing = Some(TrailingStop { arm_pct, drop });
    }

    let trigger_key = format!("{prefix}lock_trigger");
    if let Some(raw) = config.get_string(section, &trigger_key) {
        let raw = raw.trim().to_ascii_lowercase();
        let trigger = if raw == "band" {
            LockTrigger::Band
        } else {
            LockTrigger::Atr(parse_value(section, &trigger_key, &raw)?)
        };
        let default_mult = base.profit_lock.map_or(0.5, |l| l.lock_mult);
        let lock_mult = config.get_double(section, &format!("{prefix}lock_mult"), default_mult);
        out.profit_lock = Some(ProfitLock { trigger, lock_mult });
    } else if let Some(lock) = base.profit_lock {
        let lock_mult = config.get_double(section, &format!("{prefix}lock_mult"), lock.lock_mult);
        out.profit_lock = Some(ProfitLock { lock_mult, ..lock });
    }
    Ok(out)
}

/// Entry modes. `modes` lists names in trial order; each mode reads its
/// keys under the lowercased name (`tr_entry_required`, `tr_take_profit_atr`,
/// `tr_allow_short`). A listed name the base strategy lacks starts empty.
fn build_modes(
    config: &dyn ConfigPort,
    section: &str,
    base: &[EntryMode],
) -> Result<Vec<EntryMode>, RegimetraderError> {
    let names: Vec<String> = if has(config, section, "modes") {
        get_list(config, section, "modes")?
    } else {
        base.iter().map(|m| m.name.clone()).collect()
    };
    let mut modes = Vec::with_capacity(names.len());
    for name in names {
        let mode = base
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(&name))
            .cloned()
            .unwrap_or_else(|| EntryMode {
                name: name.clone(),
                entry: SignalRule::default(),
                allow_short: false,
                protection: Protection::default(),
            });
        let prefix = format!("{}_", name.to_ascii_lowercase());
        modes.push(EntryMode {
            entry: build_rule(config, section, &format!("{prefix}entry"), &mode.entry)?,
            allow_short: config.get_bool(section, &format!("{prefix}allow_short"), mode.allow_short),
            protection: build_protection(config, section, &prefix, mode.protection)?,
            name: mode.name,
        });
    }
    Ok(modes)
}

/// Higher-timeframe bias from `bias_interval` and `bias_rule`
/// (`ema_stack` with `bias_fast`/`bias_slow`, or `close_above_sma` with
/// `bias_sma`). `bias_interval = none` removes a preset's bias.
fn build_higher_timeframe(
    config: &dyn ConfigPort,
    section: &str,
    base: Option<HigherTimeframe>,
) -> Result<Option<HigherTimeframe>, RegimetraderError> {
    let interval = match config.get_string(section, "bias_interval") {
        Some(raw) if raw.trim().eq_ignore_ascii_case("none") => return Ok(None),
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => match &base {
            Some(tf) => tf.interval.clone(),
            None if has(config, section, "bias_rule") => {
                return Err(invalid(section, "bias_interval", "bias_rule needs a bias_interval"));
            }
            None => return Ok(None),
        },
    };

    let kind = match config.get_string(section, "bias_rule") {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<BiasRuleKind>()
            .map_err(|e| invalid(section, "bias_rule", e))?,
        _ => match base.as_ref().map(|tf| tf.rule) {
            Some(BiasRule::CloseAboveSma { .. }) => BiasRuleKind::CloseAboveSma,
            _ => BiasRuleKind::EmaStack,
        },
    };
    let rule = match (kind, base.as_ref().map(|tf| tf.rule)) {
        (BiasRuleKind::EmaStack, previous) => {
            let (fast, slow) = match previous {
                Some(BiasRule::EmaStack { fast, slow }) => (fast, slow),
                _ => (20, 50),
            };
            BiasRule::EmaStack {
                fast: get_usize(config, section, "bias_fast", fast)?,
                slow: get_usize(config, section, "bias_slow", slow)?,
            }
        }
        (BiasRuleKind::CloseAboveSma, previous) => {
            let period = match previous {
                Some(BiasRule::CloseAboveSma { period }) => period,
                _ => 200,
            };
            BiasRule::CloseAboveSma {
                period: get_usize(config, section, "bias_sma", period)?,
            }
        }
    };
    Ok(Some(HigherTimeframe { interval, rule }))
}

/// Builds a strategy from `section`, starting from the section's `preset`
/// (or `default_preset`) and applying every override present.
pub fn build_strategy(
    config: &dyn ConfigPort,
    section: &str,
    default: StrategyConfig,
) -> Result<StrategyConfig, RegimetraderError> {
    let mut s = match config.get_string(section, "preset") {
        Some(raw) if !raw.trim().is_empty() => {
            let preset: Preset = raw
                .parse()
                .map_err(|e: String| invalid(section, "preset", e))?;
            StrategyConfig::preset(preset)
        }
        _ => default,
    };
    if let Some(name) = config.get_string(section, "name") {
        s.name = name.trim().to_string();
    }

    let p = &mut s.indicators;
    p.bb_period = get_usize(config, section, "bb_period", p.bb_period)?;
    p.bb_k = config.get_double(section, "bb_k", p.bb_k);
    p.rsi_period = get_usize(config, section, "rsi_period", p.rsi_period)?;
    p.atr_period = get_usize(config, section, "atr_period", p.atr_period)?;
    if let Some(raw) = config.get_string(section, "atr_smoothing") {
        p.atr_smoothing = match raw.trim().to_ascii_lowercase().as_str() {
            "ema" => AtrSmoothing::Ema,
            "mean" | "rolling_mean" | "sma" => AtrSmoothing::RollingMean,
            other => {
                return Err(invalid(
                    section,
                    "atr_smoothing",
                    format!("unknown smoothing '{other}', expected ema or mean"),
                ));
            }
        };
    }
    p.ema_trend = get_usize(config, section, "ema_trend", p.ema_trend)?;
    p.ema_fast = get_usize(config, section, "ema_fast", p.ema_fast)?;
    p.ema_slow = get_usize(config, section, "ema_slow", p.ema_slow)?;
    p.macd_fast = get_usize(config, section, "macd_fast", p.macd_fast)?;
    p.macd_slow = get_usize(config, section, "macd_slow", p.macd_slow)?;
    p.macd_signal = get_usize(config, section, "macd_signal", p.macd_signal)?;
    p.stoch_k = get_usize(config, section, "stoch_k", p.stoch_k)?;
    p.stoch_d = get_usize(config, section, "stoch_d", p.stoch_d)?;
    p.volume_ma = get_usize(config, section, "volume_ma", p.volume_ma)?;

    if config.get_bool(section, "bb_dynamic", p.bb_dynamic.is_some()) {
        let period = p.bb_period;
        let current = p.bb_dynamic.clone().unwrap_or(DynamicBand {
            vol_window: period,
            vol_ema: (period * 3 / 2).max(1),
            ratio_min: 0.8,
            ratio_max: 1.5,
        });
        p.bb_dynamic = Some(DynamicBand {
            vol_window: get_usize(config, section, "bb_vol_window", current.vol_window)?,
            vol_ema: get_usize(config, section, "bb_vol_ema", current.vol_ema)?,
            ratio_min: config.get_double(section, "bb_ratio_min", current.ratio_min),
            ratio_max: config.get_double(section, "bb_ratio_max", current.ratio_max),
        });
    } else {
        p.bb_dynamic = None;
    }

    s.entry = build_rule(config, section, "entry", &s.entry)?;
    s.exit = build_rule(config, section, "exit", &s.exit)?;

    let protection = build_protection(config, section, "", s.protection())?;
    s.stop_loss = protection.stop_loss;
    s.take_profit = protection.take_profit;
    s.trailing = protection.trailing;
    s.profit_lock = protection.profit_lock;
    s.modes = build_modes(config, section, &s.modes)?;
    s.higher_timeframe = build_higher_timeframe(config, section, s.higher_timeframe.take())?;

    s.cooldown_bars = get_usize(config, section, "cooldown_bars", s.cooldown_bars)?;
    s.allow_short = config.get_bool(section, "allow_short", s.allow_short);
    if let Some(raw) = config.get_string(section, "signal_timing") {
        s.signal_timing = raw
            .parse::<ExecutionTiming>()
            .map_err(|e| invalid(section, "signal_timing", e))?;
    }

    s.validate().map_err(|e| match e {
        RegimetraderError::InvalidParameter { name, reason } => invalid(section, &name, reason),
        other => other,
    })?;
    Ok(s)
}

pub fn build_walk_forward_config(
    config: &dyn ConfigPort,
) -> Result<WalkForwardConfig, RegimetraderError> {
    let defaults = WalkForwardConfig::default();
    let section = "walkforward";
    let regime = RegimeConfig {
        train_periods: get_usize(config, section, "train_periods", defaults.regime.train_periods)?,
        min_bars: get_usize(config, section, "min_bars", defaults.regime.min_bars)?,
        vol_quantile: config.get_double(section, "vol_quantile", defaults.regime.vol_quantile),
        trend_quantile_mr: config.get_double(
            section,
            "trend_quantile_mr",
            defaults.regime.trend_quantile_mr,
        ),
        trend_quantile_mom: config.get_double(
            section,
            "trend_quantile_mom",
            defaults.regime.trend_quantile_mom,
        ),
    };
    regime.validate().map_err(|e| match e {
        RegimetraderError::InvalidParameter { name, reason } => invalid(section, &name, reason),
        other => other,
    })?;

    Ok(WalkForwardConfig {
        regime,
        mean_reversion: build_strategy(config, "mean_reversion", defaults.mean_reversion)?,
        momentum: build_strategy(config, "momentum", defaults.momentum)?,
        cost: build_cost_model(config)?,
    })
}

/// Number of trailing periods echoed in the walk-forward report.
pub fn last_periods(config: &dyn ConfigPort) -> Result<usize, RegimetraderError> {
    get_usize(config, "walkforward", "last_periods", DEFAULT_LAST_PERIODS)
}

/// Sweep grid and the minimum trade count a result needs to be kept.
pub fn build_sweep_grid(config: &dyn ConfigPort) -> Result<(SweepGrid, usize), RegimetraderError> {
    let section = "sweep";
    let band_width_pct: Vec<f64> = get_list(config, section, "band_width_pct")?;
    let grid = SweepGrid {
        bb_periods: get_list(config, section, "bb_period")?,
        bb_ks: get_list(config, section, "bb_k")?,
        cooldowns: get_list(config, section, "cooldown_bars")?,
        ema_trends: get_list(config, section, "ema_trend")?,
        rsi_long_max: get_list(config, section, "rsi_long_max")?,
        band_width_min: band_width_pct.iter().map(|p| p / 100.0).collect(),
    };
    if grid.bb_periods.contains(&0) {
        return Err(invalid(section, "bb_period", "periods must be positive"));
    }
    if grid.ema_trends.contains(&0) {
        return Err(invalid(section, "ema_trend", "periods must be positive"));
    }
    if grid.bb_ks.iter().any(|&k| k <= 0.0) {
        return Err(invalid(section, "bb_k", "k must be positive"));
    }
    if grid.rsi_long_max.iter().any(|v| !(0.0..=100.0).contains(v)) {
        return Err(invalid(section, "rsi_long_max", "RSI thresholds must lie in [0, 100]"));
    }
    if grid.band_width_min.iter().any(|&w| w < 0.0) {
        return Err(invalid(section, "band_width_pct", "band width must be non-negative"));
    }
    let min_trades = get_usize(config, section, "min_trades", DEFAULT_MIN_TRADES)?;
    Ok((grid, min_trades))
}

/// Checks every section the given subcommand reads.
pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RegimetraderError> {
    build_backtest_settings(config)?;
    build_strategy(config, "strategy", StrategyConfig::hybrid())?;
    Ok(())
}

pub fn validate_walk_forward_config(config: &dyn ConfigPort) -> Result<(), RegimetraderError> {
    build_backtest_settings(config)?;
    build_walk_forward_config(config)?;
    last_periods(config)?;
    Ok(())
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), RegimetraderError> {
    validate_backtest_config(config)?;
    build_sweep_grid(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
symbol = solusdt
interval = 15m
fee_bps = 12.5
slip_bps = 12.5

[strategy]
preset = hybrid
cooldown_bars = 3
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
        let settings = build_backtest_settings(&config).unwrap();
        assert_eq!(settings.symbol, "SOLUSDT");
        assert!((settings.cost.cost_per_side() - 0.0025).abs() < 1e-12);
        let s = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap();
        assert_eq!(s.cooldown_bars, 3);
        assert_eq!(s.stop_loss, Some(Level::Atr(1.5)));
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[backtest]\ninterval = 1h\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, RegimetraderError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn negative_fee_fails() {
        let config = make_config("[backtest]\nsymbol = BTCUSDT\nfee_bps = -1\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "fee_bps"));
    }

    #[test]
    fn unknown_preset_fails() {
        let config = make_config("[backtest]\nsymbol = BTCUSDT\n[strategy]\npreset = martingale\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "preset"));
    }

    #[test]
    fn strategy_errors_name_the_section() {
        let config = make_config("[backtest]\nsymbol = BTCUSDT\n[strategy]\npreset = bb\nbb_k = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(
            err,
            RegimetraderError::ConfigInvalid { section, key, .. } if section == "strategy" && key == "bb_k"
        ));
    }

    #[test]
    fn custom_rules_and_thresholds() {
        let config = make_config(
            r#"
[strategy]
preset = bb
entry_required = band_touch, rsi
entry_confirmations = macd_cross, stoch_cross
entry_min_confirmations = 1
entry_rsi_long_max = 30
exit_confirmations = mid_reversion
stop_loss_pct = 3
trail_arm_pct = 2
trail_drop_atr = 1.0
lock_trigger = band
lock_mult = 0.4
signal_timing = same
"#,
        );
        let s = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap();
        assert_eq!(
            s.entry.required,
            vec![
                SignalComponent::BandTouch,
                SignalComponent::Rsi {
                    long_max: 30.0,
                    short_min: 65.0
                }
            ]
        );
        assert_eq!(s.entry.min_confirmations, 1);
        assert_eq!(s.exit, SignalRule::any_of(vec![SignalComponent::MidReversion]));
        assert_eq!(s.stop_loss, Some(Level::Fraction(0.03)));
        assert_eq!(
            s.trailing,
            Some(TrailingStop {
                arm_pct: 0.02,
                drop: Level::Atr(1.0)
            })
        );
        assert_eq!(
            s.profit_lock,
            Some(ProfitLock {
                trigger: LockTrigger::Band,
                lock_mult: 0.4
            })
        );
        assert_eq!(s.signal_timing, ExecutionTiming::SameBarClose);
    }

    #[test]
    fn unknown_component_fails() {
        let config = make_config("[strategy]\nentry_required = moon_phase\n");
        let err = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap_err();
        assert!(
            matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "entry_required")
        );
    }

    #[test]
    fn both_level_forms_fail() {
        let config = make_config("[strategy]\nstop_loss_atr = 1.5\nstop_loss_pct = 2\n");
        assert!(build_strategy(&config, "strategy", StrategyConfig::hybrid()).is_err());
    }

    #[test]
    fn dynamic_bands_default_windows() {
        let config = make_config("[strategy]\npreset = bb\nbb_period = 20\nbb_dynamic = true\n");
        let s = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap();
        let d = s.indicators.bb_dynamic.unwrap();
        assert_eq!(d.vol_window, 20);
        assert_eq!(d.vol_ema, 30);
        assert_eq!(d.ratio_min, 0.8);
    }

    #[test]
    fn walk_forward_sections() {
        let config = make_config(
            r#"
[backtest]
symbol = SOLUSDT
[walkforward]
train_periods = 6
min_bars = 500
[mean_reversion]
bb_period = 18
[momentum]
ema_fast = 8
ema_slow = 30
"#,
        );
        let wf = build_walk_forward_config(&config).unwrap();
        assert_eq!(wf.regime.train_periods, 6);
        assert_eq!(wf.regime.min_bars, 500);
        assert_eq!(wf.regime.vol_quantile, 0.35);
        assert_eq!(wf.mean_reversion.indicators.bb_period, 18);
        assert_eq!(wf.mean_reversion.indicators.bb_k, 2.4);
        assert_eq!(wf.momentum.indicators.ema_slow, 30);
        assert!(validate_walk_forward_config(&config).is_ok());
    }

    #[test]
    fn inverted_trend_quantiles_fail() {
        let config = make_config(
            "[walkforward]\ntrend_quantile_mr = 0.7\ntrend_quantile_mom = 0.3\n",
        );
        let err = build_walk_forward_config(&config).unwrap_err();
        assert!(matches!(
            err,
            RegimetraderError::ConfigInvalid { section, .. } if section == "walkforward"
        ));
    }

    #[test]
    fn sweep_lists() {
        let config = make_config(
            "[sweep]\nbb_period = 14, 16,20\nbb_k = 2.0,2.4\nema_trend = 100, 200\nband_width_pct = 0.6\nmin_trades = 8\n",
        );
        let (grid, min_trades) = build_sweep_grid(&config).unwrap();
        assert_eq!(grid.bb_periods, vec![14, 16, 20]);
        assert_eq!(grid.bb_ks, vec![2.0, 2.4]);
        assert!((grid.band_width_min[0] - 0.006).abs() < 1e-12);
        assert!(grid.cooldowns.is_empty());
        assert_eq!(grid.ema_trends, vec![100, 200]);
        assert_eq!(min_trades, 8);
    }

    #[test]
    fn sweep_zero_ema_fails() {
        let config = make_config("[sweep]\nema_trend = 0, 200\n");
        let err = build_sweep_grid(&config).unwrap_err();
        assert!(matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "ema_trend"));
    }

    #[test]
    fn sweep_bad_list_item_fails() {
        let config = make_config("[sweep]\nbb_period = 14, x\n");
        let err = build_sweep_grid(&config).unwrap_err();
        assert!(matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "bb_period"));
    }

    #[test]
    fn regime_switch_modes_take_prefixed_overrides() {
        let config = make_config(
            r#"
[strategy]
preset = regime_switch
tr_take_profit_atr = 3.5
rg_take_profit_atr = 1.5
tr_lock_mult = 0.7
bias_interval = 4h
bias_rule = sma
bias_sma = 100
"#,
        );
        let s = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap();
        assert_eq!(s.modes.len(), 2);
        assert_eq!(s.modes[0].protection.take_profit, Some(Level::Atr(3.5)));
        assert_eq!(s.modes[1].protection.take_profit, Some(Level::Atr(1.5)));
        assert_eq!(
            s.modes[0].protection.profit_lock,
            Some(ProfitLock {
                trigger: LockTrigger::Band,
                lock_mult: 0.7
            })
        );
        assert!(s.modes[1].protection.profit_lock.is_none());
        assert_eq!(
            s.higher_timeframe,
            Some(HigherTimeframe {
                interval: "4h".into(),
                rule: BiasRule::CloseAboveSma { period: 100 }
            })
        );
    }

    #[test]
    fn modes_from_scratch() {
        let config = make_config(
            r#"
[strategy]
modes = up, down
up_entry_required = higher_trend, mid_cross
up_take_profit_pct = 2
down_entry_required = higher_range, band_touch
down_allow_short = true
bias_interval = 1h
bias_rule = ema_stack
bias_fast = 10
bias_slow = 30
"#,
        );
        let s = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap();
        let names: Vec<&str> = s.modes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["up", "down"]);
        assert_eq!(
            s.modes[0].entry.required,
            vec![SignalComponent::HigherTrend, SignalComponent::MidCross]
        );
        assert_eq!(s.modes[0].protection.take_profit, Some(Level::Fraction(0.02)));
        assert!(!s.modes[0].allow_short);
        assert!(s.modes[1].allow_short);
        assert_eq!(
            s.higher_timeframe.map(|tf| tf.rule),
            Some(BiasRule::EmaStack { fast: 10, slow: 30 })
        );
    }

    #[test]
    fn bias_rule_needs_interval() {
        let config = make_config("[strategy]
bias_rule = sma
");
        let err = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap_err();
        assert!(
            matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "bias_interval")
        );
    }

    #[test]
    fn removing_the_bias_of_a_bias_strategy_fails() {
        let config = make_config("[strategy]
preset = regime_switch
bias_interval = none
");
        let err = build_strategy(&config, "strategy", StrategyConfig::hybrid()).unwrap_err();
        assert!(
            matches!(err, RegimetraderError::ConfigInvalid { key, .. } if key == "bias_interval")
        );
    }
}
