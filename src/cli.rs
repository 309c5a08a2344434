//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::run_backtest_with_higher;
use crate::domain::ohlcv::Bar;
use crate::domain::config_validation::{
    BacktestSettings, build_backtest_settings, build_strategy, build_sweep_grid,
    build_walk_forward_config, last_periods, validate_backtest_config,
    validate_sweep_config, validate_walk_forward_config,
};
use crate::domain::error::RegimetraderError;
use crate::domain::metrics::Summary;
use crate::domain::regime::Policy;
use crate::domain::strategy::StrategyConfig;
use crate::domain::sweep::{SweepGrid, SweepResult, run_sweep_with_higher};
use crate::domain::walk_forward::{WalkForwardConfig, WalkForwardResult, run_walk_forward};
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "regimetrader",
    about = "Single-instrument strategy backtester with regime walk-forward"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest the [strategy] section over one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [backtest] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<String>,
    },
    /// Month-by-month regime walk-forward
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Grid search over the [sweep] section
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check every configuration section without reading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
            interval,
        } => run_backtest_command(&config, output, symbol, interval),
        Command::WalkForward { config, output } => run_walk_forward_command(&config, output),
        Command::Sweep { config, output } => run_sweep_command(&config, output),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Installs the stderr subscriber. `RUST_LOG` overrides the `info` default.
/// A second call (as in tests) is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    info!(config = adapter.source(), "loaded configuration");
    Ok(adapter)
}

/// Output file stem: `SYMBOL_interval` plus an optional label.
pub fn report_stem(settings: &BacktestSettings, label: Option<&str>) -> String {
    let base = format!("{}_{}", settings.symbol, settings.interval);
    match label {
        Some(l) if !l.is_empty() => format!("{base}_{}", l.replace(char::is_whitespace, "_")),
        _ => base,
    }
}

fn resolve_settings(
    adapter: &FileConfigAdapter,
    output: Option<PathBuf>,
) -> Result<BacktestSettings, RegimetraderError> {
    let mut settings = build_backtest_settings(adapter)?;
    if let Some(out) = output {
        settings.output_dir = out.display().to_string();
    }
    Ok(settings)
}

/// Loads the bars behind a strategy's higher-timeframe bias, if it has one.
fn higher_bars(
    data_port: &dyn DataPort,
    settings: &BacktestSettings,
    strategy: &StrategyConfig,
) -> Result<Option<Vec<Bar>>, RegimetraderError> {
    let Some(tf) = &strategy.higher_timeframe else {
        return Ok(None);
    };
    let bars = data_port.fetch_bars(&settings.symbol, &tf.interval)?;
    info!(interval = %tf.interval, bars = bars.len(), rule = %tf.rule, "higher-timeframe bars loaded");
    Ok(Some(bars))
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    settings: &BacktestSettings,
    strategy: &StrategyConfig,
) -> Result<Summary, RegimetraderError> {
    let bars = data_port.fetch_bars(&settings.symbol, &settings.interval)?;
    info!(symbol = %settings.symbol, bars = bars.len(), strategy = %strategy.name, "bars loaded");

    let higher = higher_bars(data_port, settings, strategy)?;

    let result = run_backtest_with_higher(&bars, higher.as_deref(), strategy, &settings.cost)?;
    let summary = Summary::from_run(&settings.symbol, &settings.interval, &strategy.name, &result);

    let stem = report_stem(settings, Some(&strategy.name));
    report_port.write_summary(&stem, &summary)?;
    report_port.write_ledger(&stem, &result.trades)?;
    info!(
        trades = summary.trades,
        equity = summary.equity_multiple,
        max_drawdown_pct = summary.max_drawdown_pct,
        "backtest complete"
    );
    Ok(summary)
}

pub fn run_walk_forward_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    settings: &BacktestSettings,
    config: &WalkForwardConfig,
    last: usize,
) -> Result<WalkForwardResult, RegimetraderError> {
    let bars = data_port.fetch_bars(&settings.symbol, &settings.interval)?;
    info!(symbol = %settings.symbol, bars = bars.len(), "bars loaded");

    let result = run_walk_forward(&bars, config)?;
    report_port.write_walk_forward(&report_stem(settings, None), &result, last)?;
    info!(
        traded = result.rows.len(),
        skipped = result.skipped.len(),
        strategy = result.strategy_cumulative,
        buyhold = result.buyhold_cumulative,
        ratio = result.ratio,
        "walk-forward complete"
    );
    Ok(result)
}

pub fn run_sweep_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    settings: &BacktestSettings,
    base: &StrategyConfig,
    grid: &SweepGrid,
    min_trades: usize,
) -> Result<SweepResult, RegimetraderError> {
    let bars = data_port.fetch_bars(&settings.symbol, &settings.interval)?;
    let candidates = grid.generate_configs(base);
    info!(symbol = %settings.symbol, bars = bars.len(), candidates = candidates.len(), "sweep starting");

    let higher = higher_bars(data_port, settings, base)?;

    let result = run_sweep_with_higher(&bars, higher.as_deref(), &candidates, &settings.cost, min_trades)?;
    report_port.write_sweep(&report_stem(settings, Some(&base.name)), &result)?;
    Ok(result)
}

fn run_backtest_command(
    config_path: &Path,
    output: Option<PathBuf>,
    symbol: Option<String>,
    interval: Option<String>,
) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Resolve settings and strategy
    let mut settings = match resolve_settings(&adapter, output) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Some(s) = symbol {
        settings.symbol = s.trim().to_uppercase();
    }
    if let Some(i) = interval {
        settings.interval = i.trim().to_string();
    }
    let strategy = match build_strategy(&adapter, "strategy", StrategyConfig::hybrid()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Run and report
    let data_port = CsvAdapter::new(PathBuf::from(&settings.data_dir));
    let report_port = CsvReportAdapter::new(PathBuf::from(&settings.output_dir));
    match run_backtest_pipeline(&data_port, &report_port, &settings, &strategy) {
        Ok(summary) => {
            println!(
                "{} {} {}: {} trades, win rate {:.1}%, equity {:.4}x, max drawdown {:.2}%",
                summary.symbol,
                summary.interval,
                summary.params,
                summary.trades,
                summary.win_rate_pct,
                summary.equity_multiple,
                summary.max_drawdown_pct
            );
            if let Some(open) = summary.open_position_ret_pct {
                println!("open position: {open:+.2}%");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_walk_forward_command(config_path: &Path, output: Option<PathBuf>) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Resolve settings, regime and policies
    let resolved = resolve_settings(&adapter, output).and_then(|settings| {
        let config = build_walk_forward_config(&adapter)?;
        let last = last_periods(&adapter)?;
        Ok((settings, config, last))
    });
    let (settings, config, last) = match resolved {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Run and report
    let data_port = CsvAdapter::new(PathBuf::from(&settings.data_dir));
    let report_port = CsvReportAdapter::new(PathBuf::from(&settings.output_dir));
    match run_walk_forward_pipeline(&data_port, &report_port, &settings, &config, last) {
        Ok(result) => {
            for row in result.last(last) {
                println!(
                    "{} {:>3} strat {:.4}x bh {:.4}x trades {}",
                    row.period, row.policy.tag(), row.multiplier, row.buyhold_multiplier, row.trades
                );
            }
            println!(
                "{} periods (BB {}, EMA {}, BH {}), {} skipped: strategy {:.4}x, buy-and-hold {:.4}x, ratio {:.4}",
                result.rows.len(),
                result.policy_count(Policy::MeanReversion),
                result.policy_count(Policy::Momentum),
                result.policy_count(Policy::Neutral),
                result.skipped.len(),
                result.strategy_cumulative,
                result.buyhold_cumulative,
                result.ratio
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_sweep_command(config_path: &Path, output: Option<PathBuf>) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Resolve settings, base strategy and grid
    let resolved = resolve_settings(&adapter, output).and_then(|settings| {
        let base = build_strategy(&adapter, "strategy", StrategyConfig::hybrid())?;
        let (grid, min_trades) = build_sweep_grid(&adapter)?;
        Ok((settings, base, grid, min_trades))
    });
    let (settings, base, grid, min_trades) = match resolved {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Run and report
    let data_port = CsvAdapter::new(PathBuf::from(&settings.data_dir));
    let report_port = CsvReportAdapter::new(PathBuf::from(&settings.output_dir));
    match run_sweep_pipeline(&data_port, &report_port, &settings, &base, &grid, min_trades) {
        Ok(result) => {
            println!(
                "{} candidates, {} kept (min {} trades), {} rejected",
                result.evaluated,
                result.rows.len(),
                min_trades,
                result.rejected
            );
            for row in result.rows.iter().take(10) {
                println!(
                    "{:<40} trades {:>4} win {:>5.1}% equity {:.4}x dd {:.2}%",
                    row.params,
                    row.trades,
                    row.win_rate_pct,
                    row.equity_multiple,
                    row.max_drawdown_pct
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checks = validate_backtest_config(&adapter)
        .and_then(|_| validate_walk_forward_config(&adapter))
        .and_then(|_| validate_sweep_config(&adapter));
    if let Err(e) = checks {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let summary = build_strategy(&adapter, "strategy", StrategyConfig::hybrid())
        .and_then(|strategy| build_sweep_grid(&adapter).map(|(grid, _)| (strategy, grid)));
    match summary {
        Ok((strategy, grid)) => {
            eprintln!("\nSections: {}", adapter.sections().join(", "));
            eprintln!("Strategy: {}", strategy.name);
            eprintln!("  warm-up bars: {}", strategy.warmup_bars());
            eprintln!("  signal timing: {}", strategy.signal_timing);
            eprintln!("  sweep candidates: {}", grid.size());
            eprintln!("\nConfiguration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
