//! Bar-by-bar replay of one strategy over one bar sequence.
//!
//! [`PositionStateMachine`] holds at most one position. Each call to
//! [`PositionStateMachine::step`] consumes one bar: it fills a pending signal,
//! updates the open position (extreme, trailing arm, profit lock), then checks
//! exits in priority order (stop, take-profit, trailing, signal) or, while
//! flat, entries. Protective exits always fill at the current close; signals
//! follow the strategy's [`ExecutionTiming`].
//!
//! Entry modes are tried in order and the first that fires for exactly one
//! side wins. The position keeps that mode's protective levels.

use tracing::debug;

use crate::domain::bias::aligned_bias;
use crate::domain::cost::CostModel;
use crate::domain::error::RegimetraderError;
use crate::domain::execution::{ExecutionTiming, close_position, mark_to_market, open_position};
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_helpers::{IndicatorSnapshot, compute_indicators};
use crate::domain::ohlcv::{Bar, validate_bars};
use crate::domain::position::{ExitReason, Position, Side, Trade};
use crate::domain::signal::SignalContext;
use crate::domain::strategy::{EntryMode, LockTrigger, StrategyConfig};

#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Enter {
        mode: usize,
        side: Side,
        tags: Vec<String>,
    },
    Exit { tags: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// Starts at 1.0; one point per closed trade.
    pub equity_curve: Vec<f64>,
    pub equity_multiple: f64,
    /// Position still open after the last bar.
    pub open_position: Option<Position>,
    /// Net mark-to-market return of `open_position` at the last close.
    pub open_position_ret: Option<f64>,
    pub bars: usize,
    pub entries: usize,
}

pub struct PositionStateMachine<'a> {
    bars: &'a [Bar],
    strategy: &'a StrategyConfig,
    modes: Vec<EntryMode>,
    cost: CostModel,
    snapshot: IndicatorSnapshot,
    bias: Vec<Option<bool>>,
    atr: Option<IndicatorType>,
    bands: IndicatorType,
    cursor: usize,
    position: Option<Position>,
    pending: Option<Pending>,
    cooldown: usize,
    equity: f64,
    equity_curve: Vec<f64>,
    trades: Vec<Trade>,
    entries: usize,
}

impl<'a> PositionStateMachine<'a> {
    /// Validates inputs and computes every indicator the strategy reads.
    pub fn new(
        bars: &'a [Bar],
        strategy: &'a StrategyConfig,
        cost: &CostModel,
    ) -> Result<Self, RegimetraderError> {
        Self::with_higher_timeframe(bars, None, strategy, cost)
    }

    /// Like [`PositionStateMachine::new`], with the higher-interval bars the
    /// strategy's bias is read from. Required when a rule reads the bias.
    pub fn with_higher_timeframe(
        bars: &'a [Bar],
        higher: Option<&[Bar]>,
        strategy: &'a StrategyConfig,
        cost: &CostModel,
    ) -> Result<Self, RegimetraderError> {
        validate_bars(bars)?;
        strategy.validate()?;
        cost.validate()?;

        let indicators = strategy.required_indicators();
        let warmup = strategy.warmup_bars();
        if bars.len() < warmup {
            return Err(RegimetraderError::InsufficientData {
                context: strategy.name.clone(),
                bars: bars.len(),
                minimum: warmup,
            });
        }
        let snapshot = compute_indicators(bars, &indicators)?;
        let atr_type = strategy.indicators.atr();
        let atr = indicators.contains(&atr_type).then_some(atr_type);

        let bias = match (&strategy.higher_timeframe, higher) {
            (Some(tf), Some(higher)) => aligned_bias(bars, higher, tf)?,
            (Some(tf), None) if strategy.needs_bias() => {
                return Err(RegimetraderError::invalid(
                    "bias_interval",
                    format!("no {} bars supplied for the higher-timeframe bias", tf.interval),
                ));
            }
            _ => Vec::new(),
        };

        Ok(PositionStateMachine {
            bars,
            strategy,
            modes: strategy.entry_modes(),
            cost: *cost,
            snapshot,
            bias,
            atr,
            bands: strategy.indicators.bollinger(),
            cursor: warmup - 1,
            position: None,
            pending: None,
            cooldown: 0,
            equity: 1.0,
            equity_curve: vec![1.0],
            trades: Vec::new(),
            entries: 0,
        })
    }

    /// Index of the first bar that can produce a signal.
    pub fn first_tradable(&self) -> usize {
        self.strategy.warmup_bars() - 1
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn cooldown(&self) -> usize {
        self.cooldown
    }

    /// Processes the next bar and returns its index, or `None` once every
    /// bar has been consumed.
    pub fn step(&mut self) -> Option<usize> {
        let i = self.cursor;
        if i >= self.bars.len() {
            return None;
        }
        self.cursor += 1;
        match self.position.take() {
            Some(position) => self.step_open(position, i),
            None => self.step_flat(i),
        }
        Some(i)
    }

    /// Runs the remaining bars and returns the result.
    pub fn run(mut self) -> BacktestResult {
        while self.step().is_some() {}
        self.finish()
    }

    pub fn finish(self) -> BacktestResult {
        let open_position_ret = match (&self.position, self.bars.last()) {
            (Some(p), Some(last)) => Some(mark_to_market(p, last.close, &self.cost)),
            _ => None,
        };
        BacktestResult {
            trades: self.trades,
            equity_curve: self.equity_curve,
            equity_multiple: self.equity,
            open_position: self.position,
            open_position_ret,
            bars: self.bars.len(),
            entries: self.entries,
        }
    }

    fn context(&self) -> SignalContext<'_> {
        SignalContext {
            bars: self.bars,
            snapshot: &self.snapshot,
            params: &self.strategy.indicators,
            bias: &self.bias,
        }
    }

    fn atr_at(&self, i: usize) -> Option<f64> {
        self.atr.as_ref().and_then(|t| self.snapshot.simple(t, i))
    }

    fn step_flat(&mut self, i: usize) {
        if let Some(Pending::Enter { mode, side, tags }) = self.pending.take() {
            self.enter(mode, side, i, tags);
            return;
        }
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return;
        }
        let Some((mode, side, tags)) = self.entry_signal(i) else {
            return;
        };
        match self.strategy.signal_timing {
            ExecutionTiming::SameBarClose => self.enter(mode, side, i, tags),
            ExecutionTiming::NextBarClose => {
                debug!(index = i, %side, mode = %self.modes[mode].name, "entry signal pending");
                self.pending = Some(Pending::Enter { mode, side, tags });
            }
        }
    }

    /// First mode firing for exactly one side. A mode firing both ways
    /// abstains.
    fn entry_signal(&self, i: usize) -> Option<(usize, Side, Vec<String>)> {
        let ctx = self.context();
        self.modes.iter().enumerate().find_map(|(m, mode)| {
            let long = mode.entry.fires(Side::Long, &ctx, i);
            let short = if mode.allow_short {
                mode.entry.fires(Side::Short, &ctx, i)
            } else {
                None
            };
            match (long, short) {
                (Some(tags), None) => Some((m, Side::Long, tags)),
                (None, Some(tags)) => Some((m, Side::Short, tags)),
                _ => None,
            }
        })
    }

    fn enter(&mut self, mode: usize, side: Side, i: usize, tags: Vec<String>) {
        let atr = self.atr_at(i);
        let position = open_position(side, &self.bars[i], i, &self.modes[mode], atr, tags);
        debug!(
            index = i,
            %side,
            mode = %position.mode,
            price = position.entry_price,
            stop = ?position.stop_price,
            take_profit = ?position.take_profit_price,
            "entry"
        );
        self.position = Some(position);
        self.cooldown = self.strategy.cooldown_bars;
        self.entries += 1;
    }

    fn step_open(&mut self, mut position: Position, i: usize) {
        let close = self.bars[i].close;
        let atr = self.atr_at(i).or(position.entry_atr);

        position.update_extreme(close);
        if let Some(trail) = position.protection.trailing {
            if !position.armed && position.gross_return(close) >= trail.arm_pct {
                position.armed = true;
            }
        }
        self.apply_profit_lock(&mut position, i, atr);

        let pending_exit = match self.pending.take() {
            Some(Pending::Exit { tags }) => Some(tags),
            _ => None,
        };
        let mut reason = self.protective_exit(&position, close, atr);
        if reason.is_none() {
            reason = pending_exit.map(ExitReason::Signal);
        }
        if reason.is_none() {
            reason = self.signal_exit(&position, i);
        }

        match reason {
            Some(reason) => self.exit(position, i, reason),
            None => {
                self.position = Some(position);
                self.cooldown = self.cooldown.saturating_sub(1);
            }
        }
    }

    fn apply_profit_lock(&self, position: &mut Position, i: usize, atr: Option<f64>) {
        let (Some(lock), Some(atr)) = (position.protection.profit_lock, atr) else {
            return;
        };
        let close = self.bars[i].close;
        let entry = position.entry_price;
        let triggered = match lock.trigger {
            LockTrigger::Atr(mult) => match position.side {
                Side::Long => close >= entry + mult * atr,
                Side::Short => close <= entry - mult * atr,
            },
            LockTrigger::Band => match self.snapshot.bands(&self.bands, i) {
                Some((upper, _, lower)) => match position.side {
                    Side::Long => close >= upper,
                    Side::Short => close <= lower,
                },
                None => false,
            },
        };
        if !triggered {
            return;
        }
        position.locked = true;
        let candidate = match position.side {
            Side::Long => entry + lock.lock_mult * atr,
            Side::Short => entry - lock.lock_mult * atr,
        };
        if position.ratchet_stop(candidate) {
            debug!(index = i, stop = candidate, "profit lock moved stop");
        }
    }

    fn protective_exit(&self, position: &Position, close: f64, atr: Option<f64>) -> Option<ExitReason> {
        if position.should_stop_loss(close) {
            return Some(if position.locked {
                ExitReason::LockedStop
            } else {
                ExitReason::StopLoss
            });
        }
        if position.should_take_profit(close) {
            return Some(ExitReason::TakeProfit);
        }
        let trail = position.protection.trailing?;
        if !position.armed {
            return None;
        }
        let distance = trail.drop.distance(position.extreme, atr)?;
        position
            .retraced(close, distance)
            .then_some(ExitReason::TrailingStop)
    }

    fn signal_exit(&mut self, position: &Position, i: usize) -> Option<ExitReason> {
        let tags = self
            .strategy
            .exit
            .fires(position.side.opposite(), &self.context(), i)?;
        match self.strategy.signal_timing {
            ExecutionTiming::SameBarClose => Some(ExitReason::Signal(tags)),
            ExecutionTiming::NextBarClose => {
                debug!(index = i, "exit signal pending");
                self.pending = Some(Pending::Exit { tags });
                None
            }
        }
    }

    fn exit(&mut self, position: Position, i: usize, reason: ExitReason) {
        let trade = close_position(position, &self.bars[i], i, reason, &self.cost, &mut self.equity);
        debug!(
            index = i,
            price = trade.exit_price,
            net = trade.net_return,
            reason = %trade.reason,
            "exit"
        );
        self.equity_curve.push(self.equity);
        self.trades.push(trade);
        self.cooldown = self.strategy.cooldown_bars;
    }
}

/// Replays `strategy` over `bars` from the first tradable bar to the end.
pub fn run_backtest(
    bars: &[Bar],
    strategy: &StrategyConfig,
    cost: &CostModel,
) -> Result<BacktestResult, RegimetraderError> {
    run_backtest_with_higher(bars, None, strategy, cost)
}

/// [`run_backtest`] with higher-interval bars for the strategy's bias.
pub fn run_backtest_with_higher(
    bars: &[Bar],
    higher: Option<&[Bar]>,
    strategy: &StrategyConfig,
    cost: &CostModel,
) -> Result<BacktestResult, RegimetraderError> {
    let result = PositionStateMachine::with_higher_timeframe(bars, higher, strategy, cost)?.run();
    debug!(
        strategy = %strategy.name,
        bars = result.bars,
        trades = result.trades.len(),
        equity = result.equity_multiple,
        "backtest finished"
    );
    Ok(result)
}
