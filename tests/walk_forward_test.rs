//! Integration tests for regime classification and the monthly walk-forward.

mod common;

use approx::assert_relative_eq;
use common::*;
use regimetrader::domain::regime::{Policy, RegimeConfig, SkipReason, month_stats};
use regimetrader::domain::walk_forward::{WalkForwardConfig, run_walk_forward};

fn loose_regime(train_periods: usize, vol: f64, mr: f64, mom: f64) -> RegimeConfig {
    RegimeConfig {
        train_periods,
        min_bars: 10,
        vol_quantile: vol,
        trend_quantile_mr: mr,
        trend_quantile_mom: mom,
    }
}

#[test]
fn month_stats_follow_calendar_months() {
    let bars = monthly_bars(&[101.0, 102.0, 104.0], 60);
    let stats = month_stats(&bars);

    assert_eq!(stats.len(), 3);
    assert_eq!(stats[0].period.to_string(), "2023-01");
    assert_eq!(stats[2].period.to_string(), "2023-03");
    assert!(stats.iter().all(|s| s.bar_count == 60));
    assert_relative_eq!(stats[1].net_trend, 0.02, epsilon = 1e-12);
    assert!(stats[0].realized_vol < stats[1].realized_vol);
    assert!(stats[1].realized_vol < stats[2].realized_vol);
}

#[test]
fn identical_months_pick_mean_reversion() {
    let bars = monthly_bars(&[102.0; 6], 60);
    let config = WalkForwardConfig {
        regime: loose_regime(2, 0.5, 0.5, 1.0),
        ..WalkForwardConfig::default()
    };
    let result = run_walk_forward(&bars, &config).unwrap();

    let reasons: Vec<SkipReason> = result.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(
        reasons,
        vec![
            SkipReason::NoPriorPeriod,
            SkipReason::InsufficientTraining {
                available: 0,
                required: 2
            },
            SkipReason::InsufficientTraining {
                available: 1,
                required: 2
            },
        ]
    );
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.policy_count(Policy::MeanReversion), 3);
    for row in &result.rows {
        // the +-2% oscillation never leaves the 2.4-sigma band
        assert_eq!(row.trades, 0);
        assert_eq!(row.multiplier, 1.0);
        assert_relative_eq!(row.buyhold_multiplier, 1.02, epsilon = 1e-12);
    }
    assert_eq!(result.strategy_cumulative, 1.0);
    assert_relative_eq!(result.buyhold_cumulative, 1.02f64.powi(3), epsilon = 1e-12);
    assert_relative_eq!(result.ratio, 1.0 / 1.02f64.powi(3), epsilon = 1e-12);
}

#[test]
fn accelerating_months_pick_momentum() {
    // every month is more volatile and trends harder than all before it
    let bars = monthly_bars(&[101.0, 102.0, 103.0, 104.0, 105.0, 106.0], 60);
    let config = WalkForwardConfig {
        regime: loose_regime(2, 1.0, 0.0, 1.0),
        ..WalkForwardConfig::default()
    };
    let result = run_walk_forward(&bars, &config).unwrap();

    assert_eq!(result.skipped.len(), 3);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.policy_count(Policy::Momentum), 3);
    let periods: Vec<String> = result.rows.iter().map(|r| r.period.to_string()).collect();
    assert_eq!(periods, vec!["2023-04", "2023-05", "2023-06"]);
}

#[test]
fn cumulative_multiples_are_products_of_rows() {
    let highs = [101.0, 103.0, 102.0, 101.5, 104.0, 102.5, 101.0, 103.5, 102.0, 104.5];
    let bars = monthly_bars(&highs, 60);
    let config = WalkForwardConfig {
        regime: loose_regime(3, 0.4, 0.3, 0.6),
        ..WalkForwardConfig::default()
    };
    let result = run_walk_forward(&bars, &config).unwrap();

    assert_eq!(result.rows.len() + result.skipped.len(), highs.len());
    let mut strategy = 1.0;
    let mut buyhold = 1.0;
    for row in &result.rows {
        strategy *= row.multiplier;
        buyhold *= row.buyhold_multiplier;
        assert_relative_eq!(row.strategy_cumulative, strategy, epsilon = 1e-12);
        assert_relative_eq!(row.buyhold_cumulative, buyhold, epsilon = 1e-12);
        if row.policy == Policy::Neutral {
            assert_eq!(row.multiplier, row.buyhold_multiplier);
            assert_eq!(row.trades, 0);
        }
    }
    assert_relative_eq!(result.strategy_cumulative, strategy, epsilon = 1e-12);
    assert_relative_eq!(result.buyhold_cumulative, buyhold, epsilon = 1e-12);
    assert_relative_eq!(result.ratio, strategy / buyhold, epsilon = 1e-12);
}

#[test]
fn thin_previous_month_is_skipped() {
    let mut bars = monthly_bars(&[102.0; 4], 60);
    // drop most of March
    bars.retain(|b| b.open_time.format("%m").to_string() != "03" || b.close < 101.0);
    let config = WalkForwardConfig {
        regime: RegimeConfig {
            min_bars: 40,
            ..loose_regime(1, 0.5, 0.5, 1.0)
        },
        ..WalkForwardConfig::default()
    };
    let result = run_walk_forward(&bars, &config).unwrap();

    let april = result
        .skipped
        .iter()
        .find(|s| s.period.to_string() == "2023-04")
        .unwrap();
    assert_eq!(
        april.reason,
        SkipReason::TooFewBars {
            bars: 30,
            minimum: 40
        }
    );
}

#[test]
fn alternating_months_tie_on_the_thresholds() {
    // high and low volatility months alternate for a year; with a two-month
    // window every training set holds one of each, so quantile 1.0 lands
    // exactly on the high month's volatility and trend
    let highs: Vec<f64> = (0..12).map(|m| if m % 2 == 0 { 104.0 } else { 101.0 }).collect();
    let bars = monthly_bars(&highs, 60);

    let stats = month_stats(&bars);
    assert_eq!(stats.len(), 12);
    assert_eq!(stats[0].realized_vol, stats[10].realized_vol);
    assert!(stats[1].realized_vol < stats[0].realized_vol);

    use Policy::{MeanReversion as Mr, Momentum as Mom, Neutral as N};
    let cases = [
        // vol == q_vol and |trend| == q_mom: momentum on the >= boundary
        (loose_regime(2, 1.0, 0.0, 1.0), vec![Mom, N, Mom, N, Mom, N, Mom, N, Mom]),
        // |trend| == q_mr as well: the <= test wins
        (loose_regime(2, 1.0, 1.0, 1.0), vec![Mr, N, Mr, N, Mr, N, Mr, N, Mr]),
    ];
    for (regime, expected) in cases {
        let config = WalkForwardConfig {
            regime,
            ..WalkForwardConfig::default()
        };
        let result = run_walk_forward(&bars, &config).unwrap();
        assert_eq!(result.skipped.len(), 3);
        let policies: Vec<Policy> = result.rows.iter().map(|r| r.policy).collect();
        assert_eq!(policies, expected);
        assert_eq!(result.rows[0].period.to_string(), "2023-04");
        for row in result.rows.iter().filter(|r| r.policy == N) {
            assert_eq!(row.multiplier, row.buyhold_multiplier);
            assert_relative_eq!(row.buyhold_multiplier, 1.04, epsilon = 1e-12);
        }
    }
}
