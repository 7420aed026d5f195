//! Performance metrics over an equity curve and trade list

use serde::{Deserialize, Serialize};

use crate::backtest::engine::Trade;
use crate::data::Interval;

/// Summary metrics of a backtest run. Returns, drawdown and win rate are
/// fractions, not percentages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_loss_ratio: f64,
    pub total_trades: usize,
}

/// Compute all metrics from the per-candle equity curve and closed trades.
pub fn compute_metrics(
    equity_curve: &[f64],
    trades: &[Trade],
    interval: Interval,
) -> BacktestMetrics {
    let mut metrics = BacktestMetrics {
        total_trades: trades.len(),
        ..Default::default()
    };
    let Some((&first, &last)) = equity_curve.first().zip(equity_curve.last()) else {
        return metrics;
    };
    if first > 0.0 {
        metrics.total_return = last / first - 1.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    let periods_per_year = interval.periods_per_year();
    metrics.sharpe_ratio = sharpe(&returns, periods_per_year);
    metrics.max_drawdown = max_drawdown(equity_curve);
    if first > 0.0 && equity_curve.len() > 1 {
        let periods = (equity_curve.len() - 1) as f64;
        metrics.annualized_return = (last / first).powf(periods_per_year / periods) - 1.0;
    }

    let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p < 0.0).collect();
    if !trades.is_empty() {
        metrics.win_rate = wins.len() as f64 / trades.len() as f64;
    }
    let avg_win = mean(&wins);
    let avg_loss = -mean(&losses);
    if avg_loss > 0.0 {
        metrics.profit_loss_ratio = avg_win / avg_loss;
    }

    metrics
}

/// Annualized Sharpe ratio from per-period returns (zero risk-free rate).
fn sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    mean / std * periods_per_year.sqrt()
}

/// Deepest peak-to-trough decline as a fraction of the peak.
fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst: f64 = 0.0;
    for &e in equity_curve {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.max((peak - e) / peak);
        }
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
