//! Letter-grade rating of backtest results
//!
//! Four sub-scores on a 0-100 scale (return, risk, stability, trading
//! quality) are blended into a weighted total and mapped to a grade.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backtest::metrics::BacktestMetrics;

/// Blend weights for the four sub-scores. Must be kept summing to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingWeights {
    pub return_weight: f64,
    pub risk_weight: f64,
    pub stability_weight: f64,
    pub trading_weight: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            return_weight: 0.30,
            risk_weight: 0.30,
            stability_weight: 0.25,
            trading_weight: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Grade::A
        } else if score >= 60.0 {
            Grade::B
        } else if score >= 40.0 {
            Grade::C
        } else if score >= 20.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub total_score: f64,
    pub grade: Grade,
    pub return_score: f64,
    pub risk_score: f64,
    pub stability_score: f64,
    pub trading_score: f64,
}

/// Rate a metrics summary. Sub-scores work in percent terms even though
/// the metrics carry fractions.
pub fn rate(metrics: &BacktestMetrics, weights: &RatingWeights) -> Rating {
    let return_score = score_return(metrics.annualized_return * 100.0);
    let risk_score = score_risk(metrics.max_drawdown * 100.0);
    let stability_score = score_stability(metrics.sharpe_ratio);
    let trading_score = score_trading(metrics.win_rate * 100.0, metrics.profit_loss_ratio);

    let total_score = return_score * weights.return_weight
        + risk_score * weights.risk_weight
        + stability_score * weights.stability_weight
        + trading_score * weights.trading_weight;

    Rating {
        total_score,
        grade: Grade::from_score(total_score),
        return_score,
        risk_score,
        stability_score,
        trading_score,
    }
}

fn score_return(annualized_pct: f64) -> f64 {
    let x = annualized_pct;
    if x >= 100.0 {
        100.0
    } else if x >= 50.0 {
        80.0 + (x - 50.0) / 50.0 * 20.0
    } else if x >= 20.0 {
        60.0 + (x - 20.0) / 30.0 * 20.0
    } else if x >= 0.0 {
        40.0 + x / 20.0 * 20.0
    } else {
        (40.0 + x / 50.0 * 40.0).max(0.0)
    }
}

fn score_risk(max_drawdown_pct: f64) -> f64 {
    let x = max_drawdown_pct;
    if x < 10.0 {
        100.0
    } else if x < 20.0 {
        100.0 - (x - 10.0) / 10.0 * 20.0
    } else if x < 30.0 {
        80.0 - (x - 20.0) / 10.0 * 20.0
    } else if x < 50.0 {
        60.0 - (x - 30.0) / 20.0 * 20.0
    } else {
        (40.0 - (x - 50.0) / 50.0 * 40.0).max(0.0)
    }
}

fn score_stability(sharpe: f64) -> f64 {
    let x = sharpe;
    if x >= 2.0 {
        100.0
    } else if x >= 1.5 {
        80.0 + (x - 1.5) / 0.5 * 20.0
    } else if x >= 1.0 {
        60.0 + (x - 1.0) / 0.5 * 20.0
    } else if x >= 0.5 {
        40.0 + (x - 0.5) / 0.5 * 20.0
    } else {
        (x / 0.5 * 40.0).max(0.0)
    }
}

fn score_trading(win_rate_pct: f64, profit_loss_ratio: f64) -> f64 {
    let w = win_rate_pct;
    let win_score = if w >= 60.0 {
        100.0
    } else if w >= 50.0 {
        80.0 + (w - 50.0) / 10.0 * 20.0
    } else if w >= 40.0 {
        60.0 + (w - 40.0) / 10.0 * 20.0
    } else {
        (w / 40.0 * 60.0).max(0.0)
    };

    let p = profit_loss_ratio;
    let pl_score = if p >= 3.0 {
        100.0
    } else if p >= 2.0 {
        80.0 + (p - 2.0) * 20.0
    } else if p >= 1.5 {
        60.0 + (p - 1.5) / 0.5 * 20.0
    } else if p >= 1.0 {
        40.0 + (p - 1.0) / 0.5 * 20.0
    } else {
        (p * 40.0).max(0.0)
    };

    0.5 * win_score + 0.5 * pl_score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(
        annualized_return: f64,
        max_drawdown: f64,
        sharpe_ratio: f64,
        win_rate: f64,
        profit_loss_ratio: f64,
    ) -> BacktestMetrics {
        BacktestMetrics {
            total_return: annualized_return,
            annualized_return,
            sharpe_ratio,
            max_drawdown,
            win_rate,
            profit_loss_ratio,
            total_trades: 20,
        }
    }

    #[test]
    fn test_excellent_run_grades_a() {
        // 120% annualized, 5% drawdown, sharpe 2.5, 65% wins, pl 3.5
        let rating = rate(&metrics(1.2, 0.05, 2.5, 0.65, 3.5), &RatingWeights::default());
        assert_eq!(rating.grade, Grade::A);
        assert!((rating.total_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_losing_run_grades_f() {
        let rating = rate(&metrics(-0.60, 0.70, -0.5, 0.20, 0.4), &RatingWeights::default());
        assert_eq!(rating.grade, Grade::F);
        assert_eq!(rating.return_score, 0.0);
        assert_eq!(rating.stability_score, 0.0);
    }

    #[test]
    fn test_return_score_band_boundaries() {
        assert_eq!(score_return(100.0), 100.0);
        assert_eq!(score_return(50.0), 80.0);
        assert_eq!(score_return(20.0), 60.0);
        assert_eq!(score_return(0.0), 40.0);
        assert!((score_return(35.0) - 70.0).abs() < 1e-9);
        assert!((score_return(-25.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_risk_score_band_boundaries() {
        assert_eq!(score_risk(5.0), 100.0);
        assert!((score_risk(15.0) - 90.0).abs() < 1e-9);
        assert!((score_risk(25.0) - 70.0).abs() < 1e-9);
        assert!((score_risk(40.0) - 50.0).abs() < 1e-9);
        assert_eq!(score_risk(100.0), 0.0);
    }

    #[test]
    fn test_trading_score_blends_halves() {
        // win 55% -> 90, pl 2.5 -> 90
        let score = score_trading(55.0, 2.5);
        assert!((score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(80.0), Grade::A);
        assert_eq!(Grade::from_score(79.9), Grade::B);
        assert_eq!(Grade::from_score(60.0), Grade::B);
        assert_eq!(Grade::from_score(40.0), Grade::C);
        assert_eq!(Grade::from_score(20.0), Grade::D);
        assert_eq!(Grade::from_score(19.9), Grade::F);
    }
}
