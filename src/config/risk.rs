//! Risk policy: position sizing and trade-level gates

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Sizing and risk limits applied to signals and backtest fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Fraction of the account risked per trade.
    pub risk_per_trade: f64,
    /// Minimum reward-to-risk ratio for a signal to pass.
    pub min_risk_reward: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.02,
            min_risk_reward: 2.0,
        }
    }
}

impl RiskPolicy {
    /// Units to buy/sell so a stop-out loses `risk_per_trade` of the balance.
    /// Zero when there is no stop to size against.
    pub fn position_size(&self, balance: f64, entry_price: f64, stop_loss: f64) -> f64 {
        let risk_per_unit = (entry_price - stop_loss).abs();
        if risk_per_unit == 0.0 || balance <= 0.0 {
            return 0.0;
        }
        balance * self.risk_per_trade / risk_per_unit
    }

    /// Percent-offset stop below (long) or above (short) the entry.
    pub fn percent_stop(&self, entry_price: f64, pct: f64, long: bool) -> f64 {
        if long {
            entry_price * (1.0 - pct)
        } else {
            entry_price * (1.0 + pct)
        }
    }

    /// Percent-offset target above (long) or below (short) the entry.
    pub fn percent_target(&self, entry_price: f64, pct: f64, long: bool) -> f64 {
        if long {
            entry_price * (1.0 + pct)
        } else {
            entry_price * (1.0 - pct)
        }
    }

    /// Reward-to-risk gate. Signals without both levels fail.
    pub fn check_risk(&self, signal: &Signal) -> bool {
        match signal.risk_reward_ratio() {
            Some(ratio) => ratio >= self.min_risk_reward,
            None => false,
        }
    }
}
