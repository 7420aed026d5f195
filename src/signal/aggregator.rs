//! Multi-strategy signal aggregation with conflict resolution
//!
//! Pure functions over signal slices; no clock, no I/O. Ties between buyers
//! and sellers resolve to an explicit HOLD so callers can tell "conflicting
//! opinions" apart from "no opinion at all".

use std::collections::HashMap;

use tracing::debug;

use crate::signal::{Signal, SignalType};

/// Aggregation tuning.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Per-strategy weight; strategies not listed weigh 1.0.
    pub weights: HashMap<String, f64>,
    /// Factor by which one side's weighted confidence must exceed the
    /// other's to win a conflict.
    pub conflict_margin: f64,
    /// Minimum number of agreeing signals for a one-sided aggregate.
    pub min_supporting: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            conflict_margin: 1.2,
            min_supporting: 2,
        }
    }
}

impl AggregatorConfig {
    fn weight_of(&self, strategy: &str) -> f64 {
        self.weights.get(strategy).copied().unwrap_or(1.0)
    }
}

/// Combine signals from several strategies into at most one decision.
///
/// BUY and SELL groups are compared by weighted mean confidence. With both
/// sides present, the stronger side must beat the weaker by
/// `conflict_margin`, else the result is a HOLD. A single dominant side still
/// needs `min_supporting` members. HOLD inputs are ignored.
pub fn aggregate(signals: &[Signal], config: &AggregatorConfig) -> Option<Signal> {
    let buys: Vec<&Signal> = signals
        .iter()
        .filter(|s| s.signal_type == SignalType::Buy)
        .collect();
    let sells: Vec<&Signal> = signals
        .iter()
        .filter(|s| s.signal_type == SignalType::Sell)
        .collect();

    if buys.is_empty() && sells.is_empty() {
        return None;
    }

    if !buys.is_empty() && !sells.is_empty() {
        let buy_confidence = weighted_confidence(&buys, config);
        let sell_confidence = weighted_confidence(&sells, config);
        debug!(buy_confidence, sell_confidence, "conflicting signal groups");

        if buy_confidence > sell_confidence * config.conflict_margin {
            return Some(combine(&buys, SignalType::Buy, config));
        }
        if sell_confidence > buy_confidence * config.conflict_margin {
            return Some(combine(&sells, SignalType::Sell, config));
        }
        // unresolved conflict: explicit HOLD so the caller sees the standoff
        let all: Vec<&Signal> = buys.iter().chain(sells.iter()).copied().collect();
        let mut hold = combine(&all, SignalType::Hold, config);
        hold.stop_loss = None;
        hold.take_profit = None;
        return Some(hold);
    }

    let (side, signal_type) = if buys.is_empty() {
        (&sells, SignalType::Sell)
    } else {
        (&buys, SignalType::Buy)
    };
    if side.len() < config.min_supporting {
        debug!(
            count = side.len(),
            required = config.min_supporting,
            "not enough supporting signals"
        );
        return None;
    }
    Some(combine(side, signal_type, config))
}

fn weighted_confidence(signals: &[&Signal], config: &AggregatorConfig) -> f64 {
    let mut total_weight = 0.0;
    let mut sum = 0.0;
    for s in signals {
        let w = config.weight_of(&s.strategy);
        total_weight += w;
        sum += s.confidence * w;
    }
    if total_weight == 0.0 {
        0.0
    } else {
        sum / total_weight
    }
}

fn combine(signals: &[&Signal], signal_type: SignalType, config: &AggregatorConfig) -> Signal {
    let mut total_weight = 0.0;
    let mut entry = 0.0;
    let mut confidence = 0.0;
    let mut stop_sum = 0.0;
    let mut stop_weight = 0.0;
    let mut target_sum = 0.0;
    let mut target_weight = 0.0;

    for s in signals {
        let w = config.weight_of(&s.strategy);
        total_weight += w;
        entry += s.entry_price * w;
        confidence += s.confidence * w;
        if let Some(sl) = s.stop_loss {
            stop_sum += sl * w;
            stop_weight += w;
        }
        if let Some(tp) = s.take_profit {
            target_sum += tp * w;
            target_weight += w;
        }
    }

    let first = signals[0];
    let mut out = Signal::new(
        first.symbol.clone(),
        signal_type,
        entry / total_weight,
        "aggregate",
        (confidence / total_weight).clamp(0.0, 1.0),
        first.interval,
    );
    if stop_weight > 0.0 {
        out.stop_loss = Some(stop_sum / stop_weight);
    }
    if target_weight > 0.0 {
        out.take_profit = Some(target_sum / target_weight);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interval;

    fn buy(strategy: &str, confidence: f64) -> Signal {
        Signal::buy("BTC/USDT", 100.0, strategy, confidence, Interval::H1)
            .with_stop_loss(95.0)
            .with_take_profit(110.0)
    }

    fn sell(strategy: &str, confidence: f64) -> Signal {
        Signal::sell("BTC/USDT", 100.0, strategy, confidence, Interval::H1)
            .with_stop_loss(105.0)
            .with_take_profit(90.0)
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[], &AggregatorConfig::default()).is_none());
    }

    #[test]
    fn test_agreeing_buys_average() {
        let signals = vec![buy("a", 0.6), buy("b", 0.8)];
        let out = aggregate(&signals, &AggregatorConfig::default()).unwrap();
        assert_eq!(out.signal_type, SignalType::Buy);
        assert!((out.confidence - 0.7).abs() < 1e-9);
        assert_eq!(out.stop_loss, Some(95.0));
        assert_eq!(out.strategy, "aggregate");
    }

    #[test]
    fn test_single_buy_below_min_supporting() {
        let signals = vec![buy("a", 0.9)];
        assert!(aggregate(&signals, &AggregatorConfig::default()).is_none());
    }

    #[test]
    fn test_close_conflict_yields_hold() {
        let signals = vec![buy("a", 0.7), sell("b", 0.65)];
        let out = aggregate(&signals, &AggregatorConfig::default()).unwrap();
        assert_eq!(out.signal_type, SignalType::Hold);
        assert!(out.stop_loss.is_none());
        assert!(out.take_profit.is_none());
    }

    #[test]
    fn test_dominant_side_wins_conflict() {
        let signals = vec![buy("a", 0.9), sell("b", 0.3)];
        let out = aggregate(&signals, &AggregatorConfig::default()).unwrap();
        assert_eq!(out.signal_type, SignalType::Buy);
    }

    #[test]
    fn test_weights_shift_the_outcome() {
        let signals = vec![buy("light", 0.4), buy("heavy", 0.9), sell("c", 0.6)];
        // unweighted the buy mean is 0.65, not enough to clear 0.6 * 1.2
        let out = aggregate(&signals, &AggregatorConfig::default()).unwrap();
        assert_eq!(out.signal_type, SignalType::Hold);

        let mut config = AggregatorConfig::default();
        config.weights.insert("heavy".to_string(), 10.0);
        // weighted the buy mean moves to ~0.85 and wins the conflict
        let out = aggregate(&signals, &config).unwrap();
        assert_eq!(out.signal_type, SignalType::Buy);
    }

    #[test]
    fn test_hold_inputs_are_ignored() {
        let signals = vec![
            Signal::hold("BTC/USDT", 100.0, "x", 0.9, Interval::H1),
            Signal::hold("BTC/USDT", 100.0, "y", 0.9, Interval::H1),
        ];
        assert!(aggregate(&signals, &AggregatorConfig::default()).is_none());
    }

    #[test]
    fn test_deterministic() {
        let signals = vec![buy("a", 0.6), buy("b", 0.8), sell("c", 0.2)];
        let config = AggregatorConfig::default();
        let first = aggregate(&signals, &config).unwrap();
        let second = aggregate(&signals, &config).unwrap();
        assert_eq!(first.signal_type, second.signal_type);
        assert_eq!(first.entry_price, second.entry_price);
        assert_eq!(first.confidence, second.confidence);
    }
}
