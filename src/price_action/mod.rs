//! Price-action analysis
//!
//! Works on raw OHLCV only; no indicator dependence. Split into candlestick
//! patterns, support/resistance levels, market structure and larger chart
//! patterns. Detectors return `Option` and never panic on short input.

pub mod candlestick;
pub mod chart_patterns;
pub mod structure;
pub mod support_resistance;

pub use candlestick::{
    detect_latest, doji, engulfing, inside_bar, outside_bar, pin_bar, PatternHit, PatternKind,
    Strength,
};
pub use chart_patterns::{
    double_top_bottom, head_shoulders, triangle, ChartPattern, ChartPatternKind,
};
pub use structure::{market_structure, structure_break, swing_points, StructureBreak, SwingPoint, Trend};
pub use support_resistance::{support_resistance, Level, LevelKind, SrLevels};

use serde::{Deserialize, Serialize};

/// Directional read of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    /// Pattern seen but no directional edge yet (doji, inside bar).
    Neutral,
}
