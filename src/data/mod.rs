//! Market data types and the candle source collaborator seam

pub mod candle;
pub mod interval;
pub mod source;

pub use candle::{Candle, CandleSeries};
pub use interval::Interval;
pub use source::{CandleSource, StaticCandleSource};
