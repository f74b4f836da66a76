//! Decision components — classifier, position sizer, and risk bracket.
//!
//! All three are pure functions of today's percentile, price, and ATR plus the
//! variant's immutable configuration. None of them sees a previous signal.

pub mod bracket;
pub mod classifier;
pub mod sizer;

pub use bracket::{compute_bracket, BracketBuilder, RiskBracket, StopParams};
pub use classifier::{classify, confidence};
pub use sizer::{position_size_pct, PositionSizer, Sizing, Tier, TierError, TierTable};
