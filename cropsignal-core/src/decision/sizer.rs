//! Position Sizer — conviction tiers to position-size fractions.
//!
//! Sizing is table-driven: each direction carries an ordered list of
//! (percentile cutoff, size fraction) pairs, most selective first. A new model
//! variant is a new table, not new code.
//!
//! # Formula
//! ```text
//! tier_fraction     = fraction of the first tier the percentile reaches
//! position_size_pct = r_per_trade * 100 * tier_fraction
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Action;

/// One conviction tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    /// LONG tiers match at `percentile >= cutoff`, SHORT tiers at `percentile <= cutoff`.
    pub cutoff: f64,
    /// Share of the full risk unit, in (0, 1].
    pub fraction: f64,
}

impl Tier {
    pub const fn new(cutoff: f64, fraction: f64) -> Self {
        Self { cutoff, fraction }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TierError {
    #[error("{side} tier table is empty")]
    Empty { side: &'static str },

    #[error("{side} tier {index}: fraction {fraction} outside (0, 1]")]
    Fraction {
        side: &'static str,
        index: usize,
        fraction: f64,
    },

    #[error("{side} tier {index}: cutoff {cutoff} outside [0, 1]")]
    Cutoff {
        side: &'static str,
        index: usize,
        cutoff: f64,
    },

    #[error("{side} tiers must be ordered most selective first (tier {index} cutoff {cutoff})")]
    Order {
        side: &'static str,
        index: usize,
        cutoff: f64,
    },

    #[error("{side} tiers stop at {cutoff} and leave entry threshold {threshold} unsized")]
    Coverage {
        side: &'static str,
        cutoff: f64,
        threshold: f64,
    },
}

/// Per-direction tier lists. LONG and SHORT tables are independent and need
/// not mirror each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    pub long: Vec<Tier>,
    pub short: Vec<Tier>,
}

impl TierTable {
    /// Check ordering, bounds, and that the least selective tier on each side
    /// covers the classifier's entry threshold.
    pub fn validate(&self, long_percentile: f64, short_percentile: f64) -> Result<(), TierError> {
        check_side("LONG", &self.long, |prev, next| next < prev)?;
        check_side("SHORT", &self.short, |prev, next| next > prev)?;

        if let Some(last) = self.long.last() {
            if last.cutoff > long_percentile {
                return Err(TierError::Coverage {
                    side: "LONG",
                    cutoff: last.cutoff,
                    threshold: long_percentile,
                });
            }
        }
        if let Some(last) = self.short.last() {
            if last.cutoff < short_percentile {
                return Err(TierError::Coverage {
                    side: "SHORT",
                    cutoff: last.cutoff,
                    threshold: short_percentile,
                });
            }
        }
        Ok(())
    }

    /// Fraction of the first tier reached by `percentile` for `action`.
    ///
    /// `None` for HOLD or when no tier matches.
    pub fn fraction(&self, action: Action, percentile: f64) -> Option<f64> {
        match action {
            Action::Long => self
                .long
                .iter()
                .find(|t| percentile >= t.cutoff)
                .map(|t| t.fraction),
            Action::Short => self
                .short
                .iter()
                .find(|t| percentile <= t.cutoff)
                .map(|t| t.fraction),
            Action::Hold => None,
        }
    }
}

fn check_side(
    side: &'static str,
    tiers: &[Tier],
    strictly_ordered: impl Fn(f64, f64) -> bool,
) -> Result<(), TierError> {
    if tiers.is_empty() {
        return Err(TierError::Empty { side });
    }
    for (index, tier) in tiers.iter().enumerate() {
        if !(tier.fraction > 0.0 && tier.fraction <= 1.0) {
            return Err(TierError::Fraction {
                side,
                index,
                fraction: tier.fraction,
            });
        }
        if !(0.0..=1.0).contains(&tier.cutoff) {
            return Err(TierError::Cutoff {
                side,
                index,
                cutoff: tier.cutoff,
            });
        }
        if index > 0 && !strictly_ordered(tiers[index - 1].cutoff, tier.cutoff) {
            return Err(TierError::Order {
                side,
                index,
                cutoff: tier.cutoff,
            });
        }
    }
    Ok(())
}

/// Result of sizing one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sizing {
    pub tier_fraction: f64,
    pub position_size_pct: f64,
}

impl Sizing {
    pub const FLAT: Sizing = Sizing {
        tier_fraction: 0.0,
        position_size_pct: 0.0,
    };
}

/// Position size in percent of equity for a risk unit and tier fraction.
pub fn position_size_pct(r_per_trade: f64, tier_fraction: f64) -> f64 {
    r_per_trade * 100.0 * tier_fraction
}

/// Table-driven sizer for one model variant.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizer<'a> {
    r_per_trade: f64,
    tiers: &'a TierTable,
}

impl<'a> PositionSizer<'a> {
    pub fn new(r_per_trade: f64, tiers: &'a TierTable) -> Self {
        Self { r_per_trade, tiers }
    }

    /// Size a classified action. HOLD, or a percentile no tier reaches, sizes flat.
    pub fn size(&self, action: Action, percentile: f64) -> Sizing {
        match self.tiers.fraction(action, percentile) {
            Some(fraction) => Sizing {
                tier_fraction: fraction,
                position_size_pct: position_size_pct(self.r_per_trade, fraction),
            },
            None => Sizing::FLAT,
        }
    }
}
