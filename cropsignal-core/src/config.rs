//! Model variant configuration.
//!
//! A [`ModelConfig`] is an immutable value passed into every evaluation. It is
//! built from the JSON config document shipped next to each model bundle and
//! validated once at load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::decision::{StopParams, Tier, TierError, TierTable};
use crate::indicators::RollingPercentileRanker;

pub const DEFAULT_MIN_PERIODS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("variant '{variant}' has no preset tier table; add position_sizing.tiers")]
    MissingTiers { variant: String },

    #[error("invalid tier table: {0}")]
    Tiers(#[from] TierError),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ─── Document (as serialized) ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub parameters: ParametersDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersDoc {
    pub thresholds: ThresholdsDoc,
    pub position_sizing: PositionSizingDoc,
    pub stops: StopsDoc,
    pub profit_targets: ProfitTargetsDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsDoc {
    pub long_percentile: f64,
    pub short_percentile: f64,
    pub rolling_window: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_periods: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizingDoc {
    pub r_per_trade: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<TierTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopsDoc {
    pub atr_multiplier: f64,
    pub atr_period: usize,
    pub time_stop_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitTargetsDoc {
    pub target_r: f64,
}

// ─── Validated config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub long_percentile: f64,
    pub short_percentile: f64,
    pub rolling_window: usize,
    pub min_periods: usize,
}

impl Thresholds {
    pub fn ranker(&self) -> RollingPercentileRanker {
        RollingPercentileRanker::new(self.rolling_window, self.min_periods)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub variant: String,
    pub thresholds: Thresholds,
    pub tiers: TierTable,
    pub stops: StopParams,
    pub r_per_trade: f64,
}

impl ModelConfig {
    /// Parse and validate a JSON config document.
    ///
    /// `default_variant` names the variant when the document does not.
    pub fn from_json_str(json: &str, default_variant: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        Self::from_document(doc, default_variant)
    }

    pub fn from_document(doc: ConfigDocument, default_variant: &str) -> Result<Self, ConfigError> {
        let variant = doc.variant.unwrap_or_else(|| default_variant.to_string());
        let p = doc.parameters;

        let thresholds = Thresholds {
            long_percentile: p.thresholds.long_percentile,
            short_percentile: p.thresholds.short_percentile,
            rolling_window: p.thresholds.rolling_window,
            min_periods: p.thresholds.min_periods.unwrap_or(DEFAULT_MIN_PERIODS),
        };

        let tiers = match p.position_sizing.tiers {
            Some(t) => t,
            None => variant
                .parse::<VariantPreset>()
                .map(|preset| {
                    preset.tiers_for(thresholds.long_percentile, thresholds.short_percentile)
                })
                .map_err(|_| ConfigError::MissingTiers {
                    variant: variant.clone(),
                })?,
        };

        let config = Self {
            variant,
            thresholds,
            tiers,
            stops: StopParams {
                atr_period: p.stops.atr_period,
                atr_multiplier: p.stops.atr_multiplier,
                profit_target_r: p.profit_targets.target_r,
                time_stop_days: p.stops.time_stop_days,
            },
            r_per_trade: p.position_sizing.r_per_trade,
        };
        config.validate()?;
        Ok(config)
    }

    /// Back to the document form, with the tier table written out.
    pub fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            variant: Some(self.variant.clone()),
            parameters: ParametersDoc {
                thresholds: ThresholdsDoc {
                    long_percentile: self.thresholds.long_percentile,
                    short_percentile: self.thresholds.short_percentile,
                    rolling_window: self.thresholds.rolling_window,
                    min_periods: Some(self.thresholds.min_periods),
                },
                position_sizing: PositionSizingDoc {
                    r_per_trade: self.r_per_trade,
                    tiers: Some(self.tiers.clone()),
                },
                stops: StopsDoc {
                    atr_multiplier: self.stops.atr_multiplier,
                    atr_period: self.stops.atr_period,
                    time_stop_days: self.stops.time_stop_days,
                },
                profit_targets: ProfitTargetsDoc {
                    target_r: self.stops.profit_target_r,
                },
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.long_percentile) {
            return Err(invalid("long_percentile", format!("{} outside [0, 1]", t.long_percentile)));
        }
        if !(0.0..=1.0).contains(&t.short_percentile) {
            return Err(invalid("short_percentile", format!("{} outside [0, 1]", t.short_percentile)));
        }
        if t.short_percentile >= t.long_percentile {
            return Err(invalid(
                "short_percentile",
                format!(
                    "{} must be below long_percentile {}",
                    t.short_percentile, t.long_percentile
                ),
            ));
        }
        if t.rolling_window == 0 {
            return Err(invalid("rolling_window", "must be at least 1"));
        }
        if t.min_periods == 0 || t.min_periods > t.rolling_window {
            return Err(invalid(
                "min_periods",
                format!("{} must be in 1..={}", t.min_periods, t.rolling_window),
            ));
        }

        let s = &self.stops;
        if s.atr_period == 0 {
            return Err(invalid("atr_period", "must be at least 1"));
        }
        if !(s.atr_multiplier.is_finite() && s.atr_multiplier > 0.0) {
            return Err(invalid("atr_multiplier", format!("{} must be positive", s.atr_multiplier)));
        }
        if !(s.profit_target_r.is_finite() && s.profit_target_r > 0.0) {
            return Err(invalid("target_r", format!("{} must be positive", s.profit_target_r)));
        }
        if s.time_stop_days < 1 {
            return Err(invalid("time_stop_days", "must be at least 1"));
        }
        if !(self.r_per_trade > 0.0 && self.r_per_trade <= 1.0) {
            return Err(invalid("r_per_trade", format!("{} outside (0, 1]", self.r_per_trade)));
        }

        self.tiers.validate(t.long_percentile, t.short_percentile)?;
        Ok(())
    }
}

// ─── Presets ────────────────────────────────────────────────────────────────

/// The production model variants. Each is a parameter set, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPreset {
    Moderate,
    Conservative,
    HighConviction,
}

/// Per-side sub-tiers above the entry threshold, plus the base fraction taken
/// at the threshold itself.
struct PresetTiers {
    long: &'static [Tier],
    long_base: f64,
    short: &'static [Tier],
    short_base: f64,
}

const MODERATE_TIERS: PresetTiers = PresetTiers {
    long: &[Tier::new(0.90, 1.0), Tier::new(0.85, 0.75)],
    long_base: 0.50,
    short: &[Tier::new(0.10, 1.0), Tier::new(0.15, 0.75)],
    // Observed production boundary; not a mirror of the LONG base.
    short_base: 0.20,
};

const CONSERVATIVE_TIERS: PresetTiers = PresetTiers {
    long: &[Tier::new(0.92, 1.0)],
    long_base: 0.75,
    short: &[Tier::new(0.08, 1.0)],
    short_base: 0.75,
};

const HIGH_CONVICTION_TIERS: PresetTiers = PresetTiers {
    long: &[],
    long_base: 1.0,
    short: &[],
    short_base: 1.0,
};

impl VariantPreset {
    pub const ALL: [VariantPreset; 3] = [
        VariantPreset::Moderate,
        VariantPreset::Conservative,
        VariantPreset::HighConviction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VariantPreset::Moderate => "moderate",
            VariantPreset::Conservative => "conservative",
            VariantPreset::HighConviction => "high_conviction",
        }
    }

    fn preset_tiers(self) -> &'static PresetTiers {
        match self {
            VariantPreset::Moderate => &MODERATE_TIERS,
            VariantPreset::Conservative => &CONSERVATIVE_TIERS,
            VariantPreset::HighConviction => &HIGH_CONVICTION_TIERS,
        }
    }

    /// Tier table for the given entry thresholds: the preset's sub-tiers that
    /// are more selective than the threshold, then a base tier at it.
    pub fn tiers_for(self, long_percentile: f64, short_percentile: f64) -> TierTable {
        let p = self.preset_tiers();
        let mut long: Vec<Tier> = p
            .long
            .iter()
            .copied()
            .filter(|t| t.cutoff > long_percentile)
            .collect();
        long.push(Tier::new(long_percentile, p.long_base));

        let mut short: Vec<Tier> = p
            .short
            .iter()
            .copied()
            .filter(|t| t.cutoff < short_percentile)
            .collect();
        short.push(Tier::new(short_percentile, p.short_base));

        TierTable { long, short }
    }

    /// The preset's production parameters.
    pub fn config(self) -> ModelConfig {
        let (long_percentile, short_percentile, r_per_trade, atr_multiplier, profit_target_r) =
            match self {
                VariantPreset::Moderate => (0.80, 0.20, 0.20, 3.0, 2.0),
                VariantPreset::Conservative => (0.87, 0.13, 0.15, 3.25, 1.75),
                VariantPreset::HighConviction => (0.90, 0.10, 0.20, 3.0, 2.0),
            };
        ModelConfig {
            variant: self.as_str().to_string(),
            thresholds: Thresholds {
                long_percentile,
                short_percentile,
                rolling_window: 252,
                min_periods: DEFAULT_MIN_PERIODS,
            },
            tiers: self.tiers_for(long_percentile, short_percentile),
            stops: StopParams {
                atr_period: 20,
                atr_multiplier,
                profit_target_r,
                time_stop_days: 10,
            },
            r_per_trade,
        }
    }
}

impl fmt::Display for VariantPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "moderate" => Ok(VariantPreset::Moderate),
            "conservative" => Ok(VariantPreset::Conservative),
            "high_conviction" => Ok(VariantPreset::HighConviction),
            other => Err(format!("unknown variant preset: {other}")),
        }
    }
}
