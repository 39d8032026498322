//! Immutable configuration record for one exposure analysis.
//!
//! One pipeline serves every hazard type; what differs between the flood,
//! coastal and landslide analyses is captured here: how trigger rasters
//! become hazard levels, how levels map to tiers, and which derived
//! metrics are produced.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Closed range of input levels mapped onto one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBin {
    pub lo: i32,
    pub hi: i32,
}

impl TierBin {
    pub fn new(lo: i32, hi: i32) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn contains(&self, level: i32) -> bool {
        level >= self.lo && level <= self.hi
    }
}

/// Ordered tier set: names, weights and the input bins that feed each tier.
/// Tier `i` is reported as level `i + 1` in the hazard-level raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierScheme {
    pub names: Vec<String>,
    pub weights: Vec<f64>,
    pub bins: Vec<TierBin>,
}

impl TierScheme {
    /// Split `[lo, hi]` into `names.len()` contiguous equal-width bins in
    /// ascending order, weighted 1..=M. When the range does not divide
    /// evenly the last bin absorbs the remainder.
    pub fn equal_width(lo: i32, hi: i32, names: &[&str]) -> Self {
        let m = names.len().max(1) as i32;
        let width = ((hi - lo + 1) / m).max(1);
        let bins = (0..names.len() as i32)
            .map(|i| {
                let start = lo + i * width;
                let end = if i == m - 1 { hi } else { start + width - 1 };
                TierBin::new(start, end)
            })
            .collect();
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            weights: (1..=names.len()).map(|w| w as f64).collect(),
            bins,
        }
    }

    /// The degenerate two-level case used by threshold hazards: level 0 is
    /// valid but not exposed, level 1 is the single "Exposed" tier.
    pub fn binary() -> Self {
        Self {
            names: vec!["Exposed".to_string()],
            weights: vec![1.0],
            bins: vec![TierBin::new(1, 1)],
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the tier whose bin contains `level`.
    pub fn tier_of(&self, level: i32) -> Option<usize> {
        self.bins.iter().position(|b| b.contains(level))
    }

    pub fn min_weight(&self) -> f64 {
        self.weights.first().copied().unwrap_or(0.0)
    }

    pub fn max_weight(&self) -> f64 {
        self.weights.last().copied().unwrap_or(0.0)
    }

    /// Check internal consistency and, when given, that the bins cover
    /// exactly the valid input range.
    pub fn validate(&self, range: Option<(i32, i32)>) -> Result<(), ConfigError> {
        if self.names.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        if self.weights.len() != self.names.len() || self.bins.len() != self.names.len() {
            return Err(ConfigError::TierCountMismatch {
                names: self.names.len(),
                weights: self.weights.len(),
                bins: self.bins.len(),
            });
        }
        for (index, bin) in self.bins.iter().enumerate() {
            if bin.lo > bin.hi {
                return Err(ConfigError::InvertedBin { index, lo: bin.lo, hi: bin.hi });
            }
            if index > 0 {
                let expected = self.bins[index - 1].hi + 1;
                if bin.lo != expected {
                    return Err(ConfigError::NonContiguousBins { index, lo: bin.lo, expected });
                }
            }
        }
        for (index, &weight) in self.weights.iter().enumerate() {
            let increasing = index == 0 || weight > self.weights[index - 1];
            if !weight.is_finite() || !increasing {
                return Err(ConfigError::NonIncreasingWeights { index, weight });
            }
        }
        if let Some((range_lo, range_hi)) = range {
            let lo = self.bins[0].lo;
            let hi = self.bins[self.bins.len() - 1].hi;
            if lo != range_lo || hi != range_hi {
                return Err(ConfigError::BinCoverage { lo, hi, range_lo, range_hi });
            }
        }
        Ok(())
    }
}

/// Hazard type, carried through to reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HazardKind {
    Landslide,
    Flood { return_period_years: u32 },
    Coastal,
}

/// How a continuous hazard input becomes the binary exposed mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ThresholdRule {
    /// Exposed when value > `min` (e.g. flood depth in metres).
    Above { min: f64 },
    /// Exposed when `lo <= value <= hi` (e.g. elevation for a LECZ).
    Within { lo: f64, hi: f64 },
}

impl ThresholdRule {
    #[inline]
    pub fn is_exposed(&self, value: f64) -> bool {
        match *self {
            ThresholdRule::Above { min } => value > min,
            ThresholdRule::Within { lo, hi } => value >= lo && value <= hi,
        }
    }
}

/// Valid range declared for one trigger raster, matched by band name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRange {
    pub name: String,
    pub lo: i32,
    pub hi: i32,
}

/// How trigger rasters are turned into hazard levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum HazardModel {
    /// Ordinal susceptibility levels on the shared scale `[lo, hi]`,
    /// max-combined across triggers then reclassified into tiers.
    Ordinal {
        lo: i32,
        hi: i32,
        /// Narrower valid ranges for individual triggers. Triggers not
        /// listed are masked to `[lo, hi]`.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        triggers: Vec<TriggerRange>,
    },
    /// Continuous field thresholded into exposed / not exposed.
    Threshold(ThresholdRule),
}

impl HazardModel {
    /// Ordinal model where every trigger shares the valid range `[lo, hi]`.
    pub fn ordinal(lo: i32, hi: i32) -> Self {
        HazardModel::Ordinal { lo, hi, triggers: Vec::new() }
    }

    /// Declare the valid range of one trigger. No effect on threshold models.
    pub fn with_trigger_range(mut self, name: impl Into<String>, lo: i32, hi: i32) -> Self {
        if let HazardModel::Ordinal { triggers, .. } = &mut self {
            triggers.push(TriggerRange { name: name.into(), lo, hi });
        }
        self
    }

    /// Valid range for the trigger band `name`; `None` for threshold models.
    pub fn valid_range(&self, name: &str) -> Option<(i32, i32)> {
        match self {
            HazardModel::Ordinal { lo, hi, triggers } => Some(
                triggers
                    .iter()
                    .find(|t| t.name == name)
                    .map_or((*lo, *hi), |t| (t.lo, t.hi)),
            ),
            HazardModel::Threshold(_) => None,
        }
    }
}

/// Which derived metrics each zone carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSet {
    RatioOnly,
    RatioAreaDensity,
}

impl MetricSet {
    pub fn has_area(&self) -> bool {
        matches!(self, MetricSet::RatioAreaDensity)
    }
}

/// Zonal reduction tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Sampling resolution in map units. `None` reduces at native cell size.
    pub resolution: Option<f64>,
    /// Allow coarsening the sampling scale to stay within `max_pixels`.
    pub best_effort: bool,
    /// Pixel budget for one zone at the sampling resolution.
    pub max_pixels: u64,
    /// Rows per accumulation tile. Each tile keeps its own compensated
    /// partial sum, merged into the zone total when the tile is done.
    pub tile_rows: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            best_effort: true,
            max_pixels: 1_000_000_000,
            tile_rows: 256,
        }
    }
}

impl ReductionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(r) = self.resolution {
            if !r.is_finite() || r <= 0.0 {
                return Err(ConfigError::InvalidReduction {
                    name: "resolution",
                    detail: format!("must be finite and positive, got {r}"),
                });
            }
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::InvalidReduction {
                name: "max_pixels",
                detail: "must be at least 1".to_string(),
            });
        }
        if self.tile_rows == 0 {
            return Err(ConfigError::InvalidReduction {
                name: "tile_rows",
                detail: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Full configuration of one analysis. Built once, validated, then passed
/// by reference into every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureConfig {
    pub hazard: HazardKind,
    pub model: HazardModel,
    pub tiers: TierScheme,
    pub metrics: MetricSet,
    /// Divisor converting squared map units into reported area units
    /// (1e6 turns m² into km²).
    pub area_unit: f64,
    #[serde(default)]
    pub reduction: ReductionConfig,
}

impl ExposureConfig {
    /// Landslide: 8-level susceptibility per trigger, 4 tiers.
    pub fn landslide() -> Self {
        Self {
            hazard: HazardKind::Landslide,
            model: HazardModel::ordinal(1, 8),
            tiers: TierScheme::equal_width(1, 8, &["Low", "Medium", "High", "VeryHigh"]),
            metrics: MetricSet::RatioOnly,
            area_unit: 1e6,
            reduction: ReductionConfig::default(),
        }
    }

    /// Riverine flood: cells with depth above `min_depth_m` for the given
    /// return period count as exposed.
    pub fn flood(return_period_years: u32, min_depth_m: f64) -> Self {
        Self {
            hazard: HazardKind::Flood { return_period_years },
            model: HazardModel::Threshold(ThresholdRule::Above { min: min_depth_m }),
            tiers: TierScheme::binary(),
            metrics: MetricSet::RatioAreaDensity,
            area_unit: 1e6,
            reduction: ReductionConfig::default(),
        }
    }

    /// Low-elevation coastal zone: land between 0 m and `max_elevation_m`.
    pub fn coastal_lecz(max_elevation_m: f64) -> Self {
        Self {
            hazard: HazardKind::Coastal,
            model: HazardModel::Threshold(ThresholdRule::Within { lo: 0.0, hi: max_elevation_m }),
            tiers: TierScheme::binary(),
            metrics: MetricSet::RatioAreaDensity,
            area_unit: 1e6,
            reduction: ReductionConfig::default(),
        }
    }

    pub fn with_reduction(mut self, reduction: ReductionConfig) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_tiers(mut self, tiers: TierScheme) -> Self {
        self.tiers = tiers;
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject missing or inconsistent settings before any raster work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.model {
            &HazardModel::Ordinal { lo, hi, ref triggers } => {
                if lo > hi {
                    return Err(ConfigError::InvertedRange { lo, hi });
                }
                validate_trigger_ranges(triggers, lo, hi)?;
                self.tiers.validate(Some((lo, hi)))?;
            }
            HazardModel::Threshold(rule) => {
                validate_rule(rule)?;
                // Threshold hazards produce levels {0, 1}; only 1 is a tier.
                self.tiers.validate(Some((1, 1)))?;
            }
        }
        if !self.area_unit.is_finite() || self.area_unit <= 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "area_unit",
                detail: format!("must be finite and positive, got {}", self.area_unit),
            });
        }
        self.reduction.validate()
    }
}

fn validate_trigger_ranges(triggers: &[TriggerRange], lo: i32, hi: i32) -> Result<(), ConfigError> {
    for (index, t) in triggers.iter().enumerate() {
        if t.lo > t.hi {
            return Err(ConfigError::InvertedRange { lo: t.lo, hi: t.hi });
        }
        if t.lo < lo || t.hi > hi {
            return Err(ConfigError::TriggerRangeOutside {
                name: t.name.clone(),
                lo: t.lo,
                hi: t.hi,
                range_lo: lo,
                range_hi: hi,
            });
        }
        if triggers[..index].iter().any(|u| u.name == t.name) {
            return Err(ConfigError::DuplicateTrigger { name: t.name.clone() });
        }
    }
    Ok(())
}

fn validate_rule(rule: &ThresholdRule) -> Result<(), ConfigError> {
    match *rule {
        ThresholdRule::Above { min } if !min.is_finite() => Err(ConfigError::InvalidThreshold {
            name: "min",
            detail: format!("must be finite, got {min}"),
        }),
        ThresholdRule::Within { lo, hi } if !lo.is_finite() || !hi.is_finite() => {
            Err(ConfigError::InvalidThreshold {
                name: "within",
                detail: format!("bounds must be finite, got [{lo}, {hi}]"),
            })
        }
        ThresholdRule::Within { lo, hi } if lo > hi => Err(ConfigError::InvalidThreshold {
            name: "within",
            detail: format!("lower bound {lo} exceeds upper bound {hi}"),
        }),
        _ => Ok(()),
    }
}
