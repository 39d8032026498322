//! Error types for the exposure engine.
//!
//! Each pipeline stage owns its error enum so callers can tell a bad
//! configuration (fail before any raster work) from a single failed zone
//! (isolated, collected, never fatal) from an internal invariant violation.

/// Structural problems with raster layers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RasterError {
    /// A band's cell count does not match its grid.
    #[error("band `{band}` has {actual} cells, grid expects {expected}")]
    LengthMismatch {
        /// Band name.
        band: String,
        /// `width * height` of the grid.
        expected: usize,
        /// Length of the supplied data.
        actual: usize,
    },

    /// Two layers that must share a grid do not.
    #[error("grid mismatch: `{left}` and `{right}` are not on the same grid")]
    GridMismatch {
        /// Name of the first layer.
        left: String,
        /// Name of the second layer.
        right: String,
    },

    /// A band name appears twice in one raster.
    #[error("duplicate band `{name}`")]
    DuplicateBand {
        /// The repeated band name.
        name: String,
    },

    /// A raster was expected to carry a named band.
    #[error("missing band `{name}`")]
    MissingBand {
        /// The band that was looked up.
        name: String,
    },

    /// The grid has zero cells or an inverted extent.
    #[error("degenerate grid {width}x{height}")]
    DegenerateGrid {
        /// Columns.
        width: usize,
        /// Rows.
        height: usize,
    },
}

/// Configuration is missing or inconsistent. Raised by validation before
/// any raster computation starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No tiers were configured.
    #[error("tier scheme has no tiers")]
    NoTiers,

    /// Names, weights and bins disagree in length.
    #[error("tier scheme has {names} names, {weights} weights and {bins} bins")]
    TierCountMismatch {
        /// Number of tier names.
        names: usize,
        /// Number of tier weights.
        weights: usize,
        /// Number of tier bins.
        bins: usize,
    },

    /// A bin has `lo > hi`.
    #[error("tier bin {index} is inverted: [{lo}, {hi}]")]
    InvertedBin {
        /// Position of the bin.
        index: usize,
        /// Lower bound.
        lo: i32,
        /// Upper bound.
        hi: i32,
    },

    /// Consecutive bins leave a gap or overlap.
    #[error("tier bins are not contiguous: bin {index} starts at {lo}, expected {expected}")]
    NonContiguousBins {
        /// Position of the offending bin.
        index: usize,
        /// Its lower bound.
        lo: i32,
        /// `previous.hi + 1`.
        expected: i32,
    },

    /// Bins do not span exactly the valid input range.
    #[error("tier bins cover [{lo}, {hi}] but the valid range is [{range_lo}, {range_hi}]")]
    BinCoverage {
        /// First bin's lower bound.
        lo: i32,
        /// Last bin's upper bound.
        hi: i32,
        /// Valid range lower bound.
        range_lo: i32,
        /// Valid range upper bound.
        range_hi: i32,
    },

    /// Tier weights must increase strictly with tier order.
    #[error("tier weights must be strictly increasing (weight {index} = {weight})")]
    NonIncreasingWeights {
        /// Position of the first weight that fails to increase.
        index: usize,
        /// The offending weight.
        weight: f64,
    },

    /// The valid input range is inverted.
    #[error("valid range [{lo}, {hi}] is inverted")]
    InvertedRange {
        /// Lower bound.
        lo: i32,
        /// Upper bound.
        hi: i32,
    },

    /// A trigger's declared range reaches outside the shared ordinal scale.
    #[error("trigger `{name}` range [{lo}, {hi}] lies outside the valid range [{range_lo}, {range_hi}]")]
    TriggerRangeOutside {
        /// Trigger band name.
        name: String,
        /// Declared lower bound.
        lo: i32,
        /// Declared upper bound.
        hi: i32,
        /// Shared scale lower bound.
        range_lo: i32,
        /// Shared scale upper bound.
        range_hi: i32,
    },

    /// The same trigger has more than one declared range.
    #[error("trigger `{name}` has more than one valid range")]
    DuplicateTrigger {
        /// Trigger band name.
        name: String,
    },

    /// A threshold (depth, elevation) is NaN or infinite, or its bounds are inverted.
    #[error("invalid threshold for `{name}`: {detail}")]
    InvalidThreshold {
        /// Which threshold.
        name: &'static str,
        /// What is wrong with it.
        detail: String,
    },

    /// A reduction tunable is out of range.
    #[error("invalid reduction setting `{name}`: {detail}")]
    InvalidReduction {
        /// Which setting.
        name: &'static str,
        /// What is wrong with it.
        detail: String,
    },

    /// The configuration could not be parsed.
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

/// Failures while turning trigger rasters into one hazard-level raster.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FusionError {
    /// No trigger rasters were supplied.
    #[error("no hazard rasters supplied")]
    NoTriggers,

    /// A trigger has no valid cell anywhere in the study region.
    #[error("hazard raster `{name}` has no valid cells in [{lo}, {hi}]")]
    InvalidRasterRange {
        /// Trigger band name.
        name: String,
        /// Lower bound of the accepted range.
        lo: f64,
        /// Upper bound of the accepted range.
        hi: f64,
    },

    /// Raster structure problem (grid mismatch, missing band).
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// A single zone's reduction could not complete. Reported per zone; the
/// rest of the run stays valid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReductionError {
    /// The zone geometry has no extent (empty or all-degenerate rings).
    #[error("zone `{zone}` has an empty geometry")]
    EmptyGeometry {
        /// Zone identifier.
        zone: String,
    },

    /// Strict mode would need more pixels than the budget allows.
    #[error("zone `{zone}` needs {pixels} pixels, budget is {max_pixels}; enable best-effort")]
    TooManyPixels {
        /// Zone identifier.
        zone: String,
        /// Pixels the exact reduction would visit.
        pixels: u64,
        /// Configured budget.
        max_pixels: u64,
    },

    /// Even the coarsest best-effort scale exceeds the budget.
    #[error("zone `{zone}` exceeds the pixel budget {max_pixels} even at scale factor {scale}")]
    BudgetExhausted {
        /// Zone identifier.
        zone: String,
        /// Coarsest stride tried.
        scale: usize,
        /// Configured budget.
        max_pixels: u64,
    },
}

/// Aggregation found a state that construction should have ruled out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    /// A province key derived from the zones maps to no zone rows.
    #[error("internal invariant violated: province `{province}` has no member zones")]
    EmptyGroup {
        /// The province key.
        province: String,
    },

    /// Zone records disagree on the number of tiers.
    #[error("zone `{zone}` has {actual} tiers, expected {expected}")]
    TierCountMismatch {
        /// Zone identifier.
        zone: String,
        /// Tier count of the first zone.
        expected: usize,
        /// Tier count of this zone.
        actual: usize,
    },
}

/// Umbrella error for a full pipeline run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExposureError {
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// See [`RasterError`].
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// See [`FusionError`].
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// See [`AggregateError`].
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_raster_range_message() {
        let e = FusionError::InvalidRasterRange { name: "rain".into(), lo: 1.0, hi: 8.0 };
        assert_eq!(e.to_string(), "hazard raster `rain` has no valid cells in [1, 8]");
    }

    #[test]
    fn too_many_pixels_message_names_zone() {
        let e = ReductionError::TooManyPixels { zone: "llg-7".into(), pixels: 10, max_pixels: 4 };
        assert!(e.to_string().starts_with("zone `llg-7` needs 10 pixels"));
    }

    #[test]
    fn errors_convert_into_umbrella() {
        let e: ExposureError = ConfigError::NoTiers.into();
        assert!(matches!(e, ExposureError::Config(ConfigError::NoTiers)));
        let e: ExposureError = FusionError::NoTriggers.into();
        assert_eq!(e.to_string(), "no hazard rasters supplied");
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync + std::error::Error>() {}
        assert_impl::<ExposureError>();
        assert_impl::<ReductionError>();
    }
}
