//! Hazard fusion: trigger rasters → one ordinal hazard-level raster.
//!
//! Order of operations matters and is fixed:
//!   1. Mask every trigger to its valid range (or threshold it).
//!   2. Max-combine the masked triggers cellwise.
//!   3. Reclassify the combined levels into tiers.
//!
//! Masking before combining keeps an out-of-range cell in one trigger from
//! overriding a valid value in another.

use crate::algebra;
use crate::config::{HazardModel, TierScheme};
use crate::error::{FusionError, RasterError};
use crate::raster::{Band, Grid, Raster};

/// Single-band raster of hazard levels. For ordinal hazards the levels are
/// tier numbers `1..=M`; for threshold hazards `0` (not exposed) or `1`.
/// No data marks cells invalid in every trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardLevelRaster {
    grid: Grid,
    levels: Band,
    tier_count: usize,
}

impl HazardLevelRaster {
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn levels(&self) -> &Band {
        &self.levels
    }

    pub fn tier_count(&self) -> usize {
        self.tier_count
    }

    /// Level at a flat cell index, `None` for no data.
    pub fn level_at(&self, idx: usize) -> Option<u32> {
        self.levels.get(idx).map(|v| v as u32)
    }
}

/// Fuse one or more trigger rasters into a hazard-level raster.
///
/// Each trigger contributes its first band. Triggers must share a grid.
/// A trigger with no valid cell at all is an error; partial coverage is not.
pub fn fuse(
    triggers: &[Raster],
    model: &HazardModel,
    tiers: &TierScheme,
) -> Result<HazardLevelRaster, FusionError> {
    let first = triggers.first().ok_or(FusionError::NoTriggers)?;
    let grid = *first.grid();

    let mut masked: Vec<Band> = Vec::with_capacity(triggers.len());
    for trigger in triggers {
        let band = trigger.first_band().ok_or_else(|| RasterError::MissingBand {
            name: "<first band>".to_string(),
        })?;
        first.ensure_same_grid(trigger, &first_name(first), &band.name)?;

        let (band, lo, hi) = match (model, model.valid_range(&band.name)) {
            (HazardModel::Threshold(rule), _) => {
                (algebra::threshold(band, rule), f64::NEG_INFINITY, f64::INFINITY)
            }
            (HazardModel::Ordinal { lo, hi, .. }, range) => {
                let (lo, hi) = range.unwrap_or((*lo, *hi));
                let (lo, hi) = (lo as f64, hi as f64);
                (algebra::mask_range(band, lo, hi), lo, hi)
            }
        };

        let valid = band.valid_count();
        if valid == 0 {
            return Err(FusionError::InvalidRasterRange { name: band.name, lo, hi });
        }
        log::debug!("trigger `{}`: {valid} of {} cells valid", band.name, grid.len());
        masked.push(band);
    }

    let mut combined = masked.remove(0);
    for band in &masked {
        combined = algebra::max_combine("hazard", &combined, band)?;
    }
    combined.name = "hazard".to_string();

    let levels = match model {
        HazardModel::Ordinal { .. } => algebra::reclassify(&combined, &tiers.bins),
        HazardModel::Threshold(_) => combined,
    };

    log::info!(
        "fused {} trigger(s) into {} tier(s), {} valid cells",
        triggers.len(),
        tiers.len(),
        levels.valid_count()
    );

    Ok(HazardLevelRaster { grid, levels, tier_count: tiers.len() })
}

fn first_name(raster: &Raster) -> String {
    raster.first_band().map(|b| b.name.clone()).unwrap_or_default()
}
