//! Pipeline orchestrator: runs every stage in order.
//!
//! Stage order:
//!   1. Hazard fusion (materialised before any reduction)
//!   2. Stack population with per-tier layers
//!   3. One multi-band reduction per zone (parallel with `threading`)
//!   4. Per-zone statistics
//!   5. Province and national aggregation (sequential, after all zones)

use std::collections::HashSet;

use crate::aggregate::aggregate;
use crate::config::ExposureConfig;
use crate::error::{ConfigError, ExposureError, ReductionError};
use crate::fusion::fuse;
use crate::raster::Raster;
use crate::reduce::reduce;
use crate::report::{ExposureReport, FailedZone};
use crate::stats::{compute, exposure_stack, ZoneStatistics};
use crate::zone::Zone;

/// Generic exposure pipeline parameterised by an [`ExposureConfig`].
#[derive(Debug, Clone)]
pub struct ExposurePipeline {
    config: ExposureConfig,
}

impl ExposurePipeline {
    /// Validate the configuration up front; a pipeline that exists is
    /// always correctly configured.
    pub fn new(config: ExposureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExposureConfig {
        &self.config
    }

    /// Run the full pipeline.
    ///
    /// Zone-level failures are collected into the report, not returned as
    /// errors. Only problems that void the whole run (no valid hazard
    /// data, mismatched grids) surface as `Err`.
    pub fn run(
        &self,
        triggers: &[Raster],
        population: &Raster,
        zones: &[Zone],
    ) -> Result<ExposureReport, ExposureError> {
        let config = &self.config;

        // ── 1. Hazard fusion ────────────────────────────────────────────────
        let hazard = fuse(triggers, &config.model, &config.tiers)?;

        // ── 2. Multi-band stack ─────────────────────────────────────────────
        let stack = exposure_stack(&hazard, population, config.metrics)?;
        let cell_area = stack.grid().cell_area() / config.area_unit;
        log::info!(
            "reducing {} band(s) over {} zone(s)",
            stack.band_count(),
            zones.len()
        );
        warn_duplicate_ids(zones);

        // ── 3–4. Per-zone reduction and statistics ──────────────────────────
        let outcomes = reduce_zones(zones, |zone| {
            let sums = reduce(&stack, zone, &config.reduction)?;
            Ok(compute(zone, &sums, &config.tiers, config.metrics, cell_area))
        });

        let mut statistics = Vec::with_capacity(zones.len());
        let mut failed = Vec::new();
        for (zone, outcome) in zones.iter().zip(outcomes) {
            match outcome {
                Ok(s) => {
                    if s.approximate {
                        log::warn!("zone `{}` reduced in best-effort mode", s.zone_id);
                    }
                    statistics.push(s);
                }
                Err(e) => {
                    log::warn!("zone `{}` failed: {e}", zone.id());
                    failed.push(FailedZone { zone: zone.to_ref(), error: e });
                }
            }
        }

        // ── 5. Aggregation ──────────────────────────────────────────────────
        let (provinces, national) = aggregate(&statistics)?;

        Ok(ExposureReport {
            hazard: config.hazard.clone(),
            tier_names: config.tiers.names.clone(),
            metrics: config.metrics,
            zones: statistics,
            failed,
            provinces,
            national,
        })
    }
}

#[cfg(feature = "threading")]
fn reduce_zones<F>(zones: &[Zone], f: F) -> Vec<Result<ZoneStatistics, ReductionError>>
where
    F: Fn(&Zone) -> Result<ZoneStatistics, ReductionError> + Sync + Send,
{
    use rayon::prelude::*;
    zones.par_iter().map(f).collect()
}

#[cfg(not(feature = "threading"))]
fn reduce_zones<F>(zones: &[Zone], f: F) -> Vec<Result<ZoneStatistics, ReductionError>>
where
    F: Fn(&Zone) -> Result<ZoneStatistics, ReductionError>,
{
    zones.iter().map(f).collect()
}

fn warn_duplicate_ids(zones: &[Zone]) {
    let mut seen = HashSet::new();
    for zone in zones {
        if !seen.insert(zone.id()) {
            log::warn!("zone id `{}` appears more than once", zone.id());
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
