//! Per-zone exposure statistics built from one multi-band reduction.
//!
//! Null policy: an absent band sum counts as 0 people.
//! Rounding: population sums are rounded to whole people after summation
//! and before any division.
//! Zero-division: ratios and densities divide by 1 when the true
//! denominator is 0, so an empty zone yields 0 rather than NaN.

use serde::Serialize;

use crate::algebra;
use crate::config::{MetricSet, TierScheme};
use crate::error::RasterError;
use crate::fusion::HazardLevelRaster;
use crate::raster::{Band, Raster};
use crate::reduce::BandSums;
use crate::zone::Zone;

pub const POPULATION_BAND: &str = "population";
pub const EXPOSED_CELLS_BAND: &str = "exposed_cells";

/// Band name carrying population in tier `index` (0-based).
pub fn tier_band(index: usize) -> String {
    format!("tier_{}", index + 1)
}

/// Pack total population, per-tier population and (for area metrics) the
/// exposed-cell indicator into one raster so each zone needs exactly one
/// reduction.
pub fn exposure_stack(
    hazard: &HazardLevelRaster,
    population: &Raster,
    metrics: MetricSet,
) -> Result<Raster, RasterError> {
    if hazard.grid() != population.grid() {
        return Err(RasterError::GridMismatch {
            left: "hazard".to_string(),
            right: "population".to_string(),
        });
    }
    let pop = population
        .first_band()
        .ok_or_else(|| RasterError::MissingBand { name: POPULATION_BAND.to_string() })?;
    let levels = hazard.levels();

    let mut bands = Vec::with_capacity(hazard.tier_count() + 2);
    bands.push(Band::new(POPULATION_BAND, pop.data.clone()));
    for index in 0..hazard.tier_count() {
        bands.push(algebra::mask_eq(tier_band(index), pop, levels, (index + 1) as f64)?);
    }
    if metrics.has_area() {
        bands.push(algebra::indicator(EXPOSED_CELLS_BAND, levels));
    }
    Raster::new(*hazard.grid(), bands)
}

/// Exposure metrics for one base zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatistics {
    pub zone_id: String,
    pub zone_name: String,
    pub parent: String,
    pub total_population: u64,
    /// One entry per tier, in tier order.
    pub tier_population: Vec<u64>,
    /// `tier_population[i] / total_population`, 0 for an empty zone.
    pub tier_ratio: Vec<f64>,
    pub exposed_population: u64,
    pub exposure_ratio: f64,
    /// Population-weighted mean tier weight; 0 for an empty zone.
    pub risk_score: f64,
    /// Exposed area in report units (flood / coastal only).
    pub exposed_area: Option<f64>,
    /// Exposed people per report area unit (flood / coastal only).
    pub exposure_density: Option<f64>,
    /// Set when the reduction was coarsened to fit the pixel budget.
    pub approximate: bool,
}

/// `num / den`, dividing by 1 instead when the true denominator is 0.
#[inline]
pub fn safe_div(num: f64, den: f64) -> f64 {
    num / if den == 0.0 { 1.0 } else { den }
}

/// Population-weighted mean of tier weights, normalised per zone.
pub fn risk_score(tier_population: &[u64], total: u64, weights: &[f64]) -> f64 {
    if total == 0 {
        return 0.0;
    }
    tier_population
        .iter()
        .zip(weights)
        .map(|(&p, &w)| p as f64 / total as f64 * w)
        .sum()
}

fn round_people(v: Option<f64>) -> u64 {
    v.unwrap_or(0.0).max(0.0).round() as u64
}

/// Rounding each tier independently can push their sum above the rounded
/// total; take people back from the tiers that rounded up the most.
fn reconcile(total: u64, raw: &[f64], rounded: &mut [u64]) {
    let mut excess = rounded.iter().sum::<u64>().saturating_sub(total);
    while excess > 0 {
        let worst = rounded
            .iter()
            .zip(raw)
            .enumerate()
            .filter(|&(_, (&r, _))| r > 0)
            .map(|(i, (&r, &x))| (i, r as f64 - x))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        match worst {
            Some(i) => rounded[i] -= 1,
            None => break,
        }
        excess -= 1;
    }
}

/// Build [`ZoneStatistics`] from one zone's band sums.
///
/// `cell_area` is the area of one native cell already expressed in report
/// units.
pub fn compute(
    zone: &Zone,
    sums: &BandSums,
    tiers: &TierScheme,
    metrics: MetricSet,
    cell_area: f64,
) -> ZoneStatistics {
    let total = round_people(sums.get(POPULATION_BAND));

    let raw: Vec<f64> = (0..tiers.len())
        .map(|i| sums.get(&tier_band(i)).unwrap_or(0.0).max(0.0))
        .collect();
    let mut tier_population: Vec<u64> = raw.iter().map(|&v| round_people(Some(v))).collect();
    reconcile(total, &raw, &mut tier_population);

    // Denominator 0 only for an empty zone, whose tiers are 0 as well.
    let tier_ratio = tier_population
        .iter()
        .map(|&p| safe_div(p as f64, total as f64))
        .collect();

    let exposed_population: u64 = tier_population.iter().sum();
    // Same zero-denominator approximation as the tier ratios.
    let exposure_ratio = safe_div(exposed_population as f64, total as f64);
    let risk_score = risk_score(&tier_population, total, &tiers.weights);

    let (exposed_area, exposure_density) = if metrics.has_area() {
        let cells = sums.get(EXPOSED_CELLS_BAND).unwrap_or(0.0);
        let area = cells * cell_area;
        // No exposed cells means no exposed people: density reads as 0.
        (Some(area), Some(safe_div(exposed_population as f64, area)))
    } else {
        (None, None)
    };

    ZoneStatistics {
        zone_id: zone.id().to_string(),
        zone_name: zone.name().to_string(),
        parent: zone.parent().to_string(),
        total_population: total,
        tier_population,
        tier_ratio,
        exposed_population,
        exposure_ratio,
        risk_score,
        exposed_area,
        exposure_density,
        approximate: sums.is_approximate(),
    }
}
