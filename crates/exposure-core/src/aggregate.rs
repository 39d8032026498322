//! Zone → province → national aggregation.
//!
//! Absolute counts are re-summed at each level and every ratio, density and
//! share is re-derived from the pooled counts. The one exception is the
//! province average risk score: an equal-weight mean of member zone scores,
//! kept as a zone-comparison statistic rather than a population-weighted one.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AggregateError;
use crate::stats::{safe_div, ZoneStatistics};

/// Metrics for one province, derived from its member zones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvinceStatistics {
    pub province: String,
    pub zone_count: usize,
    pub total_population: u64,
    pub tier_population: Vec<u64>,
    pub tier_ratio: Vec<f64>,
    pub exposed_population: u64,
    pub exposure_ratio: f64,
    /// Mean of member zone risk scores, one vote per zone.
    pub avg_risk_score: f64,
    pub exposed_area: Option<f64>,
    pub exposure_density: Option<f64>,
    /// Member zones whose reduction was coarsened.
    pub approximate_zones: usize,
}

/// Study-area totals summed straight from the zones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalTotals {
    pub zone_count: usize,
    pub province_count: usize,
    pub total_population: u64,
    pub tier_population: Vec<u64>,
    pub tier_ratio: Vec<f64>,
    pub exposed_population: u64,
    pub exposure_ratio: f64,
}

/// Pooled absolute counts for a set of zones.
#[derive(Default)]
struct Pool {
    total: u64,
    tiers: Vec<u64>,
    area: Option<f64>,
    score_sum: f64,
    approximate: usize,
    zones: usize,
}

impl Pool {
    fn new(tier_count: usize) -> Self {
        Self { tiers: vec![0; tier_count], ..Self::default() }
    }

    fn add(&mut self, z: &ZoneStatistics) {
        self.total += z.total_population;
        for (acc, p) in self.tiers.iter_mut().zip(&z.tier_population) {
            *acc += p;
        }
        if let Some(a) = z.exposed_area {
            *self.area.get_or_insert(0.0) += a;
        }
        self.score_sum += z.risk_score;
        self.approximate += usize::from(z.approximate);
        self.zones += 1;
    }

    fn exposed(&self) -> u64 {
        self.tiers.iter().sum()
    }

    fn tier_ratio(&self) -> Vec<f64> {
        // Re-derived from pooled counts; divide by 1 for an empty pool.
        self.tiers.iter().map(|&p| safe_div(p as f64, self.total as f64)).collect()
    }
}

/// Group zone statistics by parent, re-derive province metrics and sum
/// national totals.
///
/// Provinces come back sorted by name. Only parents actually present in
/// `zones` appear.
pub fn aggregate(
    zones: &[ZoneStatistics],
) -> Result<(Vec<ProvinceStatistics>, NationalTotals), AggregateError> {
    let tier_count = zones.first().map_or(0, |z| z.tier_population.len());
    if let Some(z) = zones.iter().find(|z| z.tier_population.len() != tier_count) {
        return Err(AggregateError::TierCountMismatch {
            zone: z.zone_id.clone(),
            expected: tier_count,
            actual: z.tier_population.len(),
        });
    }

    let mut groups: BTreeMap<&str, Vec<&ZoneStatistics>> = BTreeMap::new();
    for z in zones {
        groups.entry(z.parent.as_str()).or_default().push(z);
    }

    let mut provinces = Vec::with_capacity(groups.len());
    for (province, members) in &groups {
        provinces.push(province_statistics(province, members, tier_count)?);
    }

    let mut national = Pool::new(tier_count);
    for z in zones {
        national.add(z);
    }
    let totals = NationalTotals {
        zone_count: zones.len(),
        province_count: provinces.len(),
        total_population: national.total,
        tier_ratio: national.tier_ratio(),
        exposed_population: national.exposed(),
        // Same zero-denominator policy as the tier ratios.
        exposure_ratio: safe_div(national.exposed() as f64, national.total as f64),
        tier_population: national.tiers,
    };

    log::info!(
        "aggregated {} zone(s) into {} province(s), national population {}",
        zones.len(),
        provinces.len(),
        totals.total_population
    );
    Ok((provinces, totals))
}

fn province_statistics(
    province: &str,
    members: &[&ZoneStatistics],
    tier_count: usize,
) -> Result<ProvinceStatistics, AggregateError> {
    if members.is_empty() {
        return Err(AggregateError::EmptyGroup { province: province.to_string() });
    }
    let mut pool = Pool::new(tier_count);
    for z in members {
        pool.add(z);
    }
    let exposed = pool.exposed();
    Ok(ProvinceStatistics {
        province: province.to_string(),
        zone_count: pool.zones,
        total_population: pool.total,
        tier_ratio: pool.tier_ratio(),
        exposed_population: exposed,
        // Pooled counts; divide by 1 when the province has no population.
        exposure_ratio: safe_div(exposed as f64, pool.total as f64),
        avg_risk_score: pool.score_sum / pool.zones as f64,
        exposed_area: pool.area,
        // Pooled exposed people over pooled exposed area; 0 when no area.
        exposure_density: pool.area.map(|a| safe_div(exposed as f64, a)),
        approximate_zones: pool.approximate,
        tier_population: pool.tiers,
    })
}

/// Metric used to order zones or provinces for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    TotalPopulation,
    ExposedPopulation,
    ExposureRatio,
    RiskScore,
    ExposureDensity,
    /// Population in the given 0-based tier.
    TierPopulation(usize),
}

/// Records that can be ranked by a [`RankMetric`].
pub trait Ranked {
    fn metric(&self, metric: RankMetric) -> f64;
}

impl Ranked for ZoneStatistics {
    fn metric(&self, metric: RankMetric) -> f64 {
        match metric {
            RankMetric::TotalPopulation => self.total_population as f64,
            RankMetric::ExposedPopulation => self.exposed_population as f64,
            RankMetric::ExposureRatio => self.exposure_ratio,
            RankMetric::RiskScore => self.risk_score,
            RankMetric::ExposureDensity => self.exposure_density.unwrap_or(0.0),
            RankMetric::TierPopulation(i) => self.tier_population.get(i).copied().unwrap_or(0) as f64,
        }
    }
}

impl Ranked for ProvinceStatistics {
    fn metric(&self, metric: RankMetric) -> f64 {
        match metric {
            RankMetric::TotalPopulation => self.total_population as f64,
            RankMetric::ExposedPopulation => self.exposed_population as f64,
            RankMetric::ExposureRatio => self.exposure_ratio,
            RankMetric::RiskScore => self.avg_risk_score,
            RankMetric::ExposureDensity => self.exposure_density.unwrap_or(0.0),
            RankMetric::TierPopulation(i) => self.tier_population.get(i).copied().unwrap_or(0) as f64,
        }
    }
}

/// Borrowed view sorted by `metric`, highest first. Ties keep input order,
/// so ranking the canonical name-sorted list stays deterministic.
pub fn rank<T: Ranked>(records: &[T], metric: RankMetric) -> Vec<&T> {
    let mut view: Vec<&T> = records.iter().collect();
    view.sort_by(|a, b| b.metric(metric).total_cmp(&a.metric(metric)));
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn zone(id: &str, parent: &str, total: u64, tiers: Vec<u64>, score: f64) -> ZoneStatistics {
        let exposed = tiers.iter().sum();
        ZoneStatistics {
            zone_id: id.into(),
            zone_name: id.into(),
            parent: parent.into(),
            total_population: total,
            tier_ratio: tiers.iter().map(|&p| safe_div(p as f64, total as f64)).collect(),
            tier_population: tiers,
            exposed_population: exposed,
            exposure_ratio: safe_div(exposed as f64, total as f64),
            risk_score: score,
            exposed_area: None,
            exposure_density: None,
            approximate: false,
        }
    }

    #[test]
    fn province_ratio_is_pooled_not_averaged() {
        let zones = vec![
            zone("a1", "A", 100, vec![10], 0.1),
            zone("a2", "A", 50, vec![50], 1.0),
            zone("b1", "B", 200, vec![0], 0.0),
        ];
        let (provinces, national) = aggregate(&zones).unwrap();
        assert_eq!(provinces.len(), 2);
        let a = &provinces[0];
        assert_eq!(a.province, "A");
        assert_eq!(a.zone_count, 2);
        assert_eq!(a.total_population, 150);
        assert_eq!(a.tier_population, vec![60]);
        // Pooled 60/150 = 0.4, not the mean of 0.1 and 1.0.
        assert_relative_eq!(a.tier_ratio[0], 0.4);
        // Score is the deliberate exception: equal-weight mean.
        assert_relative_eq!(a.avg_risk_score, 0.55);
        assert_eq!(provinces[1].tier_ratio, vec![0.0]);
        assert_eq!(national.total_population, 350);
        assert_eq!(national.tier_population, vec![60]);
        assert_eq!(national.province_count, 2);
    }

    #[test]
    fn provinces_come_only_from_present_parents_sorted() {
        let zones = vec![zone("z", "Zeta", 1, vec![0], 0.0), zone("a", "Alpha", 1, vec![1], 1.0)];
        let (provinces, _) = aggregate(&zones).unwrap();
        let names: Vec<&str> = provinces.iter().map(|p| p.province.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let (provinces, national) = aggregate(&[]).unwrap();
        assert!(provinces.is_empty());
        assert_eq!(national.total_population, 0);
        assert_eq!(national.exposure_ratio, 0.0);
    }

    #[test]
    fn mismatched_tier_counts_are_rejected() {
        let zones = vec![zone("a", "A", 1, vec![0, 1], 1.0), zone("b", "A", 1, vec![1], 1.0)];
        assert!(matches!(aggregate(&zones), Err(AggregateError::TierCountMismatch { .. })));
    }

    #[test]
    fn empty_group_is_an_internal_error() {
        let err = province_statistics("Ghost", &[], 1).unwrap_err();
        assert_eq!(err, AggregateError::EmptyGroup { province: "Ghost".into() });
    }

    #[test]
    fn area_and_density_are_pooled() {
        let mut a = zone("a", "A", 100, vec![40], 1.0);
        a.exposed_area = Some(2.0);
        let mut b = zone("b", "A", 100, vec![20], 1.0);
        b.exposed_area = Some(1.0);
        let (provinces, _) = aggregate(&[a, b]).unwrap();
        assert_relative_eq!(provinces[0].exposed_area.unwrap(), 3.0);
        assert_relative_eq!(provinces[0].exposure_density.unwrap(), 20.0);
    }

    #[test]
    fn ranking_is_a_view_and_descending() {
        let zones = vec![
            zone("a", "A", 100, vec![10], 0.1),
            zone("b", "B", 100, vec![90], 0.9),
            zone("c", "C", 100, vec![50], 0.5),
        ];
        let (provinces, _) = aggregate(&zones).unwrap();
        let ranked = rank(&provinces, RankMetric::ExposureRatio);
        let order: Vec<&str> = ranked.iter().map(|p| p.province.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
        assert_eq!(provinces[0].province, "A");

        let by_tier = rank(&zones, RankMetric::TierPopulation(0));
        assert_eq!(by_tier[0].zone_id, "b");
    }
}
