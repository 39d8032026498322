//! Fully-resolved result of one pipeline run.

use serde::{Serialize, Serializer};

use crate::aggregate::{rank, NationalTotals, ProvinceStatistics, RankMetric};
use crate::config::{HazardKind, MetricSet};
use crate::error::ReductionError;
use crate::stats::ZoneStatistics;
use crate::zone::ZoneRef;

fn serialize_display<S: Serializer>(e: &ReductionError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

/// A zone whose reduction could not complete. It is left out of the
/// aggregates rather than counted as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedZone {
    pub zone: ZoneRef,
    #[serde(serialize_with = "serialize_display")]
    pub error: ReductionError,
}

/// How far a zone's numbers can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    Authoritative,
    Approximate,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneStatusEntry {
    pub zone_id: String,
    pub status: ZoneStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureReport {
    pub hazard: HazardKind,
    pub tier_names: Vec<String>,
    pub metrics: MetricSet,
    /// Zones that reduced successfully, in input order.
    pub zones: Vec<ZoneStatistics>,
    pub failed: Vec<FailedZone>,
    /// Canonical order: province name ascending.
    pub provinces: Vec<ProvinceStatistics>,
    pub national: NationalTotals,
}

impl ExposureReport {
    /// Computed zones first (authoritative or approximate), then failed ones.
    pub fn zone_status(&self) -> Vec<ZoneStatusEntry> {
        let computed = self.zones.iter().map(|z| ZoneStatusEntry {
            zone_id: z.zone_id.clone(),
            status: if z.approximate { ZoneStatus::Approximate } else { ZoneStatus::Authoritative },
        });
        let failed = self.failed.iter().map(|f| ZoneStatusEntry {
            zone_id: f.zone.id.clone(),
            status: ZoneStatus::Failed,
        });
        computed.chain(failed).collect()
    }

    /// True when every zone reduced exactly.
    pub fn is_authoritative(&self) -> bool {
        self.failed.is_empty() && self.zones.iter().all(|z| !z.approximate)
    }

    pub fn rank_provinces(&self, metric: RankMetric) -> Vec<&ProvinceStatistics> {
        rank(&self.provinces, metric)
    }

    pub fn rank_zones(&self, metric: RankMetric) -> Vec<&ZoneStatistics> {
        rank(&self.zones, metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str, approximate: bool, exposed: u64) -> ZoneStatistics {
        ZoneStatistics {
            zone_id: id.into(),
            zone_name: id.into(),
            parent: "P".into(),
            total_population: 100,
            tier_population: vec![exposed],
            tier_ratio: vec![exposed as f64 / 100.0],
            exposed_population: exposed,
            exposure_ratio: exposed as f64 / 100.0,
            risk_score: exposed as f64 / 100.0,
            exposed_area: None,
            exposure_density: None,
            approximate,
        }
    }

    fn report() -> ExposureReport {
        let zones = vec![zone("a", false, 5), zone("b", true, 50)];
        let (provinces, national) = crate::aggregate::aggregate(&zones).unwrap();
        ExposureReport {
            hazard: HazardKind::Coastal,
            tier_names: vec!["Exposed".into()],
            metrics: MetricSet::RatioOnly,
            zones,
            failed: vec![FailedZone {
                zone: ZoneRef { id: "c".into(), name: "C".into(), parent: "P".into() },
                error: ReductionError::EmptyGeometry { zone: "c".into() },
            }],
            provinces,
            national,
        }
    }

    #[test]
    fn status_enumerates_every_zone() {
        let r = report();
        let status: Vec<(String, ZoneStatus)> =
            r.zone_status().into_iter().map(|e| (e.zone_id, e.status)).collect();
        assert_eq!(
            status,
            vec![
                ("a".to_string(), ZoneStatus::Authoritative),
                ("b".to_string(), ZoneStatus::Approximate),
                ("c".to_string(), ZoneStatus::Failed),
            ]
        );
        assert!(!r.is_authoritative());
    }

    #[test]
    fn ranking_leaves_canonical_order_alone() {
        let r = report();
        assert_eq!(r.rank_zones(RankMetric::ExposedPopulation)[0].zone_id, "b");
        assert_eq!(r.zones[0].zone_id, "a");
    }

    #[test]
    fn failed_zone_serialises_error_text() {
        let r = report();
        let json = serde_json::to_value(&r.failed[0]).unwrap();
        assert_eq!(json["error"], "zone `c` has an empty geometry");
        assert_eq!(json["zone"]["id"], "c");
    }
}
