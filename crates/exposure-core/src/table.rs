//! Stable tabular view of a report for export collaborators.
//!
//! Column names and order are a contract; tier columns expand in tier
//! order as `pop_<tier>` then `ratio_<tier>`. Area columns appear only for
//! metric sets that carry them.

use serde::Serialize;

use crate::report::ExposureReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Lower-case tier name with anything but ASCII alphanumerics as `_`.
pub fn tier_slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn float(v: f64) -> String {
    format!("{v:.6}")
}

fn opt_float(v: Option<f64>) -> String {
    v.map(float).unwrap_or_default()
}

fn tier_columns(tier_names: &[String]) -> Vec<String> {
    let pops = tier_names.iter().map(|n| format!("pop_{}", tier_slug(n)));
    let ratios = tier_names.iter().map(|n| format!("ratio_{}", tier_slug(n)));
    pops.chain(ratios).collect()
}

fn tier_cells<'a>(population: &'a [u64], ratio: &'a [f64]) -> impl Iterator<Item = String> + 'a {
    population
        .iter()
        .map(u64::to_string)
        .chain(ratio.iter().map(|&r| float(r)))
}

fn header(lead: &[&str], tiers: &[String], tail: &[&str]) -> Vec<String> {
    lead.iter()
        .map(|s| s.to_string())
        .chain(tier_columns(tiers))
        .chain(tail.iter().map(|s| s.to_string()))
        .collect()
}

/// One row per computed zone.
pub fn zone_table(report: &ExposureReport) -> Table {
    let area = report.metrics.has_area();
    let mut tail = vec!["exposed_population", "exposure_ratio", "risk_score"];
    if area {
        tail.extend(["exposed_area", "exposure_density"]);
    }
    tail.push("approximate");

    let rows = report
        .zones
        .iter()
        .map(|z| {
            let mut row = vec![z.zone_id.clone(), z.zone_name.clone(), z.parent.clone(), z.total_population.to_string()];
            row.extend(tier_cells(&z.tier_population, &z.tier_ratio));
            row.extend([z.exposed_population.to_string(), float(z.exposure_ratio), float(z.risk_score)]);
            if area {
                row.extend([opt_float(z.exposed_area), opt_float(z.exposure_density)]);
            }
            row.push(z.approximate.to_string());
            row
        })
        .collect();

    Table {
        header: header(&["zone_id", "zone_name", "parent", "total_population"], &report.tier_names, &tail),
        rows,
    }
}

/// One row per province, in canonical (name) order.
pub fn province_table(report: &ExposureReport) -> Table {
    let area = report.metrics.has_area();
    let mut tail = vec!["exposed_population", "exposure_ratio", "avg_risk_score"];
    if area {
        tail.extend(["exposed_area", "exposure_density"]);
    }
    tail.push("approximate_zones");

    let rows = report
        .provinces
        .iter()
        .map(|p| {
            let mut row = vec![p.province.clone(), p.zone_count.to_string(), p.total_population.to_string()];
            row.extend(tier_cells(&p.tier_population, &p.tier_ratio));
            row.extend([p.exposed_population.to_string(), float(p.exposure_ratio), float(p.avg_risk_score)]);
            if area {
                row.extend([opt_float(p.exposed_area), opt_float(p.exposure_density)]);
            }
            row.push(p.approximate_zones.to_string());
            row
        })
        .collect();

    Table {
        header: header(&["province", "zone_count", "total_population"], &report.tier_names, &tail),
        rows,
    }
}

/// Single-row national summary.
pub fn national_table(report: &ExposureReport) -> Table {
    let n = &report.national;
    let mut row = vec![n.zone_count.to_string(), n.province_count.to_string(), n.total_population.to_string()];
    row.extend(tier_cells(&n.tier_population, &n.tier_ratio));
    row.extend([n.exposed_population.to_string(), float(n.exposure_ratio)]);

    Table {
        header: header(
            &["zone_count", "province_count", "total_population"],
            &report.tier_names,
            &["exposed_population", "exposure_ratio"],
        ),
        rows: vec![row],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::config::{HazardKind, MetricSet};
    use crate::stats::ZoneStatistics;

    fn report(metrics: MetricSet) -> ExposureReport {
        let zones = vec![ZoneStatistics {
            zone_id: "llg-1".into(),
            zone_name: "Wau Rural".into(),
            parent: "Morobe".into(),
            total_population: 100,
            tier_population: vec![10, 20, 30, 40],
            tier_ratio: vec![0.1, 0.2, 0.3, 0.4],
            exposed_population: 100,
            exposure_ratio: 1.0,
            risk_score: 3.0,
            exposed_area: metrics.has_area().then_some(2.5),
            exposure_density: metrics.has_area().then_some(40.0),
            approximate: false,
        }];
        let (provinces, national) = aggregate(&zones).unwrap();
        ExposureReport {
            hazard: HazardKind::Landslide,
            tier_names: vec!["Low".into(), "Medium".into(), "High".into(), "Very High".into()],
            metrics,
            zones,
            failed: vec![],
            provinces,
            national,
        }
    }

    #[test]
    fn zone_columns_are_stable() {
        let t = zone_table(&report(MetricSet::RatioOnly));
        assert_eq!(
            t.header,
            vec![
                "zone_id", "zone_name", "parent", "total_population",
                "pop_low", "pop_medium", "pop_high", "pop_very_high",
                "ratio_low", "ratio_medium", "ratio_high", "ratio_very_high",
                "exposed_population", "exposure_ratio", "risk_score", "approximate",
            ]
        );
        assert_eq!(t.rows[0].len(), t.header.len());
        assert_eq!(t.rows[0][4], "10");
        assert_eq!(t.rows[0][8], "0.100000");
    }

    #[test]
    fn area_columns_follow_metric_set() {
        let t = zone_table(&report(MetricSet::RatioAreaDensity));
        assert!(t.header.contains(&"exposed_area".to_string()));
        assert_eq!(t.rows[0].len(), t.header.len());

        let p = province_table(&report(MetricSet::RatioAreaDensity));
        assert_eq!(p.header[0], "province");
        assert_eq!(p.rows[0][0], "Morobe");
        assert_eq!(p.rows[0].len(), p.header.len());
        assert_eq!(p.header.last().unwrap(), "approximate_zones");
    }

    #[test]
    fn national_is_one_row() {
        let t = national_table(&report(MetricSet::RatioOnly));
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].len(), t.header.len());
        assert_eq!(t.rows[0][2], "100");
    }
}
