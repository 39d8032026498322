//! Hazard-exposure runner: loads a scenario file, runs the zonal exposure
//! pipeline and prints the report as JSON or as the stable tables.

mod scenario;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use exposure_core::{
    table::{self, Table},
    ExposureConfig, ExposurePipeline, ExposureReport, RankMetric, Ranked, ReductionConfig,
};
use log::LevelFilter;
use serde_json::json;

use crate::scenario::Scenario;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hazard-exposure", about = "Population exposure to natural hazards by administrative zone")]
struct Args {
    /// Scenario JSON: grid, trigger layers, population layer, GeoJSON zones.
    scenario: PathBuf,

    /// Hazard preset used when the scenario carries no `config`.
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// Flood return period in years (flood preset).
    #[arg(long, default_value_t = 100)]
    return_period: u32,

    /// Minimum flood depth in metres counted as exposed (flood preset).
    #[arg(long, default_value_t = 0.0)]
    min_depth: f64,

    /// Upper elevation in metres of the low-elevation coastal zone (coastal preset).
    #[arg(long, default_value_t = 10.0)]
    max_elevation: f64,

    /// Sampling resolution in map units; native cell size when omitted.
    #[arg(long)]
    resolution: Option<f64>,

    /// Pixel budget per zone.
    #[arg(long)]
    max_pixels: Option<u64>,

    /// Fail zones over the pixel budget instead of coarsening them.
    #[arg(long)]
    strict: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Also print provinces and zones ranked by this metric.
    #[arg(short, long, value_enum)]
    rank: Option<RankBy>,

    /// Number of entries shown per ranking.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Preset {
    Landslide,
    Flood,
    Coastal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Tables,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RankBy {
    TotalPopulation,
    ExposedPopulation,
    ExposureRatio,
    RiskScore,
    ExposureDensity,
}

impl From<RankBy> for RankMetric {
    fn from(r: RankBy) -> Self {
        match r {
            RankBy::TotalPopulation => RankMetric::TotalPopulation,
            RankBy::ExposedPopulation => RankMetric::ExposedPopulation,
            RankBy::ExposureRatio => RankMetric::ExposureRatio,
            RankBy::RiskScore => RankMetric::RiskScore,
            RankBy::ExposureDensity => RankMetric::ExposureDensity,
        }
    }
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Scenario config if present, otherwise the chosen preset; command-line
    /// reduction overrides apply to both.
    fn config(&self, from_scenario: Option<ExposureConfig>) -> Result<ExposureConfig> {
        let config = match (from_scenario, self.preset) {
            (Some(c), _) => c,
            (None, Some(Preset::Landslide)) => ExposureConfig::landslide(),
            (None, Some(Preset::Flood)) => ExposureConfig::flood(self.return_period, self.min_depth),
            (None, Some(Preset::Coastal)) => ExposureConfig::coastal_lecz(self.max_elevation),
            (None, None) => anyhow::bail!("scenario has no `config`; pass --preset"),
        };
        let reduction = ReductionConfig {
            resolution: self.resolution.or(config.reduction.resolution),
            best_effort: config.reduction.best_effort && !self.strict,
            max_pixels: self.max_pixels.unwrap_or(config.reduction.max_pixels),
            ..config.reduction
        };
        Ok(config.with_reduction(reduction))
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_table(title: &str, t: &Table) {
    println!("# {title}");
    println!("{}", t.header.join("\t"));
    for row in &t.rows {
        println!("{}", row.join("\t"));
    }
    println!();
}

fn ranking<'a, T: Ranked>(
    ranked: impl IntoIterator<Item = &'a T>,
    label: impl Fn(&T) -> &str,
    metric: RankMetric,
    top: usize,
) -> Vec<(String, f64)>
where
    T: 'a,
{
    ranked
        .into_iter()
        .take(top)
        .map(|r| (label(r).to_string(), r.metric(metric)))
        .collect()
}

fn emit(report: &ExposureReport, args: &Args) -> Result<()> {
    let ranked = args.rank.map(|by| {
        let metric = RankMetric::from(by);
        (
            ranking(report.rank_provinces(metric), |p| p.province.as_str(), metric, args.top),
            ranking(report.rank_zones(metric), |z| z.zone_id.as_str(), metric, args.top),
        )
    });

    match args.format {
        Format::Json => {
            let mut out = serde_json::to_value(report).context("serialising report")?;
            out["zone_status"] = serde_json::to_value(report.zone_status())?;
            if let Some((provinces, zones)) = ranked {
                out["ranking"] = json!({ "provinces": provinces, "zones": zones });
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Tables => {
            print_table("zones", &table::zone_table(report));
            print_table("provinces", &table::province_table(report));
            print_table("national", &table::national_table(report));
            for f in &report.failed {
                println!("failed\t{}\t{}", f.zone.id, f.error);
            }
            if let Some((provinces, zones)) = ranked {
                for (title, entries) in [("province ranking", provinces), ("zone ranking", zones)] {
                    println!("# {title}");
                    for (i, (name, value)) in entries.iter().enumerate() {
                        println!("{}\t{name}\t{value:.6}", i + 1);
                    }
                    println!();
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    pretty_env_logger::formatted_builder()
        .filter_level(args.log_level())
        .parse_env("RUST_LOG")
        .init();

    let json = fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&json).with_context(|| format!("loading {}", args.scenario.display()))?;

    let config = args.config(scenario.config.clone())?;
    let pipeline = ExposurePipeline::new(config).context("invalid configuration")?;
    let report = pipeline
        .run(&scenario.triggers, &scenario.population, &scenario.zones)
        .context("exposure run failed")?;

    if !report.is_authoritative() {
        log::warn!(
            "{} zone(s) failed, {} approximate",
            report.failed.len(),
            report.zones.iter().filter(|z| z.approximate).count()
        );
    }
    emit(&report, &args)
}
