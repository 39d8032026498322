//! Scenario file: configuration, grid, hazard triggers, population and zones
//! in one JSON document. Zones are a GeoJSON `FeatureCollection` whose
//! features carry `id`, `name` and `parent` properties.

use anyhow::{bail, Context, Result};
use exposure_core::{Band, ExposureConfig, Grid, Raster, Zone};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection};
use serde::Deserialize;
use serde_json::Value;

// ── Serde helpers ─────────────────────────────────────────────────────────────

fn null_as_nan_vec<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Vec<f64>, D::Error> {
    let v: Vec<Option<f64>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
}

#[derive(Deserialize)]
struct GridSpec {
    width: usize,
    height: usize,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

#[derive(Deserialize)]
struct LayerSpec {
    name: String,
    #[serde(deserialize_with = "null_as_nan_vec")]
    data: Vec<f64>,
    #[serde(default)]
    nodata: Option<f64>,
}

#[derive(Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    config: Option<ExposureConfig>,
    grid: GridSpec,
    triggers: Vec<LayerSpec>,
    population: LayerSpec,
    zones: FeatureCollection,
}

/// A fully loaded scenario, ready for the pipeline.
#[derive(Debug)]
pub struct Scenario {
    /// `None` when the file leaves the choice to a command-line preset.
    pub config: Option<ExposureConfig>,
    pub triggers: Vec<Raster>,
    pub population: Raster,
    pub zones: Vec<Zone>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ScenarioFile = serde_json::from_str(json).context("parsing scenario JSON")?;
        if let Some(config) = &file.config {
            config.validate().context("scenario configuration")?;
        }
        let g = &file.grid;
        let grid = Grid::new(g.width, g.height, g.min_x, g.max_x, g.min_y, g.max_y).context("scenario grid")?;

        if file.triggers.is_empty() {
            bail!("scenario has no hazard trigger layers");
        }
        let triggers = file
            .triggers
            .into_iter()
            .map(|layer| {
                let name = layer.name.clone();
                to_raster(grid, layer).with_context(|| format!("trigger layer `{name}`"))
            })
            .collect::<Result<Vec<_>>>()?;
        let population = to_raster(grid, file.population).context("population layer")?;

        let zones = file
            .zones
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| to_zone(f).with_context(|| format!("zone feature #{i}")))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "loaded scenario: {}×{} grid, {} trigger(s), {} zone(s)",
            grid.width,
            grid.height,
            triggers.len(),
            zones.len()
        );
        Ok(Self { config: file.config, triggers, population, zones })
    }
}

fn to_raster(grid: Grid, layer: LayerSpec) -> Result<Raster> {
    let band = Band::with_nodata(layer.name, layer.data, layer.nodata);
    Ok(Raster::single(grid, band)?)
}

fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Polygon and MultiPolygon geometries only.
fn to_multipolygon(feature: &Feature) -> Result<MultiPolygon<f64>> {
    let Some(geometry) = feature.geometry.clone() else {
        return Ok(MultiPolygon(vec![]));
    };
    let geometry: geo::Geometry<f64> = geometry.try_into().context("converting GeoJSON geometry")?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        other => bail!("unsupported zone geometry: {other:?}"),
    }
}

fn to_zone(feature: &Feature) -> Result<Zone> {
    let id = property_string(feature, "id")
        .or_else(|| {
            feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            })
        })
        .context("feature has no `id`")?;
    let name = property_string(feature, "name").unwrap_or_else(|| id.clone());
    let parent = property_string(feature, "parent").with_context(|| format!("zone `{id}` has no `parent`"))?;
    let geometry = to_multipolygon(feature)?;
    // An empty geometry is kept; the reducer reports it as a failed zone.
    Ok(Zone::new(id, name, parent, geometry))
}
