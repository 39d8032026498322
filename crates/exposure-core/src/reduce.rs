//! Zonal sum reduction of a multi-band raster over one zone polygon.
//!
//! All bands are reduced in a single pass over the zone's cells; callers
//! pack every per-tier layer plus the total-population layer into one
//! raster and call [`reduce`] once per zone.
//!
//! Sampling works on square blocks of `scale × scale` native cells, aligned
//! to the grid origin. A block contributes the sum of its valid native
//! cells when its centre lies inside the zone. At scale 1 this is the plain
//! "cell centre inside polygon" rule.
//!
//! Budget handling:
//!   scale_0 = max(1, round(resolution / cell_width))
//!   pixels(s) = number of blocks covering the zone's bounding window
//!   strict:      pixels(scale_0) > max_pixels → error
//!   best effort: double the scale until pixels(s) ≤ max_pixels, flag result

use crate::config::ReductionConfig;
use crate::error::ReductionError;
use crate::raster::{CellWindow, Grid, Raster};
use crate::zone::Zone;

/// Neumaier-compensated running sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StableSum {
    sum: f64,
    comp: f64,
}

impl StableSum {
    #[inline]
    pub fn add(&mut self, v: f64) {
        let t = self.sum + v;
        if self.sum.abs() >= v.abs() {
            self.comp += (self.sum - t) + v;
        } else {
            self.comp += (v - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn merge(&mut self, other: StableSum) {
        self.add(other.sum);
        self.comp += other.comp;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.comp
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BandAccumulator {
    sum: StableSum,
    valid: u64,
}

impl BandAccumulator {
    fn merge(&mut self, other: &BandAccumulator) {
        self.sum.merge(other.sum);
        self.valid += other.valid;
    }
}

/// Per-band sums for one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSums {
    sums: Vec<(String, Option<f64>)>,
    scale: usize,
    approximate: bool,
    pixels: u64,
}

impl BandSums {
    /// Sum of `band`, `None` when the band had no valid cell in the zone
    /// (or is not part of the raster).
    pub fn get(&self, band: &str) -> Option<f64> {
        self.sums.iter().find(|(name, _)| name == band).and_then(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.sums.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Block size in native cells actually used.
    pub fn scale(&self) -> usize {
        self.scale
    }

    /// True when the scale was coarsened to respect the pixel budget.
    pub fn is_approximate(&self) -> bool {
        self.approximate
    }

    /// Blocks visited at the chosen scale.
    pub fn pixels(&self) -> u64 {
        self.pixels
    }
}

/// Native-cell block size implied by the configured resolution.
pub fn base_scale(grid: &Grid, config: &ReductionConfig) -> usize {
    match config.resolution {
        Some(r) => ((r / grid.cell_width()).round() as usize).max(1),
        None => 1,
    }
}

/// Expand a window outward to whole blocks of `scale` cells aligned to the
/// grid origin, clamped to the grid.
fn align(window: &CellWindow, scale: usize, grid: &Grid) -> CellWindow {
    CellWindow {
        row_start: window.row_start / scale * scale,
        row_end: window.row_end.div_ceil(scale).saturating_mul(scale).min(grid.height),
        col_start: window.col_start / scale * scale,
        col_end: window.col_end.div_ceil(scale).saturating_mul(scale).min(grid.width),
    }
}

fn block_count(window: &CellWindow, scale: usize, grid: &Grid) -> u64 {
    let w = align(window, scale, grid);
    (w.rows().div_ceil(scale) as u64) * (w.cols().div_ceil(scale) as u64)
}

/// Sum every band of `raster` over `zone`.
///
/// Bands with no valid contributing cell are reported as absent, not zero.
/// A zone whose bounding box misses the raster is a legitimate all-absent
/// result, not an error.
pub fn reduce(raster: &Raster, zone: &Zone, config: &ReductionConfig) -> Result<BandSums, ReductionError> {
    let grid = raster.grid();
    let (x0, y0, x1, y1) = zone
        .bounds()
        .ok_or_else(|| ReductionError::EmptyGeometry { zone: zone.id().to_string() })?;

    let base = base_scale(grid, config);
    let absent = |scale| BandSums {
        sums: raster.band_names().map(|n| (n.to_string(), None)).collect(),
        scale,
        approximate: false,
        pixels: 0,
    };

    let Some(window) = grid.window(x0, y0, x1, y1) else {
        log::debug!("zone `{}` lies outside the raster extent", zone.id());
        return Ok(absent(base));
    };

    let scale = choose_scale(&window, base, grid, zone, config)?;
    let approximate = scale != base;
    let window = align(&window, scale, grid);
    let pixels = block_count(&window, scale, grid);

    let accumulators = accumulate(raster, zone, &window, scale, config.tile_rows);

    let sums = raster
        .band_names()
        .zip(&accumulators)
        .map(|(name, acc)| (name.to_string(), (acc.valid > 0).then(|| acc.sum.value())))
        .collect();

    log::debug!(
        "zone `{}`: {pixels} block(s) at scale {scale}{}",
        zone.id(),
        if approximate { " (best effort)" } else { "" }
    );

    Ok(BandSums { sums, scale, approximate, pixels })
}

fn choose_scale(
    window: &CellWindow,
    base: usize,
    grid: &Grid,
    zone: &Zone,
    config: &ReductionConfig,
) -> Result<usize, ReductionError> {
    let needed = block_count(window, base, grid);
    if needed <= config.max_pixels {
        return Ok(base);
    }
    if !config.best_effort {
        return Err(ReductionError::TooManyPixels {
            zone: zone.id().to_string(),
            pixels: needed,
            max_pixels: config.max_pixels,
        });
    }

    let ceiling = grid.width.max(grid.height).max(base);
    let mut scale = base;
    while block_count(window, scale, grid) > config.max_pixels {
        if scale >= ceiling {
            return Err(ReductionError::BudgetExhausted {
                zone: zone.id().to_string(),
                scale,
                max_pixels: config.max_pixels,
            });
        }
        scale = scale.saturating_mul(2);
    }
    Ok(scale)
}

/// Walk the aligned window in tiles of whole block-rows, accumulate each
/// tile separately, then merge tile partials.
fn accumulate(
    raster: &Raster,
    zone: &Zone,
    window: &CellWindow,
    scale: usize,
    tile_rows: usize,
) -> Vec<BandAccumulator> {
    let grid = raster.grid();
    let bands = raster.bands();
    let mut totals = vec![BandAccumulator::default(); bands.len()];
    let mut tile = vec![BandAccumulator::default(); bands.len()];

    let rows_per_tile = (tile_rows / scale).max(1) * scale;
    let (cw, ch) = (grid.cell_width(), grid.cell_height());

    let mut tile_start = window.row_start;
    while tile_start < window.row_end {
        let tile_end = (tile_start + rows_per_tile).min(window.row_end);
        tile.iter_mut().for_each(|a| *a = BandAccumulator::default());

        for block_row in (tile_start..tile_end).step_by(scale) {
            let r1 = (block_row + scale).min(window.row_end);
            let cy = grid.min_y + (block_row + r1) as f64 * 0.5 * ch;

            for block_col in (window.col_start..window.col_end).step_by(scale) {
                let c1 = (block_col + scale).min(window.col_end);
                let cx = grid.min_x + (block_col + c1) as f64 * 0.5 * cw;
                if !zone.contains(cx, cy) {
                    continue;
                }
                for r in block_row..r1 {
                    for c in block_col..c1 {
                        let idx = grid.index(r, c);
                        for (acc, band) in tile.iter_mut().zip(bands) {
                            if let Some(v) = band.get(idx) {
                                acc.sum.add(v);
                                acc.valid += 1;
                            }
                        }
                    }
                }
            }
        }

        for (total, part) in totals.iter_mut().zip(&tile) {
            total.merge(part);
        }
        tile_start = tile_end;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Band;
    use approx::assert_relative_eq;

    const NAN: f64 = f64::NAN;

    /// 4×4 grid of 100 m cells.
    fn grid() -> Grid {
        Grid::with_cell_size(4, 4, 0.0, 0.0, 100.0).unwrap()
    }

    fn strict(max_pixels: u64) -> ReductionConfig {
        ReductionConfig { best_effort: false, max_pixels, ..ReductionConfig::default() }
    }

    #[test]
    fn sums_cells_whose_centres_fall_inside() {
        let pop = Band::new("population", (0..16).map(|i| i as f64).collect());
        let raster = Raster::single(grid(), pop).unwrap();
        // Left half: columns 0 and 1 of every row.
        let zone = Zone::rect("w", "West", "A", (0.0, 0.0), (200.0, 400.0));
        let sums = reduce(&raster, &zone, &ReductionConfig::default()).unwrap();
        // 0+1+4+5+8+9+12+13
        assert_relative_eq!(sums.get("population").unwrap(), 52.0);
        assert!(!sums.is_approximate());
        assert_eq!(sums.pixels(), 8);
    }

    #[test]
    fn band_without_valid_cells_is_absent_not_zero() {
        let raster = Raster::new(
            grid(),
            vec![Band::new("population", vec![1.0; 16]), Band::new("tier_1", vec![NAN; 16])],
        )
        .unwrap();
        let zone = Zone::rect("z", "Z", "A", (0.0, 0.0), (400.0, 400.0));
        let sums = reduce(&raster, &zone, &ReductionConfig::default()).unwrap();
        assert_eq!(sums.get("population"), Some(16.0));
        assert_eq!(sums.get("tier_1"), None);
    }

    #[test]
    fn valid_zeros_are_present() {
        let raster = Raster::single(grid(), Band::new("population", vec![0.0; 16])).unwrap();
        let zone = Zone::rect("z", "Z", "A", (0.0, 0.0), (400.0, 400.0));
        let sums = reduce(&raster, &zone, &ReductionConfig::default()).unwrap();
        assert_eq!(sums.get("population"), Some(0.0));
    }

    #[test]
    fn zone_outside_extent_is_all_absent() {
        let raster = Raster::single(grid(), Band::new("population", vec![1.0; 16])).unwrap();
        let zone = Zone::rect("far", "Far", "A", (1000.0, 1000.0), (2000.0, 2000.0));
        let sums = reduce(&raster, &zone, &strict(1)).unwrap();
        assert_eq!(sums.get("population"), None);
    }

    #[test]
    fn empty_geometry_fails_the_zone() {
        let raster = Raster::single(grid(), Band::new("population", vec![1.0; 16])).unwrap();
        let zone = Zone::new("bad", "Bad", "A", geo::MultiPolygon(vec![]));
        let err = reduce(&raster, &zone, &ReductionConfig::default()).unwrap_err();
        assert_eq!(err, ReductionError::EmptyGeometry { zone: "bad".into() });
    }

    #[test]
    fn strict_mode_over_budget_fails() {
        let raster = Raster::single(grid(), Band::new("population", vec![1.0; 16])).unwrap();
        let zone = Zone::rect("z", "Z", "A", (0.0, 0.0), (400.0, 400.0));
        let err = reduce(&raster, &zone, &strict(4)).unwrap_err();
        assert_eq!(err, ReductionError::TooManyPixels { zone: "z".into(), pixels: 16, max_pixels: 4 });
    }

    #[test]
    fn best_effort_coarsens_and_flags() {
        let raster = Raster::single(grid(), Band::new("population", vec![1.0; 16])).unwrap();
        let zone = Zone::rect("z", "Z", "A", (0.0, 0.0), (400.0, 400.0));
        let config = ReductionConfig { best_effort: true, max_pixels: 4, ..ReductionConfig::default() };
        let sums = reduce(&raster, &zone, &config).unwrap();
        assert!(sums.is_approximate());
        assert_eq!(sums.scale(), 2);
        assert_eq!(sums.pixels(), 4);
        // Whole-grid zone: every block centre is inside, so nothing is lost.
        assert_eq!(sums.get("population"), Some(16.0));
    }

    #[test]
    fn resolution_sets_the_block_scale_without_flagging() {
        let raster = Raster::single(grid(), Band::new("population", vec![1.0; 16])).unwrap();
        let zone = Zone::rect("z", "Z", "A", (0.0, 0.0), (400.0, 400.0));
        let config = ReductionConfig { resolution: Some(200.0), ..ReductionConfig::default() };
        let sums = reduce(&raster, &zone, &config).unwrap();
        assert_eq!(sums.scale(), 2);
        assert!(!sums.is_approximate());
        assert_eq!(sums.get("population"), Some(16.0));
    }

    #[test]
    fn tiling_does_not_change_the_result() {
        let data: Vec<f64> = (0..16).map(|i| 0.1 * i as f64).collect();
        let raster = Raster::single(grid(), Band::new("population", data)).unwrap();
        let zone = Zone::rect("z", "Z", "A", (0.0, 0.0), (400.0, 400.0));
        let one = ReductionConfig { tile_rows: 1, ..ReductionConfig::default() };
        let all = ReductionConfig { tile_rows: 1024, ..ReductionConfig::default() };
        let a = reduce(&raster, &zone, &one).unwrap().get("population").unwrap();
        let b = reduce(&raster, &zone, &all).unwrap().get("population").unwrap();
        assert_relative_eq!(a, b, epsilon = 1e-12);
        assert_relative_eq!(a, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn centres_on_a_shared_edge_are_counted_once() {
        let g = Grid::with_cell_size(3, 1, 0.0, 0.0, 100.0).unwrap();
        let raster = Raster::single(g, Band::new("population", vec![100.0; 3])).unwrap();
        // The edge at x = 150 runs through the middle cell centre.
        let west = Zone::rect("w", "West", "A", (0.0, 0.0), (150.0, 100.0));
        let east = Zone::rect("e", "East", "A", (150.0, 0.0), (300.0, 100.0));
        let config = ReductionConfig::default();
        let w = reduce(&raster, &west, &config).unwrap().get("population").unwrap();
        let e = reduce(&raster, &east, &config).unwrap().get("population").unwrap();
        assert_eq!(w + e, 300.0);
        assert_eq!((w, e), (100.0, 200.0));
    }

    #[test]
    fn quadrants_meeting_on_centres_partition_the_grid() {
        // 3×3 cells; the quadrant edges run through the middle row and column.
        let raster = Raster::single(
            Grid::with_cell_size(3, 3, 0.0, 0.0, 100.0).unwrap(),
            Band::new("population", (1..=9).map(f64::from).collect()),
        )
        .unwrap();
        let zones = [
            Zone::rect("sw", "SW", "A", (0.0, 0.0), (150.0, 150.0)),
            Zone::rect("se", "SE", "A", (150.0, 0.0), (300.0, 150.0)),
            Zone::rect("nw", "NW", "A", (0.0, 150.0), (150.0, 300.0)),
            Zone::rect("ne", "NE", "A", (150.0, 150.0), (300.0, 300.0)),
        ];
        let total: f64 = zones
            .iter()
            .map(|z| reduce(&raster, z, &ReductionConfig::default()).unwrap().get("population").unwrap_or(0.0))
            .sum();
        assert_eq!(total, 45.0);
    }

    #[test]
    fn stable_sum_keeps_small_terms() {
        let mut s = StableSum::default();
        s.add(1e16);
        for _ in 0..10 {
            s.add(1.0);
        }
        s.add(-1e16);
        assert_eq!(s.value(), 10.0);
    }
}
