use serde::{Deserialize, Serialize};

use crate::error::RasterError;

/// Fixed spatial grid shared by every layer of one analysis.
///
/// Cells are stored row-major. Row 0 lies along `min_y`, column 0 along
/// `min_x`. Coordinates are in projected map units (metres in this domain).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Half-open block of rows and columns inside a [`Grid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl CellWindow {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    pub fn cell_count(&self) -> u64 {
        self.rows() as u64 * self.cols() as u64
    }
}

impl Grid {
    /// Build a grid, rejecting zero-sized or inverted extents.
    pub fn new(
        width: usize,
        height: usize,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    ) -> Result<Self, RasterError> {
        let grid = Self { width, height, min_x, max_x, min_y, max_y };
        grid.check()?;
        Ok(grid)
    }

    /// Square cells of `cell_size` anchored at (`min_x`, `min_y`).
    pub fn with_cell_size(
        width: usize,
        height: usize,
        min_x: f64,
        min_y: f64,
        cell_size: f64,
    ) -> Result<Self, RasterError> {
        Self::new(
            width,
            height,
            min_x,
            min_x + width as f64 * cell_size,
            min_y,
            min_y + height as f64 * cell_size,
        )
    }

    pub(crate) fn check(&self) -> Result<(), RasterError> {
        let extent_ok = self.max_x > self.min_x && self.max_y > self.min_y;
        if self.width == 0 || self.height == 0 || !extent_ok {
            return Err(RasterError::DegenerateGrid { width: self.width, height: self.height });
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    pub fn cell_width(&self) -> f64 {
        (self.max_x - self.min_x) / self.width as f64
    }

    pub fn cell_height(&self) -> f64 {
        (self.max_y - self.min_y) / self.height as f64
    }

    /// Area of one native cell in squared map units.
    pub fn cell_area(&self) -> f64 {
        self.cell_width() * self.cell_height()
    }

    /// Coordinates of the centre of cell (`row`, `col`).
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) * self.cell_width(),
            self.min_y + (row as f64 + 0.5) * self.cell_height(),
        )
    }

    /// Cells whose centres can fall inside the box `[x0, x1] × [y0, y1]`.
    /// Returns `None` when the box misses the grid entirely.
    pub fn window(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> Option<CellWindow> {
        let span = |lo: f64, hi: f64, origin: f64, size: f64, n: usize| -> Option<(usize, usize)> {
            // Centre of cell i sits at origin + (i + 0.5) * size.
            let first = ((lo - origin) / size - 0.5).ceil().max(0.0);
            let last = ((hi - origin) / size - 0.5).floor().min(n as f64 - 1.0);
            if last < 0.0 || first >= n as f64 || first > last {
                return None;
            }
            Some((first as usize, last as usize + 1))
        };
        let (col_start, col_end) = span(x0, x1, self.min_x, self.cell_width(), self.width)?;
        let (row_start, row_end) = span(y0, y1, self.min_y, self.cell_height(), self.height)?;
        Some(CellWindow { row_start, row_end, col_start, col_end })
    }
}

/// One named layer of a [`Raster`]. `NaN` marks "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub data: Vec<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f64>) -> Self {
        Self { name: name.into(), data }
    }

    /// Build a band, mapping every cell equal to `nodata` (and every
    /// non-finite cell) to the internal no-data marker.
    pub fn with_nodata(name: impl Into<String>, data: Vec<f64>, nodata: Option<f64>) -> Self {
        let data = data
            .into_iter()
            .map(|v| match nodata {
                Some(nd) if v == nd => f64::NAN,
                _ if !v.is_finite() => f64::NAN,
                _ => v,
            })
            .collect();
        Self { name: name.into(), data }
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<f64> {
        let v = self.data[idx];
        if v.is_nan() { None } else { Some(v) }
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// A gridded layer with one or more named bands over a fixed [`Grid`].
/// Immutable once built; algebra produces new rasters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    grid: Grid,
    bands: Vec<Band>,
}

impl Raster {
    /// A single-band raster.
    pub fn single(grid: Grid, band: Band) -> Result<Self, RasterError> {
        Self::new(grid, vec![band])
    }

    /// A multi-band raster. Every band must match the grid and carry a
    /// unique name.
    pub fn new(grid: Grid, bands: Vec<Band>) -> Result<Self, RasterError> {
        grid.check()?;
        let mut raster = Self { grid, bands: Vec::with_capacity(bands.len()) };
        for band in bands {
            raster.push(band)?;
        }
        Ok(raster)
    }

    fn push(&mut self, band: Band) -> Result<(), RasterError> {
        if band.data.len() != self.grid.len() {
            return Err(RasterError::LengthMismatch {
                band: band.name,
                expected: self.grid.len(),
                actual: band.data.len(),
            });
        }
        if self.bands.iter().any(|b| b.name == band.name) {
            return Err(RasterError::DuplicateBand { name: band.name });
        }
        self.bands.push(band);
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, name: &str) -> Result<&Band, RasterError> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| RasterError::MissingBand { name: name.to_string() })
    }

    /// First band; every raster built through [`Raster::new`] has at least
    /// one unless constructed with an empty list.
    pub fn first_band(&self) -> Option<&Band> {
        self.bands.first()
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.iter().map(|b| b.name.as_str())
    }

    /// Fail unless `other` sits on exactly the same grid.
    pub fn ensure_same_grid(&self, other: &Raster, left: &str, right: &str) -> Result<(), RasterError> {
        if self.grid != other.grid {
            return Err(RasterError::GridMismatch { left: left.to_string(), right: right.to_string() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid4() -> Grid {
        Grid::with_cell_size(4, 4, 0.0, 0.0, 100.0).unwrap()
    }

    #[test]
    fn cell_geometry_matches_extent() {
        let g = grid4();
        assert_eq!(g.cell_width(), 100.0);
        assert_eq!(g.cell_area(), 10_000.0);
        assert_eq!(g.cell_center(0, 0), (50.0, 50.0));
        assert_eq!(g.cell_center(3, 2), (250.0, 350.0));
    }

    #[test]
    fn window_selects_cells_by_centre() {
        let g = grid4();
        // Box covers centres 50 and 150 on x, 250 and 350 on y.
        let w = g.window(40.0, 200.0, 160.0, 400.0).unwrap();
        assert_eq!(w, CellWindow { row_start: 2, row_end: 4, col_start: 0, col_end: 2 });
        assert_eq!(w.cell_count(), 4);
    }

    #[test]
    fn window_outside_grid_is_none() {
        let g = grid4();
        assert!(g.window(500.0, 500.0, 900.0, 900.0).is_none());
        assert!(g.window(-90.0, -90.0, -10.0, -10.0).is_none());
        // Box between two centres contains none.
        assert!(g.window(60.0, 60.0, 140.0, 140.0).is_none());
    }

    #[test]
    fn window_far_past_the_grid_is_clamped() {
        let g = grid4();
        let w = g.window(-1e300, -1e300, 1e300, 1e300).unwrap();
        assert_eq!(w, CellWindow { row_start: 0, row_end: 4, col_start: 0, col_end: 4 });
        let w = g.window(150.0, 0.0, f64::MAX, 100.0).unwrap();
        assert_eq!(w, CellWindow { row_start: 0, row_end: 1, col_start: 1, col_end: 4 });
    }

    #[test]
    fn nodata_sentinel_maps_to_nan() {
        let b = Band::with_nodata("pop", vec![1.0, -9999.0, f64::INFINITY, 3.0], Some(-9999.0));
        assert_eq!(b.valid_count(), 2);
        assert_eq!(b.get(1), None);
        assert_eq!(b.get(3), Some(3.0));
    }

    #[test]
    fn raster_rejects_bad_bands() {
        let g = grid4();
        let short = Raster::single(g, Band::new("a", vec![0.0; 3]));
        assert!(matches!(short, Err(RasterError::LengthMismatch { .. })));

        let dup = Raster::new(g, vec![Band::new("a", vec![0.0; 16]), Band::new("a", vec![1.0; 16])]);
        assert!(matches!(dup, Err(RasterError::DuplicateBand { .. })));
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        assert!(Grid::new(0, 4, 0.0, 1.0, 0.0, 1.0).is_err());
        assert!(Grid::new(4, 4, 1.0, 0.0, 0.0, 1.0).is_err());
    }
}
