//! Elementwise raster algebra over bands that share one grid.
//!
//! Every operation propagates "no data" (`NaN`) unless stated otherwise and
//! returns a fresh band; inputs are never mutated.

use crate::config::{ThresholdRule, TierBin};
use crate::error::RasterError;
use crate::raster::Band;

fn ensure_same_len(a: &Band, b: &Band) -> Result<(), RasterError> {
    if a.data.len() != b.data.len() {
        return Err(RasterError::GridMismatch { left: a.name.clone(), right: b.name.clone() });
    }
    Ok(())
}

fn zip_with(
    name: impl Into<String>,
    a: &Band,
    b: &Band,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Band, RasterError> {
    ensure_same_len(a, b)?;
    let data = a.data.iter().zip(&b.data).map(|(&x, &y)| f(x, y)).collect();
    Ok(Band::new(name, data))
}

/// Keep cells inside the closed range `[lo, hi]`; everything else becomes
/// no data.
pub fn mask_range(band: &Band, lo: f64, hi: f64) -> Band {
    let data = band
        .data
        .iter()
        .map(|&v| if v >= lo && v <= hi { v } else { f64::NAN })
        .collect();
    Band::new(band.name.clone(), data)
}

/// 1 where the rule marks a cell exposed, 0 where it does not, no data
/// where the input has none.
pub fn threshold(band: &Band, rule: &ThresholdRule) -> Band {
    let data = band
        .data
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else if rule.is_exposed(v) {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Band::new(band.name.clone(), data)
}

/// Cellwise maximum over whichever inputs are valid. A cell valid in one
/// input takes that value; a cell invalid in both stays no data.
pub fn max_combine(name: impl Into<String>, a: &Band, b: &Band) -> Result<Band, RasterError> {
    zip_with(name, a, b, |x, y| match (x.is_nan(), y.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => y,
        (false, true) => x,
        (false, false) => x.max(y),
    })
}

/// Map ordinal levels onto tiers: a cell whose rounded level lies in
/// `bins[i]` becomes `i + 1`. Levels outside every bin become no data.
pub fn reclassify(band: &Band, bins: &[TierBin]) -> Band {
    let data = band
        .data
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return f64::NAN;
            }
            let level = v.round() as i32;
            bins.iter()
                .position(|b| b.contains(level))
                .map_or(f64::NAN, |i| (i + 1) as f64)
        })
        .collect();
    Band::new(band.name.clone(), data)
}

/// `values` where `classes == class`, no data elsewhere.
pub fn mask_eq(name: impl Into<String>, values: &Band, classes: &Band, class: f64) -> Result<Band, RasterError> {
    zip_with(name, values, classes, |v, c| if c == class { v } else { f64::NAN })
}

/// `values` where `mask` is valid and non-zero, no data elsewhere.
pub fn mask_where(name: impl Into<String>, values: &Band, mask: &Band) -> Result<Band, RasterError> {
    zip_with(name, values, mask, |v, m| if !m.is_nan() && m != 0.0 { v } else { f64::NAN })
}

/// 1 where `classes` is a valid non-zero level, no data elsewhere.
pub fn indicator(name: impl Into<String>, classes: &Band) -> Band {
    let data = classes
        .data
        .iter()
        .map(|&c| if !c.is_nan() && c != 0.0 { 1.0 } else { f64::NAN })
        .collect();
    Band::new(name, data)
}

pub fn multiply(name: impl Into<String>, a: &Band, b: &Band) -> Result<Band, RasterError> {
    zip_with(name, a, b, |x, y| x * y)
}

/// Cellwise quotient; a zero divisor yields no data rather than infinity.
pub fn divide(name: impl Into<String>, a: &Band, b: &Band) -> Result<Band, RasterError> {
    zip_with(name, a, b, |x, y| if y == 0.0 { f64::NAN } else { x / y })
}
