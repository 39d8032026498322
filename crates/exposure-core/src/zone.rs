//! Administrative zones: read-only named polygons with a parent reference.

use geo::coordinate_position::CoordPos;
use geo::{BoundingRect, Coord, CoordinatePosition, MultiPolygon, Polygon, Rect};
use serde::Serialize;

/// A base administrative zone (an LLG) with its province name.
///
/// Loaded once and never mutated; the bounding box is cached at
/// construction for the reduction window lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    id: String,
    name: String,
    parent: String,
    geometry: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

/// Identity of a zone without its geometry, carried into reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRef {
    pub id: String,
    pub name: String,
    pub parent: String,
}

impl Zone {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        let bbox = geometry.bounding_rect();
        Self { id: id.into(), name: name.into(), parent: parent.into(), geometry, bbox }
    }

    pub fn from_polygon(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: impl Into<String>,
        polygon: Polygon<f64>,
    ) -> Self {
        Self::new(id, name, parent, MultiPolygon(vec![polygon]))
    }

    /// Axis-aligned rectangular zone, mostly for synthetic scenarios.
    pub fn rect(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: impl Into<String>,
        (x0, y0): (f64, f64),
        (x1, y1): (f64, f64),
    ) -> Self {
        let rect = Rect::new(geo::coord! { x: x0, y: y0 }, geo::coord! { x: x1, y: y1 });
        Self::from_polygon(id, name, parent, rect.to_polygon())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// `(min_x, min_y, max_x, max_y)`, or `None` for an empty geometry.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.bbox.map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
    }

    /// True when the zone owns the point (`x`, `y`).
    ///
    /// Interior points are owned. A boundary point is owned when the zone
    /// lies just to its +x side, or, on an edge parallel to x, just to its
    /// +x/+y diagonal. Zones that tile the plane therefore own every shared
    /// boundary point exactly once.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self.position(x, y) {
            CoordPos::Inside => true,
            CoordPos::Outside => false,
            CoordPos::OnBoundary => {
                let e = nudge(x, y);
                match self.position(x + e, y) {
                    CoordPos::Inside => true,
                    CoordPos::Outside => false,
                    CoordPos::OnBoundary => self.position(x + e, y + e) == CoordPos::Inside,
                }
            }
        }
    }

    #[inline]
    fn position(&self, x: f64, y: f64) -> CoordPos {
        self.geometry.coordinate_position(&Coord { x, y })
    }

    pub fn to_ref(&self) -> ZoneRef {
        ZoneRef { id: self.id.clone(), name: self.name.clone(), parent: self.parent.clone() }
    }
}

/// Offset small enough to stay off neighbouring vertices yet large enough
/// to move `x` and `y` by many ulps.
fn nudge(x: f64, y: f64) -> f64 {
    x.abs().max(y.abs()).max(1.0) * f64::EPSILON * 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_zone_bounds_and_containment() {
        let z = Zone::rect("z1", "Zone 1", "A", (0.0, 0.0), (200.0, 100.0));
        assert_eq!(z.bounds(), Some((0.0, 0.0, 200.0, 100.0)));
        assert!(z.contains(150.0, 50.0));
        assert!(!z.contains(250.0, 50.0));
        assert_eq!(z.parent(), "A");
    }

    #[test]
    fn shared_edge_belongs_to_exactly_one_zone() {
        let west = Zone::rect("w", "West", "A", (0.0, 0.0), (150.0, 100.0));
        let east = Zone::rect("e", "East", "A", (150.0, 0.0), (300.0, 100.0));
        assert!(!west.contains(150.0, 50.0));
        assert!(east.contains(150.0, 50.0));

        let south = Zone::rect("s", "South", "A", (0.0, 0.0), (300.0, 50.0));
        let north = Zone::rect("n", "North", "A", (0.0, 50.0), (300.0, 100.0));
        assert!(!south.contains(100.0, 50.0));
        assert!(north.contains(100.0, 50.0));
    }

    #[test]
    fn shared_corner_belongs_to_exactly_one_quadrant() {
        let quads = [
            Zone::rect("sw", "SW", "A", (0.0, 0.0), (1.0, 1.0)),
            Zone::rect("se", "SE", "A", (1.0, 0.0), (2.0, 1.0)),
            Zone::rect("nw", "NW", "A", (0.0, 1.0), (1.0, 2.0)),
            Zone::rect("ne", "NE", "A", (1.0, 1.0), (2.0, 2.0)),
        ];
        let owners: Vec<&str> = quads.iter().filter(|z| z.contains(1.0, 1.0)).map(|z| z.id()).collect();
        assert_eq!(owners, vec!["ne"]);
    }

    #[test]
    fn empty_geometry_has_no_bounds() {
        let z = Zone::new("z0", "Empty", "A", MultiPolygon(vec![]));
        assert_eq!(z.bounds(), None);
    }
}
