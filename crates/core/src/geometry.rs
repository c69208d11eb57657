use serde::{Deserialize, Serialize};

/// A patch boundary polygon: one exterior ring plus zero or more holes.
///
/// Coordinates are `(lon, lat)` pairs. Rings arrive validated (GeoJSON
/// decoding is the caller's job) and need not be closed; WKT output closes
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(exterior: Vec<(f64, f64)>, holes: Vec<Vec<(f64, f64)>>) -> Self {
        Self { exterior, holes }
    }

    /// Render as a WKT `POLYGON`.
    pub fn to_wkt(&self) -> String {
        format!("POLYGON {}", self.rings_wkt())
    }

    /// The `((x y, ...), (x y, ...))` ring list shared by POLYGON and
    /// MULTIPOLYGON output.
    fn rings_wkt(&self) -> String {
        let mut rings = vec![ring_wkt(&self.exterior)];
        rings.extend(self.holes.iter().map(|hole| ring_wkt(hole)));
        format!("({})", rings.join(", "))
    }
}

fn ring_wkt(ring: &[(f64, f64)]) -> String {
    let mut points: Vec<String> = ring.iter().map(|(x, y)| format!("{x} {y}")).collect();
    // Close the ring when the input leaves it open.
    if ring.first() != ring.last() {
        if let Some((x, y)) = ring.first() {
            points.push(format!("{x} {y}"));
        }
    }
    format!("({})", points.join(", "))
}

/// Render a group of polygons as one WKT `MULTIPOLYGON`, preserving input
/// order.
pub fn multi_wkt(polygons: &[Polygon]) -> String {
    if polygons.is_empty() {
        return "MULTIPOLYGON EMPTY".to_string();
    }
    let parts: Vec<String> = polygons.iter().map(|p| p.rings_wkt()).collect();
    format!("MULTIPOLYGON ({})", parts.join(", "))
}
