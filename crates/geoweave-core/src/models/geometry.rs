//! Canonical geometry types used across all geoweave crates.
//!
//! These types provide a bridge between GeoJSON serialization and the
//! computational geo crate types.

use serde::{Deserialize, Serialize};

/// Geometry validation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidityMode {
    /// Strict validation - also reject self-intersecting rings
    Strict,
    /// Lenient validation - structural checks only (closed rings, finite coordinates)
    #[default]
    Lenient,
}

/// Spatial predicate for filtering and joining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpatialPredicate {
    /// Geometry intersects (shares at least one point with) the other geometry
    #[default]
    Intersects,
    /// Geometry is completely within the other geometry
    Within,
    /// Geometry contains the other geometry
    Contains,
    /// Bounding boxes intersect (fast approximation)
    BoundingBox,
}

/// Geometry type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeometryType {
    #[default]
    Point,
    Polygon,
    MultiPolygon,
    Mixed,
}

/// GeoJSON-compatible geometry representation
///
/// Rings are stored exterior first, then holes. Coordinates are `[x, y]` in
/// the units of the owning collection's CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

impl Geometry {
    /// Create a Point geometry
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point { coordinates: [x, y] }
    }

    /// Create a Polygon geometry
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Geometry::Polygon { coordinates: rings }
    }

    /// Create a MultiPolygon geometry
    pub fn multi_polygon(polygons: Vec<Vec<Vec<[f64; 2]>>>) -> Self {
        Geometry::MultiPolygon { coordinates: polygons }
    }

    /// Axis-aligned rectangle as a closed polygon
    pub fn rect(min: [f64; 2], max: [f64; 2]) -> Self {
        Geometry::polygon(vec![vec![
            [min[0], min[1]],
            [max[0], min[1]],
            [max[0], max[1]],
            [min[0], max[1]],
            [min[0], min[1]],
        ]])
    }

    /// Get the geometry type
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point { .. } => GeometryType::Point,
            Geometry::Polygon { .. } => GeometryType::Polygon,
            Geometry::MultiPolygon { .. } => GeometryType::MultiPolygon,
        }
    }

    /// Polygon or MultiPolygon
    pub fn is_polygonal(&self) -> bool {
        !matches!(self, Geometry::Point { .. })
    }

    /// Iterate over every coordinate pair
    pub fn coords(&self) -> Box<dyn Iterator<Item = &[f64; 2]> + '_> {
        match self {
            Geometry::Point { coordinates } => Box::new(std::iter::once(coordinates)),
            Geometry::Polygon { coordinates } => Box::new(coordinates.iter().flatten()),
            Geometry::MultiPolygon { coordinates } => {
                Box::new(coordinates.iter().flatten().flatten())
            }
        }
    }

    /// Apply a fallible function to every coordinate, producing a new geometry
    pub fn try_map_coords<E>(
        &self,
        mut f: impl FnMut([f64; 2]) -> Result<[f64; 2], E>,
    ) -> Result<Geometry, E> {
        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point { coordinates: f(*coordinates)? },
            Geometry::Polygon { coordinates } => {
                Geometry::Polygon { coordinates: map_rings(coordinates, &mut f)? }
            }
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates
                    .iter()
                    .map(|polygon| map_rings(polygon, &mut f))
                    .collect::<Result<_, E>>()?,
            },
        })
    }

    /// Shift every coordinate by `(dx, dy)`
    pub fn translate(&self, dx: f64, dy: f64) -> Geometry {
        self.map_coords(|[x, y]| [x + dx, y + dy])
    }

    /// Apply an infallible function to every coordinate
    pub fn map_coords(&self, mut f: impl FnMut([f64; 2]) -> [f64; 2]) -> Geometry {
        match self.try_map_coords::<std::convert::Infallible>(|c| Ok(f(c))) {
            Ok(geometry) => geometry,
            Err(never) => match never {},
        }
    }

    /// Bounding box as `(min, max)`; `None` when the geometry has no coordinates
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        self.coords().fold(None, |acc, c| match acc {
            None => Some((*c, *c)),
            Some((min, max)) => Some((
                [min[0].min(c[0]), min[1].min(c[1])],
                [max[0].max(c[0]), max[1].max(c[1])],
            )),
        })
    }

    /// Try to parse from a serde_json::Value (GeoJSON)
    pub fn from_geojson(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Convert to serde_json::Value (GeoJSON)
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn map_rings<E>(
    rings: &[Vec<[f64; 2]>],
    f: &mut impl FnMut([f64; 2]) -> Result<[f64; 2], E>,
) -> Result<Vec<Vec<[f64; 2]>>, E> {
    rings.iter().map(|ring| ring.iter().map(|c| f(*c)).collect::<Result<Vec<_>, E>>()).collect()
}
