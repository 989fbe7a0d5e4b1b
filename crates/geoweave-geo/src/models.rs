//! Geometry models for geoweave-geo.
//!
//! This module re-exports canonical types from `geoweave-core` and provides
//! the conversions to/from the `geo` crate that the kernels compute with.

use geo::Geometry as GeoGeometry;

use geoweave_core::error::{GeoweaveError, Result};

// Re-export canonical types from geoweave-core
pub use geoweave_core::models::{
    Crs, Distance, DistanceUnit, Feature, FeatureCollection, Geometry, GeometryType,
    SpatialPredicate, ValidityMode,
};

fn to_line_string(ring: &[[f64; 2]]) -> geo::LineString {
    geo::LineString::new(ring.iter().map(|c| geo::Coord { x: c[0], y: c[1] }).collect())
}

fn to_geo_polygon(rings: &[Vec<[f64; 2]>]) -> geo::Polygon {
    match rings.split_first() {
        Some((exterior, interiors)) => geo::Polygon::new(
            to_line_string(exterior),
            interiors.iter().map(|r| to_line_string(r)).collect(),
        ),
        None => geo::Polygon::new(geo::LineString::new(vec![]), vec![]),
    }
}

fn from_geo_polygon(polygon: &geo::Polygon) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
        .collect()
}

/// Convert a canonical Geometry to a geo::Geometry
pub fn to_geo_geometry(geom: &Geometry) -> GeoGeometry {
    match geom {
        Geometry::Point { coordinates } => {
            GeoGeometry::Point(geo::Point::new(coordinates[0], coordinates[1]))
        }
        Geometry::Polygon { coordinates } => GeoGeometry::Polygon(to_geo_polygon(coordinates)),
        Geometry::MultiPolygon { coordinates } => GeoGeometry::MultiPolygon(geo::MultiPolygon::new(
            coordinates.iter().map(|p| to_geo_polygon(p)).collect(),
        )),
    }
}

/// Polygonal area of a geometry, `None` for points
pub fn to_multi_polygon(geom: &Geometry) -> Option<geo::MultiPolygon> {
    match geom {
        Geometry::Point { .. } => None,
        Geometry::Polygon { coordinates } => {
            Some(geo::MultiPolygon::new(vec![to_geo_polygon(coordinates)]))
        }
        Geometry::MultiPolygon { coordinates } => Some(geo::MultiPolygon::new(
            coordinates.iter().map(|p| to_geo_polygon(p)).collect(),
        )),
    }
}

/// Convert a geo::Geometry to a canonical Geometry.
///
/// Rects and triangles become polygons; other kinds have no canonical form.
pub fn from_geo_geometry(geom: &GeoGeometry) -> Result<Geometry> {
    match geom {
        GeoGeometry::Point(p) => Ok(Geometry::Point { coordinates: [p.x(), p.y()] }),
        GeoGeometry::Polygon(p) => Ok(Geometry::Polygon { coordinates: from_geo_polygon(p) }),
        GeoGeometry::MultiPolygon(mp) => Ok(Geometry::MultiPolygon {
            coordinates: mp.iter().map(from_geo_polygon).collect(),
        }),
        GeoGeometry::Rect(r) => Ok(Geometry::Polygon { coordinates: from_geo_polygon(&r.to_polygon()) }),
        GeoGeometry::Triangle(t) => {
            Ok(Geometry::Polygon { coordinates: from_geo_polygon(&t.to_polygon()) })
        }
        other => Err(GeoweaveError::malformed(
            "-",
            format!("{} has no point or polygon representation", kind_name(other)),
        )),
    }
}

fn kind_name(geom: &GeoGeometry) -> &'static str {
    match geom {
        GeoGeometry::Line(_) => "Line",
        GeoGeometry::LineString(_) => "LineString",
        GeoGeometry::MultiPoint(_) => "MultiPoint",
        GeoGeometry::MultiLineString(_) => "MultiLineString",
        GeoGeometry::GeometryCollection(_) => "GeometryCollection",
        _ => "Geometry",
    }
}

/// Extension trait for Geometry with geo-crate operations
pub trait GeometryExt {
    /// Convert to geo::Geometry
    fn to_geo(&self) -> GeoGeometry;

    /// Planar area in squared CRS units; 0 for points
    fn planar_area(&self) -> f64;
}

impl GeometryExt for Geometry {
    fn to_geo(&self) -> GeoGeometry {
        to_geo_geometry(self)
    }

    fn planar_area(&self) -> f64 {
        use geo::Area;
        to_multi_polygon(self).map(|mp| mp.unsigned_area()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::polygon(vec![vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]])
    }

    #[test]
    fn test_point_roundtrip() {
        let geom = Geometry::point(-73.98, 40.75);
        assert_eq!(from_geo_geometry(&to_geo_geometry(&geom)).unwrap(), geom);
    }

    #[test]
    fn test_polygon_with_hole_roundtrip() {
        let geom = Geometry::polygon(vec![
            vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
            vec![[1.0, 1.0], [1.0, 2.0], [2.0, 2.0], [2.0, 1.0], [1.0, 1.0]],
        ]);
        assert_eq!(from_geo_geometry(&to_geo_geometry(&geom)).unwrap(), geom);
        assert!((geom.planar_area() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_rect_becomes_polygon() {
        let rect = geo::Rect::new(geo::coord! { x: 0.0, y: 0.0 }, geo::coord! { x: 1.0, y: 1.0 });
        let geom = from_geo_geometry(&GeoGeometry::Rect(rect)).unwrap();
        assert!(matches!(geom, Geometry::Polygon { .. }));
        assert!((geom.planar_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_string_has_no_canonical_form() {
        let line = geo::LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(from_geo_geometry(&GeoGeometry::LineString(line)).is_err());
    }

    #[test]
    fn test_multi_polygon_view() {
        assert!(to_multi_polygon(&Geometry::point(0.0, 0.0)).is_none());
        assert_eq!(to_multi_polygon(&square()).unwrap().0.len(), 1);
        assert_eq!(square().planar_area(), 4.0);
    }
}
