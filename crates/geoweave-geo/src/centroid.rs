//! Centroids and representative points
//!
//! [`centroid`] is the area-weighted mean of a polygonal geometry, computed
//! with the signed-area / first-moment formula over every ring. Each ring is
//! accumulated relative to its first vertex so that large projected
//! coordinates (millions of metres) do not swamp the cross products.
//!
//! [`point_on_surface`] trades the true centroid for a point guaranteed to lie
//! inside the polygon, which matters for L-shapes and annuli.

use geo::InteriorPoint;

use crate::models::{to_multi_polygon, Crs, Feature, FeatureCollection, Geometry};
use crate::transform::require_projected;
use geoweave_core::error::{GeoweaveError, Result};

/// Signed area and area-weighted centre of one ring
struct RingMoment {
    area: f64,
    centre: [f64; 2],
}

fn ring_moment(ring: &[[f64; 2]]) -> Option<RingMoment> {
    let origin = *ring.first()?;
    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;

    for w in ring.windows(2) {
        let (x0, y0) = (w[0][0] - origin[0], w[0][1] - origin[1]);
        let (x1, y1) = (w[1][0] - origin[0], w[1][1] - origin[1]);
        let cross = x0 * y1 - x1 * y0;
        twice_area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if twice_area == 0.0 {
        return Some(RingMoment { area: 0.0, centre: origin });
    }

    Some(RingMoment {
        area: twice_area / 2.0,
        centre: [origin[0] + cx / (3.0 * twice_area), origin[1] + cy / (3.0 * twice_area)],
    })
}

/// Area-weighted centroid of a geometry in a projected CRS.
///
/// Holes subtract from their polygon regardless of ring orientation; members
/// of a multipolygon are weighted by their area. The centroid of a point is
/// the point itself.
pub fn centroid(geometry: &Geometry, crs: &Crs) -> Result<[f64; 2]> {
    require_projected(crs, "centroid")?;
    polygonal_centroid(geometry).ok_or_else(|| GeoweaveError::malformed("-", "polygon has zero area"))
}

fn polygonal_centroid(geometry: &Geometry) -> Option<[f64; 2]> {
    let polygons: Vec<&Vec<Vec<[f64; 2]>>> = match geometry {
        Geometry::Point { coordinates } => return Some(*coordinates),
        Geometry::Polygon { coordinates } => vec![coordinates],
        Geometry::MultiPolygon { coordinates } => coordinates.iter().collect(),
    };

    let mut total_area = 0.0;
    let mut ring_area = 0.0;
    let mut moment = [0.0, 0.0];

    for rings in polygons {
        for (i, ring) in rings.iter().enumerate() {
            let Some(m) = ring_moment(ring) else { continue };
            let weight = if i == 0 { m.area.abs() } else { -m.area.abs() };
            total_area += weight;
            ring_area += m.area.abs();
            moment[0] += m.centre[0] * weight;
            moment[1] += m.centre[1] * weight;
        }
    }

    // Zero, or holes cancelling their shells up to rounding
    if total_area <= ring_area * 1e-12 {
        return None;
    }
    Some([moment[0] / total_area, moment[1] / total_area])
}

/// A point guaranteed to lie in the interior of a polygonal geometry.
///
/// Valid in any CRS since it makes no metric claim. Points return themselves.
pub fn point_on_surface(geometry: &Geometry) -> Result<[f64; 2]> {
    if let Geometry::Point { coordinates } = geometry {
        return Ok(*coordinates);
    }

    to_multi_polygon(geometry)
        .and_then(|mp| mp.interior_point())
        .map(|p| [p.x(), p.y()])
        .ok_or_else(|| GeoweaveError::malformed("-", "polygon has no interior"))
}

/// Centroid of every feature as a point collection with the original ids and attributes
pub fn centroids(collection: &FeatureCollection) -> Result<FeatureCollection> {
    require_projected(&collection.crs, "centroid")?;
    map_points(collection, |feature| {
        polygonal_centroid(&feature.geometry)
            .ok_or_else(|| GeoweaveError::malformed(feature.id.clone(), "polygon has zero area"))
    })
}

/// Representative interior point of every feature
pub fn points_on_surface(collection: &FeatureCollection) -> Result<FeatureCollection> {
    map_points(collection, |feature| {
        point_on_surface(&feature.geometry).map_err(|_| {
            GeoweaveError::malformed(feature.id.clone(), "polygon has no interior")
        })
    })
}

fn map_points(
    collection: &FeatureCollection,
    point: impl Fn(&Feature) -> Result<[f64; 2]>,
) -> Result<FeatureCollection> {
    let features = collection
        .iter()
        .map(|feature| {
            let [x, y] = point(feature)?;
            Ok(Feature {
                id: feature.id.clone(),
                geometry: Geometry::point(x, y),
                properties: feature.properties.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(collection.with_features(features))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Contains;

    fn l_shape() -> Geometry {
        Geometry::polygon(vec![vec![
            [0.0, 0.0],
            [3.0, 0.0],
            [3.0, 1.0],
            [1.0, 1.0],
            [1.0, 3.0],
            [0.0, 3.0],
            [0.0, 0.0],
        ]])
    }

    fn assert_close(actual: [f64; 2], expected: [f64; 2]) {
        assert!(
            (actual[0] - expected[0]).abs() < 1e-9 && (actual[1] - expected[1]).abs() < 1e-9,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn test_square_centroid() {
        let square =
            Geometry::polygon(vec![vec![[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]]]);
        assert_close(centroid(&square, &Crs::conus_albers()).unwrap(), [1.0, 1.0]);
    }

    #[test]
    fn test_orientation_does_not_matter() {
        let ccw = Geometry::rect([0.0, 0.0], [4.0, 2.0]);
        let cw = Geometry::polygon(vec![vec![[0.0, 0.0], [0.0, 2.0], [4.0, 2.0], [4.0, 0.0], [0.0, 0.0]]]);
        assert_close(centroid(&ccw, &Crs::conus_albers()).unwrap(), [2.0, 1.0]);
        assert_close(centroid(&cw, &Crs::conus_albers()).unwrap(), [2.0, 1.0]);
    }

    #[test]
    fn test_hole_shifts_centroid() {
        // 4x4 square minus the 2x4 right half leaves the left half
        let geom = Geometry::polygon(vec![
            vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
            vec![[2.0, 0.0], [2.0, 4.0], [4.0, 4.0], [4.0, 0.0], [2.0, 0.0]],
        ]);
        assert_close(centroid(&geom, &Crs::conus_albers()).unwrap(), [1.0, 2.0]);
    }

    #[test]
    fn test_multipolygon_weighted_by_area() {
        let geom = Geometry::multi_polygon(vec![
            vec![vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]],
            vec![vec![[10.0, 0.0], [11.0, 0.0], [11.0, 1.0], [10.0, 1.0], [10.0, 0.0]]],
        ]);
        // (4 * (1, 1) + 1 * (10.5, 0.5)) / 5
        assert_close(centroid(&geom, &Crs::conus_albers()).unwrap(), [2.9, 0.9]);
    }

    #[test]
    fn test_large_projected_coordinates() {
        let square = Geometry::rect([2_000_000.0, 1_000_000.0], [2_000_010.0, 1_000_010.0]);
        assert_close(centroid(&square, &Crs::conus_albers()).unwrap(), [2_000_005.0, 1_000_005.0]);
    }

    #[test]
    fn test_geographic_crs_rejected() {
        let square = Geometry::rect([0.0, 0.0], [1.0, 1.0]);
        assert!(matches!(
            centroid(&square, &Crs::wgs84()),
            Err(GeoweaveError::CrsNotProjected { .. })
        ));
    }

    #[test]
    fn test_tiny_polygon_has_centroid() {
        // a 1 nm square in metres, area 1e-18
        let tiny = Geometry::rect([3.0, 4.0], [3.0 + 1e-9, 4.0 + 1e-9]);
        let [x, y] = centroid(&tiny, &Crs::conus_albers()).unwrap();
        assert!((x - (3.0 + 5e-10)).abs() < 1e-12 && (y - (4.0 + 5e-10)).abs() < 1e-12, "{} {}", x, y);
    }

    #[test]
    fn test_hole_filling_shell_has_no_centroid() {
        let shell = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]];
        let filled = Geometry::polygon(vec![shell.clone(), shell]);
        assert!(centroid(&filled, &Crs::conus_albers()).is_err());
    }

    #[test]
    fn test_degenerate_polygon() {
        let flat = Geometry::polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 0.0]]]);
        assert!(matches!(
            centroid(&flat, &Crs::conus_albers()),
            Err(GeoweaveError::MalformedGeometry { .. })
        ));
    }

    #[test]
    fn test_point_on_surface_stays_inside_l_shape() {
        let centre = centroid(&l_shape(), &Crs::conus_albers()).unwrap();
        let surface = point_on_surface(&l_shape()).unwrap();

        let polygon = to_multi_polygon(&l_shape()).unwrap();
        assert!(!polygon.contains(&geo::Point::new(centre[0], centre[1])));
        assert!(polygon.contains(&geo::Point::new(surface[0], surface[1])));
    }

    #[test]
    fn test_point_on_surface_of_annulus() {
        let annulus = Geometry::polygon(vec![
            vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
            vec![[2.0, 2.0], [2.0, 8.0], [8.0, 8.0], [8.0, 2.0], [2.0, 2.0]],
        ]);
        let surface = point_on_surface(&annulus).unwrap();
        let polygon = to_multi_polygon(&annulus).unwrap();
        assert!(polygon.contains(&geo::Point::new(surface[0], surface[1])));
    }

    #[test]
    fn test_collection_forms_keep_attributes() {
        let tracts = FeatureCollection::new(
            "tracts",
            Crs::conus_albers(),
            vec![Feature::new("t1", l_shape()).with_property("pop", 30)],
        )
        .unwrap();

        let points = points_on_surface(&tracts).unwrap();
        assert_eq!(points.features[0].id, "t1");
        assert_eq!(points.features[0].numeric("pop").unwrap(), 30.0);
        assert_eq!(points.crs, tracts.crs);

        let centres = centroids(&tracts).unwrap();
        assert!(matches!(centres.features[0].geometry, Geometry::Point { .. }));

        let geographic = tracts.with_features(tracts.features.clone());
        let geographic = FeatureCollection { crs: Crs::wgs84(), ..geographic };
        assert!(centroids(&geographic).is_err());
        assert!(points_on_surface(&geographic).is_ok());
    }
}
