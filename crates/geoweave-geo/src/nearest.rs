//! Nearest-feature search and planar distances
//!
//! Distances are Euclidean in the linear unit of a projected CRS. Geographic
//! collections are rejected rather than measured in degrees.

use geo::{Distance, Euclidean, Geometry as GeoGeometry, Intersects};
use serde::{Deserialize, Serialize};

use crate::index::{envelope_of, SpatialIndex};
use crate::models::{to_geo_geometry, DistanceUnit, FeatureCollection, Geometry};
use crate::transform::{check_crs_match, require_projected};
use geoweave_core::error::{GeoweaveError, Result};

/// A query's nearest candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nearest {
    /// Position of the query feature
    pub query: usize,
    /// Position of the nearest candidate feature
    pub candidate: usize,
    /// Distance in `unit`
    pub distance: f64,
    pub unit: DistanceUnit,
}

impl Nearest {
    /// The distance expressed in another unit
    pub fn distance_in(&self, unit: DistanceUnit) -> f64 {
        unit.from_meters(self.unit.to_meters(self.distance))
    }
}

/// Euclidean distance between two geometries; 0 when they intersect
pub fn geometry_distance(a: &Geometry, b: &Geometry) -> f64 {
    geo_distance(&to_geo_geometry(a), &to_geo_geometry(b))
}

fn geo_distance(a: &GeoGeometry, b: &GeoGeometry) -> f64 {
    if a.intersects(b) {
        0.0
    } else {
        Euclidean.distance(a, b)
    }
}

/// For each query, the position of the closest candidate.
///
/// Ties go to the lowest candidate position. Both collections must share a
/// projected CRS.
pub fn nearest_index(queries: &FeatureCollection, candidates: &FeatureCollection) -> Result<Vec<usize>> {
    Ok(scan(queries, candidates, "nearest_index")?.into_iter().map(|(i, _)| i).collect())
}

/// Nearest candidate of each query together with the distance to it
pub fn nearest_with_distance(
    queries: &FeatureCollection,
    candidates: &FeatureCollection,
) -> Result<Vec<Nearest>> {
    let unit = queries.crs.linear_unit().unwrap_or_default();
    Ok(scan(queries, candidates, "nearest_with_distance")?
        .into_iter()
        .enumerate()
        .map(|(query, (candidate, distance))| Nearest { query, candidate, distance, unit })
        .collect())
}

fn scan(
    queries: &FeatureCollection,
    candidates: &FeatureCollection,
    operation: &str,
) -> Result<Vec<(usize, f64)>> {
    check_crs_match(&queries.crs, &candidates.crs)?;
    require_projected(&queries.crs, operation)?;

    if queries.is_empty() {
        return Ok(Vec::new());
    }
    if candidates.is_empty() {
        return Err(GeoweaveError::NoCandidates { queries: queries.len() });
    }

    let index = SpatialIndex::from_collection(candidates);
    let candidates_geo: Vec<GeoGeometry> = candidates.geometries().map(to_geo_geometry).collect();

    let result = queries
        .iter()
        .map(|query| {
            let envelope = envelope_of(&query.geometry)
                .ok_or_else(|| GeoweaveError::malformed(query.id.clone(), "geometry has no coordinates"))?;
            let query_geo = to_geo_geometry(&query.geometry);

            let mut best: Option<(usize, f64)> = None;
            for (bound, i) in index.nearest_candidates(&envelope) {
                if let Some((_, best_distance)) = best {
                    if bound > best_distance {
                        break;
                    }
                }

                let distance = geo_distance(&query_geo, &candidates_geo[i]);
                let better = match best {
                    None => true,
                    Some((best_i, best_distance)) => {
                        distance < best_distance || (distance == best_distance && i < best_i)
                    }
                };
                if better {
                    best = Some((i, distance));
                }
            }

            best.ok_or(GeoweaveError::NoCandidates { queries: queries.len() })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Nearest search: {} queries against {} candidates",
        queries.len(),
        candidates.len()
    );

    Ok(result)
}

/// Element-wise distance between aligned features of two collections,
/// in the linear unit of their shared projected CRS
pub fn pairwise_distance(a: &FeatureCollection, b: &FeatureCollection) -> Result<Vec<f64>> {
    check_crs_match(&a.crs, &b.crs)?;
    require_projected(&a.crs, "pairwise_distance")?;

    if a.len() != b.len() {
        return Err(GeoweaveError::LengthMismatch { left: a.len(), right: b.len() });
    }

    Ok(a.geometries().zip(b.geometries()).map(|(x, y)| geometry_distance(x, y)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Crs, Feature};

    fn points(crs: Crs, coords: &[[f64; 2]]) -> FeatureCollection {
        let features = coords
            .iter()
            .enumerate()
            .map(|(i, c)| Feature::new(i.to_string(), Geometry::point(c[0], c[1])))
            .collect();
        FeatureCollection::new("points", crs, features).unwrap()
    }

    #[test]
    fn test_nearest_scenario() {
        let queries = points(Crs::conus_albers(), &[[0.0, 0.0]]);
        let candidates = points(Crs::conus_albers(), &[[5.0, 5.0], [1.0, 0.0], [10.0, 10.0]]);

        assert_eq!(nearest_index(&queries, &candidates).unwrap(), vec![1]);

        let nearest = nearest_with_distance(&queries, &candidates).unwrap();
        assert_eq!(nearest[0].candidate, 1);
        assert_eq!(nearest[0].distance, 1.0);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let queries = points(Crs::conus_albers(), &[[0.0, 0.0]]);
        let candidates = points(Crs::conus_albers(), &[[3.0, 0.0], [0.0, 2.0], [-2.0, 0.0]]);
        assert_eq!(nearest_index(&queries, &candidates).unwrap(), vec![1]);
    }

    #[test]
    fn test_polygon_candidates_use_boundary_distance() {
        let queries = points(Crs::conus_albers(), &[[0.0, 0.0], [15.0, 5.0]]);
        let candidates = FeatureCollection::new(
            "parcels",
            Crs::conus_albers(),
            vec![
                // large parcel whose centre is far away but whose edge is close
                Feature::new("big", Geometry::rect([2.0, -50.0], [100.0, 50.0])),
                Feature::new("small", Geometry::rect([-4.0, -1.0], [-3.0, 1.0])),
            ],
        )
        .unwrap();

        let nearest = nearest_with_distance(&queries, &candidates).unwrap();
        assert_eq!(nearest[0].candidate, 0);
        assert!((nearest[0].distance - 2.0).abs() < 1e-12);
        // inside the big parcel
        assert_eq!(nearest[1].distance, 0.0);
    }

    #[test]
    fn test_many_candidates_match_exhaustive_search() {
        // 50 x 50 lattice with spacing 2, so many queries have equidistant candidates
        let lattice: Vec<[f64; 2]> =
            (0..2500).map(|i| [(i % 50) as f64 * 2.0, (i / 50) as f64 * 2.0]).collect();
        let candidates = points(Crs::conus_albers(), &lattice);
        let queries = FeatureCollection::new(
            "zones",
            Crs::conus_albers(),
            vec![
                Feature::new("a", Geometry::point(41.0, 41.0)),
                Feature::new("b", Geometry::point(-7.0, 13.0)),
                Feature::new("c", Geometry::rect([20.5, 30.5], [21.5, 31.5])),
                Feature::new("d", Geometry::rect([150.0, -20.0], [160.0, 250.0])),
            ],
        )
        .unwrap();

        let found = nearest_with_distance(&queries, &candidates).unwrap();
        for (query, nearest) in queries.iter().zip(&found) {
            let (expected, distance) = candidates
                .geometries()
                .map(|c| geometry_distance(&query.geometry, c))
                .enumerate()
                .fold((usize::MAX, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best });
            assert_eq!(nearest.candidate, expected, "query {}", query.id);
            assert_eq!(nearest.distance, distance);
        }
        // equidistant from four lattice points
        assert_eq!(found[0].candidate, 20 * 50 + 20);
    }

    #[test]
    fn test_geographic_crs_rejected() {
        let queries = points(Crs::wgs84(), &[[0.0, 0.0]]);
        let candidates = points(Crs::wgs84(), &[[1.0, 1.0]]);

        assert!(matches!(
            nearest_index(&queries, &candidates),
            Err(GeoweaveError::CrsNotProjected { .. })
        ));
        assert!(matches!(
            pairwise_distance(&queries, &candidates),
            Err(GeoweaveError::CrsNotProjected { .. })
        ));
    }

    #[test]
    fn test_empty_inputs() {
        let empty = points(Crs::conus_albers(), &[]);
        let some = points(Crs::conus_albers(), &[[0.0, 0.0]]);

        assert!(nearest_index(&empty, &some).unwrap().is_empty());
        assert!(matches!(
            nearest_index(&some, &empty),
            Err(GeoweaveError::NoCandidates { queries: 1 })
        ));
    }

    #[test]
    fn test_pairwise_distance() {
        let a = points(Crs::conus_albers(), &[[0.0, 0.0], [1.0, 1.0]]);
        let b = points(Crs::conus_albers(), &[[3.0, 4.0], [1.0, 1.0]]);
        assert_eq!(pairwise_distance(&a, &b).unwrap(), vec![5.0, 0.0]);

        let short = points(Crs::conus_albers(), &[[0.0, 0.0]]);
        assert!(matches!(
            pairwise_distance(&a, &short),
            Err(GeoweaveError::LengthMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_distance_unit_conversion() {
        let survey_feet = Crs::new(
            2263,
            "NAD83 / New York Long Island (ftUS)",
            geoweave_core::models::CrsKind::Projected { unit: DistanceUnit::UsSurveyFeet },
        );
        let queries = points(survey_feet.clone(), &[[0.0, 0.0]]);
        let candidates = points(survey_feet, &[[5280.0, 0.0]]);

        let nearest = nearest_with_distance(&queries, &candidates).unwrap();
        assert_eq!(nearest[0].unit, DistanceUnit::UsSurveyFeet);
        assert!((nearest[0].distance_in(DistanceUnit::Miles) - 1.000_002).abs() < 1e-6);
    }
}
