//! Property tests for the geometric kernels

use proptest::prelude::*;

use geoweave_core::models::{Crs, Feature, FeatureCollection, Geometry};
use geoweave_geo::{
    centroid, filter_within, geometry_distance, interpolate, nearest_index, pairwise_distance,
    InterpolationMode,
};

/// Star-shaped (hence simple) polygon around `centre`
fn star_polygon() -> impl Strategy<Value = Geometry> {
    (
        (-1.0e5..1.0e5f64, -1.0e5..1.0e5f64),
        prop::collection::vec(1.0..100.0f64, 3..10),
    )
        .prop_map(|((cx, cy), radii)| {
            let n = radii.len();
            let mut ring: Vec<[f64; 2]> = radii
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let angle = i as f64 * std::f64::consts::TAU / n as f64;
                    [cx + r * angle.cos(), cy + r * angle.sin()]
                })
                .collect();
            ring.push(ring[0]);
            Geometry::polygon(vec![ring])
        })
}

fn points(coords: &[(f64, f64)]) -> FeatureCollection {
    let features = coords
        .iter()
        .enumerate()
        .map(|(i, (x, y))| Feature::new(i.to_string(), Geometry::point(*x, *y)))
        .collect();
    FeatureCollection::new("points", Crs::conus_albers(), features).unwrap()
}

fn rects(boxes: &[(f64, f64, f64, f64)]) -> FeatureCollection {
    let features = boxes
        .iter()
        .enumerate()
        .map(|(i, (x, y, w, h))| Feature::new(i.to_string(), Geometry::rect([*x, *y], [x + w, y + h])))
        .collect();
    FeatureCollection::new("rects", Crs::conus_albers(), features).unwrap()
}

/// Sorted interior cut positions splitting `[0, extent]` into strips at least 1 wide
fn cuts(extent: f64) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::btree_set(1u32..(extent as u32), 0..5).prop_map(|set| {
        let mut edges = vec![0.0];
        edges.extend(set.into_iter().map(f64::from));
        edges.push(extent);
        edges
    })
}

proptest! {
    #[test]
    fn centroid_follows_translation(
        polygon in star_polygon(),
        dx in -1.0e6..1.0e6f64,
        dy in -1.0e6..1.0e6f64,
    ) {
        let crs = Crs::conus_albers();
        let original = centroid(&polygon, &crs).unwrap();
        let moved = centroid(&polygon.translate(dx, dy), &crs).unwrap();
        let back = centroid(&polygon.translate(dx, dy).translate(-dx, -dy), &crs).unwrap();

        let tolerance = 1e-6;
        prop_assert!((moved[0] - (original[0] + dx)).abs() < tolerance);
        prop_assert!((moved[1] - (original[1] + dy)).abs() < tolerance);
        prop_assert!((back[0] - original[0]).abs() < tolerance);
        prop_assert!((back[1] - original[1]).abs() < tolerance);
    }

    #[test]
    fn filter_within_is_an_idempotent_subset(
        coords in prop::collection::vec((0.0..100.0f64, 0.0..100.0f64), 0..40),
        boxes in prop::collection::vec((0.0..90.0f64, 0.0..90.0f64, 1.0..30.0f64, 1.0..30.0f64), 0..4),
    ) {
        let subjects = points(&coords);
        let boundary = rects(&boxes);

        let once = filter_within(&subjects, &boundary).unwrap();
        let twice = filter_within(&once, &boundary).unwrap();
        prop_assert_eq!(&once, &twice);

        // order-preserving subsequence of the subjects
        let mut remaining = subjects.iter();
        for kept in once.iter() {
            prop_assert!(remaining.any(|f| f == kept));
        }
    }

    #[test]
    fn nearest_candidate_is_minimal(
        query_coords in prop::collection::vec((-1000.0..1000.0f64, -1000.0..1000.0f64), 1..10),
        candidate_coords in prop::collection::vec((-1000.0..1000.0f64, -1000.0..1000.0f64), 1..25),
    ) {
        let queries = points(&query_coords);
        let candidates = points(&candidate_coords);

        let nearest = nearest_index(&queries, &candidates).unwrap();
        let chosen = candidates.select(&nearest);
        let distances = pairwise_distance(&queries, &chosen).unwrap();

        for (query, best) in queries.iter().zip(&distances) {
            for candidate in candidates.iter() {
                prop_assert!(*best <= geometry_distance(&query.geometry, &candidate.geometry));
            }
        }
    }

    #[test]
    fn extensive_interpolation_conserves_mass(
        columns in cuts(100.0),
        rows in cuts(60.0),
        values in prop::collection::vec(0.0..10_000.0f64, 6),
    ) {
        // sources are vertical strips, targets horizontal strips, both tiling [0,100]x[0,60]
        let sources: Vec<Feature> = columns
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                Feature::new(format!("s{}", i), Geometry::rect([w[0], 0.0], [w[1], 60.0]))
                    .with_property("pop", values[i])
            })
            .collect();
        let targets: Vec<Feature> = rows
            .windows(2)
            .enumerate()
            .map(|(i, w)| Feature::new(format!("t{}", i), Geometry::rect([0.0, w[0]], [100.0, w[1]])))
            .collect();

        let source = FeatureCollection::new("source", Crs::conus_albers(), sources).unwrap();
        let target = FeatureCollection::new("target", Crs::conus_albers(), targets).unwrap();

        let result = interpolate(&source, &target, &["pop"], InterpolationMode::Extensive).unwrap();

        let expected: f64 = source.iter().map(|f| f.numeric("pop").unwrap()).sum();
        let actual: f64 = result.iter().map(|f| f.numeric("pop").unwrap()).sum();
        prop_assert!((expected - actual).abs() <= 1e-6 * expected.max(1.0));
    }
}
