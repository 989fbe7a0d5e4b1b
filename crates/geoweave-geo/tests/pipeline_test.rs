//! End-to-end workflows: load, reproject, then measure
//!
//! Reprojection goes through PROJ, so these tests need its data files.

use geoweave_core::formats::{geojson::write_geojson, FormatRegistry};
use geoweave_core::models::{Crs, CrsRegistry, DistanceUnit, Feature, FeatureCollection, Geometry};
use geoweave_geo::{
    centroids, count_contained, derive_share, filter_within, interpolate, nearest_with_distance,
    spatial_join, InterpolationMode, JoinOptions, Transformer,
};
use std::fs;
use tempfile::TempDir;

const TRACTS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "id": "36061000100",
            "geometry": {"type": "Polygon", "coordinates": [[[-74.02, 40.70], [-74.00, 40.70], [-74.00, 40.72], [-74.02, 40.72], [-74.02, 40.70]]]},
            "properties": {"total": 4000, "poverty": 600}
        },
        {
            "type": "Feature",
            "id": "36061000200",
            "geometry": {"type": "Polygon", "coordinates": [[[-74.00, 40.70], [-73.98, 40.70], [-73.98, 40.72], [-74.00, 40.72], [-74.00, 40.70]]]},
            "properties": {"total": 2000, "poverty": 500}
        }
    ]
}"#;

/// Route kernel debug logs to the test harness; `RUST_LOG=geoweave_geo=debug` shows them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn load_tracts(dir: &TempDir) -> FeatureCollection {
    let path = dir.path().join("tracts.geojson");
    fs::write(&path, TRACTS).unwrap();
    FormatRegistry::with_defaults().load(&path, &CrsRegistry::builtin()).unwrap()
}

fn stores() -> FeatureCollection {
    FeatureCollection::new(
        "stores",
        Crs::wgs84(),
        vec![
            Feature::new("s1", Geometry::point(-74.015, 40.705)).with_property("name", "Corner"),
            Feature::new("s2", Geometry::point(-74.012, 40.715)).with_property("name", "Market"),
            Feature::new("s3", Geometry::point(-73.99, 40.71)).with_property("name", "Deli"),
            Feature::new("s4", Geometry::point(-73.90, 40.80)).with_property("name", "Uptown"),
        ],
    )
    .unwrap()
}

#[test]
fn test_load_project_and_count() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let tracts = load_tracts(&dir);
    assert_eq!(tracts.crs, Crs::wgs84());

    let transformer = Transformer::default();
    let projected = transformer.normalize_collections(&[tracts, stores()], 5070).unwrap();
    let (tracts, stores) = (&projected[0], &projected[1]);
    assert!(tracts.crs.is_projected());

    let inside = filter_within(stores, tracts).unwrap();
    let ids: Vec<&str> = inside.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);

    assert_eq!(count_contained(tracts, stores).unwrap(), vec![2, 1]);

    let joined = spatial_join(&inside, tracts, &JoinOptions::default()).unwrap();
    assert_eq!(joined.len(), 3);
    assert_eq!(joined.features[2].numeric("total").unwrap(), 2000.0);
}

#[test]
fn test_nearest_store_distance_in_miles() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let transformer = Transformer::default();
    let tracts = transformer.transform(&load_tracts(&dir), 5070).unwrap();
    let stores = transformer.transform(&stores(), 5070).unwrap();

    let centres = centroids(&tracts).unwrap();
    let nearest = nearest_with_distance(&centres, &stores).unwrap();

    assert_eq!(nearest.len(), 2);
    assert_eq!(nearest[1].candidate, 2);
    assert_eq!(nearest[0].unit, DistanceUnit::Meters);
    // tract centres are within a mile of some store
    assert!(nearest.iter().all(|n| n.distance_in(DistanceUnit::Miles) < 1.0));
}

#[test]
fn test_interpolate_onto_grid_and_write() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let transformer = Transformer::default();
    let tracts = transformer.transform(&load_tracts(&dir), 5070).unwrap();

    // one cell covering both tracts entirely
    let (min, max) = tracts.bounds().unwrap();
    let grid = FeatureCollection::new(
        "grid",
        tracts.crs.clone(),
        vec![Feature::new("cell", Geometry::rect([min[0] - 10.0, min[1] - 10.0], [max[0] + 10.0, max[1] + 10.0]))],
    )
    .unwrap();

    let cell = interpolate(&tracts, &grid, &["total", "poverty"], InterpolationMode::Extensive).unwrap();
    assert!((cell.features[0].numeric("total").unwrap() - 6000.0).abs() < 1e-6);

    let cell = derive_share(&cell, "poverty", "total", "poverty_rate").unwrap();
    assert!((cell.features[0].numeric("poverty_rate").unwrap() - 1100.0 / 6000.0).abs() < 1e-9);

    let out = dir.path().join("cells.geojson");
    write_geojson(&cell, &out).unwrap();
    let reloaded = FormatRegistry::with_defaults().load(&out, transformer.registry()).unwrap();
    assert_eq!(reloaded.crs.epsg, 5070);
    assert_eq!(reloaded.features[0].id, "cell");
}
