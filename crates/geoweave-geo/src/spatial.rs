//! Spatial predicates, location filters and the spatial join
//!
//! All operations require both operands to carry the same CRS tag and check
//! it before touching any geometry. Candidates are pruned with the envelope
//! index; the exact predicate runs on `geo` geometries.

use geo::{BoundingRect, Contains, Geometry as GeoGeometry, Intersects, Within};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::index::SpatialIndex;
use crate::models::{to_geo_geometry, Feature, FeatureCollection, Geometry, SpatialPredicate};
use crate::transform::check_crs_match;
use geoweave_core::error::{GeoweaveError, Result};

/// Evaluate `predicate(subject, reference)`
pub fn evaluate_predicate(subject: &Geometry, reference: &Geometry, predicate: SpatialPredicate) -> bool {
    evaluate_geo(&to_geo_geometry(subject), &to_geo_geometry(reference), predicate)
}

fn evaluate_geo(subject: &GeoGeometry, reference: &GeoGeometry, predicate: SpatialPredicate) -> bool {
    match predicate {
        SpatialPredicate::Intersects => subject.intersects(reference),
        SpatialPredicate::Within => subject.is_within(reference),
        SpatialPredicate::Contains => subject.contains(reference),
        SpatialPredicate::BoundingBox => match (subject.bounding_rect(), reference.bounding_rect()) {
            (Some(a), Some(b)) => a.intersects(&b),
            _ => false,
        },
    }
}

/// Keep the subjects whose geometry intersects the union of the boundary geometries.
///
/// Order is preserved. An empty boundary yields an empty result.
pub fn filter_within(subjects: &FeatureCollection, boundary: &FeatureCollection) -> Result<FeatureCollection> {
    filter_by(subjects, boundary, SpatialPredicate::Intersects)
}

/// Keep the subjects satisfying `predicate` against at least one boundary geometry
pub fn filter_by(
    subjects: &FeatureCollection,
    boundary: &FeatureCollection,
    predicate: SpatialPredicate,
) -> Result<FeatureCollection> {
    check_crs_match(&subjects.crs, &boundary.crs)?;

    let index = SpatialIndex::from_collection(boundary);
    let boundary_geo: Vec<GeoGeometry> = boundary.geometries().map(to_geo_geometry).collect();

    let kept: Vec<Feature> = subjects
        .iter()
        .filter(|subject| {
            let subject_geo = to_geo_geometry(&subject.geometry);
            index
                .candidates(&subject.geometry)
                .into_iter()
                .any(|i| evaluate_geo(&subject_geo, &boundary_geo[i], predicate))
        })
        .cloned()
        .collect();

    tracing::debug!(
        "{:?} filter kept {} of {} features of '{}'",
        predicate,
        kept.len(),
        subjects.len(),
        subjects.name
    );

    Ok(subjects.with_features(kept))
}

/// For each container, the number of point features intersecting it.
///
/// A point intersecting several containers is counted in each.
pub fn count_contained(containers: &FeatureCollection, points: &FeatureCollection) -> Result<Vec<usize>> {
    check_crs_match(&containers.crs, &points.crs)?;

    let index = SpatialIndex::from_collection(points);
    let points_geo: Vec<GeoGeometry> = points.geometries().map(to_geo_geometry).collect();

    Ok(containers
        .iter()
        .map(|container| {
            let container_geo = to_geo_geometry(&container.geometry);
            index
                .candidates(&container.geometry)
                .into_iter()
                .filter(|&i| points_geo[i].intersects(&container_geo))
                .count()
        })
        .collect())
}

/// Which operand's geometry the joined features carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometrySource {
    #[default]
    Left,
    Right,
}

/// Which left features appear in the join result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinKind {
    /// Only matched pairs
    #[default]
    Inner,
    /// Unmatched left features are kept once with null right attributes
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOptions {
    pub geometry: GeometrySource,
    pub kind: JoinKind,
    pub predicate: SpatialPredicate,

    /// Appended to right-hand property names that already exist on the left
    pub suffix: String,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            geometry: GeometrySource::Left,
            kind: JoinKind::Inner,
            predicate: SpatialPredicate::Intersects,
            suffix: "_right".to_string(),
        }
    }
}

impl JoinOptions {
    pub fn geometry(mut self, source: GeometrySource) -> Self {
        self.geometry = source;
        self
    }

    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn predicate(mut self, predicate: SpatialPredicate) -> Self {
        self.predicate = predicate;
        self
    }
}

/// Attach right-hand attributes to left-hand features by location.
///
/// One output feature per (left, right) pair where `predicate(left, right)`
/// holds, in left order then right order. The result geometry comes from
/// `options.geometry` regardless of which operand is passed first, and the
/// output always carries geometry. Output ids are those of the geometry side.
pub fn spatial_join(
    left: &FeatureCollection,
    right: &FeatureCollection,
    options: &JoinOptions,
) -> Result<FeatureCollection> {
    check_crs_match(&left.crs, &right.crs)?;

    if options.kind == JoinKind::Left && options.geometry == GeometrySource::Right {
        return Err(GeoweaveError::ConfigInvalid {
            key: "join_options".to_string(),
            reason: "a left join keeps unmatched left features, which have no right geometry"
                .to_string(),
        });
    }

    let index = SpatialIndex::from_collection(right);
    let right_geo: Vec<GeoGeometry> = right.geometries().map(to_geo_geometry).collect();
    let right_schema = right.schema();

    let mut features = Vec::new();
    for l in left.iter() {
        let left_geo = to_geo_geometry(&l.geometry);
        let matches: Vec<usize> = index
            .candidates(&l.geometry)
            .into_iter()
            .filter(|&i| evaluate_geo(&left_geo, &right_geo[i], options.predicate))
            .collect();

        if matches.is_empty() && options.kind == JoinKind::Left {
            let mut properties = l.properties.clone();
            for name in &right_schema {
                properties.insert(right_name(&l.properties, name, &options.suffix), serde_json::Value::Null);
            }
            features.push(Feature { id: l.id.clone(), geometry: l.geometry.clone(), properties });
            continue;
        }

        for i in matches {
            let r = &right.features[i];
            let mut properties = l.properties.clone();
            for (name, value) in &r.properties {
                properties.insert(right_name(&l.properties, name, &options.suffix), value.clone());
            }

            let (id, geometry) = match options.geometry {
                GeometrySource::Left => (l.id.clone(), l.geometry.clone()),
                GeometrySource::Right => (r.id.clone(), r.geometry.clone()),
            };
            features.push(Feature { id, geometry, properties });
        }
    }

    tracing::debug!(
        "Joined '{}' ({} features) with '{}' ({} features): {} rows",
        left.name,
        left.len(),
        right.name,
        right.len(),
        features.len()
    );

    let name = match options.geometry {
        GeometrySource::Left => left.name.clone(),
        GeometrySource::Right => right.name.clone(),
    };
    Ok(FeatureCollection { name, crs: left.crs.clone(), features })
}

fn right_name(left: &HashMap<String, serde_json::Value>, name: &str, suffix: &str) -> String {
    if left.contains_key(name) {
        format!("{}{}", name, suffix)
    } else {
        name.to_string()
    }
}
