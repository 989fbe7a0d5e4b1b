use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::crs::Crs;
use super::geometry::{Geometry, GeometryType};
use crate::error::{GeoweaveError, Result};

/// A geometry paired with its attribute record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Identifier (source id, GEOID, or row index)
    pub id: String,

    pub geometry: Geometry,

    /// Attribute record, field name to scalar value
    pub properties: HashMap<String, serde_json::Value>,
}

impl Feature {
    pub fn new(id: impl Into<String>, geometry: Geometry) -> Self {
        Self { id: id.into(), geometry, properties: HashMap::new() }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Read a numeric attribute.
    ///
    /// Numeric strings (as returned by the census API) are accepted. Fails with
    /// `SchemaFieldMissing` when the field is absent and `FieldNotNumeric` when
    /// it cannot be read as a number.
    pub fn numeric(&self, key: &str) -> Result<f64> {
        let value = self.properties.get(key).ok_or_else(|| GeoweaveError::SchemaFieldMissing {
            field: key.to_string(),
            feature_id: self.id.clone(),
        })?;

        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        number.filter(|n| n.is_finite()).ok_or_else(|| GeoweaveError::FieldNotNumeric {
            field: key.to_string(),
            feature_id: self.id.clone(),
            value: value.to_string(),
        })
    }

    /// Store a numeric attribute. Non-finite values are stored as null.
    pub fn set_numeric(&mut self, key: impl Into<String>, value: f64) {
        let json = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
        self.properties.insert(key.into(), json);
    }
}

/// Ordered features sharing one CRS tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub name: String,
    pub crs: Crs,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a collection, rejecting structurally malformed geometries
    pub fn new(name: impl Into<String>, crs: Crs, features: Vec<Feature>) -> Result<Self> {
        for feature in &features {
            check_structure(feature)?;
        }
        Ok(Self { name: name.into(), crs, features })
    }

    /// Create an empty collection in the given CRS
    pub fn empty(name: impl Into<String>, crs: Crs) -> Self {
        Self { name: name.into(), crs, features: Vec::new() }
    }

    /// Copy of this collection's name and CRS with different features
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self { name: self.name.clone(), crs: self.crs.clone(), features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.features.iter().map(|f| &f.geometry)
    }

    /// Features at the given indices, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        let features = indices.iter().filter_map(|&i| self.features.get(i).cloned()).collect();
        self.with_features(features)
    }

    /// Union of all property names
    pub fn schema(&self) -> BTreeSet<String> {
        self.features.iter().flat_map(|f| f.properties.keys().cloned()).collect()
    }

    /// Common geometry type, `Mixed` when features disagree
    pub fn geometry_type(&self) -> Option<GeometryType> {
        let mut types = self.features.iter().map(|f| f.geometry.geometry_type());
        let first = types.next()?;
        if types.all(|t| t == first) {
            Some(first)
        } else {
            Some(GeometryType::Mixed)
        }
    }

    /// Bounding box of all geometries
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        self.features.iter().filter_map(|f| f.geometry.bounds()).reduce(|(amin, amax), (bmin, bmax)| {
            (
                [amin[0].min(bmin[0]), amin[1].min(bmin[1])],
                [amax[0].max(bmax[0]), amax[1].max(bmax[1])],
            )
        })
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Structural checks every geometry must pass to enter a collection
fn check_structure(feature: &Feature) -> Result<()> {
    if feature.geometry.coords().any(|c| !c[0].is_finite() || !c[1].is_finite()) {
        return Err(GeoweaveError::malformed(&feature.id, "coordinates must be finite"));
    }

    let polygons: Vec<&Vec<Vec<[f64; 2]>>> = match &feature.geometry {
        Geometry::Point { .. } => return Ok(()),
        Geometry::Polygon { coordinates } => vec![coordinates],
        Geometry::MultiPolygon { coordinates } => coordinates.iter().collect(),
    };

    if polygons.is_empty() {
        return Err(GeoweaveError::malformed(&feature.id, "multipolygon has no members"));
    }

    for rings in polygons {
        if rings.is_empty() {
            return Err(GeoweaveError::malformed(&feature.id, "polygon has no exterior ring"));
        }
        for (i, ring) in rings.iter().enumerate() {
            if ring.len() < 4 {
                return Err(GeoweaveError::malformed(
                    &feature.id,
                    format!("ring {} must have at least 4 points, found {}", i, ring.len()),
                ));
            }
            if ring.first() != ring.last() {
                return Err(GeoweaveError::malformed(
                    &feature.id,
                    format!("ring {} is not closed (first point != last point)", i),
                ));
            }
        }
    }

    Ok(())
}
