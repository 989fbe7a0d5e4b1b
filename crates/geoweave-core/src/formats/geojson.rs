//! GeoJSON format reader and writer

use std::fs;
use std::path::Path;

use crate::error::{GeoweaveError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{properties_from_json, FormatDataset, FormatReader, FormatValidation};
use crate::models::{Feature, FeatureCollection, Geometry};

/// GeoJSON format reader
pub struct GeoJsonReader;

impl FormatReader for GeoJsonReader {
    fn read(&self, path: &Path) -> Result<FormatDataset> {
        let content = fs::read_to_string(path)?;

        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed").to_string();
        let (features, crs) = parse_geojson(&content)?;

        Ok(FormatDataset { name, format_name: "GeoJSON".to_string(), crs, features })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json", "geojson"]
    }

    fn format_name(&self) -> &str {
        "GeoJSON"
    }

    fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let json_validation = FormatValidator::validate_json_structure(path);
        Ok(FormatValidator::merge_validations(vec![validation, json_validation]))
    }
}

/// Parse GeoJSON text into features and the declared EPSG code.
///
/// The legacy `crs` member is honoured; without it RFC 7946 fixes EPSG:4326.
/// Features with a null geometry are skipped.
pub fn parse_geojson(content: &str) -> Result<(Vec<Feature>, u32)> {
    let geojson: geojson::GeoJson = content.parse().map_err(|e| GeoweaveError::FormatError {
        format: "GeoJSON".to_string(),
        message: format!("Failed to parse GeoJSON: {}", e),
    })?;

    match geojson {
        geojson::GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|fm| fm.get("crs"))
                .and_then(extract_epsg_from_crs)
                .unwrap_or(4326);

            let mut features = Vec::with_capacity(fc.features.len());
            for (idx, feature) in fc.features.iter().enumerate() {
                if let Some(feature) = convert_feature(feature, idx)? {
                    features.push(feature);
                }
            }
            Ok((features, crs))
        }
        geojson::GeoJson::Feature(feature) => {
            Ok((convert_feature(&feature, 0)?.into_iter().collect(), 4326))
        }
        geojson::GeoJson::Geometry(geom) => {
            let geometry = convert_geometry(&geom.value, "0")?;
            Ok((vec![Feature::new("0", geometry)], 4326))
        }
    }
}

/// Convert a GeoJSON feature, `None` when it carries no geometry
fn convert_feature(feature: &geojson::Feature, idx: usize) -> Result<Option<Feature>> {
    let id = feature
        .id
        .as_ref()
        .map(|id| match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        })
        .unwrap_or_else(|| idx.to_string());

    let geometry = match &feature.geometry {
        Some(geom) => convert_geometry(&geom.value, &id)?,
        None => {
            tracing::warn!("Skipping feature {} without geometry", id);
            return Ok(None);
        }
    };

    Ok(Some(Feature {
        id,
        geometry,
        properties: properties_from_json(feature.properties.as_ref()),
    }))
}

fn convert_geometry(value: &geojson::Value, feature_id: &str) -> Result<Geometry> {
    match value {
        geojson::Value::Point(position) => {
            Ok(Geometry::Point { coordinates: convert_position(position, feature_id)? })
        }
        geojson::Value::Polygon(rings) => {
            Ok(Geometry::Polygon { coordinates: convert_rings(rings, feature_id)? })
        }
        geojson::Value::MultiPolygon(polygons) => Ok(Geometry::MultiPolygon {
            coordinates: polygons
                .iter()
                .map(|rings| convert_rings(rings, feature_id))
                .collect::<Result<_>>()?,
        }),
        other => {
            let kind = match other {
                geojson::Value::MultiPoint(_) => "MultiPoint",
                geojson::Value::LineString(_) => "LineString",
                geojson::Value::MultiLineString(_) => "MultiLineString",
                geojson::Value::GeometryCollection(_) => "GeometryCollection",
                _ => "unknown",
            };
            Err(GeoweaveError::malformed(feature_id, format!("unsupported geometry type {}", kind)))
        }
    }
}

fn convert_rings(rings: &[Vec<Vec<f64>>], feature_id: &str) -> Result<Vec<Vec<[f64; 2]>>> {
    rings
        .iter()
        .map(|ring| ring.iter().map(|p| convert_position(p, feature_id)).collect::<Result<Vec<_>>>())
        .collect()
}

fn convert_position(position: &[f64], feature_id: &str) -> Result<[f64; 2]> {
    match position {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(GeoweaveError::malformed(feature_id, "position needs at least two values")),
    }
}

/// Extract EPSG code from a legacy CRS object
fn extract_epsg_from_crs(crs: &serde_json::Value) -> Option<u32> {
    // "EPSG:3857" or "urn:ogc:def:crs:EPSG::3857"
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next()?.parse().ok()
}

/// Serialize a collection as a GeoJSON FeatureCollection.
///
/// Non-WGS84 collections carry a legacy named `crs` member so that
/// [`parse_geojson`] restores the tag.
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features: Vec<serde_json::Value> = collection
        .features
        .iter()
        .map(|f| {
            serde_json::json!({
                "type": "Feature",
                "id": f.id,
                "geometry": f.geometry.to_geojson(),
                "properties": f.properties,
            })
        })
        .collect();

    let mut document = serde_json::json!({
        "type": "FeatureCollection",
        "name": collection.name,
        "features": features,
    });
    if collection.crs.epsg != 4326 {
        document["crs"] = serde_json::json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", collection.crs.epsg) }
        });
    }

    serde_json::to_string_pretty(&document).map_err(|e| GeoweaveError::Serialization(e.to_string()))
}

/// Write a collection to a GeoJSON file
pub fn write_geojson(collection: &FeatureCollection, path: &Path) -> Result<()> {
    fs::write(path, to_geojson_string(collection)?)?;
    Ok(())
}
