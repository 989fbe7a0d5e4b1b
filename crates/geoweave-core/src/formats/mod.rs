//! Format abstraction layer for vector file formats
//!
//! Each format implements the `FormatReader` trait, and the `FormatRegistry` manages
//! format detection and dispatching to appropriate readers. Reads are synchronous
//! and fully materialise the file before returning.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{GeoweaveError, Result};
use crate::models::{CrsRegistry, Feature, FeatureCollection};

pub mod geojson;
pub mod shapefile;
pub mod validation;

/// Format reader trait that all format implementations must implement
pub trait FormatReader: Send + Sync {
    /// Read a dataset from the given path
    fn read(&self, path: &Path) -> Result<FormatDataset>;

    /// Get supported file extensions (e.g., ["shp"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "Shapefile", "GeoJSON")
    fn format_name(&self) -> &str;

    /// Validate file structure without full read
    fn validate(&self, _path: &Path) -> Result<FormatValidation> {
        Ok(FormatValidation::default())
    }
}

/// Result of format validation
#[derive(Debug, Clone, Default)]
pub struct FormatValidation {
    /// Validation errors that prevent reading
    pub errors: Vec<String>,

    /// Warnings that don't prevent reading but indicate potential issues
    pub warnings: Vec<String>,
}

impl FormatValidation {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Raw dataset returned by format readers, before CRS resolution
#[derive(Debug, Clone)]
pub struct FormatDataset {
    /// Dataset name (file stem)
    pub name: String,

    pub format_name: String,

    /// CRS EPSG code as declared by the file
    pub crs: u32,

    pub features: Vec<Feature>,
}

/// Convert a JSON property map into the attribute record of a feature
pub(crate) fn properties_from_json(
    map: Option<&serde_json::Map<String, serde_json::Value>>,
) -> HashMap<String, serde_json::Value> {
    map.map(|props| props.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Central registry for format readers
pub struct FormatRegistry {
    readers: Vec<Box<dyn FormatReader>>,
}

impl FormatRegistry {
    /// Create a new empty format registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with the GeoJSON and Shapefile readers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(geojson::GeoJsonReader));
        registry.register(Box::new(shapefile::ShapefileFormatReader));
        registry
    }

    /// Register a format reader
    pub fn register(&mut self, reader: Box<dyn FormatReader>) {
        self.readers.push(reader);
    }

    /// Detect format and return appropriate reader
    pub fn detect_format(&self, path: &Path) -> Result<&dyn FormatReader> {
        let extension = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            GeoweaveError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            }
        })?;
        let extension = extension.to_ascii_lowercase();

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| GeoweaveError::UnsupportedFormat {
                extension,
                supported: self.supported_formats(),
            })
    }

    /// Read a file into a validated feature collection with a resolved CRS
    pub fn load(&self, path: &Path, crs_registry: &CrsRegistry) -> Result<FeatureCollection> {
        let reader = self.detect_format(path)?;

        let validation = reader.validate(path)?;
        validation::FormatValidator::validation_to_result(&validation, reader.format_name())?;
        for warning in &validation.warnings {
            tracing::warn!("{}: {}", path.display(), warning);
        }

        let dataset = reader.read(path)?;
        let crs = crs_registry.resolve(dataset.crs)?;
        tracing::debug!(
            "Loaded {} features from {} ({}, {})",
            dataset.features.len(),
            path.display(),
            dataset.format_name,
            crs
        );

        FeatureCollection::new(dataset.name, crs, dataset.features)
    }

    /// Get list of all supported format extensions
    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }

    /// Get all registered readers
    pub fn readers(&self) -> &[Box<dyn FormatReader>] {
        &self.readers
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_formats() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.readers().len(), 2);
        assert_eq!(registry.supported_formats(), vec!["json", "geojson", "shp"]);
    }

    #[test]
    fn test_format_detection() {
        let registry = FormatRegistry::with_defaults();

        let reader = registry.detect_format(Path::new("tracts.geojson")).unwrap();
        assert_eq!(reader.format_name(), "GeoJSON");

        let reader = registry.detect_format(Path::new("TRACTS.SHP")).unwrap();
        assert_eq!(reader.format_name(), "Shapefile");
    }

    #[test]
    fn test_unsupported_format() {
        let registry = FormatRegistry::with_defaults();
        let err = registry.detect_format(Path::new("tracts.gpkg")).err().unwrap();
        assert!(matches!(err, GeoweaveError::UnsupportedFormat { .. }));

        assert!(registry.detect_format(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_empty_registry() {
        let registry = FormatRegistry::new();
        assert!(registry.readers().is_empty());
        assert!(registry.detect_format(Path::new("a.geojson")).is_err());
    }

    #[test]
    fn test_format_validation_flags() {
        let validation =
            FormatValidation { errors: vec![], warnings: vec!["No CRS specified".to_string()] };
        assert!(validation.is_valid());
        assert!(validation.has_warnings());
    }
}
