//! Error types for geoweave

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoweaveError {
    // CRS errors
    #[error("Unknown CRS: EPSG:{epsg} is not a registered coordinate system")]
    UnknownCrs { epsg: u32 },

    #[error("No projection defined from EPSG:{from} to EPSG:{to}: {reason}")]
    ProjectionUndefined { from: u32, to: u32, reason: String },

    #[error("CRS mismatch: left operand has {left}, right operand has {right}")]
    CrsMismatch { left: String, right: String },

    #[error("{operation} requires a projected CRS, got {crs} (angular units)")]
    CrsNotProjected { operation: String, crs: String },

    // Schema errors
    #[error("Field '{field}' missing from feature {feature_id}")]
    SchemaFieldMissing { field: String, feature_id: String },

    #[error("Field '{field}' on feature {feature_id} is not numeric: {value}")]
    FieldNotNumeric {
        field: String,
        feature_id: String,
        value: String,
    },

    // Geometry errors
    #[error("Malformed geometry at feature {feature_id}: {reason}")]
    MalformedGeometry { feature_id: String, reason: String },

    #[error("Collections are not aligned: {left} features vs {right} features")]
    LengthMismatch { left: usize, right: usize },

    #[error("Nearest-feature search needs at least one candidate, {queries} queries given")]
    NoCandidates { queries: usize },

    // Format errors
    #[error("Unsupported format '.{extension}'. Supported: {}", supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("{format} error: {message}")]
    FormatError { format: String, message: String },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // Collaborator errors
    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GeoweaveError {
    /// Build a `MalformedGeometry` error for a feature
    pub fn malformed(feature_id: impl Into<String>, reason: impl Into<String>) -> Self {
        GeoweaveError::MalformedGeometry { feature_id: feature_id.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, GeoweaveError>;
