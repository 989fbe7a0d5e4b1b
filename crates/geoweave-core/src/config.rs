use crate::error::{GeoweaveError, Result};
use crate::models::{DistanceUnit, ValidityMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Set explicitly by the calling application
    Override,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Override => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for geoweave
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// EPSG code inputs are normalised to before measuring
    pub working_crs: ConfigValue<u32>,
    pub distance_unit: ConfigValue<DistanceUnit>,
    pub geometry_validity: ConfigValue<ValidityMode>,
    pub geocoder_benchmark: ConfigValue<String>,
    pub http_timeout_secs: ConfigValue<u64>,
    pub census_api_key: ConfigValue<Option<String>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            working_crs: ConfigValue::new(4326, ConfigSource::Default),
            distance_unit: ConfigValue::new(DistanceUnit::Meters, ConfigSource::Default),
            geometry_validity: ConfigValue::new(ValidityMode::Lenient, ConfigSource::Default),
            geocoder_benchmark: ConfigValue::new(
                "Public_AR_Current".to_string(),
                ConfigSource::Default,
            ),
            http_timeout_secs: ConfigValue::new(30, ConfigSource::Default),
            census_api_key: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| GeoweaveError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| GeoweaveError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(crs) = file_config.working_crs {
            self.working_crs.update(crs, ConfigSource::File);
        }

        if let Some(distance_unit) = file_config.distance_unit {
            self.distance_unit.update(distance_unit, ConfigSource::File);
        }

        if let Some(geometry_validity) = file_config.geometry_validity {
            self.geometry_validity.update(geometry_validity, ConfigSource::File);
        }

        if let Some(benchmark) = file_config.geocoder_benchmark {
            self.geocoder_benchmark.update(benchmark, ConfigSource::File);
        }

        if let Some(timeout) = file_config.http_timeout_secs {
            self.http_timeout_secs.update(timeout, ConfigSource::File);
        }

        if let Some(key) = file_config.census_api_key {
            self.census_api_key.update(Some(key), ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // GEOWEAVE_WORKING_CRS
        if let Ok(crs_str) = env::var("GEOWEAVE_WORKING_CRS") {
            match crs_str.parse::<u32>() {
                Ok(crs) => self.working_crs.update(crs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_WORKING_CRS value '{}': expected integer EPSG code",
                    crs_str
                ),
            }
        }

        // GEOWEAVE_DISTANCE_UNIT
        if let Ok(unit_str) = env::var("GEOWEAVE_DISTANCE_UNIT") {
            match parse_distance_unit(&unit_str) {
                Ok(unit) => self.distance_unit.update(unit, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_DISTANCE_UNIT value '{}': expected meters, kilometers, miles, feet, or us-feet",
                    unit_str
                ),
            }
        }

        // GEOWEAVE_GEOMETRY_VALIDITY
        if let Ok(validity_str) = env::var("GEOWEAVE_GEOMETRY_VALIDITY") {
            match parse_validity_mode(&validity_str) {
                Ok(validity) => self.geometry_validity.update(validity, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_GEOMETRY_VALIDITY value '{}': expected strict or lenient",
                    validity_str
                ),
            }
        }

        // GEOWEAVE_GEOCODER_BENCHMARK
        if let Ok(benchmark) = env::var("GEOWEAVE_GEOCODER_BENCHMARK") {
            self.geocoder_benchmark.update(benchmark, ConfigSource::Environment);
        }

        // GEOWEAVE_HTTP_TIMEOUT_SECS
        if let Ok(timeout_str) = env::var("GEOWEAVE_HTTP_TIMEOUT_SECS") {
            match timeout_str.parse::<u64>() {
                Ok(timeout) => self.http_timeout_secs.update(timeout, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_HTTP_TIMEOUT_SECS value '{}': expected whole seconds",
                    timeout_str
                ),
            }
        }

        // CENSUS_API_KEY keeps the name the census tooling ecosystem uses
        if let Ok(key) = env::var("CENSUS_API_KEY") {
            if !key.trim().is_empty() {
                self.census_api_key.update(Some(key), ConfigSource::Environment);
            }
        }

        self
    }

    /// Apply explicit overrides from the calling application
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(crs) = overrides.working_crs {
            self.working_crs.update(crs, ConfigSource::Override);
        }

        if let Some(distance_unit) = overrides.distance_unit {
            self.distance_unit.update(distance_unit, ConfigSource::Override);
        }

        if let Some(geometry_validity) = overrides.geometry_validity {
            self.geometry_validity.update(geometry_validity, ConfigSource::Override);
        }

        if let Some(benchmark) = overrides.geocoder_benchmark {
            self.geocoder_benchmark.update(benchmark, ConfigSource::Override);
        }

        if let Some(timeout) = overrides.http_timeout_secs {
            self.http_timeout_secs.update(timeout, ConfigSource::Override);
        }

        if let Some(key) = overrides.census_api_key {
            self.census_api_key.update(Some(key), ConfigSource::Override);
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.value)
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "working_crs".to_string(),
            (format!("EPSG:{}", self.working_crs.value), self.working_crs.source),
        );

        map.insert(
            "distance_unit".to_string(),
            (format!("{:?}", self.distance_unit.value), self.distance_unit.source),
        );

        map.insert(
            "geometry_validity".to_string(),
            (format!("{:?}", self.geometry_validity.value), self.geometry_validity.source),
        );

        map.insert(
            "geocoder_benchmark".to_string(),
            (self.geocoder_benchmark.value.clone(), self.geocoder_benchmark.source),
        );

        map.insert(
            "http_timeout_secs".to_string(),
            (self.http_timeout_secs.value.to_string(), self.http_timeout_secs.source),
        );

        // Never expose the key itself
        let key_state = if self.census_api_key.value.is_some() { "set" } else { "unset" };
        map.insert(
            "census_api_key".to_string(),
            (key_state.to_string(), self.census_api_key.source),
        );

        map
    }
}

impl Default for LayeredConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    working_crs: Option<u32>,
    distance_unit: Option<DistanceUnit>,
    geometry_validity: Option<ValidityMode>,
    geocoder_benchmark: Option<String>,
    http_timeout_secs: Option<u64>,
    census_api_key: Option<String>,
}

/// Explicit overrides supplied by the calling application
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub working_crs: Option<u32>,
    pub distance_unit: Option<DistanceUnit>,
    pub geometry_validity: Option<ValidityMode>,
    pub geocoder_benchmark: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub census_api_key: Option<String>,
}

/// Parse distance unit from string
pub fn parse_distance_unit(s: &str) -> Result<DistanceUnit> {
    match s.to_lowercase().as_str() {
        "meters" | "m" => Ok(DistanceUnit::Meters),
        "kilometers" | "km" => Ok(DistanceUnit::Kilometers),
        "miles" | "mi" => Ok(DistanceUnit::Miles),
        "feet" | "ft" => Ok(DistanceUnit::Feet),
        "us-feet" | "us_feet" | "ftus" => Ok(DistanceUnit::UsSurveyFeet),
        _ => Err(GeoweaveError::ConfigInvalid {
            key: "distance_unit".to_string(),
            reason: format!(
                "Invalid distance unit: {}. Use meters, kilometers, miles, feet, or us-feet",
                s
            ),
        }),
    }
}

/// Parse validity mode from string
pub fn parse_validity_mode(s: &str) -> Result<ValidityMode> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(ValidityMode::Strict),
        "lenient" => Ok(ValidityMode::Lenient),
        _ => Err(GeoweaveError::ConfigInvalid {
            key: "geometry_validity".to_string(),
            reason: format!("Invalid validity mode: {}. Use strict or lenient", s),
        }),
    }
}
