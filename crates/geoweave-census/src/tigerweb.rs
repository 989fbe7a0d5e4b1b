//! TIGERweb boundary client
//!
//! TIGERweb publishes the Census Bureau's cartographic units as ArcGIS map
//! service layers. A layer query filtered on the FIPS code columns returns
//! GeoJSON in EPSG:4326 with the `GEOID` and `NAME` of every unit.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use geoweave_core::config::LayeredConfig;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::formats::geojson::parse_geojson;
use geoweave_core::models::{CrsRegistry, Feature, FeatureCollection};
use geoweave_core::ports::{BoundarySource, CensusGeography, CensusRequest, GEOID_FIELD};
use serde_json::Value;

const SERVICE: &str = "TIGERweb";

pub const TIGERWEB_URL: &str =
    "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/tigerWMS_Current/MapServer";

/// Layer ids of the current vintage, by summary level
const DEFAULT_LAYERS: [(&str, u32); 4] =
    [("state", 80), ("county", 82), ("tract", 8), ("block group", 10)];

/// Client for TIGERweb map service layers
pub struct TigerWebClient {
    base_url: String,
    layers: HashMap<&'static str, u32>,
    client: reqwest::Client,
}

impl TigerWebClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            layers: HashMap::from(DEFAULT_LAYERS),
            client: reqwest::Client::new(),
        }
    }

    /// Create against the public current-vintage service
    pub fn public() -> Self {
        Self::new(TIGERWEB_URL)
    }

    /// Public service with the configured HTTP timeout
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, ..Self::public() })
    }

    /// Use another layer for a summary level, e.g. a census vintage service
    pub fn with_layer(mut self, level: &'static str, layer: u32) -> Self {
        self.layers.insert(level, layer);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, geography: &CensusGeography) -> Result<String> {
        let layer = self.layers.get(geography.level()).ok_or_else(|| GeoweaveError::ConfigInvalid {
            key: "layer".to_string(),
            reason: format!("no {} layer for {}", SERVICE, geography.level()),
        })?;
        Ok(format!("{}/{}/query", self.base_url.trim_end_matches('/'), layer))
    }

    fn query(geography: &CensusGeography) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            ("where", where_clause(geography)?),
            ("outFields", "GEOID,NAME".to_string()),
            ("returnGeometry", "true".to_string()),
            ("outSR", "4326".to_string()),
            ("f", "geojson".to_string()),
        ])
    }
}

#[async_trait]
impl BoundarySource for TigerWebClient {
    async fn fetch_boundaries(&self, request: &CensusRequest) -> Result<FeatureCollection> {
        let url = self.url(&request.geography)?;
        let response = self
            .client
            .get(&url)
            .query(&Self::query(&request.geography)?)
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to connect to {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("API error ({}): {}", status, error_text)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| unavailable(format!("Failed to read response: {}", e)))?;

        let units = parse_units(&request.geography, &body)?;
        tracing::debug!("Fetched {} {} boundaries from {}", units.len(), request.geography.level(), SERVICE);
        Ok(units)
    }

    fn service_name(&self) -> &str {
        SERVICE
    }
}

fn unavailable(reason: String) -> GeoweaveError {
    GeoweaveError::ServiceUnavailable { service: SERVICE.to_string(), reason }
}

/// Filter on the FIPS columns of the layer; codes must be digits
fn where_clause(geography: &CensusGeography) -> Result<String> {
    let (state, county, tract) = match geography {
        CensusGeography::State { state } => (state.as_deref(), None, None),
        CensusGeography::County { state, county } => (Some(state.as_str()), county.as_deref(), None),
        CensusGeography::Tract { state, county } => (Some(state.as_str()), county.as_deref(), None),
        CensusGeography::BlockGroup { state, county, tract } => {
            (Some(state.as_str()), Some(county.as_str()), tract.as_deref())
        }
    };

    let mut terms = Vec::new();
    for (column, code) in [("STATE", state), ("COUNTY", county), ("TRACT", tract)] {
        let Some(code) = code else { continue };
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(GeoweaveError::ConfigInvalid {
                key: column.to_lowercase(),
                reason: format!("'{}' is not a FIPS code", code),
            });
        }
        terms.push(format!("{}='{}'", column, code));
    }

    Ok(if terms.is_empty() { "1=1".to_string() } else { terms.join(" AND ") })
}

/// ArcGIS reports query failures as a 200 response with an `error` member
#[derive(Debug, Deserialize)]
struct ServiceError {
    error: ServiceErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorDetail {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Features keyed by GEOID in the CRS the payload declares
fn parse_units(geography: &CensusGeography, body: &str) -> Result<FeatureCollection> {
    if let Ok(ServiceError { error }) = serde_json::from_str::<ServiceError>(body) {
        return Err(unavailable(format!("query failed ({}): {}", error.code, error.message)));
    }

    let (features, epsg) = parse_geojson(body)?;
    let crs = CrsRegistry::builtin().resolve(epsg)?;

    let features = features
        .into_iter()
        .map(|feature| {
            let geoid = match feature.property(GEOID_FIELD) {
                Some(Value::String(geoid)) => geoid.trim().to_string(),
                _ => {
                    return Err(GeoweaveError::FormatError {
                        format: SERVICE.to_string(),
                        message: format!("feature {} has no string {}", feature.id, GEOID_FIELD),
                    })
                }
            };
            Ok(Feature { id: geoid, ..feature })
        })
        .collect::<Result<Vec<_>>>()?;

    FeatureCollection::new(geography.level(), crs, features)
}
