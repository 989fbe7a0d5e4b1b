//! Census Data API client
//!
//! The API answers a table request with a JSON array of arrays: a header row
//! of column names followed by one row of strings per statistical unit. The
//! geography columns (`state`, `county`, `tract`, ...) come last and their
//! concatenation is the unit's GEOID.

use async_trait::async_trait;
use std::collections::HashMap;

use geoweave_core::config::LayeredConfig;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::ports::{CensusRequest, CensusRow, CensusTable, CensusTableSource};
use serde_json::Value;

const SERVICE: &str = "Census Data API";

pub const CENSUS_DATA_URL: &str = "https://api.census.gov/data";

/// Published estimates at or below this are annotation codes
/// (-666666666 "not computed", -999999999 "not available", ...)
const ANNOTATION_THRESHOLD: f64 = -111_111_111.0;

/// Client for api.census.gov tables
pub struct CensusDataClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CensusDataClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { base_url: base_url.into(), api_key, client: reqwest::Client::new() }
    }

    /// Create against the public endpoint
    pub fn public(api_key: Option<String>) -> Self {
        Self::new(CENSUS_DATA_URL, api_key)
    }

    /// Public endpoint with the configured API key and HTTP timeout
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: CENSUS_DATA_URL.to_string(),
            api_key: config.census_api_key.value.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, request: &CensusRequest) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            request.year,
            request.dataset.trim_matches('/')
        )
    }

    fn query(&self, request: &CensusRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("get", request.variables.join(",")),
            ("for", request.geography.for_clause()),
        ];
        if let Some(within) = request.geography.in_clause() {
            query.push(("in", within));
        }
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        query
    }
}

#[async_trait]
impl CensusTableSource for CensusDataClient {
    async fn fetch_table(&self, request: &CensusRequest) -> Result<CensusTable> {
        if request.variables.is_empty() {
            return Err(GeoweaveError::ConfigInvalid {
                key: "variables".to_string(),
                reason: "a census request needs at least one variable".to_string(),
            });
        }

        let url = self.url(request);
        let response = self
            .client
            .get(&url)
            .query(&self.query(request))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to connect to {}: {}", url, e)))?;

        // No rows for the requested geography
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            tracing::warn!("{} returned no rows for {}", SERVICE, url);
            return Ok(CensusTable { variables: request.variables.clone(), rows: Vec::new() });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("API error ({}): {}", status, error_text)));
        }

        let rows: Vec<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse response: {}", e)))?;

        let table = parse_table(request, rows)?;
        tracing::debug!("Fetched {} rows of {} from {}", table.len(), request.dataset, SERVICE);
        Ok(table)
    }

    fn service_name(&self) -> &str {
        SERVICE
    }
}

fn unavailable(reason: String) -> GeoweaveError {
    GeoweaveError::ServiceUnavailable { service: SERVICE.to_string(), reason }
}

fn malformed(message: impl Into<String>) -> GeoweaveError {
    GeoweaveError::FormatError { format: SERVICE.to_string(), message: message.into() }
}

/// Turn the header-plus-rows payload into a table keyed by GEOID
fn parse_table(request: &CensusRequest, rows: Vec<Vec<Value>>) -> Result<CensusTable> {
    let mut rows = rows.into_iter();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| malformed("response has no header row"))?
        .into_iter()
        .map(|cell| match cell {
            Value::String(name) => name,
            other => other.to_string(),
        })
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| malformed(format!("response has no '{}' column", name)))
    };

    let geoid_columns = request
        .geography
        .geoid_columns()
        .iter()
        .map(|&name| Ok((name, column(name)?)))
        .collect::<Result<Vec<_>>>()?;
    let variable_columns = request
        .variables
        .iter()
        .map(|name| Ok((name.clone(), column(name.as_str())?)))
        .collect::<Result<Vec<_>>>()?;

    let rows = rows
        .enumerate()
        .map(|(n, row)| {
            if row.len() != header.len() {
                return Err(malformed(format!(
                    "row {} has {} cells, header has {}",
                    n + 1,
                    row.len(),
                    header.len()
                )));
            }

            let geoid = geoid_columns
                .iter()
                .map(|&(name, i)| {
                    row[i].as_str().ok_or_else(|| {
                        malformed(format!("row {} has a non-string '{}' cell: {}", n + 1, name, row[i]))
                    })
                })
                .collect::<Result<String>>()?;
            let values: HashMap<String, Value> = variable_columns
                .iter()
                .map(|(name, i)| (name.clone(), cell_value(&row[*i])))
                .collect();

            Ok(CensusRow { geoid, values })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CensusTable { variables: request.variables.clone(), rows })
}

/// Numeric strings become numbers, annotation codes become null
fn cell_value(cell: &Value) -> Value {
    let number = match cell {
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(number) => number,
            Err(_) => return cell.clone(),
        },
        Value::Number(n) => match n.as_f64() {
            Some(number) => number,
            None => return cell.clone(),
        },
        other => return other.clone(),
    };

    if number <= ANNOTATION_THRESHOLD || !number.is_finite() {
        return Value::Null;
    }
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}
