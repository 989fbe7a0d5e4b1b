use async_trait::async_trait;
use serde::Deserialize;

use geoweave_core::config::LayeredConfig;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::ports::{Address, GeocodeMatch, GeocodeQuality, Geocoder};

const SERVICE: &str = "Census geocoder";

/// Structured-address endpoint of the Census Bureau geocoder
pub const CENSUS_GEOCODER_URL: &str = "https://geocoding.geo.census.gov/geocoder/locations/address";

/// Census Bureau geocoder
pub struct CensusGeocoder {
    /// Address endpoint URL
    base_url: String,

    /// Address benchmark (e.g., "Public_AR_Current")
    benchmark: String,

    /// HTTP client
    client: reqwest::Client,
}

impl CensusGeocoder {
    pub fn new(base_url: impl Into<String>, benchmark: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            benchmark: benchmark.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create against the public Census endpoint
    pub fn public(benchmark: impl Into<String>) -> Self {
        Self::new(CENSUS_GEOCODER_URL, benchmark)
    }

    /// Public endpoint with the configured benchmark and HTTP timeout
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: CENSUS_GEOCODER_URL.to_string(),
            benchmark: config.geocoder_benchmark.value.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    fn query<'a>(&'a self, address: &'a Address) -> [(&'static str, &'a str); 6] {
        [
            ("street", address.street.as_str()),
            ("city", address.city.as_str()),
            ("state", address.state.as_str()),
            ("zip", address.zip.as_str()),
            ("benchmark", self.benchmark.as_str()),
            ("format", "json"),
        ]
    }
}

#[async_trait]
impl Geocoder for CensusGeocoder {
    async fn geocode(&self, address: &Address) -> Result<GeocodeMatch> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query(address))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to connect to {}: {}", self.base_url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("API error ({}): {}", status, error_text)));
        }

        let body: GeocoderResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse response: {}", e)))?;

        Ok(interpret(address, body))
    }

    fn service_name(&self) -> &str {
        SERVICE
    }
}

fn unavailable(reason: String) -> GeoweaveError {
    GeoweaveError::ServiceUnavailable { service: SERVICE.to_string(), reason }
}

/// Grade the candidates the service returned for `address`.
///
/// A single candidate whose normalised text equals the input is exact; any
/// other non-empty candidate list takes the first candidate as a non-exact
/// match.
fn interpret(address: &Address, body: GeocoderResponse) -> GeocodeMatch {
    let matches = body.result.address_matches;
    let Some(first) = matches.first() else {
        return GeocodeMatch::no_match();
    };

    let quality = if matches.len() == 1 && normalize(&first.matched_address) == normalize(&address.to_string()) {
        GeocodeQuality::Exact
    } else {
        GeocodeQuality::NonExact
    };

    GeocodeMatch::matched(
        [first.coordinates.x, first.coordinates.y],
        first.matched_address.clone(),
        quality,
    )
}

/// Uppercase alphanumeric words separated by single spaces
fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct GeocoderResponse {
    result: GeocoderResult,
}

#[derive(Debug, Deserialize)]
struct GeocoderResult {
    #[serde(rename = "addressMatches", default)]
    address_matches: Vec<AddressMatch>,
}

#[derive(Debug, Deserialize)]
struct AddressMatch {
    #[serde(rename = "matchedAddress")]
    matched_address: String,
    coordinates: Coordinates,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    x: f64,
    y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bureau() -> Address {
        Address::new("4600 Silver Hill Rd", "Washington", "DC", "20233")
    }

    fn parse(body: &str) -> GeocoderResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_geocoder_creation() {
        let geocoder = CensusGeocoder::public("Public_AR_Census2020");
        assert_eq!(geocoder.base_url(), CENSUS_GEOCODER_URL);
        assert_eq!(geocoder.benchmark(), "Public_AR_Census2020");
        assert_eq!(geocoder.service_name(), "Census geocoder");
    }

    #[test]
    fn test_from_config_uses_benchmark() {
        let geocoder = CensusGeocoder::from_config(&LayeredConfig::with_defaults()).unwrap();
        assert_eq!(geocoder.benchmark(), "Public_AR_Current");
    }

    #[test]
    fn test_query_parameters() {
        let geocoder = CensusGeocoder::public("Public_AR_Current");
        let address = bureau();
        let query = geocoder.query(&address);
        assert_eq!(query[0], ("street", "4600 Silver Hill Rd"));
        assert_eq!(query[3], ("zip", "20233"));
        assert_eq!(query[5], ("format", "json"));
    }

    #[test]
    fn test_single_identical_match_is_exact() {
        let body = parse(
            r#"{"result": {
                "input": {"address": {"street": "4600 Silver Hill Rd"}},
                "addressMatches": [{
                    "matchedAddress": "4600 SILVER HILL RD, WASHINGTON, DC, 20233",
                    "coordinates": {"x": -76.92744, "y": 38.845985},
                    "tigerLine": {"tigerLineId": "76355984", "side": "L"}
                }]
            }}"#,
        );

        let result = interpret(&bureau(), body);
        assert_eq!(result.quality, GeocodeQuality::Exact);
        assert_eq!(result.coordinates, Some([-76.92744, 38.845985]));
        assert_eq!(result.matched_address.as_deref(), Some("4600 SILVER HILL RD, WASHINGTON, DC, 20233"));
    }

    #[test]
    fn test_corrected_or_ambiguous_match_is_non_exact() {
        let corrected = parse(
            r#"{"result": {"addressMatches": [{
                "matchedAddress": "4600 SILVER HILL RD, SUITLAND, MD, 20746",
                "coordinates": {"x": -76.927, "y": 38.846}
            }]}}"#,
        );
        assert_eq!(interpret(&bureau(), corrected).quality, GeocodeQuality::NonExact);

        let ambiguous = parse(
            r#"{"result": {"addressMatches": [
                {"matchedAddress": "4600 SILVER HILL RD, WASHINGTON, DC, 20233", "coordinates": {"x": -76.9, "y": 38.8}},
                {"matchedAddress": "4600 SILVER HILL CT, WASHINGTON, DC, 20233", "coordinates": {"x": -76.8, "y": 38.7}}
            ]}}"#,
        );
        let result = interpret(&bureau(), ambiguous);
        assert_eq!(result.quality, GeocodeQuality::NonExact);
        assert_eq!(result.coordinates, Some([-76.9, 38.8]));
    }

    #[test]
    fn test_no_candidates() {
        let body = parse(r#"{"result": {"input": {}, "addressMatches": []}}"#);
        let result = interpret(&bureau(), body);
        assert_eq!(result.quality, GeocodeQuality::NoMatch);
        assert!(result.coordinates.is_none());

        let missing = parse(r#"{"result": {}}"#);
        assert!(!interpret(&bureau(), missing).is_match());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("4600 Silver Hill Rd, Washington, DC 20233"), "4600 SILVER HILL RD WASHINGTON DC 20233");
        assert_eq!(normalize("  a,,b  "), "A B");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let geocoder = CensusGeocoder::new("http://127.0.0.1:1/geocoder", "Public_AR_Current");
        let err = geocoder.geocode(&bureau()).await.unwrap_err();
        assert!(matches!(err, GeoweaveError::ServiceUnavailable { .. }));
    }
}
