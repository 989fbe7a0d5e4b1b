//! Geocoding port: structured street address to a WGS84 point

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::models::{Crs, Feature, FeatureCollection, Geometry};

/// Structured US street address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self { street: street.into(), city: city.into(), state: state.into(), zip: zip.into() }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {} {}", self.street, self.city, self.state, self.zip)
    }
}

/// How closely the geocoder's answer matches the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeocodeQuality {
    Exact,
    NonExact,
    NoMatch,
}

impl GeocodeQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeQuality::Exact => "exact",
            GeocodeQuality::NonExact => "non_exact",
            GeocodeQuality::NoMatch => "no_match",
        }
    }
}

/// Geocoder answer for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    /// Longitude/latitude in EPSG:4326, `None` when nothing matched
    pub coordinates: Option<[f64; 2]>,
    pub matched_address: Option<String>,
    pub quality: GeocodeQuality,
}

impl GeocodeMatch {
    pub fn matched(coordinates: [f64; 2], matched_address: impl Into<String>, quality: GeocodeQuality) -> Self {
        Self { coordinates: Some(coordinates), matched_address: Some(matched_address.into()), quality }
    }

    pub fn no_match() -> Self {
        Self { coordinates: None, matched_address: None, quality: GeocodeQuality::NoMatch }
    }

    pub fn is_match(&self) -> bool {
        self.coordinates.is_some() && self.quality != GeocodeQuality::NoMatch
    }
}

/// Port for address geocoding services
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode a single address. An address the service cannot place is a
    /// `GeocodeQuality::NoMatch` answer, not an error.
    async fn geocode(&self, address: &Address) -> Result<GeocodeMatch>;

    /// Name of the backing service, used in logs
    fn service_name(&self) -> &str;
}

/// Points built from a batch of addresses
#[derive(Debug, Clone)]
pub struct GeocodeReport {
    /// One point per matched address, in EPSG:4326
    pub collection: FeatureCollection,

    /// Input positions of addresses that did not match
    pub unmatched: Vec<usize>,
}

/// Geocode addresses one by one into a point collection.
///
/// Feature ids are the input positions. Each feature carries the input
/// address, the matched address and the match quality. Service errors abort
/// the batch; unmatched addresses are skipped and reported.
pub async fn geocode_collection(
    geocoder: &dyn Geocoder,
    name: &str,
    addresses: &[Address],
) -> Result<GeocodeReport> {
    let mut features = Vec::with_capacity(addresses.len());
    let mut unmatched = Vec::new();

    for (idx, address) in addresses.iter().enumerate() {
        let answer = geocoder.geocode(address).await?;

        let coordinates = match answer.coordinates {
            Some(c) if answer.quality != GeocodeQuality::NoMatch => c,
            _ => {
                tracing::warn!("{}: no match for address {} ({})", geocoder.service_name(), idx, address);
                unmatched.push(idx);
                continue;
            }
        };

        let mut feature = Feature::new(idx.to_string(), Geometry::point(coordinates[0], coordinates[1]))
            .with_property("input_address", address.to_string())
            .with_property("match_quality", answer.quality.as_str());
        if let Some(matched) = answer.matched_address {
            feature = feature.with_property("matched_address", matched);
        }
        features.push(feature);
    }

    tracing::debug!(
        "Geocoded {} of {} addresses with {}",
        features.len(),
        addresses.len(),
        geocoder.service_name()
    );

    let collection = FeatureCollection::new(name, Crs::wgs84(), features)?;
    Ok(GeocodeReport { collection, unmatched })
}
