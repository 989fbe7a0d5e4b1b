//! Areal-weighted interpolation
//!
//! Redistributes numeric attributes from a source partition of space onto a
//! target partition, assuming each attribute is spread uniformly over its
//! source unit. Overlap areas come from polygon clipping in a projected CRS.

use geo::{Area, BooleanOps, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::index::SpatialIndex;
use crate::models::{to_multi_polygon, Feature, FeatureCollection, ValidityMode};
use crate::transform::{check_crs_match, require_projected};
use crate::validation::ensure_valid;
use geoweave_core::error::{GeoweaveError, Result};

/// How a source value is apportioned to the targets it overlaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Totals such as population counts: `value(s) * A(s ∩ t) / A(s)`
    Extensive,
    /// Densities and rates: `value(s) * A(s ∩ t) / A(t)`
    Intensive,
}

impl FromStr for InterpolationMode {
    type Err = GeoweaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "extensive" => Ok(InterpolationMode::Extensive),
            "intensive" => Ok(InterpolationMode::Intensive),
            _ => Err(GeoweaveError::ConfigInvalid {
                key: "interpolation_mode".to_string(),
                reason: format!("Invalid interpolation mode: {}. Use extensive or intensive", s),
            }),
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationMode::Extensive => f.write_str("extensive"),
            InterpolationMode::Intensive => f.write_str("intensive"),
        }
    }
}

/// Areal interpolator with a configurable geometry validity policy
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaWeightedInterpolator {
    validity: ValidityMode,
}

/// A source unit prepared for clipping
struct SourceUnit {
    area: MultiPolygon,
    size: f64,
    values: Vec<f64>,
}

impl AreaWeightedInterpolator {
    pub fn new(validity: ValidityMode) -> Self {
        Self { validity }
    }

    pub fn validity(&self) -> ValidityMode {
        self.validity
    }

    /// Interpolate `fields` from `source` onto `target`.
    ///
    /// The result keeps the target's geometry, ids and attributes and adds
    /// (or overwrites) one numeric attribute per field. Targets that overlap
    /// no source receive 0. Source units with zero area contribute nothing.
    pub fn interpolate(
        &self,
        source: &FeatureCollection,
        target: &FeatureCollection,
        fields: &[&str],
        mode: InterpolationMode,
    ) -> Result<FeatureCollection> {
        check_crs_match(&source.crs, &target.crs)?;
        require_projected(&source.crs, "interpolate")?;

        let sources = self.prepare_sources(source, fields)?;
        let targets = target
            .iter()
            .map(|feature| self.polygonal(feature))
            .collect::<Result<Vec<_>>>()?;

        let index = SpatialIndex::from_collection(source);

        let mut features = Vec::with_capacity(target.len());
        for (feature, target_area) in target.iter().zip(&targets) {
            let target_size = target_area.unsigned_area();
            let mut totals = vec![0.0; fields.len()];

            for i in index.candidates(&feature.geometry) {
                let unit = &sources[i];
                if unit.size <= 0.0 {
                    continue;
                }

                let overlap = unit.area.intersection(target_area).unsigned_area();
                if overlap <= 0.0 {
                    continue;
                }

                let weight = match mode {
                    InterpolationMode::Extensive => overlap / unit.size,
                    InterpolationMode::Intensive if target_size > 0.0 => overlap / target_size,
                    InterpolationMode::Intensive => 0.0,
                };
                for (total, value) in totals.iter_mut().zip(&unit.values) {
                    *total += value * weight;
                }
            }

            let mut interpolated = feature.clone();
            for (field, total) in fields.iter().zip(totals) {
                interpolated.set_numeric(*field, total);
            }
            features.push(interpolated);
        }

        tracing::debug!(
            "Interpolated {} field(s) ({}) from {} source units onto {} targets",
            fields.len(),
            mode,
            source.len(),
            target.len()
        );

        Ok(target.with_features(features))
    }

    fn prepare_sources(&self, source: &FeatureCollection, fields: &[&str]) -> Result<Vec<SourceUnit>> {
        source
            .iter()
            .map(|feature| {
                let values = fields.iter().map(|field| feature.numeric(field)).collect::<Result<Vec<_>>>()?;
                let area = self.polygonal(feature)?;
                let size = area.unsigned_area();
                if size <= 0.0 {
                    tracing::debug!("Source unit {} has zero area and contributes nothing", feature.id);
                }
                Ok(SourceUnit { area, size, values })
            })
            .collect()
    }

    fn polygonal(&self, feature: &Feature) -> Result<MultiPolygon> {
        ensure_valid(feature, self.validity)?;
        to_multi_polygon(&feature.geometry).ok_or_else(|| {
            GeoweaveError::malformed(feature.id.clone(), "areal interpolation needs polygonal geometry")
        })
    }
}

/// Interpolate with lenient geometry validity
pub fn interpolate(
    source: &FeatureCollection,
    target: &FeatureCollection,
    fields: &[&str],
    mode: InterpolationMode,
) -> Result<FeatureCollection> {
    AreaWeightedInterpolator::default().interpolate(source, target, fields, mode)
}
