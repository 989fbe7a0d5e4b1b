//! Derived attribute columns
//!
//! Census tables often give a total and a few category subtotals; the
//! remaining category is the difference. Rounding in published estimates can
//! make that difference slightly negative, so it is floored at zero before it
//! feeds any ratio.

use crate::models::FeatureCollection;
use geoweave_core::error::Result;

/// Add `output = max(total - Σ parts, 0)` to every feature
pub fn derive_remainder(
    collection: &FeatureCollection,
    total: &str,
    parts: &[&str],
    output: &str,
) -> Result<FeatureCollection> {
    let features = collection
        .iter()
        .map(|feature| {
            let mut remainder = feature.numeric(total)?;
            for part in parts {
                remainder -= feature.numeric(part)?;
            }

            let mut derived = feature.clone();
            derived.set_numeric(output, remainder.max(0.0));
            Ok(derived)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(collection.with_features(features))
}

/// Add `output = max(numerator, 0) / denominator`, 0 where the denominator is 0
pub fn derive_share(
    collection: &FeatureCollection,
    numerator: &str,
    denominator: &str,
    output: &str,
) -> Result<FeatureCollection> {
    let features = collection
        .iter()
        .map(|feature| {
            let n = feature.numeric(numerator)?.max(0.0);
            let d = feature.numeric(denominator)?;

            let mut derived = feature.clone();
            derived.set_numeric(output, if d == 0.0 { 0.0 } else { n / d });
            Ok(derived)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(collection.with_features(features))
}
