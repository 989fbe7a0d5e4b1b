//! Attribute join between boundary features and census rows

use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::models::FeatureCollection;
use geoweave_core::ports::CensusTable;
use serde_json::Value;

/// Attach census rows to features whose `key_field` holds the row's GEOID.
///
/// Every feature is kept in order. Features without a matching row get null
/// for each table variable; variables overwrite same-named properties.
/// Numeric keys (GEOIDs stored as numbers by some tools) are compared by
/// their integer text, so leading zeros must already be present in the rows.
pub fn join_by_geoid(
    collection: &FeatureCollection,
    table: &CensusTable,
    key_field: &str,
) -> Result<FeatureCollection> {
    let rows = table.by_geoid();
    let mut unmatched = 0;

    let features = collection
        .iter()
        .map(|feature| {
            let key = match feature.property(key_field) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.as_u64().map(|n| n.to_string()).unwrap_or_else(|| n.to_string()),
                Some(other) => {
                    return Err(GeoweaveError::ConfigInvalid {
                        key: key_field.to_string(),
                        reason: format!("GEOID on feature {} is not a string or number: {}", feature.id, other),
                    })
                }
                None => {
                    return Err(GeoweaveError::SchemaFieldMissing {
                        field: key_field.to_string(),
                        feature_id: feature.id.clone(),
                    })
                }
            };

            let mut joined = feature.clone();
            match rows.get(key.as_str()) {
                Some(row) => {
                    for variable in &table.variables {
                        let value = row.values.get(variable).cloned().unwrap_or(Value::Null);
                        joined.properties.insert(variable.clone(), value);
                    }
                }
                None => {
                    unmatched += 1;
                    for variable in &table.variables {
                        joined.properties.insert(variable.clone(), Value::Null);
                    }
                }
            }
            Ok(joined)
        })
        .collect::<Result<Vec<_>>>()?;

    if unmatched > 0 {
        tracing::warn!(
            "{} of {} features in '{}' have no census row for '{}'",
            unmatched,
            collection.len(),
            collection.name,
            key_field
        );
    }

    Ok(collection.with_features(features))
}
