//! CRS transformation and normalization

use proj::Proj;

use crate::models::{Crs, FeatureCollection, Geometry};
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::models::{CrsDefinition, CrsRegistry};

/// Check if two CRS are the same
pub fn crs_match(crs1: &Crs, crs2: &Crs) -> bool {
    crs1.epsg == crs2.epsg
}

/// Fail with `CrsMismatch` unless both operands carry the same CRS tag
pub fn check_crs_match(left: &Crs, right: &Crs) -> Result<()> {
    if !crs_match(left, right) {
        return Err(GeoweaveError::CrsMismatch { left: left.to_string(), right: right.to_string() });
    }
    Ok(())
}

/// Fail with `CrsNotProjected` when `crs` measures in angular units
pub fn require_projected(crs: &Crs, operation: &str) -> Result<()> {
    if !crs.is_projected() {
        return Err(GeoweaveError::CrsNotProjected {
            operation: operation.to_string(),
            crs: crs.to_string(),
        });
    }
    Ok(())
}

/// Reproject a geometry between two registered systems
pub fn reproject_geometry(
    geometry: &Geometry,
    from: &CrsDefinition,
    to: &CrsDefinition,
) -> Result<Geometry> {
    if crs_match(&from.crs, &to.crs) {
        return Ok(geometry.clone());
    }

    let proj = build_projection(from, to)?;
    project(&proj, geometry, from, to)
}

fn build_projection(from: &CrsDefinition, to: &CrsDefinition) -> Result<Proj> {
    let from_def = from.proj_definition();
    let to_def = to.proj_definition();

    Proj::new_known_crs(&from_def, &to_def, None).map_err(|e| GeoweaveError::ProjectionUndefined {
        from: from.crs.epsg,
        to: to.crs.epsg,
        reason: format!("Failed to create projection from {} to {}: {}", from_def, to_def, e),
    })
}

fn project(proj: &Proj, geometry: &Geometry, from: &CrsDefinition, to: &CrsDefinition) -> Result<Geometry> {
    geometry.try_map_coords(|[x, y]| {
        let undefined = |reason: String| GeoweaveError::ProjectionUndefined {
            from: from.crs.epsg,
            to: to.crs.epsg,
            reason,
        };

        let (px, py) =
            proj.convert((x, y)).map_err(|e| undefined(format!("Projection failed at ({}, {}): {}", x, y, e)))?;
        if !px.is_finite() || !py.is_finite() {
            return Err(undefined(format!("({}, {}) is outside the target system's domain", x, y)));
        }
        Ok([px, py])
    })
}

/// Reprojects feature collections between the systems of a registry
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    registry: CrsRegistry,
}

impl Transformer {
    pub fn new(registry: CrsRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CrsRegistry {
        &self.registry
    }

    /// Re-project every geometry of `collection` into `target_epsg`.
    ///
    /// The result carries the resolved target tag. Attributes and feature
    /// order are unchanged.
    pub fn transform(&self, collection: &FeatureCollection, target_epsg: u32) -> Result<FeatureCollection> {
        let to = self.registry.definition(target_epsg)?;
        let from = self.registry.definition(collection.crs.epsg)?;

        if crs_match(&from.crs, &to.crs) {
            let mut same = collection.clone();
            same.crs = to.crs.clone();
            return Ok(same);
        }

        let proj = build_projection(from, to)?;
        let features = collection
            .iter()
            .map(|feature| {
                let mut projected = feature.clone();
                projected.geometry = project(&proj, &feature.geometry, from, to)?;
                Ok(projected)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Transformed {} features of '{}' from {} to {}",
            features.len(),
            collection.name,
            from.crs,
            to.crs
        );

        Ok(FeatureCollection { name: collection.name.clone(), crs: to.crs.clone(), features })
    }

    /// Reproject a single geometry between two registered EPSG codes
    pub fn reproject_geometry(&self, geometry: &Geometry, from_epsg: u32, to_epsg: u32) -> Result<Geometry> {
        reproject_geometry(geometry, self.registry.definition(from_epsg)?, self.registry.definition(to_epsg)?)
    }

    /// Bring several collections into one CRS, preserving their order
    pub fn normalize_collections(
        &self,
        collections: &[FeatureCollection],
        target_epsg: u32,
    ) -> Result<Vec<FeatureCollection>> {
        collections.iter().map(|c| self.transform(c, target_epsg)).collect()
    }
}
