//! Coordinate reference systems and the registry of known systems.
//!
//! A [`Crs`] is the tag carried by every feature collection. Geometric
//! operations compare tags by EPSG code only; the [`CrsKind`] decides whether
//! linear-unit operations (distance, area, centroid) are meaningful.

use crate::error::{GeoweaveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Distance units for spatial operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Miles,
    Feet,
    UsSurveyFeet,
}

impl DistanceUnit {
    /// Length of one unit in meters
    fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.344,
            DistanceUnit::Feet => 0.3048,
            DistanceUnit::UsSurveyFeet => 1200.0 / 3937.0,
        }
    }

    /// Convert a distance value to meters
    pub fn to_meters(&self, value: f64) -> f64 {
        value * self.meters_per_unit()
    }

    /// Convert a distance value from meters to this unit
    pub fn from_meters(&self, meters: f64) -> f64 {
        meters / self.meters_per_unit()
    }
}

/// Distance with unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub value: f64,
    pub unit: DistanceUnit,
}

impl Distance {
    pub fn new(value: f64, unit: DistanceUnit) -> Self {
        Self { value, unit }
    }

    pub fn meters(value: f64) -> Self {
        Self::new(value, DistanceUnit::Meters)
    }

    pub fn to_meters(&self) -> f64 {
        self.unit.to_meters(self.value)
    }

    /// Express this distance in another unit
    pub fn convert(&self, unit: DistanceUnit) -> Self {
        Self::new(unit.from_meters(self.to_meters()), unit)
    }
}

/// Whether a CRS measures in angles or in linear units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrsKind {
    /// Latitude/longitude in degrees
    Geographic,
    /// Planar coordinates in `unit`
    Projected { unit: DistanceUnit },
}

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
    pub kind: CrsKind,
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>, kind: CrsKind) -> Self {
        Self { epsg, name: name.into(), kind }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84", CrsKind::Geographic)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::new(3857, "WGS 84 / Pseudo-Mercator", CrsKind::Projected { unit: DistanceUnit::Meters })
    }

    /// NAD83 / Conus Albers (EPSG:5070), the usual equal-area choice for US census work
    pub fn conus_albers() -> Self {
        Self::new(5070, "NAD83 / Conus Albers", CrsKind::Projected { unit: DistanceUnit::Meters })
    }

    pub fn is_projected(&self) -> bool {
        matches!(self.kind, CrsKind::Projected { .. })
    }

    /// Linear unit of a projected CRS
    pub fn linear_unit(&self) -> Option<DistanceUnit> {
        match self.kind {
            CrsKind::Projected { unit } => Some(unit),
            CrsKind::Geographic => None,
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{} ({})", self.epsg, self.name)
    }
}

/// A registered coordinate system, optionally with an explicit PROJ definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsDefinition {
    pub crs: Crs,

    /// PROJ string or WKT. When absent the authority code `EPSG:<code>` is used.
    pub proj: Option<String>,
}

impl CrsDefinition {
    pub fn new(crs: Crs) -> Self {
        Self { crs, proj: None }
    }

    pub fn with_proj(mut self, definition: impl Into<String>) -> Self {
        self.proj = Some(definition.into());
        self
    }

    /// Definition string handed to PROJ
    pub fn proj_definition(&self) -> String {
        self.proj.clone().unwrap_or_else(|| format!("EPSG:{}", self.crs.epsg))
    }
}

/// The set of coordinate systems the toolkit knows about
#[derive(Debug, Clone)]
pub struct CrsRegistry {
    entries: HashMap<u32, CrsDefinition>,
}

impl CrsRegistry {
    /// Create a registry with no entries
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Create a registry pre-populated with the builtin systems
    pub fn builtin() -> Self {
        let meters = CrsKind::Projected { unit: DistanceUnit::Meters };
        let us_feet = CrsKind::Projected { unit: DistanceUnit::UsSurveyFeet };

        let mut registry = Self::empty();
        registry.register(CrsDefinition::new(Crs::wgs84()));
        registry.register(CrsDefinition::new(Crs::new(4269, "NAD83", CrsKind::Geographic)));
        registry.register(CrsDefinition::new(Crs::new(4267, "NAD27", CrsKind::Geographic)));
        registry.register(CrsDefinition::new(Crs::web_mercator()));
        registry.register(CrsDefinition::new(Crs::new(3395, "WGS 84 / World Mercator", meters)));
        registry.register(CrsDefinition::new(Crs::conus_albers()));
        registry.register(CrsDefinition::new(Crs::new(
            2163,
            "US National Atlas Equal Area",
            meters,
        )));
        registry.register(CrsDefinition::new(Crs::new(27700, "OSGB36 / British National Grid", meters)));
        registry.register(CrsDefinition::new(Crs::new(
            2263,
            "NAD83 / New York Long Island (ftUS)",
            us_feet,
        )));
        registry.register(CrsDefinition::new(Crs::new(
            2227,
            "NAD83 / California zone 3 (ftUS)",
            us_feet,
        )));

        for zone in 1..=23 {
            registry.register(CrsDefinition::new(Crs::new(
                26900 + zone,
                format!("NAD83 / UTM zone {}N", zone),
                meters,
            )));
        }
        for zone in 1..=60 {
            registry.register(CrsDefinition::new(Crs::new(
                32600 + zone,
                format!("WGS 84 / UTM zone {}N", zone),
                meters,
            )));
            registry.register(CrsDefinition::new(Crs::new(
                32700 + zone,
                format!("WGS 84 / UTM zone {}S", zone),
                meters,
            )));
        }

        registry
    }

    /// Register (or replace) a coordinate system
    pub fn register(&mut self, definition: CrsDefinition) {
        self.entries.insert(definition.crs.epsg, definition);
    }

    pub fn contains(&self, epsg: u32) -> bool {
        self.entries.contains_key(&epsg)
    }

    /// Look up the full definition of a registered system
    pub fn definition(&self, epsg: u32) -> Result<&CrsDefinition> {
        self.entries.get(&epsg).ok_or(GeoweaveError::UnknownCrs { epsg })
    }

    /// Resolve an EPSG code to its CRS tag
    pub fn resolve(&self, epsg: u32) -> Result<Crs> {
        self.definition(epsg).map(|d| d.crs.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CrsRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_resolves_common_codes() {
        let registry = CrsRegistry::builtin();

        assert!(!registry.resolve(4326).unwrap().is_projected());
        assert!(registry.resolve(3857).unwrap().is_projected());
        assert_eq!(registry.resolve(32617).unwrap().name, "WGS 84 / UTM zone 17N");
        assert_eq!(registry.resolve(32733).unwrap().name, "WGS 84 / UTM zone 33S");
        assert_eq!(registry.resolve(26918).unwrap().name, "NAD83 / UTM zone 18N");
        assert_eq!(
            registry.resolve(2263).unwrap().linear_unit(),
            Some(DistanceUnit::UsSurveyFeet)
        );
    }

    #[test]
    fn test_unknown_crs() {
        let registry = CrsRegistry::builtin();
        let err = registry.resolve(999_999).unwrap_err();
        assert!(matches!(err, GeoweaveError::UnknownCrs { epsg: 999_999 }));
    }

    #[test]
    fn test_register_custom_definition() {
        let mut registry = CrsRegistry::empty();
        assert!(registry.is_empty());

        let local = Crs::new(
            900_001,
            "Local grid",
            CrsKind::Projected { unit: DistanceUnit::Meters },
        );
        registry.register(CrsDefinition::new(local).with_proj("+proj=eqc +datum=WGS84 +units=m"));

        let definition = registry.definition(900_001).unwrap();
        assert_eq!(definition.proj_definition(), "+proj=eqc +datum=WGS84 +units=m");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_proj_definition_uses_authority_code() {
        let definition = CrsDefinition::new(Crs::conus_albers());
        assert_eq!(definition.proj_definition(), "EPSG:5070");
    }

    #[test]
    fn test_distance_conversion() {
        let km = Distance::new(5.0, DistanceUnit::Kilometers);
        assert!((km.to_meters() - 5000.0).abs() < 1e-9);

        let mile = Distance::meters(1609.344).convert(DistanceUnit::Miles);
        assert!((mile.value - 1.0).abs() < 1e-9);

        let survey_foot = DistanceUnit::UsSurveyFeet.to_meters(3937.0);
        assert!((survey_foot - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_crs_display() {
        assert_eq!(Crs::wgs84().to_string(), "EPSG:4326 (WGS 84)");
    }
}
