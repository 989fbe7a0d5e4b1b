//! Port trait definitions
//!
//! These traits define the interfaces that collaborator adapters must implement.
//! The geometric kernels never call them; callers fetch inputs through a port
//! and hand plain feature collections to the kernels.

pub mod census;
pub mod geocoding;

pub use census::{
    BoundarySource, CensusGeography, CensusRequest, CensusRow, CensusTable, CensusTableSource, GEOID_FIELD,
};
pub use geocoding::{geocode_collection, Address, GeocodeMatch, GeocodeQuality, GeocodeReport, Geocoder};
