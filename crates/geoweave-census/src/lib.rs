//! geoweave census - US Census Bureau adapters
//!
//! HTTP implementations of the collaborator ports defined in
//! `geoweave_core::ports`: the geocoder, TIGERweb unit boundaries and Data
//! API tables, plus the GEOID join that attaches table rows to boundaries.

pub mod boundaries;
pub mod data;
pub mod geocoder;
pub mod join;
pub mod tigerweb;

pub use boundaries::CensusBoundaries;
pub use data::CensusDataClient;
pub use geocoder::CensusGeocoder;
pub use join::join_by_geoid;
pub use tigerweb::TigerWebClient;
