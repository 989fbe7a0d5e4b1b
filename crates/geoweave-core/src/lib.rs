//! geoweave core - domain models, CRS registry, configuration, formats and ports
//!
//! This crate holds the feature store side of the toolkit: the value types that
//! every geometric kernel in `geoweave-geo` consumes and produces, the readers
//! that materialise them from files, and the port traits for external
//! collaborators (geocoding, census boundaries and tables).

pub mod config;
pub mod error;
pub mod formats;
pub mod models;
pub mod ports;

pub use error::{GeoweaveError, Result};
