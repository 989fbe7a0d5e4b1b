//! Census ports: unit boundaries and attribute tables, both keyed by GEOID
//!
//! A [`BoundarySource`] yields the geometry of statistical units with their
//! identifiers and attributes; a [`CensusTableSource`] yields attribute rows
//! only. Adapters combine the two by joining on [`GEOID_FIELD`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::FeatureCollection;

/// Property holding the unit identifier on boundary features
pub const GEOID_FIELD: &str = "GEOID";

/// Summary level of the requested rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CensusGeography {
    State { state: Option<String> },
    County { state: String, county: Option<String> },
    Tract { state: String, county: Option<String> },
    BlockGroup { state: String, county: String, tract: Option<String> },
}

impl CensusGeography {
    /// Value of the `for` query parameter
    pub fn for_clause(&self) -> String {
        match self {
            CensusGeography::State { state } => format!("state:{}", state.as_deref().unwrap_or("*")),
            CensusGeography::County { county, .. } => {
                format!("county:{}", county.as_deref().unwrap_or("*"))
            }
            CensusGeography::Tract { .. } => "tract:*".to_string(),
            CensusGeography::BlockGroup { .. } => "block group:*".to_string(),
        }
    }

    /// Value of the `in` query parameter, `None` for state-level requests
    pub fn in_clause(&self) -> Option<String> {
        match self {
            CensusGeography::State { .. } => None,
            CensusGeography::County { state, .. } => Some(format!("state:{}", state)),
            CensusGeography::Tract { state, county } => Some(match county {
                Some(county) => format!("state:{} county:{}", state, county),
                None => format!("state:{}", state),
            }),
            CensusGeography::BlockGroup { state, county, tract } => Some(match tract {
                Some(tract) => format!("state:{} county:{} tract:{}", state, county, tract),
                None => format!("state:{} county:{}", state, county),
            }),
        }
    }

    /// Summary level name, as used in collection names and logs
    pub fn level(&self) -> &'static str {
        match self {
            CensusGeography::State { .. } => "state",
            CensusGeography::County { .. } => "county",
            CensusGeography::Tract { .. } => "tract",
            CensusGeography::BlockGroup { .. } => "block group",
        }
    }

    /// Geography columns whose concatenation forms the GEOID, outermost first
    pub fn geoid_columns(&self) -> &'static [&'static str] {
        match self {
            CensusGeography::State { .. } => &["state"],
            CensusGeography::County { .. } => &["state", "county"],
            CensusGeography::Tract { .. } => &["state", "county", "tract"],
            CensusGeography::BlockGroup { .. } => &["state", "county", "tract", "block group"],
        }
    }
}

/// One table request: dataset path, vintage, variables and geography
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusRequest {
    /// Dataset path such as `acs/acs5` or `dec/pl`
    pub dataset: String,
    pub year: u16,
    pub variables: Vec<String>,
    pub geography: CensusGeography,
}

impl CensusRequest {
    pub fn new(dataset: impl Into<String>, year: u16, geography: CensusGeography) -> Self {
        Self { dataset: dataset.into(), year, variables: Vec::new(), geography }
    }

    /// Builder-style variable list
    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables.extend(variables.into_iter().map(Into::into));
        self
    }
}

/// One statistical unit of a census table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusRow {
    pub geoid: String,

    /// Requested variables; suppressed values are null
    pub values: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CensusTable {
    pub variables: Vec<String>,
    pub rows: Vec<CensusRow>,
}

impl CensusTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows indexed by GEOID; later duplicates win
    pub fn by_geoid(&self) -> HashMap<&str, &CensusRow> {
        self.rows.iter().map(|row| (row.geoid.as_str(), row)).collect()
    }
}

/// Port for census attribute tables
#[async_trait]
pub trait CensusTableSource: Send + Sync {
    /// Fetch attribute rows for a table request
    async fn fetch_table(&self, request: &CensusRequest) -> Result<CensusTable>;

    /// Name of the backing service, used in logs
    fn service_name(&self) -> &str;
}

/// Port for administrative boundary sources
#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Fetch the units of `request.geography` as features tagged with their
    /// CRS. Every feature carries its identifier in [`GEOID_FIELD`] together
    /// with the requested variables the source can supply.
    async fn fetch_boundaries(&self, request: &CensusRequest) -> Result<FeatureCollection>;

    /// Name of the backing service, used in logs
    fn service_name(&self) -> &str;
}
