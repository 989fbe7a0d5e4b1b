//! Boundary geometry joined with census table variables

use async_trait::async_trait;

use crate::data::CensusDataClient;
use crate::join::join_by_geoid;
use crate::tigerweb::TigerWebClient;
use geoweave_core::config::LayeredConfig;
use geoweave_core::error::Result;
use geoweave_core::models::FeatureCollection;
use geoweave_core::ports::{BoundarySource, CensusRequest, CensusTableSource, GEOID_FIELD};

/// Unit boundaries from one source with the requested variables from a table source
pub struct CensusBoundaries<B, T> {
    geometry: B,
    tables: T,
}

impl<B: BoundarySource, T: CensusTableSource> CensusBoundaries<B, T> {
    pub fn new(geometry: B, tables: T) -> Self {
        Self { geometry, tables }
    }
}

impl CensusBoundaries<TigerWebClient, CensusDataClient> {
    /// TIGERweb boundaries with Census Data API tables
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        Ok(Self::new(TigerWebClient::from_config(config)?, CensusDataClient::from_config(config)?))
    }
}

#[async_trait]
impl<B: BoundarySource, T: CensusTableSource> BoundarySource for CensusBoundaries<B, T> {
    async fn fetch_boundaries(&self, request: &CensusRequest) -> Result<FeatureCollection> {
        let units = self.geometry.fetch_boundaries(request).await?;
        if request.variables.is_empty() {
            return Ok(units);
        }

        let table = self.tables.fetch_table(request).await?;
        tracing::debug!(
            "Joining {} rows from {} onto {} boundaries from {}",
            table.len(),
            self.tables.service_name(),
            units.len(),
            self.geometry.service_name()
        );
        join_by_geoid(&units, &table, GEOID_FIELD)
    }

    fn service_name(&self) -> &str {
        "Census boundaries"
    }
}
