pub mod crs;
pub mod feature;
pub mod geometry;

pub use crs::{Crs, CrsDefinition, CrsKind, CrsRegistry, Distance, DistanceUnit};
pub use feature::{Feature, FeatureCollection};
pub use geometry::{Geometry, GeometryType, SpatialPredicate, ValidityMode};
