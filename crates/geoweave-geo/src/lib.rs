//! geoweave geo - geometric kernels
//!
//! CRS transformation, geometry validation, the envelope index, spatial
//! predicates and joins, nearest-feature search, centroids and areal
//! interpolation. Every operation here is a pure function of its inputs and
//! returns a new collection or fails; nothing is logged above debug level and
//! no error is swallowed.

pub mod attributes;
pub mod centroid;
pub mod index;
pub mod interpolate;
pub mod models;
pub mod nearest;
pub mod spatial;
pub mod transform;
pub mod validation;

pub use attributes::{derive_remainder, derive_share};
pub use centroid::{centroid, centroids, point_on_surface, points_on_surface};
pub use interpolate::{interpolate, AreaWeightedInterpolator, InterpolationMode};
pub use nearest::{geometry_distance, nearest_index, nearest_with_distance, pairwise_distance, Nearest};
pub use spatial::{
    count_contained, evaluate_predicate, filter_by, filter_within, spatial_join, GeometrySource,
    JoinKind, JoinOptions,
};
pub use transform::{check_crs_match, crs_match, require_projected, Transformer};
