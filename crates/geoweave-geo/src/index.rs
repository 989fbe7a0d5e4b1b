//! Envelope index over the features of a collection
//!
//! The index stores feature positions, not geometries. Queries return
//! candidate positions whose envelopes qualify; callers run the exact
//! predicate or distance on the collection itself.

use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};

use crate::models::{FeatureCollection, Geometry};

/// Position of a feature together with its bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedGeometry {
    /// Position of the feature in its collection
    pub id: usize,

    envelope: AABB<[f64; 2]>,
}

impl IndexedGeometry {
    /// Index entry for a geometry, `None` when it has no coordinates
    pub fn new(id: usize, geometry: &Geometry) -> Option<Self> {
        envelope_of(geometry).map(|envelope| Self { id, envelope })
    }
}

impl RTreeObject for IndexedGeometry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedGeometry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// Bounding box of a geometry as an rstar envelope
pub fn envelope_of(geometry: &Geometry) -> Option<AABB<[f64; 2]>> {
    geometry.bounds().map(|(min, max)| AABB::from_corners(min, max))
}

/// Smallest distance between two boxes; 0 when they touch or overlap.
///
/// This is a lower bound of the distance between any geometries they enclose.
pub fn envelope_gap(a: &AABB<[f64; 2]>, b: &AABB<[f64; 2]>) -> f64 {
    let axis_gap = |axis: usize| {
        let (a_lo, a_hi) = (a.lower()[axis], a.upper()[axis]);
        let (b_lo, b_hi) = (b.lower()[axis], b.upper()[axis]);
        if a_hi < b_lo {
            b_lo - a_hi
        } else if b_hi < a_lo {
            a_lo - b_hi
        } else {
            0.0
        }
    };

    let (dx, dy) = (axis_gap(0), axis_gap(1));
    (dx * dx + dy * dy).sqrt()
}

/// Spatial index for candidate pruning
pub struct SpatialIndex {
    tree: RTree<IndexedGeometry>,
}

impl SpatialIndex {
    /// Create a spatial index over all features of a collection
    pub fn from_collection(collection: &FeatureCollection) -> Self {
        Self::from_geometries(collection.geometries().enumerate())
    }

    /// Create a spatial index from positioned geometries
    pub fn from_geometries<'a>(geometries: impl IntoIterator<Item = (usize, &'a Geometry)>) -> Self {
        let indexed: Vec<IndexedGeometry> = geometries
            .into_iter()
            .filter_map(|(id, geom)| IndexedGeometry::new(id, geom))
            .collect();

        Self { tree: RTree::bulk_load(indexed) }
    }

    /// Positions whose envelopes intersect the envelope of `geometry`, ascending
    pub fn candidates(&self, geometry: &Geometry) -> Vec<usize> {
        match envelope_of(geometry) {
            Some(envelope) => self.query_envelope(&envelope),
            None => Vec::new(),
        }
    }

    /// Positions whose envelopes intersect `envelope`, ascending
    pub fn query_envelope(&self, envelope: &AABB<[f64; 2]>) -> Vec<usize> {
        let mut ids: Vec<usize> =
            self.tree.locate_in_envelope_intersecting(envelope).map(|g| g.id).collect();
        ids.sort_unstable();
        ids
    }

    /// Entries in ascending order of a lower bound on their distance to
    /// anything inside `envelope`.
    ///
    /// Entries are visited lazily by distance from the envelope centre; the
    /// bound is that distance less the envelope's half diagonal, so callers
    /// can stop once the bound exceeds their best exact distance.
    pub fn nearest_candidates<'a>(
        &'a self,
        envelope: &AABB<[f64; 2]>,
    ) -> impl Iterator<Item = (f64, usize)> + 'a {
        let centre = envelope.center();
        let (lower, upper) = (envelope.lower(), envelope.upper());
        let radius = (upper[0] - lower[0]).hypot(upper[1] - lower[1]) / 2.0;

        self.tree
            .nearest_neighbor_iter_with_distance_2(&centre)
            .map(move |(entry, distance_2)| ((distance_2.sqrt() - radius).max(0.0), entry.id))
    }

    /// Get the total number of geometries in the index
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Geometry> {
        vec![Geometry::point(0.0, 0.0), Geometry::point(5.0, 5.0), Geometry::point(10.0, 10.0)]
    }

    #[test]
    fn test_envelope_query() {
        let geoms = points();
        let index = SpatialIndex::from_geometries(geoms.iter().enumerate());
        assert_eq!(index.len(), 3);

        let window = Geometry::rect([0.0, 0.0], [6.0, 6.0]);
        assert_eq!(index.candidates(&window), vec![0, 1]);
    }

    #[test]
    fn test_nearest_candidates_order() {
        let geoms = points();
        let index = SpatialIndex::from_geometries(geoms.iter().enumerate());

        let ordered: Vec<(f64, usize)> = index.nearest_candidates(&AABB::from_point([9.0, 9.0])).collect();
        let ids: Vec<usize> = ordered.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![2, 1, 0]);
        assert!((ordered[0].0 - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_candidates_bound_envelope_gap() {
        let geoms: Vec<Geometry> = (0..400)
            .map(|i| {
                let (x, y) = ((i % 20) as f64 * 3.0, (i / 20) as f64 * 3.0);
                Geometry::rect([x, y], [x + 1.0, y + 1.0])
            })
            .collect();
        let index = SpatialIndex::from_geometries(geoms.iter().enumerate());
        let query = AABB::from_corners([10.5, 20.5], [14.0, 23.0]);

        let bounds: Vec<(f64, usize)> = index.nearest_candidates(&query).collect();
        assert_eq!(bounds.len(), 400);
        for pair in bounds.windows(2) {
            assert!(pair[0].0 <= pair[1].0);
        }
        for (bound, id) in bounds {
            let gap = envelope_gap(&envelope_of(&geoms[id]).unwrap(), &query);
            assert!(bound <= gap + 1e-9, "bound {} exceeds gap {} for {}", bound, gap, id);
        }
    }

    #[test]
    fn test_nearest_candidates_are_lazy() {
        let geoms: Vec<Geometry> = (0..10_000).map(|i| Geometry::point(i as f64, 0.0)).collect();
        let index = SpatialIndex::from_geometries(geoms.iter().enumerate());

        let first: Vec<usize> =
            index.nearest_candidates(&AABB::from_point([5000.2, 0.0])).take(3).map(|(_, id)| id).collect();
        assert_eq!(first, vec![5000, 5001, 4999]);
    }

    #[test]
    fn test_envelope_gap() {
        let a = AABB::from_corners([0.0, 0.0], [1.0, 1.0]);
        assert_eq!(envelope_gap(&a, &AABB::from_corners([0.5, 0.5], [3.0, 3.0])), 0.0);
        assert_eq!(envelope_gap(&a, &AABB::from_point([4.0, 1.0])), 3.0);
        assert_eq!(envelope_gap(&a, &AABB::from_point([4.0, 5.0])), 5.0);
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::from_geometries(std::iter::empty());
        assert!(index.is_empty());
        assert!(index.candidates(&Geometry::point(0.0, 0.0)).is_empty());
    }
}
