//! Range, radius and k-nearest-neighbor queries over a fixed 2D point set.
//!
//! One `rstar` tree serves every query kind. Results are point indices into
//! the slice the index was built from.

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

#[derive(Debug, Clone)]
pub struct SpatialPointIndex {
    points: Vec<[f64; 2]>,
    tree: RTree<IndexedPoint>,
}

impl SpatialPointIndex {
    pub fn new(points: &[[f64; 2]]) -> Self {
        let items = points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(*p, i))
            .collect();
        Self {
            points: points.to_vec(),
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> [f64; 2] {
        self.points[index]
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Indices of points inside the half-open box `[x0, x1) x [y0, y1)`, ascending
    pub fn in_window(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<usize> {
        let envelope = AABB::from_corners([x0, y0], [x1, y1]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|item| {
                let [x, y] = *item.geom();
                x < x1 && y < y1
            })
            .map(|item| item.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Indices of points at distance `<= radius` from `center`, ascending
    pub fn within_radius(&self, center: [f64; 2], radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        let envelope = AABB::from_corners(
            [center[0] - radius, center[1] - radius],
            [center[0] + radius, center[1] + radius],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|item| distance_2(*item.geom(), center) <= r2)
            .map(|item| item.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Up to `k` nearest points strictly closer than `max_distance`, nearest
    /// first, as `(index, distance)`. `exclude` drops one index (the query
    /// point itself when it belongs to the set).
    pub fn nearest_within(
        &self,
        center: [f64; 2],
        k: usize,
        max_distance: f64,
        exclude: Option<usize>,
    ) -> Vec<(usize, f64)> {
        let max_2 = max_distance * max_distance;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&center)
            .take_while(|(_, d2)| *d2 < max_2)
            .filter(|(item, _)| Some(item.data) != exclude)
            .take(k)
            .map(|(item, d2)| (item.data, d2.sqrt()))
            .collect()
    }

    /// Nearest point and its distance
    pub fn nearest(&self, center: [f64; 2]) -> Option<(usize, f64)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&center)
            .next()
            .map(|(item, d2)| (item.data, d2.sqrt()))
    }
}

pub(crate) fn distance_2(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

pub(crate) fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    distance_2(a, b).sqrt()
}
