//! Planar road graphs: construction from the adjacency interchange format,
//! subdivision, crossover detection and bounded graph search.

pub mod crossover;
pub mod search;
pub mod subdivide;

pub use crossover::find_crossings;
pub use search::reachable_within;
pub use subdivide::{SubdividedGraph, subdivide};

use std::collections::{BTreeMap, BTreeSet};

use roadnet_common::{AdjacencyMap, PixelKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Undirected graph embedded in the plane. Edges are unique `(a, b)` pairs
/// with `a < b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadGraph {
    pub points: Vec<[f64; 2]>,
    pub edges: Vec<(usize, usize)>,
}

impl RoadGraph {
    /// Build the canonical graph from an adjacency mapping. Vertex ids are
    /// the union of keys and neighbor ids; `normalize` maps a raw id
    /// `(first, second)` to an `(x, y)` position.
    pub fn from_adjacency<F>(adjacency: &AdjacencyMap, normalize: F) -> Self
    where
        F: Fn([f64; 2]) -> [f64; 2],
    {
        let mut ids: BTreeSet<PixelKey> = BTreeSet::new();
        for (key, neighbors) in adjacency {
            ids.insert(*key);
            ids.extend(neighbors.iter().copied());
        }
        let lookup: BTreeMap<PixelKey, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let points = ids
            .iter()
            .map(|&(a, b)| normalize([a as f64, b as f64]))
            .collect();

        let mut edges = BTreeSet::new();
        for (key, neighbors) in adjacency {
            let u = lookup[key];
            for neighbor in neighbors {
                let v = lookup[neighbor];
                if u != v {
                    edges.insert((u.min(v), u.max(v)));
                }
            }
        }

        Self {
            points,
            edges: edges.into_iter().collect(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Neighbor lists, derived on demand
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.points.len()];
        for &(a, b) in &self.edges {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        adjacency
    }

    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.points.len()];
        for &(a, b) in &self.edges {
            degrees[a] += 1;
            degrees[b] += 1;
        }
        degrees
    }

    /// Edge geometry with its endpoint vertex ids
    pub fn segments(&self) -> Vec<(geo::Line<f64>, [usize; 2])> {
        self.edges
            .iter()
            .map(|&(a, b)| {
                let (pa, pb) = (self.points[a], self.points[b]);
                (geo::Line::new((pa[0], pa[1]), (pb[0], pb[1])), [a, b])
            })
            .collect()
    }
}

/// Mapping from raw ground-truth vertex ids to `(x, y)` positions used by
/// the supported datasets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordConvention {
    /// Ids are already `(x, y)`
    Identity,
    /// Ids are `(row, col)`; `x = col`, `y = row`
    #[default]
    RowCol,
    /// Ids are `(row, col)` with a bottom-left origin: `x = col`, `y = size - row`
    FlippedRowCol { size: f64 },
}

impl CoordConvention {
    pub fn apply(&self, id: [f64; 2]) -> [f64; 2] {
        match *self {
            Self::Identity => id,
            Self::RowCol => [id[1], id[0]],
            Self::FlippedRowCol { size } => [id[1], size - id[0]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_adjacency_merges_directions() {
        let mut adjacency = AdjacencyMap::new();
        adjacency.insert((0, 0), vec![(0, 10), (0, 0)]);
        adjacency.insert((0, 10), vec![(0, 0), (10, 10)]);

        let graph = RoadGraph::from_adjacency(&adjacency, |p| CoordConvention::RowCol.apply(p));

        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.points[1], [10.0, 0.0]);
        assert_eq!(graph.degrees(), vec![1, 2, 1]);
    }

    #[test]
    fn test_coord_conventions() {
        assert_eq!(CoordConvention::Identity.apply([1.0, 2.0]), [1.0, 2.0]);
        assert_eq!(CoordConvention::RowCol.apply([1.0, 2.0]), [2.0, 1.0]);
        assert_eq!(
            CoordConvention::FlippedRowCol { size: 400.0 }.apply([1.0, 2.0]),
            [2.0, 399.0]
        );
    }
}
