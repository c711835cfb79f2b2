//! Accepted edges → predicted graph → georeferenced road segments.

use std::collections::{BTreeMap, BTreeSet};

use geo::{AffineTransform, Coord};
use roadnet_common::{AdjacencyMap, GeoReference, PixelKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::coords::{affine_from_gdal, transform_for_crs};
use crate::edges::EdgeAggregate;
use crate::error::{Result, RoadGraphError};
use crate::traits::CoordinateTransform;

/// Candidate vertices in pixel `(x, y)` plus accepted directed edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictedGraph {
    pub points: Vec<[f64; 2]>,
    pub edges: Vec<(usize, usize)>,
}

impl PredictedGraph {
    /// Inverse of [`Self::to_adjacency`]: one vertex per distinct key, one
    /// directed edge per neighbor entry
    pub fn from_adjacency(adjacency: &AdjacencyMap) -> Self {
        let mut ids: BTreeMap<PixelKey, usize> = BTreeMap::new();
        let mut points = Vec::new();
        let mut id_of = |key: PixelKey| {
            *ids.entry(key).or_insert_with(|| {
                points.push([key.1 as f64, key.0 as f64]);
                points.len() - 1
            })
        };

        let mut edges = Vec::new();
        let mut seen = BTreeSet::new();
        for (&from, neighbors) in adjacency {
            let a = id_of(from);
            for &to in neighbors {
                let b = id_of(to);
                if a != b && seen.insert((a, b)) {
                    edges.push((a, b));
                }
            }
        }
        Self { points, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Interchange form keyed by integer `(row, col)`. Every accepted edge
    /// is listed from both endpoints, each neighbor once.
    pub fn to_adjacency(&self) -> AdjacencyMap {
        let key = |i: usize| -> PixelKey {
            let [x, y] = self.points[i];
            (y.round() as i64, x.round() as i64)
        };

        let mut adjacency = AdjacencyMap::new();
        for &(a, b) in &self.edges {
            let (ka, kb) = (key(a), key(b));
            for (from, to) in [(ka, kb), (kb, ka)] {
                let neighbors = adjacency.entry(from).or_default();
                if !neighbors.contains(&to) {
                    neighbors.push(to);
                }
            }
        }
        adjacency
    }
}

/// Geographic two-point segment, `[longitude, latitude]` ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub start: [f64; 2],
    pub end: [f64; 2],
}

#[derive(Debug, Clone, Copy)]
pub struct GraphAssembler {
    /// Averages must be strictly above this
    pub threshold: f64,
}

impl GraphAssembler {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn assemble(&self, points: Vec<[f64; 2]>, aggregate: &EdgeAggregate) -> PredictedGraph {
        let edges: Vec<(usize, usize)> = aggregate
            .averages()
            .filter(|(_, average)| *average > self.threshold)
            .map(|(key, _)| key)
            .collect();
        debug!(
            candidates = aggregate.len(),
            accepted = edges.len(),
            threshold = self.threshold,
            "assembled graph"
        );
        PredictedGraph { points, edges }
    }
}

/// Georeference every edge through the raster's transform and CRS. Any
/// failure is logged and yields no segments.
pub fn georeference(graph: &PredictedGraph, geo: &GeoReference) -> Vec<RoadSegment> {
    match transform_for_crs(&geo.crs) {
        Ok(transform) => georeference_using(graph, geo, transform.as_ref()),
        Err(err) => {
            error!(crs = %geo.crs, edges = graph.edge_count(), "georeferencing failed: {err}");
            Vec::new()
        }
    }
}

/// Like [`georeference`], with a caller-supplied transform in place of the
/// CRS lookup
pub fn georeference_using(
    graph: &PredictedGraph,
    geo: &GeoReference,
    transform: &dyn CoordinateTransform,
) -> Vec<RoadSegment> {
    let result = geo
        .validate()
        .map_err(RoadGraphError::from)
        .and_then(|_| georeference_with(graph, &affine_from_gdal(geo), transform));

    match result {
        Ok(segments) => segments,
        Err(err) => {
            error!(crs = %geo.crs, edges = graph.edge_count(), "georeferencing failed: {err}");
            Vec::new()
        }
    }
}

/// Pixel centers (`+0.5`) through `affine`, then `transform`
pub fn georeference_with(
    graph: &PredictedGraph,
    affine: &AffineTransform<f64>,
    transform: &dyn CoordinateTransform,
) -> Result<Vec<RoadSegment>> {
    // many edges share a vertex
    let mut projected: BTreeMap<usize, [f64; 2]> = BTreeMap::new();
    let mut locate = |i: usize| -> Result<[f64; 2]> {
        if let Some(p) = projected.get(&i) {
            return Ok(*p);
        }
        let [x, y] = graph.points[i];
        let c = affine.apply(Coord { x: x + 0.5, y: y + 0.5 });
        let (lon, lat) = transform.transform(c.x, c.y)?;
        projected.insert(i, [lon, lat]);
        Ok([lon, lat])
    };

    graph
        .edges
        .iter()
        .map(|&(a, b)| {
            Ok(RoadSegment {
                start: locate(a)?,
                end: locate(b)?,
            })
        })
        .collect()
}
