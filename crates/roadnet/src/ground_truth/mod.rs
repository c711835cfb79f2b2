//! Training-time index over a ground-truth road graph.
//!
//! Built once per source tile and read-only afterwards; share it through an
//! `Arc` (see [`GroundTruthCache`]).

mod cache;

pub use cache::GroundTruthCache;

use roadnet_common::AdjacencyMap;
use tracing::debug;

use crate::config::SamplingConfig;
use crate::error::{Result, RoadGraphError};
use crate::graph::{RoadGraph, find_crossings, subdivide};
use crate::spatial::SpatialPointIndex;

/// Sampling metadata of one subdivided point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAnnotation {
    pub original_degree: usize,
    /// Degree in the source graph differs from 2
    pub is_intersection: bool,
    /// `f64::INFINITY` when the graph has no crossovers
    pub crossover_distance: f64,
    /// Too close to a crossover to be offered as a sampling candidate
    pub excluded: bool,
    pub interest_weight: f64,
}

#[derive(Debug, Clone)]
pub struct GroundTruthIndex {
    canonical: RoadGraph,
    crossovers: Vec<[f64; 2]>,
    subdivided: RoadGraph,
    subdivided_adjacency: Vec<Vec<usize>>,
    points: SpatialPointIndex,
    annotations: Vec<PointAnnotation>,
    subdivide_step: f64,
}

impl GroundTruthIndex {
    /// Build the index. Returns `Ok(None)` for an empty adjacency mapping.
    pub fn build<F>(config: &SamplingConfig, adjacency: &AdjacencyMap, normalize: F) -> Result<Option<Self>>
    where
        F: Fn([f64; 2]) -> [f64; 2],
    {
        if !(config.subdivide_step.is_finite() && config.subdivide_step > 0.0) {
            return Err(RoadGraphError::InvalidConfig(format!(
                "subdivide_step must be positive, got {}",
                config.subdivide_step
            )));
        }
        if adjacency.is_empty() {
            return Ok(None);
        }

        let canonical = RoadGraph::from_adjacency(adjacency, normalize);
        Ok(Some(Self::from_graph(config, canonical)))
    }

    /// Build from an already canonical graph
    pub fn from_graph(config: &SamplingConfig, canonical: RoadGraph) -> Self {
        let crossovers = find_crossings(&canonical.segments());
        let dense = subdivide(&canonical, config.subdivide_step);
        let subdivided_adjacency = dense.graph.adjacency();
        let points = SpatialPointIndex::new(&dense.graph.points);
        let crossover_index = SpatialPointIndex::new(&crossovers);

        let mut annotations: Vec<PointAnnotation> = dense
            .graph
            .points
            .iter()
            .zip(&dense.original_degree)
            .map(|(p, &degree)| {
                let crossover_distance = crossover_index
                    .nearest(*p)
                    .map_or(f64::INFINITY, |(_, d)| d);
                PointAnnotation {
                    original_degree: degree,
                    is_intersection: degree != 2,
                    crossover_distance,
                    excluded: crossover_distance <= config.crossover_exclude_radius,
                    interest_weight: config.background_weight,
                }
            })
            .collect();

        let interesting_centers = annotations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_intersection)
            .map(|(i, _)| dense.graph.points[i])
            .chain(crossovers.iter().copied())
            .collect::<Vec<_>>();
        for center in interesting_centers {
            for i in points.within_radius(center, config.interest_radius) {
                annotations[i].interest_weight = config.interest_weight;
            }
        }

        debug!(
            vertices = canonical.vertex_count(),
            edges = canonical.edge_count(),
            subdivided_points = points.len(),
            crossovers = crossovers.len(),
            "built ground-truth index"
        );

        Self {
            canonical,
            crossovers,
            subdivided: dense.graph,
            subdivided_adjacency,
            points,
            annotations,
            subdivide_step: config.subdivide_step,
        }
    }

    pub fn canonical(&self) -> &RoadGraph {
        &self.canonical
    }

    pub fn crossovers(&self) -> &[[f64; 2]] {
        &self.crossovers
    }

    pub fn subdivided(&self) -> &RoadGraph {
        &self.subdivided
    }

    pub fn subdivided_adjacency(&self) -> &[Vec<usize>] {
        &self.subdivided_adjacency
    }

    pub fn points(&self) -> &SpatialPointIndex {
        &self.points
    }

    pub fn annotations(&self) -> &[PointAnnotation] {
        &self.annotations
    }

    pub fn annotation(&self, index: usize) -> &PointAnnotation {
        &self.annotations[index]
    }

    pub fn subdivide_step(&self) -> f64 {
        self.subdivide_step
    }
}
