//! Fixed-size pairwise connectivity queries.
//!
//! Training labels and inference queries pair points the same way: each
//! anchor is matched with its nearest neighbors inside the neighbor radius,
//! and the list is padded to exactly K slots with invalid self-pairs.

use serde::{Deserialize, Serialize};

use crate::config::TopologyConfig;
use crate::spatial::SpatialPointIndex;

/// One anchor with exactly K `(pair, connected, valid)` slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySample {
    pub pairs: Vec<(usize, usize)>,
    pub connected: Vec<bool>,
    pub valid: Vec<bool>,
}

impl TopologySample {
    /// Pad `neighbors` (with their labels) to `k` slots using `(anchor, anchor)`
    pub fn padded(anchor: usize, neighbors: &[usize], connected: &[bool], k: usize) -> Self {
        let mut sample = Self {
            pairs: Vec::with_capacity(k),
            connected: Vec::with_capacity(k),
            valid: Vec::with_capacity(k),
        };
        for (&neighbor, &label) in neighbors.iter().zip(connected).take(k) {
            sample.pairs.push((anchor, neighbor));
            sample.connected.push(label);
            sample.valid.push(true);
        }
        while sample.pairs.len() < k {
            sample.pairs.push((anchor, anchor));
            sample.connected.push(false);
            sample.valid.push(false);
        }
        sample
    }

    /// Placeholder used when a patch has no usable points
    pub fn degenerate(k: usize) -> Self {
        Self::padded(0, &[], &[], k)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
}

/// Bounded k-NN pairing over one point set
#[derive(Debug, Clone, Copy)]
pub struct NeighborPairing {
    pub radius: f64,
    pub k: usize,
}

impl NeighborPairing {
    pub fn new(config: &TopologyConfig) -> Self {
        Self {
            radius: config.neighbor_radius,
            k: config.max_neighbor_queries,
        }
    }

    /// Up to K neighbors of `anchor` (an index into `index`), nearest first
    pub fn neighbors(&self, index: &SpatialPointIndex, anchor: usize) -> Vec<usize> {
        index
            .nearest_within(index.point(anchor), self.k, self.radius, Some(anchor))
            .into_iter()
            .map(|(i, _)| i)
            .collect()
    }

    /// Query every point of `index` as an anchor; unlabelled
    pub fn all_anchors(&self, index: &SpatialPointIndex) -> Vec<TopologySample> {
        (0..index.len())
            .map(|anchor| {
                let neighbors = self.neighbors(index, anchor);
                let labels = vec![false; neighbors.len()];
                TopologySample::padded(anchor, &neighbors, &labels, self.k)
            })
            .collect()
    }
}
