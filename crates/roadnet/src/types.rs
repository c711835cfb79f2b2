use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::topology::TopologySample;

/// Per-pixel probability canvas with values in `[0, 1]`
pub type ProbabilityMask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Connectivity probability per `[point][slot]` of one tile query. Padded
/// slots may hold NaN.
pub type PairScores = Vec<Vec<f32>>;

/// Two-channel mask prediction for one model-sized tile
#[derive(Debug, Clone)]
pub struct MaskPatch {
    pub keypoint: ProbabilityMask,
    pub road: ProbabilityMask,
}

impl MaskPatch {
    pub fn new(keypoint: ProbabilityMask, road: ProbabilityMask) -> Self {
        Self { keypoint, road }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.road.dimensions()
    }
}

/// Output of the first inference pass for one batch of tiles
#[derive(Debug, Clone)]
pub struct MaskPrediction<E> {
    pub masks: Vec<MaskPatch>,
    pub embeddings: Vec<E>,
}

/// Connectivity query for one tile: candidate points in tile-local pixel
/// coordinates and one K-slot pairing per point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyQuery {
    pub points: Vec<[f64; 2]>,
    pub samples: Vec<TopologySample>,
}

impl TopologyQuery {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}
