use image::{GrayImage, RgbImage};

use crate::error::Result;
use crate::types::{MaskPrediction, PairScores, TopologyQuery};

/// Opaque model behind both inference passes.
///
/// Calls are blocking and all-or-nothing; an error aborts the whole image.
pub trait InferenceService {
    /// Per-tile embedding computed in the first pass and consumed by the second
    type Embedding;

    /// Side of the square tiles the model accepts
    fn model_input_size(&self) -> u32;

    /// Keypoint and road probabilities plus one embedding per tile, in input order
    fn predict_masks_and_embedding(&self, tiles: &[RgbImage]) -> Result<MaskPrediction<Self::Embedding>>;

    /// Connectivity probability for every slot of every query
    fn predict_connectivity(
        &self,
        embeddings: &[&Self::Embedding],
        queries: &[TopologyQuery],
    ) -> Result<Vec<PairScores>>;
}

/// Turns fused 8-bit probability canvases into candidate graph vertices
pub trait PointExtractor: Send + Sync {
    /// Candidate `(x, y)` pixel positions; empty when nothing passes
    fn extract_points(&self, keypoint: &GrayImage, road: &GrayImage) -> Result<Vec<[f64; 2]>>;
}

/// Projected coordinates to output (longitude, latitude)
pub trait CoordinateTransform: Send + Sync {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)>;
}
