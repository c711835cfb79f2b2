//! Supervised training samples from one ground-truth patch.
//!
//! A patch yields a thinned set of graph points (the keypoint targets) and a
//! fixed number of topology samples, each pairing an anchor with its nearest
//! thinned neighbors and labelling which pairs are directly connected along
//! the road graph.

use std::collections::HashSet;

use image::{ImageBuffer, Pixel};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand_distr::Normal;
use roadnet_common::PatchWindow;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tracing::{debug, warn};

use crate::config::RoadGraphConfig;
use crate::error::{Result, RoadGraphError};
use crate::ground_truth::GroundTruthIndex;
use crate::graph::reachable_within;
use crate::nms::{KeypointCandidate, NonMaxSuppressor};
use crate::spatial::SpatialPointIndex;
use crate::topology::{NeighborPairing, TopologySample};

const RANDOM_SCORE_MIN: f64 = 0.9;
const INTERSECTION_SCORE: f64 = 2.0;

/// Counter-clockwise quarter turns applied to a training patch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn quarter_turns(self) -> usize {
        match self {
            Self::R0 => 0,
            Self::R90 => 1,
            Self::R180 => 2,
            Self::R270 => 3,
        }
    }

    pub fn from_quarter_turns(turns: usize) -> Self {
        match turns % 4 {
            0 => Self::R0,
            1 => Self::R90,
            2 => Self::R180,
            _ => Self::R270,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_quarter_turns(rng.random_range(0..4))
    }

    /// Rotate a patch-local point about the center of a `size` square patch.
    /// One quarter turn maps `(x, y)` to `(y, size - x)`.
    pub fn apply_to_point(self, point: [f64; 2], size: f64) -> [f64; 2] {
        (0..self.quarter_turns()).fold(point, |[x, y], _| [y, size - x])
    }

    /// Rotate a pixel patch consistently with [`Rotation::apply_to_point`]
    pub fn apply_to_image<P>(self, image: &ImageBuffer<P, Vec<P::Subpixel>>) -> ImageBuffer<P, Vec<P::Subpixel>>
    where
        P: Pixel + 'static,
    {
        use image::imageops::{rotate90, rotate180, rotate270};
        match self {
            Self::R0 => image.clone(),
            Self::R90 => rotate270(image),
            Self::R180 => rotate180(image),
            Self::R270 => rotate90(image),
        }
    }
}

/// Thinned patch points (patch-local, rotated, noised) and `sample_num`
/// topology samples whose pairs index into `points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSample {
    pub points: Vec<[f64; 2]>,
    /// Subdivided-graph id of every entry of `points`; empty for a degenerate patch
    pub point_ids: Vec<usize>,
    pub samples: Vec<TopologySample>,
}

impl PatchSample {
    /// Output for a patch without usable points: a single origin point and
    /// all-invalid samples
    pub fn degenerate(sample_num: usize, k: usize) -> Self {
        Self {
            points: vec![[0.0, 0.0]],
            point_ids: Vec::new(),
            samples: vec![TopologySample::degenerate(k); sample_num],
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.point_ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PatchSampler {
    nms: NonMaxSuppressor,
    pairing: NeighborPairing,
    sample_num: usize,
    noise: Normal<f64>,
}

impl PatchSampler {
    pub fn new(config: &RoadGraphConfig) -> Result<Self> {
        config.validate()?;
        let noise = Normal::new(0.0, config.sampling.position_noise_std)
            .map_err(|e| RoadGraphError::InvalidConfig(format!("position noise: {e}")))?;
        Ok(Self {
            nms: NonMaxSuppressor::new(config.extraction.road_nms_radius),
            pairing: NeighborPairing::new(&config.topology),
            sample_num: config.sampling.sample_num,
            noise,
        })
    }

    pub fn sample_num(&self) -> usize {
        self.sample_num
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        index: &GroundTruthIndex,
        window: &PatchWindow,
        rotation: Rotation,
        rng: &mut R,
    ) -> Result<PatchSample> {
        let (x0, y0) = (window.x as f64, window.y as f64);
        let in_patch: Vec<usize> = index
            .points()
            .in_window(x0, y0, window.right() as f64, window.bottom() as f64)
            .into_iter()
            .filter(|&i| !index.annotation(i).excluded)
            .collect();

        if in_patch.is_empty() {
            warn!(window = window.index, x = window.x, y = window.y, "patch has no graph points");
            return Ok(PatchSample::degenerate(self.sample_num, self.pairing.k));
        }

        let candidates: Vec<KeypointCandidate> = in_patch
            .iter()
            .map(|&i| {
                let annotation = index.annotation(i);
                let point = index.points().point(i);
                let candidate = if annotation.is_intersection {
                    KeypointCandidate::new(point, INTERSECTION_SCORE).with_override(true)
                } else {
                    KeypointCandidate::new(point, rng.random_range(RANDOM_SCORE_MIN..1.0))
                };
                candidate.with_weight(annotation.interest_weight)
            })
            .collect();

        let kept = self.nms.suppress(&candidates);
        let point_ids: Vec<usize> = kept.iter().map(|&k| in_patch[k]).collect();
        let kept_points: Vec<[f64; 2]> = kept.iter().map(|&k| candidates[k].point).collect();
        let kept_index = SpatialPointIndex::new(&kept_points);

        let anchors = WeightedIndex::new(kept.iter().map(|&k| candidates[k].weight))
            .map_err(|e| RoadGraphError::InvalidConfig(format!("sampling weights: {e}")))?;
        let max_depth = (self.pairing.radius / index.subdivide_step()).floor() as usize;

        // anchors are drawn with replacement; label each distinct anchor once
        let mut labelled: Vec<Option<TopologySample>> = vec![None; kept.len()];
        let mut samples = Vec::with_capacity(self.sample_num);
        for _ in 0..self.sample_num {
            let anchor = anchors.sample(rng);
            let sample = labelled[anchor].get_or_insert_with(|| {
                let neighbors = self.pairing.neighbors(&kept_index, anchor);
                let targets: HashSet<usize> = neighbors.iter().map(|&n| point_ids[n]).collect();
                let reached = reachable_within(
                    index.subdivided_adjacency(),
                    point_ids[anchor],
                    &targets,
                    max_depth,
                );
                let connected: Vec<bool> = neighbors
                    .iter()
                    .map(|&n| reached.contains(&point_ids[n]))
                    .collect();
                TopologySample::padded(anchor, &neighbors, &connected, self.pairing.k)
            });
            samples.push(sample.clone());
        }

        let size = window.width as f64;
        let points = kept_points
            .iter()
            .map(|p| {
                let [x, y] = rotation.apply_to_point([p[0] - x0, p[1] - y0], size);
                [x + self.noise.sample(rng), y + self.noise.sample(rng)]
            })
            .collect();

        debug!(
            window = window.index,
            candidates = in_patch.len(),
            kept = kept.len(),
            %rotation,
            "sampled patch"
        );

        Ok(PatchSample {
            points,
            point_ids,
            samples,
        })
    }
}
