//! Greedy priority-based point thinning.
//!
//! Candidates are visited by descending score (ties keep input order) and a
//! candidate survives only when no already-kept point lies within the
//! suppression radius. Candidates flagged `always_keep` are kept first and
//! unconditionally, so they can never be suppressed.

use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::spatial::distance_2;

/// Point with priority, keep-override and sampling-interest weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeypointCandidate {
    pub point: [f64; 2],
    pub score: f64,
    pub always_keep: bool,
    pub weight: f64,
}

impl KeypointCandidate {
    pub fn new(point: [f64; 2], score: f64) -> Self {
        Self {
            point,
            score,
            always_keep: false,
            weight: 1.0,
        }
    }

    pub fn with_override(mut self, always_keep: bool) -> Self {
        self.always_keep = always_keep;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NonMaxSuppressor {
    pub radius: f64,
}

impl NonMaxSuppressor {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Returns indices into `candidates` of the kept points, in visit order.
    pub fn suppress(&self, candidates: &[KeypointCandidate]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            let (ca, cb) = (&candidates[a], &candidates[b]);
            cb.always_keep
                .cmp(&ca.always_keep)
                .then_with(|| cb.score.total_cmp(&ca.score))
        });

        let r2 = self.radius * self.radius;
        let mut kept_tree: RTree<[f64; 2]> = RTree::new();
        let mut kept = Vec::new();

        for idx in order {
            let candidate = &candidates[idx];
            let suppressed = !candidate.always_keep
                && kept_tree
                    .nearest_neighbor(&candidate.point)
                    .is_some_and(|nearest| distance_2(*nearest, candidate.point) <= r2);
            if suppressed {
                continue;
            }
            kept_tree.insert(candidate.point);
            kept.push(idx);
        }

        kept
    }

    /// Convenience wrapper for plain scored points
    pub fn suppress_points(&self, points: &[[f64; 2]], scores: &[f64]) -> Vec<usize> {
        let candidates: Vec<KeypointCandidate> = points
            .iter()
            .zip(scores)
            .map(|(p, s)| KeypointCandidate::new(*p, *s))
            .collect();
        self.suppress(&candidates)
    }
}
