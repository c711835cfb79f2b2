//! Pairwise connectivity evidence across tiles.
//!
//! Each tile sees the candidate vertices inside its window, pairs them with
//! the same bounded k-NN rule used for training labels and receives one
//! probability per pair. Probabilities are summed per directed
//! `(source, target)` key over all tiles; the two directions of one
//! geographic edge are kept apart.

use std::collections::BTreeMap;

use roadnet_common::PatchWindow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TopologyConfig;
use crate::error::{Result, RoadGraphError};
use crate::spatial::SpatialPointIndex;
use crate::topology::NeighborPairing;
use crate::types::{PairScores, TopologyQuery};

/// Directed pair of global candidate indices
pub type EdgeKey = (usize, usize);

/// Connectivity query for one window plus the map back to global indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileQuery {
    pub window: PatchWindow,
    pub query: TopologyQuery,
    /// `local_to_global[i]` is the global index of `query.points[i]`
    pub local_to_global: Vec<usize>,
}

impl TileQuery {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

/// Running `(sum, count)` of scores per directed key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeAggregate {
    scores: BTreeMap<EdgeKey, (f64, usize)>,
}

impl EdgeAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: EdgeKey, score: f64) {
        let entry = self.scores.entry(key).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;
    }

    pub fn average(&self, key: &EdgeKey) -> Option<f64> {
        self.scores.get(key).map(|(sum, count)| sum / *count as f64)
    }

    pub fn count(&self, key: &EdgeKey) -> usize {
        self.scores.get(key).map_or(0, |(_, count)| *count)
    }

    /// `(key, average)` in key order
    pub fn averages(&self) -> impl Iterator<Item = (EdgeKey, f64)> + '_ {
        self.scores
            .iter()
            .map(|(key, (sum, count))| (*key, sum / *count as f64))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

pub struct EdgeScorer {
    index: SpatialPointIndex,
    pairing: NeighborPairing,
}

impl EdgeScorer {
    pub fn new(points: &[[f64; 2]], config: &TopologyConfig) -> Self {
        Self {
            index: SpatialPointIndex::new(points),
            pairing: NeighborPairing::new(config),
        }
    }

    pub fn points(&self) -> &[[f64; 2]] {
        self.index.points()
    }

    /// Candidates inside `window` (half-open), in window-local coordinates,
    /// each paired with its nearest neighbors from the same window
    pub fn prepare(&self, window: &PatchWindow) -> TileQuery {
        let (x0, y0) = (window.x as f64, window.y as f64);
        let local_to_global =
            self.index
                .in_window(x0, y0, window.right() as f64, window.bottom() as f64);
        let points: Vec<[f64; 2]> = local_to_global
            .iter()
            .map(|&g| {
                let [x, y] = self.index.point(g);
                [x - x0, y - y0]
            })
            .collect();
        let samples = self.pairing.all_anchors(&SpatialPointIndex::new(&points));

        TileQuery {
            window: *window,
            query: TopologyQuery { points, samples },
            local_to_global,
        }
    }

    /// Fold one tile's scores into `aggregate`. Invalid slots are skipped;
    /// NaN or infinite scores count as 0 and the rest are clamped to `[0, 1]`.
    pub fn accumulate(aggregate: &mut EdgeAggregate, tile: &TileQuery, scores: &PairScores) -> Result<()> {
        let samples = &tile.query.samples;
        if scores.len() < samples.len() {
            return Err(RoadGraphError::inference(format!(
                "window {}: {} score rows for {} points",
                tile.window.index,
                scores.len(),
                samples.len()
            )));
        }

        let mut added = 0usize;
        for (sample, row) in samples.iter().zip(scores) {
            if row.len() < sample.len() {
                return Err(RoadGraphError::inference(format!(
                    "window {}: {} scores for {} pair slots",
                    tile.window.index,
                    row.len(),
                    sample.len()
                )));
            }
            for (slot, &(a, b)) in sample.pairs.iter().enumerate() {
                if !sample.valid[slot] {
                    continue;
                }
                let key = (tile.local_to_global[a], tile.local_to_global[b]);
                aggregate.add(key, sanitize(row[slot]));
                added += 1;
            }
        }
        debug!(window = tile.window.index, pairs = added, "aggregated edge scores");
        Ok(())
    }
}

fn sanitize(score: f32) -> f64 {
    if score.is_finite() {
        (score as f64).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(k: usize) -> TopologyConfig {
        TopologyConfig {
            neighbor_radius: 64.0,
            max_neighbor_queries: k,
        }
    }

    #[test]
    fn test_prepare_selects_half_open_window() {
        let points = vec![[10.0, 10.0], [50.0, 10.0], [100.0, 10.0], [120.0, 30.0]];
        let scorer = EdgeScorer::new(&points, &config(3));
        let tile = scorer.prepare(&PatchWindow::square(2, 0, 0, 100));

        assert_eq!(tile.local_to_global, vec![0, 1]);
        assert_eq!(tile.query.points, vec![[10.0, 10.0], [50.0, 10.0]]);
        assert_eq!(tile.query.samples.len(), 2);
        assert_eq!(tile.query.samples[0].pairs, vec![(0, 1), (0, 0), (0, 0)]);

        let shifted = scorer.prepare(&PatchWindow::square(3, 100, 0, 100));
        assert_eq!(shifted.local_to_global, vec![2, 3]);
        assert_eq!(shifted.query.points, vec![[0.0, 10.0], [20.0, 30.0]]);
    }

    #[test]
    fn test_empty_window() {
        let scorer = EdgeScorer::new(&[[10.0, 10.0]], &config(4));
        let tile = scorer.prepare(&PatchWindow::square(0, 50, 50, 20));
        assert!(tile.is_empty());

        let mut aggregate = EdgeAggregate::new();
        EdgeScorer::accumulate(&mut aggregate, &tile, &Vec::new()).unwrap();
        assert!(aggregate.is_empty());
    }

    #[test]
    fn test_scores_are_sanitized_and_invalid_slots_skipped() {
        let points = vec![[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]];
        let scorer = EdgeScorer::new(&points, &config(3));
        let tile = scorer.prepare(&PatchWindow::square(0, 0, 0, 64));
        // point 0 pairs with 1 then 2; point 1 with 0 and 2 (equidistant);
        // point 2 with 1 then 0
        let scores = vec![
            vec![f32::NAN, 1.5, 0.9],
            vec![0.25, 0.75, f32::NAN],
            vec![f32::INFINITY, -1.0, 0.9],
        ];

        let mut aggregate = EdgeAggregate::new();
        EdgeScorer::accumulate(&mut aggregate, &tile, &scores).unwrap();

        assert_eq!(aggregate.len(), 6);
        assert_eq!(aggregate.average(&(0, 1)), Some(0.0));
        assert_eq!(aggregate.average(&(0, 2)), Some(1.0));
        assert_eq!(aggregate.average(&(2, 1)), Some(0.0));
        assert_eq!(aggregate.average(&(2, 0)), Some(0.0));
        // the third slot of every sample is padding and never counted
        assert_eq!(aggregate.count(&(0, 0)), 0);
    }

    #[test]
    fn test_directions_are_aggregated_separately() {
        let mut aggregate = EdgeAggregate::new();
        aggregate.add((1, 2), 1.0);
        aggregate.add((1, 2), 0.5);
        aggregate.add((2, 1), 0.0);

        assert_eq!(aggregate.average(&(1, 2)), Some(0.75));
        assert_eq!(aggregate.count(&(1, 2)), 2);
        assert_eq!(aggregate.average(&(2, 1)), Some(0.0));
        assert_eq!(aggregate.averages().count(), 2);
    }

    #[test]
    fn test_short_score_rows_are_errors() {
        let points = vec![[0.0, 0.0], [10.0, 0.0]];
        let scorer = EdgeScorer::new(&points, &config(2));
        let tile = scorer.prepare(&PatchWindow::square(0, 0, 0, 64));

        let mut aggregate = EdgeAggregate::new();
        assert!(EdgeScorer::accumulate(&mut aggregate, &tile, &vec![vec![0.5, 0.5]]).is_err());
        assert!(EdgeScorer::accumulate(&mut aggregate, &tile, &vec![vec![0.5], vec![0.5]]).is_err());
    }
}
