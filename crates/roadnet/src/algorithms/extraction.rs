use image::GrayImage;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::nms::{KeypointCandidate, NonMaxSuppressor};
use crate::traits::PointExtractor;

/// Keypoint candidates outrank every road candidate when the two sets are merged
const KEYPOINT_PRIORITY: f64 = 1.0;

/// Threshold both probability masks, thin each with its own NMS radius and
/// merge them with keypoints taking priority.
#[derive(Debug, Clone)]
pub struct ThresholdPointExtractor {
    pub keypoint_threshold: u8,
    pub road_threshold: u8,
    pub keypoint_nms_radius: f64,
    pub road_nms_radius: f64,
}

impl ThresholdPointExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            keypoint_threshold: to_level(config.keypoint_threshold),
            road_threshold: to_level(config.road_threshold),
            keypoint_nms_radius: config.keypoint_nms_radius,
            road_nms_radius: config.road_nms_radius,
        }
    }
}

impl Default for ThresholdPointExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl PointExtractor for ThresholdPointExtractor {
    fn extract_points(&self, keypoint: &GrayImage, road: &GrayImage) -> Result<Vec<[f64; 2]>> {
        let keypoints = thinned(keypoint, self.keypoint_threshold, self.keypoint_nms_radius);
        let road_points = thinned(road, self.road_threshold, self.road_nms_radius);

        let merged: Vec<KeypointCandidate> = keypoints
            .iter()
            .map(|c| KeypointCandidate::new(c.point, c.score + KEYPOINT_PRIORITY))
            .chain(road_points.iter().copied())
            .collect();
        let kept = NonMaxSuppressor::new(self.road_nms_radius).suppress(&merged);

        debug!(
            keypoints = keypoints.len(),
            road_points = road_points.len(),
            kept = kept.len(),
            "extracted graph points"
        );
        Ok(kept.into_iter().map(|i| merged[i].point).collect())
    }
}

/// Probability threshold to the 8-bit level used on quantized masks
fn to_level(threshold: f64) -> u8 {
    (threshold.clamp(0.0, 1.0) * 255.0) as u8
}

/// Pixels above `level`, scored by their probability and thinned by NMS
fn thinned(mask: &GrayImage, level: u8, radius: f64) -> Vec<KeypointCandidate> {
    let binary = imageproc::contrast::threshold(mask, level);
    let candidates: Vec<KeypointCandidate> = binary
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| {
            let score = mask.get_pixel(x, y)[0] as f64 / 255.0;
            KeypointCandidate::new([x as f64, y as f64], score)
        })
        .collect();

    NonMaxSuppressor::new(radius)
        .suppress(&candidates)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_empty_masks_give_no_points() {
        let mask = GrayImage::new(32, 32);
        let points = ThresholdPointExtractor::default()
            .extract_points(&mask, &mask)
            .unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_road_line_collapses_to_keypoints() {
        let mut keypoint = GrayImage::new(64, 64);
        let mut road = GrayImage::new(64, 64);
        for x in 10..=42 {
            road.put_pixel(x, 20, Luma([255]));
        }
        keypoint.put_pixel(10, 20, Luma([255]));
        keypoint.put_pixel(42, 20, Luma([255]));

        let extractor = ThresholdPointExtractor {
            road_nms_radius: 20.0,
            ..ThresholdPointExtractor::default()
        };
        let points = extractor.extract_points(&keypoint, &road).unwrap();
        assert_eq!(points, vec![[10.0, 20.0], [42.0, 20.0]]);
    }

    #[test]
    fn test_long_road_is_sampled_at_nms_spacing() {
        let keypoint = GrayImage::new(200, 8);
        let mut road = GrayImage::new(200, 8);
        for x in 0..200 {
            road.put_pixel(x, 4, Luma([200]));
        }
        let points = ThresholdPointExtractor::default()
            .extract_points(&keypoint, &road)
            .unwrap();

        assert!(points.len() >= 6);
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert!((a[0] - b[0]).abs() > 16.0);
            }
        }
    }

    #[test]
    fn test_below_threshold_is_ignored() {
        let keypoint = GrayImage::from_pixel(16, 16, Luma([100]));
        let road = GrayImage::from_pixel(16, 16, Luma([127]));
        let points = ThresholdPointExtractor::default()
            .extract_points(&keypoint, &road)
            .unwrap();
        assert!(points.is_empty());
    }
}
