//! Overlap-averaged fusion of per-tile mask predictions.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use roadnet_common::PatchWindow;
use tracing::debug;

use crate::error::{Result, RoadGraphError};
use crate::types::{MaskPatch, ProbabilityMask};

/// Full-resolution keypoint and road sums plus a coverage count per pixel
#[derive(Debug, Clone)]
pub struct MaskFusionBuffer {
    keypoint: ProbabilityMask,
    road: ProbabilityMask,
    weight: ImageBuffer<Luma<f32>, Vec<f32>>,
    tiles: usize,
}

/// Averaged probabilities; pixels no tile covered are exactly zero
#[derive(Debug, Clone)]
pub struct FusedMasks {
    pub keypoint: ProbabilityMask,
    pub road: ProbabilityMask,
}

impl MaskFusionBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            keypoint: ImageBuffer::new(width, height),
            road: ImageBuffer::new(width, height),
            weight: ImageBuffer::new(width, height),
            tiles: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.road.dimensions()
    }

    pub fn tiles(&self) -> usize {
        self.tiles
    }

    /// Add one tile prediction at its window. The prediction may be larger
    /// than the window (a padded edge tile); only the top-left
    /// `window.width x window.height` region is used.
    pub fn accumulate(&mut self, window: &PatchWindow, patch: &MaskPatch) -> Result<()> {
        let (width, height) = self.dimensions();
        if window.right() > width || window.bottom() > height {
            return Err(RoadGraphError::Fusion(format!(
                "window {} at ({}, {}) size {}x{} exceeds the {width}x{height} canvas",
                window.index, window.x, window.y, window.width, window.height
            )));
        }
        let (pw, ph) = patch.dimensions();
        if patch.keypoint.dimensions() != (pw, ph) || pw < window.width || ph < window.height {
            return Err(RoadGraphError::Fusion(format!(
                "prediction for window {} is {pw}x{ph}, window is {}x{}",
                window.index, window.width, window.height
            )));
        }

        for row in 0..window.height {
            for col in 0..window.width {
                let (x, y) = (window.x + col, window.y + row);
                self.keypoint.get_pixel_mut(x, y)[0] += patch.keypoint.get_pixel(col, row)[0];
                self.road.get_pixel_mut(x, y)[0] += patch.road.get_pixel(col, row)[0];
                self.weight.get_pixel_mut(x, y)[0] += 1.0;
            }
        }
        self.tiles += 1;
        Ok(())
    }

    pub fn finish(self) -> FusedMasks {
        let Self {
            mut keypoint,
            mut road,
            weight,
            tiles,
        } = self;

        let mut uncovered = 0usize;
        for ((k, r), w) in keypoint
            .pixels_mut()
            .zip(road.pixels_mut())
            .zip(weight.pixels())
        {
            if w[0] > 0.0 {
                k[0] /= w[0];
                r[0] /= w[0];
            } else {
                k[0] = 0.0;
                r[0] = 0.0;
                uncovered += 1;
            }
        }
        debug!(tiles, uncovered, "fused tile masks");

        FusedMasks { keypoint, road }
    }
}

impl FusedMasks {
    /// 8-bit `(keypoint, road)` masks, `p * 255` truncated
    pub fn quantize(&self) -> (GrayImage, GrayImage) {
        (quantize(&self.keypoint), quantize(&self.road))
    }
}

fn quantize(mask: &ProbabilityMask) -> GrayImage {
    ImageBuffer::from_fn(mask.width(), mask.height(), |x, y| {
        // float to int casts saturate, NaN becomes 0
        Luma([(mask.get_pixel(x, y)[0] * 255.0) as u8])
    })
}

/// Extend `tile` to `size x size` by repeating its last column and row
pub fn pad_replicate(tile: &RgbImage, size: u32) -> Result<RgbImage> {
    let (width, height) = tile.dimensions();
    if width == 0 || height == 0 || width > size || height > size {
        return Err(RoadGraphError::Fusion(format!(
            "cannot pad a {width}x{height} tile to {size}x{size}"
        )));
    }
    if (width, height) == (size, size) {
        return Ok(tile.clone());
    }
    Ok(ImageBuffer::from_fn(size, size, |x, y| {
        *tile.get_pixel(x.min(width - 1), y.min(height - 1))
    }))
}
