//! Training and evaluation examples drawn from a set of source tiles.

use std::sync::Arc;

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use rand::Rng;
use roadnet_common::{AdjacencyMap, PatchWindow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RoadGraphConfig;
use crate::error::{Result, RoadGraphError};
use crate::ground_truth::{GroundTruthCache, GroundTruthIndex};
use crate::sampler::{PatchSample, PatchSampler, Rotation};
use crate::tiles::TilePlanner;
use crate::types::ProbabilityMask;

/// One source image with its rendered masks and ground-truth graph
#[derive(Debug, Clone)]
pub struct SourceTile {
    pub id: String,
    pub image: RgbImage,
    pub keypoint_mask: GrayImage,
    pub road_mask: GrayImage,
    pub adjacency: AdjacencyMap,
}

impl SourceTile {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub tile_id: String,
    pub window: PatchWindow,
    pub rotation: Rotation,
    pub rgb: RgbImage,
    pub keypoint_mask: ProbabilityMask,
    pub road_mask: ProbabilityMask,
    pub sample: PatchSample,
}

/// Per-example summary, used by the CLI sample dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleSummary {
    pub tile_id: String,
    pub window: PatchWindow,
    pub rotation: Rotation,
    pub sample: PatchSample,
}

impl From<&TrainingExample> for ExampleSummary {
    fn from(example: &TrainingExample) -> Self {
        Self {
            tile_id: example.tile_id.clone(),
            window: example.window,
            rotation: example.rotation,
            sample: example.sample.clone(),
        }
    }
}

pub struct TrainingDataset {
    config: RoadGraphConfig,
    tiles: Vec<SourceTile>,
    cache: GroundTruthCache<String>,
    sampler: PatchSampler,
}

impl TrainingDataset {
    pub fn new(config: RoadGraphConfig, tiles: Vec<SourceTile>) -> Result<Self> {
        if tiles.is_empty() {
            return Err(RoadGraphError::Dataset("no source tiles".to_string()));
        }
        for tile in &tiles {
            let dims = tile.dimensions();
            if tile.keypoint_mask.dimensions() != dims || tile.road_mask.dimensions() != dims {
                return Err(RoadGraphError::Dataset(format!(
                    "tile {}: masks do not match the {}x{} image",
                    tile.id, dims.0, dims.1
                )));
            }
        }

        let sampler = PatchSampler::new(&config)?;
        let cache = GroundTruthCache::new(config.cache_capacity)?;
        info!(tiles = tiles.len(), cache_capacity = config.cache_capacity, "training dataset ready");
        Ok(Self {
            config,
            tiles,
            cache,
            sampler,
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[SourceTile] {
        &self.tiles
    }

    /// Cached ground-truth index of a tile; `None` when its graph is empty
    pub fn index_for(&self, tile: usize) -> Result<Option<Arc<GroundTruthIndex>>> {
        let source = self.tiles.get(tile).ok_or_else(|| {
            RoadGraphError::Dataset(format!("tile {tile} out of range ({} tiles)", self.tiles.len()))
        })?;
        let convention = self.config.sampling.coord_convention;
        self.cache.get_or_build(&source.id, || {
            GroundTruthIndex::build(&self.config.sampling, &source.adjacency, |p| convention.apply(p))
        })
    }

    /// Random tile, window and rotation. Tiles with an empty graph are
    /// redrawn up to `max_redraws` times.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TrainingExample> {
        let sampling = &self.config.sampling;
        for attempt in 0..=sampling.max_redraws {
            let tile = rng.random_range(0..self.tiles.len());
            let Some(index) = self.index_for(tile)? else {
                debug!(tile = %self.tiles[tile].id, attempt, "tile graph is empty, redrawing");
                continue;
            };

            let window = TilePlanner::random_window(
                rng,
                self.tiles[tile].dimensions(),
                sampling.sample_margin,
                self.config.patch_size,
            )?;
            let rotation = Rotation::random(rng);
            return self.example(tile, &index, window, rotation, rng);
        }

        Err(RoadGraphError::Dataset(format!(
            "no tile with a non-empty graph after {} draws",
            sampling.max_redraws + 1
        )))
    }

    /// Every evaluation window of every tile with a non-empty graph, unrotated
    pub fn evaluation_examples<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<TrainingExample>> {
        let mut examples = Vec::new();
        for (tile, source) in self.tiles.iter().enumerate() {
            let Some(index) = self.index_for(tile)? else {
                warn!(tile = %source.id, "skipping tile with an empty graph");
                continue;
            };
            let windows = TilePlanner::evaluation(
                source.dimensions(),
                self.config.sampling.sample_margin,
                self.config.patch_size,
            )?;
            for window in windows {
                examples.push(self.example(tile, &index, window, Rotation::R0, rng)?);
            }
        }
        Ok(examples)
    }

    fn example<R: Rng + ?Sized>(
        &self,
        tile: usize,
        index: &GroundTruthIndex,
        window: PatchWindow,
        rotation: Rotation,
        rng: &mut R,
    ) -> Result<TrainingExample> {
        let source = &self.tiles[tile];
        let crop = |image: &GrayImage| {
            image::imageops::crop_imm(image, window.x, window.y, window.width, window.height).to_image()
        };
        let rgb = image::imageops::crop_imm(&source.image, window.x, window.y, window.width, window.height)
            .to_image();

        let sample = self.sampler.sample(index, &window, rotation, rng)?;
        Ok(TrainingExample {
            tile_id: source.id.clone(),
            window,
            rotation,
            rgb: rotation.apply_to_image(&rgb),
            keypoint_mask: to_probability(&rotation.apply_to_image(&crop(&source.keypoint_mask))),
            road_mask: to_probability(&rotation.apply_to_image(&crop(&source.road_mask))),
            sample,
        })
    }
}

fn to_probability(mask: &GrayImage) -> ProbabilityMask {
    ImageBuffer::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([mask.get_pixel(x, y)[0] as f32 / 255.0])
    })
}
