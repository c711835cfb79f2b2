use std::cell::Cell;

use image::{ImageBuffer, Luma, Rgb, RgbImage};
use roadnet::config::{RoadGraphConfig, TilingConfig};
use roadnet::{InferenceService, MaskPatch, MaskPrediction, PairScores, RoadGraphError, TopologyQuery};
use roadnet_common::{GeoReference, RasterImage};

/// Road row of [`road_raster`]
pub const ROAD_ROW: u32 = 256;
/// First and last road column of [`road_raster`]; both ends are drawn red
pub const ROAD_START: u32 = 240;
pub const ROAD_END: u32 = 272;

pub const GDAL: [f64; 6] = [1000.0, 10.0, 0.0, 5000.0, 0.0, -10.0];

/// 512x512 black raster with one short horizontal road. Road pixels are
/// white except the two endpoints, which are red.
pub fn road_raster(crs: &str) -> RasterImage {
    let mut pixels = RgbImage::new(512, 512);
    for x in ROAD_START..=ROAD_END {
        pixels.put_pixel(x, ROAD_ROW, Rgb([255, 255, 255]));
    }
    pixels.put_pixel(ROAD_START, ROAD_ROW, Rgb([255, 0, 0]));
    pixels.put_pixel(ROAD_END, ROAD_ROW, Rgb([255, 0, 0]));
    RasterImage::new(pixels, GeoReference::from_gdal(GDAL, crs))
}

pub fn black_raster(width: u32, height: u32) -> RasterImage {
    RasterImage::new(RgbImage::new(width, height), GeoReference::from_gdal(GDAL, "EPSG:4326"))
}

/// 256px stride tiling with a 64px overlap, tuned so the road above yields
/// exactly its two endpoints as candidates
pub fn test_config() -> RoadGraphConfig {
    let mut config = RoadGraphConfig::default();
    config.patch_size = 256;
    config.extraction.keypoint_nms_radius = 8.0;
    config.extraction.road_nms_radius = 20.0;
    config.topology.neighbor_radius = 64.0;
    config.topology.max_neighbor_queries = 4;
    config.inference.tiling = TilingConfig::Stride { overlap: 64 };
    config
}

/// Reads masks straight off the pixels: red channel above 128 is road,
/// red without green is a keypoint. Connectivity is 1 for horizontally
/// aligned pairs pointing right (or either way when `symmetric`).
pub struct ColorMaskService {
    pub model_size: u32,
    pub symmetric: bool,
    pub fail_connectivity: bool,
    pub mask_calls: Cell<usize>,
    pub connectivity_calls: Cell<usize>,
}

impl ColorMaskService {
    pub fn new(model_size: u32) -> Self {
        Self {
            model_size,
            symmetric: false,
            fail_connectivity: false,
            mask_calls: Cell::new(0),
            connectivity_calls: Cell::new(0),
        }
    }

    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_connectivity = true;
        self
    }

    fn connected(&self, a: [f64; 2], b: [f64; 2]) -> bool {
        (a[1] - b[1]).abs() < 0.5 && (self.symmetric || a[0] < b[0])
    }
}

impl InferenceService for ColorMaskService {
    /// Number of road pixels in the tile
    type Embedding = usize;

    fn model_input_size(&self) -> u32 {
        self.model_size
    }

    fn predict_masks_and_embedding(&self, tiles: &[RgbImage]) -> roadnet::Result<MaskPrediction<usize>> {
        self.mask_calls.set(self.mask_calls.get() + 1);

        let mut masks = Vec::with_capacity(tiles.len());
        let mut embeddings = Vec::with_capacity(tiles.len());
        for tile in tiles {
            if tile.dimensions() != (self.model_size, self.model_size) {
                return Err(RoadGraphError::inference(format!(
                    "expected {0}x{0} tiles, got {1:?}",
                    self.model_size,
                    tile.dimensions()
                )));
            }
            let road = ImageBuffer::from_fn(tile.width(), tile.height(), |x, y| {
                let p = tile.get_pixel(x, y);
                Luma([if p[0] > 128 { 1.0f32 } else { 0.0 }])
            });
            let keypoint = ImageBuffer::from_fn(tile.width(), tile.height(), |x, y| {
                let p = tile.get_pixel(x, y);
                Luma([if p[0] > 128 && p[1] < 128 { 1.0f32 } else { 0.0 }])
            });
            embeddings.push(road.pixels().filter(|p| p[0] > 0.0).count());
            masks.push(MaskPatch::new(keypoint, road));
        }
        Ok(MaskPrediction { masks, embeddings })
    }

    fn predict_connectivity(
        &self,
        embeddings: &[&usize],
        queries: &[TopologyQuery],
    ) -> roadnet::Result<Vec<PairScores>> {
        self.connectivity_calls.set(self.connectivity_calls.get() + 1);
        if self.fail_connectivity {
            return Err(RoadGraphError::inference("connectivity model unavailable"));
        }
        if embeddings.len() != queries.len() {
            return Err(RoadGraphError::inference(format!(
                "{} embeddings for {} queries",
                embeddings.len(),
                queries.len()
            )));
        }

        Ok(queries
            .iter()
            .map(|query| {
                query
                    .samples
                    .iter()
                    .map(|sample| {
                        sample
                            .pairs
                            .iter()
                            .zip(&sample.valid)
                            .map(|(&(a, b), &valid)| {
                                if !valid {
                                    f32::NAN
                                } else if self.connected(query.points[a], query.points[b]) {
                                    1.0
                                } else {
                                    0.0
                                }
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect())
    }
}
