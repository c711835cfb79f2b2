//! # Roadnet Common - Shared Types and Utilities
//!
//! Shared data structures for the road-graph extraction workspace: raster
//! images with their georeference, patch windows, and the adjacency
//! interchange format used to hand graphs between stages.
//!
//! ## Example
//!
//! ```rust
//! use roadnet_common::{GeoReference, PatchWindow};
//!
//! let window = PatchWindow::new(0, 64, 64, 256, 256);
//! assert_eq!((window.right(), window.bottom()), (320, 320));
//!
//! // GDAL order: x origin, pixel width, row rotation, y origin, column rotation, pixel height
//! let geo = GeoReference::from_gdal([1000.0, 10.0, 0.0, 5000.0, 0.0, -10.0], "EPSG:3857");
//! assert_eq!(geo.pixel_to_projected(1.0, 1.0), (1010.0, 4990.0));
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Standard error type for shared operations
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Window {index} ({x}, {y}, {width}x{height}) exceeds raster bounds {raster_width}x{raster_height}")]
    WindowOutOfBounds {
        index: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        raster_width: u32,
        raster_height: u32,
    },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rectangular pixel window with a stable index inside its plan.
///
/// The window covers columns `x..x + width` and rows `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PatchWindow {
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PatchWindow {
    pub fn new(index: usize, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            index,
            x,
            y,
            width,
            height,
        }
    }

    /// Square window of side `size` at `(x, y)`
    pub fn square(index: usize, x: u32, y: u32, size: u32) -> Self {
        Self::new(index, x, y, size, size)
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Affine pixel→projected transform plus coordinate reference identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoReference {
    /// Coefficients in GDAL order: `[x0, px_w, rot_row, y0, rot_col, px_h]`
    pub gdal: [f64; 6],
    /// Coordinate reference identifier, e.g. `EPSG:3857`
    pub crs: String,
}

impl GeoReference {
    pub fn from_gdal(gdal: [f64; 6], crs: impl Into<String>) -> Self {
        Self {
            gdal,
            crs: crs.into(),
        }
    }

    /// Pixel space is the projected space
    pub fn identity(crs: impl Into<String>) -> Self {
        Self::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0], crs)
    }

    /// Apply the affine transform to a (column, row) pixel coordinate
    pub fn pixel_to_projected(&self, col: f64, row: f64) -> (f64, f64) {
        let [x0, a, b, y0, d, e] = self.gdal;
        (x0 + a * col + b * row, y0 + d * col + e * row)
    }

    /// Check that the transform is invertible and finite
    pub fn validate(&self) -> Result<()> {
        let [_, a, b, _, d, e] = self.gdal;
        if self.gdal.iter().any(|c| !c.is_finite()) {
            return Err(CommonError::InvalidValue {
                message: format!("non-finite geo transform {:?}", self.gdal),
            });
        }
        if (a * e - b * d).abs() < f64::EPSILON {
            return Err(CommonError::InvalidValue {
                message: format!("singular geo transform {:?}", self.gdal),
            });
        }
        Ok(())
    }
}

/// Source raster: RGB pixels plus georeference. Immutable per call.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub pixels: RgbImage,
    pub geo: GeoReference,
}

impl RasterImage {
    pub fn new(pixels: RgbImage, geo: GeoReference) -> Self {
        Self { pixels, geo }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Windowed pixel read. The window must lie inside the raster.
    pub fn read_window(&self, window: &PatchWindow) -> Result<RgbImage> {
        if window.right() > self.width() || window.bottom() > self.height() {
            return Err(CommonError::WindowOutOfBounds {
                index: window.index,
                x: window.x,
                y: window.y,
                width: window.width,
                height: window.height,
                raster_width: self.width(),
                raster_height: self.height(),
            });
        }
        Ok(image::imageops::crop_imm(
            &self.pixels,
            window.x,
            window.y,
            window.width,
            window.height,
        )
        .to_image())
    }
}

/// Integer pixel position as `(row, col)`
pub type PixelKey = (i64, i64);

/// Graph interchange format: vertex `(row, col)` → neighbor `(row, col)`s
pub type AdjacencyMap = BTreeMap<PixelKey, Vec<PixelKey>>;

/// JSON-friendly adjacency helpers. JSON objects cannot be keyed by tuples,
/// so files store a list of `[key, neighbors]` entries.
pub mod adjacency {
    use super::*;

    pub type AdjacencyEntries = Vec<(PixelKey, Vec<PixelKey>)>;

    pub fn to_entries(map: &AdjacencyMap) -> AdjacencyEntries {
        map.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    /// Repeated keys have their neighbor lists concatenated
    pub fn from_entries(entries: AdjacencyEntries) -> AdjacencyMap {
        let mut map = AdjacencyMap::new();
        for (key, neighbors) in entries {
            map.entry(key).or_default().extend(neighbors);
        }
        map
    }

    pub fn from_json(content: &str) -> Result<AdjacencyMap> {
        let entries: AdjacencyEntries = serde_json::from_str(content)?;
        Ok(from_entries(entries))
    }

    pub fn to_json(map: &AdjacencyMap) -> Result<String> {
        Ok(serde_json::to_string(&to_entries(map))?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<AdjacencyMap> {
        let content = fs::read_to_string(path)?;
        from_json(&content)
    }

    pub fn to_json_file<P: AsRef<Path>>(map: &AdjacencyMap, path: P) -> Result<()> {
        fs::write(path, to_json(map)?)?;
        Ok(())
    }

    /// Number of directed adjacency entries
    pub fn edge_count(map: &AdjacencyMap) -> usize {
        map.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_window_edges_are_exclusive() {
        let window = PatchWindow::square(3, 10, 20, 100);
        assert_eq!(window.index, 3);
        assert_eq!((window.right(), window.bottom()), (110, 120));
        assert_eq!(PatchWindow::new(0, 0, 0, 4, 2).bottom(), 2);
    }

    #[test]
    fn test_geo_reference() {
        let geo = GeoReference::from_gdal([1000.0, 10.0, 0.0, 5000.0, 0.0, -10.0], "EPSG:3857");
        assert_eq!(geo.pixel_to_projected(0.5, 0.5), (1005.0, 4995.0));
        assert!(geo.validate().is_ok());

        let singular = GeoReference::from_gdal([0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "EPSG:3857");
        assert!(singular.validate().is_err());
    }

    #[test]
    fn test_read_window() {
        let mut pixels = RgbImage::new(8, 8);
        pixels.put_pixel(5, 6, Rgb([255, 0, 0]));
        let raster = RasterImage::new(pixels, GeoReference::identity("EPSG:3857"));

        let tile = raster.read_window(&PatchWindow::square(0, 4, 4, 4)).unwrap();
        assert_eq!(tile.dimensions(), (4, 4));
        assert_eq!(tile.get_pixel(1, 2), &Rgb([255, 0, 0]));

        assert!(raster.read_window(&PatchWindow::square(1, 6, 6, 4)).is_err());
    }

    #[test]
    fn test_adjacency_json() {
        let json = "[[[1,2],[[3,4]]],[[3,4],[[1,2]]],[[1,2],[[5,6]]]]";
        let map = adjacency::from_json(json).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map[&(1, 2)], vec![(3, 4), (5, 6)]);
        assert_eq!(adjacency::edge_count(&map), 3);

        let back = adjacency::from_json(&adjacency::to_json(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }
}
