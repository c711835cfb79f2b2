//! Window layouts over a raster.
//!
//! Windows are emitted row-major (top row first, left to right) and their
//! `index` is their position in the returned list, so per-tile data from one
//! pass can be matched with the same window in a later pass.

use rand::Rng;
use roadnet_common::PatchWindow;
use tracing::debug;

use crate::config::{RoadGraphConfig, TilingConfig};
use crate::error::{Result, RoadGraphError};

/// Image dimensions as `(width, height)`
pub type Dimensions = (u32, u32);

pub struct TilePlanner;

impl TilePlanner {
    /// Layout selected by the inference tiling config
    pub fn plan(config: &RoadGraphConfig, dims: Dimensions) -> Result<Vec<PatchWindow>> {
        let patch = config.patch_size;
        let windows = match config.inference.tiling {
            TilingConfig::Stride { overlap } => Self::stride(dims, patch, overlap)?,
            TilingConfig::Grid {
                margin,
                patches_per_edge: None,
            } => Self::evaluation(dims, margin, patch)?,
            TilingConfig::Grid {
                margin,
                patches_per_edge: Some(count),
            } => Self::grid(dims, margin, patch, count)?,
        };
        debug!(width = dims.0, height = dims.1, windows = windows.len(), "planned tiles");
        Ok(windows)
    }

    /// `patches_per_edge` linearly spaced windows per axis between `margin`
    /// and `dim - patch - margin`, start positions rounded half-to-even.
    pub fn grid(dims: Dimensions, margin: u32, patch: u32, patches_per_edge: u32) -> Result<Vec<PatchWindow>> {
        if patches_per_edge == 0 {
            return Err(RoadGraphError::TilePlanning(
                "patches_per_edge must be positive".to_string(),
            ));
        }
        Self::grid_with_counts(dims, margin, patch, (patches_per_edge, patches_per_edge))
    }

    /// Grid with the smallest per-axis count that covers `[margin, dim - margin)`
    pub fn evaluation(dims: Dimensions, margin: u32, patch: u32) -> Result<Vec<PatchWindow>> {
        let counts = (
            Self::eval_patches_per_edge(dims.0, margin, patch)?,
            Self::eval_patches_per_edge(dims.1, margin, patch)?,
        );
        Self::grid_with_counts(dims, margin, patch, counts)
    }

    pub fn eval_patches_per_edge(dim: u32, margin: u32, patch: u32) -> Result<u32> {
        check_fits(dim, margin, patch)?;
        let span = dim - 2 * margin;
        Ok(span.div_ceil(patch))
    }

    /// Windows starting at 0 every `tile - overlap` pixels, plus one window
    /// flush with the far edge. An axis shorter than `tile` gets a single
    /// clipped window.
    pub fn stride(dims: Dimensions, tile: u32, overlap: u32) -> Result<Vec<PatchWindow>> {
        if tile == 0 {
            return Err(RoadGraphError::TilePlanning("tile size must be positive".to_string()));
        }
        if overlap >= tile {
            return Err(RoadGraphError::TilePlanning(format!(
                "overlap ({overlap}) must be smaller than the tile size ({tile})"
            )));
        }
        if dims.0 == 0 || dims.1 == 0 {
            return Err(RoadGraphError::TilePlanning(format!(
                "cannot tile an empty {}x{} image",
                dims.0, dims.1
            )));
        }

        let xs = stride_starts(dims.0, tile, tile - overlap);
        let ys = stride_starts(dims.1, tile, tile - overlap);
        let (w, h) = (tile.min(dims.0), tile.min(dims.1));
        Ok(cartesian(&xs, &ys, w, h))
    }

    /// Uniformly drawn square window inside the margins
    pub fn random_window<R: Rng + ?Sized>(
        rng: &mut R,
        dims: Dimensions,
        margin: u32,
        patch: u32,
    ) -> Result<PatchWindow> {
        check_fits(dims.0, margin, patch)?;
        check_fits(dims.1, margin, patch)?;
        let x = rng.random_range(margin..=dims.0 - patch - margin);
        let y = rng.random_range(margin..=dims.1 - patch - margin);
        Ok(PatchWindow::square(0, x, y, patch))
    }

    fn grid_with_counts(
        dims: Dimensions,
        margin: u32,
        patch: u32,
        (nx, ny): (u32, u32),
    ) -> Result<Vec<PatchWindow>> {
        check_fits(dims.0, margin, patch)?;
        check_fits(dims.1, margin, patch)?;
        let xs = linspace_starts(margin, dims.0 - patch - margin, nx);
        let ys = linspace_starts(margin, dims.1 - patch - margin, ny);
        Ok(cartesian(&xs, &ys, patch, patch))
    }
}

fn check_fits(dim: u32, margin: u32, patch: u32) -> Result<()> {
    if patch == 0 {
        return Err(RoadGraphError::TilePlanning("patch size must be positive".to_string()));
    }
    let needed = patch as u64 + 2 * margin as u64;
    if (dim as u64) < needed {
        return Err(RoadGraphError::TilePlanning(format!(
            "image side {dim} is smaller than patch {patch} plus margins of {margin}"
        )));
    }
    Ok(())
}

fn linspace_starts(lo: u32, hi: u32, count: u32) -> Vec<u32> {
    if count == 1 {
        return vec![lo];
    }
    let (lo_f, hi_f) = (lo as f64, hi as f64);
    let last = (count - 1) as f64;
    (0..count)
        .map(|i| {
            let t = lo_f + (hi_f - lo_f) * i as f64 / last;
            t.round_ties_even() as u32
        })
        .collect()
}

fn stride_starts(dim: u32, tile: u32, step: u32) -> Vec<u32> {
    if dim <= tile {
        return vec![0];
    }
    let last = dim - tile;
    let mut starts: Vec<u32> = (0..last).step_by(step as usize).collect();
    starts.push(last);
    starts
}

fn cartesian(xs: &[u32], ys: &[u32], width: u32, height: u32) -> Vec<PatchWindow> {
    ys.iter()
        .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
        .enumerate()
        .map(|(index, (x, y))| PatchWindow::new(index, x, y, width, height))
        .collect()
}
