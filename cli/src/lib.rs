use roadnet::SourceTile;
use roadnet_common::adjacency;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    Common(#[from] roadnet_common::CommonError),
    #[error("Manifest lists no tiles")]
    EmptyManifest,
    #[error("Expected 6 comma-separated GDAL coefficients, got {0:?}")]
    InvalidGeoTransform(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One training tile on disk
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TileEntry {
    pub id: String,
    pub image: PathBuf,
    pub keypoint_mask: PathBuf,
    pub road_mask: PathBuf,
    /// Adjacency JSON: a list of `[[row, col], [[row, col], ...]]` entries
    pub graph: PathBuf,
}

/// Set of training tiles. Relative paths resolve against `root`, or against
/// the manifest's own directory when `root` is absent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DatasetManifest {
    pub root: Option<PathBuf>,
    pub tiles: Vec<TileEntry>,
}

impl DatasetManifest {
    /// Load a manifest from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(&path)?;
        Ok(Self::from_toml(&content)?.anchored_at(path.as_ref()))
    }

    /// Load a manifest from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let manifest: DatasetManifest = toml::from_str(content)?;
        manifest.check()
    }

    /// Load a manifest from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(&path)?;
        Ok(Self::from_json(&content)?.anchored_at(path.as_ref()))
    }

    /// Load a manifest from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        let manifest: DatasetManifest = serde_json::from_str(content)?;
        manifest.check()
    }

    /// Auto-detect file format and load the manifest
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    fn check(self) -> Result<Self, CliError> {
        if self.tiles.is_empty() {
            return Err(CliError::EmptyManifest);
        }
        Ok(self)
    }

    fn anchored_at(mut self, manifest_path: &Path) -> Self {
        if self.root.is_none() {
            self.root = manifest_path.parent().map(Path::to_path_buf);
        }
        self
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read every listed image, mask and graph
    pub fn load_tiles(&self) -> Result<Vec<SourceTile>, CliError> {
        self.tiles
            .iter()
            .map(|entry| {
                Ok(SourceTile {
                    id: entry.id.clone(),
                    image: image::open(self.resolve(&entry.image))?.to_rgb8(),
                    keypoint_mask: image::open(self.resolve(&entry.keypoint_mask))?.to_luma8(),
                    road_mask: image::open(self.resolve(&entry.road_mask))?.to_luma8(),
                    adjacency: adjacency::from_json_file(self.resolve(&entry.graph))?,
                })
            })
            .collect()
    }
}

/// Parse `"x0,a,b,y0,d,e"` GDAL geotransform coefficients
pub fn parse_geotransform(value: &str) -> Result<[f64; 6], CliError> {
    let invalid = || CliError::InvalidGeoTransform(value.to_string());
    let coefficients = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<f64>, CliError>>()?;
    coefficients.try_into().map_err(|_| invalid())
}
