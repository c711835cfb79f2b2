//! Engine configuration.
//!
//! Every section has defaults matching the reference training setup, so a
//! config file only needs the values it changes. Configuration is validated
//! once when an index, sampler or pipeline is constructed; a failure there is
//! a programming or deployment error, not a runtime condition.

use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoadGraphError};
use crate::graph::CoordConvention;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RoadGraphConfig {
    /// Side of the square model input, in pixels
    #[schemars(range(min = 1))]
    pub patch_size: u32,
    pub sampling: SamplingConfig,
    pub topology: TopologyConfig,
    pub extraction: ExtractionConfig,
    pub inference: InferenceConfig,
    /// Maximum number of ground-truth indices kept in memory
    #[schemars(range(min = 1))]
    pub cache_capacity: usize,
}

impl Default for RoadGraphConfig {
    fn default() -> Self {
        Self {
            patch_size: 256,
            sampling: SamplingConfig::default(),
            topology: TopologyConfig::default(),
            extraction: ExtractionConfig::default(),
            inference: InferenceConfig::default(),
            cache_capacity: 256,
        }
    }
}

/// Training-time ground-truth sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SamplingConfig {
    /// Spacing of points inserted along ground-truth edges
    pub subdivide_step: f64,
    /// Points this close to a crossover are never sampled
    pub crossover_exclude_radius: f64,
    /// Points this close to an intersection or crossover are sampled more often
    pub interest_radius: f64,
    pub interest_weight: f64,
    pub background_weight: f64,
    /// Topology samples drawn per patch
    #[schemars(range(min = 1))]
    pub sample_num: usize,
    /// Standard deviation of the positional noise added to patch points, in pixels
    pub position_noise_std: f64,
    /// Border excluded when drawing training and evaluation windows
    pub sample_margin: u32,
    pub coord_convention: CoordConvention,
    /// Redraws allowed when a drawn tile has an empty graph
    pub max_redraws: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            subdivide_step: 4.0,
            crossover_exclude_radius: 4.0,
            interest_radius: 32.0,
            interest_weight: 0.9,
            background_weight: 0.1,
            sample_num: 512,
            position_noise_std: 1.0,
            sample_margin: 0,
            coord_convention: CoordConvention::RowCol,
            max_redraws: 16,
        }
    }
}

/// Pairing shared by training labels and inference queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TopologyConfig {
    /// Candidate neighbors must be strictly closer than this
    pub neighbor_radius: f64,
    /// Slots per topology sample (K)
    #[schemars(range(min = 1))]
    pub max_neighbor_queries: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            neighbor_radius: 64.0,
            max_neighbor_queries: 16,
        }
    }
}

/// Candidate vertex extraction from fused masks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractionConfig {
    #[schemars(range(min = 0.0, max = 1.0))]
    pub keypoint_threshold: f64,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub road_threshold: f64,
    pub keypoint_nms_radius: f64,
    /// Also the suppression radius used when sampling training patches
    pub road_nms_radius: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            keypoint_threshold: 0.5,
            road_threshold: 0.5,
            keypoint_nms_radius: 8.0,
            road_nms_radius: 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InferenceConfig {
    /// Tiles per inference call
    #[schemars(range(min = 1))]
    pub batch_size: usize,
    pub tiling: TilingConfig,
    pub embedding_policy: EmbeddingPolicy,
    /// Averaged edge scores must be strictly above this to be accepted
    #[schemars(range(min = 0.0, max = 1.0))]
    pub edge_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            tiling: TilingConfig::default(),
            embedding_policy: EmbeddingPolicy::Retain,
            edge_threshold: 0.5,
        }
    }
}

/// How inference windows are laid out. Both modes use `patch_size` windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TilingConfig {
    /// Step by `patch_size - overlap`, plus a final window flush with the far edge
    Stride { overlap: u32 },
    /// Linearly spaced grid between the margins; the count defaults to the
    /// smallest one that covers the image
    Grid {
        margin: u32,
        patches_per_edge: Option<u32>,
    },
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self::Stride { overlap: 64 }
    }
}

/// What happens to per-tile embeddings between the two inference passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingPolicy {
    /// Keep every pass-1 embedding in memory for pass 2
    #[default]
    Retain,
    /// Drop embeddings after pass 1 and run the service again per batch in pass 2
    Recompute,
}

impl RoadGraphConfig {
    /// Check every value the engine relies on
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.patch_size == 0 {
            problems.push("patch_size must be positive".to_string());
        }
        if self.cache_capacity == 0 {
            problems.push("cache_capacity must be positive".to_string());
        }

        let s = &self.sampling;
        if !(s.subdivide_step.is_finite() && s.subdivide_step > 0.0) {
            problems.push(format!("sampling.subdivide_step must be positive, got {}", s.subdivide_step));
        }
        for (name, value) in [
            ("sampling.crossover_exclude_radius", s.crossover_exclude_radius),
            ("sampling.interest_radius", s.interest_radius),
            ("sampling.position_noise_std", s.position_noise_std),
            ("extraction.keypoint_nms_radius", self.extraction.keypoint_nms_radius),
            ("extraction.road_nms_radius", self.extraction.road_nms_radius),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                problems.push(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if !(s.interest_weight > 0.0 && s.background_weight > 0.0) {
            problems.push("sampling weights must be positive".to_string());
        }
        if s.sample_num == 0 {
            problems.push("sampling.sample_num must be positive".to_string());
        }
        if 2 * s.sample_margin as u64 + self.patch_size as u64 > u32::MAX as u64 {
            problems.push("sampling.sample_margin is too large".to_string());
        }
        if let CoordConvention::FlippedRowCol { size } = s.coord_convention {
            if !size.is_finite() {
                problems.push("sampling.coord_convention size must be finite".to_string());
            }
        }

        let t = &self.topology;
        if !(t.neighbor_radius.is_finite() && t.neighbor_radius > 0.0) {
            problems.push(format!("topology.neighbor_radius must be positive, got {}", t.neighbor_radius));
        }
        if t.max_neighbor_queries == 0 {
            problems.push("topology.max_neighbor_queries must be positive".to_string());
        }

        let e = &self.extraction;
        for (name, value) in [
            ("extraction.keypoint_threshold", e.keypoint_threshold),
            ("extraction.road_threshold", e.road_threshold),
            ("inference.edge_threshold", self.inference.edge_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{name} must be within [0, 1], got {value}"));
            }
        }

        let i = &self.inference;
        if i.batch_size == 0 {
            problems.push("inference.batch_size must be positive".to_string());
        }
        match i.tiling {
            TilingConfig::Stride { overlap } if overlap >= self.patch_size => {
                problems.push(format!(
                    "inference.tiling.overlap ({overlap}) must be smaller than patch_size ({})",
                    self.patch_size
                ));
            }
            TilingConfig::Grid { patches_per_edge: Some(0), .. } => {
                problems.push("inference.tiling.patches_per_edge must be positive".to_string());
            }
            _ => {}
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RoadGraphError::InvalidConfig(problems.join("; ")))
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: RoadGraphConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: RoadGraphConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            other => Err(RoadGraphError::InvalidConfig(format!(
                "unsupported config format {other:?}, use .toml or .json"
            ))),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RoadGraphConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RoadGraphConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RoadGraphConfig::from_toml(
            r#"
            patch_size = 512

            [sampling]
            sample_num = 4
            coord_convention = { type = "flipped_row_col", size = 400.0 }

            [inference.tiling]
            mode = "grid"
            margin = 64
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.patch_size, 512);
        assert_eq!(config.sampling.sample_num, 4);
        assert_eq!(config.sampling.subdivide_step, 4.0);
        assert_eq!(config.sampling.coord_convention, CoordConvention::FlippedRowCol { size: 400.0 });
        assert_eq!(
            config.inference.tiling,
            TilingConfig::Grid { margin: 64, patches_per_edge: None }
        );
        assert_eq!(config.topology.max_neighbor_queries, 16);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = RoadGraphConfig::default();
        config.patch_size = 0;
        config.sampling.subdivide_step = 0.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("patch_size"));
        assert!(err.contains("subdivide_step"));

        let mut config = RoadGraphConfig::default();
        config.inference.tiling = TilingConfig::Stride { overlap: 256 };
        assert!(config.validate().is_err());

        let mut config = RoadGraphConfig::default();
        config.inference.edge_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_and_schema() {
        let config = RoadGraphConfig::default();
        let parsed = RoadGraphConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);

        let schema = serde_json::to_value(RoadGraphConfig::schema()).unwrap();
        assert!(schema["properties"]["patch_size"].is_object());
    }
}
