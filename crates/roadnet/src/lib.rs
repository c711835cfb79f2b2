//! # Road Graph Extraction Library
//!
//! Patch-based extraction of road networks from georeferenced aerial imagery.
//!
//! ## Core Features
//!
//! - **Training Data**: Ground-truth graph indexing, crossover-aware patch sampling
//!   and fixed-size topology labels
//! - **Tiled Inference**: Overlap-averaged mask fusion and cross-tile edge scoring
//!   behind a pluggable [`InferenceService`]
//! - **Graph Assembly**: Thresholded directed edges, adjacency export and
//!   georeferenced GeoJSON output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roadnet::{RoadGraphPipeline, InferenceService};
//! use roadnet_common::RasterImage;
//!
//! fn extract<S: InferenceService>(raster: &RasterImage, service: &S) -> roadnet::Result<String> {
//!     let pipeline = RoadGraphPipeline::builder().build()?;
//!     let output = pipeline.run(raster, service)?;
//!     output.to_geojson_string()
//! }
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod config;
pub mod algorithms;

// Geometry
pub mod spatial;
pub mod nms;
pub mod graph;
pub mod topology;

// Training
pub mod ground_truth;
pub mod sampler;
pub mod dataset;

// Inference
pub mod tiles;
pub mod fusion;
pub mod edges;
pub mod assembly;
pub mod coords;
pub mod pipeline;
pub mod io;

// Re-exports for convenience
pub use error::{Result, RoadGraphError};
pub use types::*;
pub use traits::*;
pub use algorithms::*;
pub use config::{
    EmbeddingPolicy, ExtractionConfig, InferenceConfig, RoadGraphConfig, SamplingConfig, TilingConfig,
    TopologyConfig,
};
pub use assembly::{GraphAssembler, PredictedGraph, RoadSegment};
pub use dataset::{SourceTile, TrainingDataset, TrainingExample};
pub use ground_truth::{GroundTruthCache, GroundTruthIndex};
pub use pipeline::{PipelineOutput, PipelineStage, RoadGraphPipeline, builder::PipelineBuilder};
pub use sampler::{PatchSample, PatchSampler, Rotation};
pub use tiles::TilePlanner;
pub use topology::TopologySample;
