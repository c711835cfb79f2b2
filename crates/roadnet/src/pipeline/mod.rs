pub mod builder;

use image::{GrayImage, RgbImage};
use roadnet_common::{AdjacencyMap, PatchWindow, RasterImage};
use strum::{Display, EnumIter, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::assembly::{GraphAssembler, PredictedGraph, RoadSegment, georeference, georeference_using};
use crate::config::{EmbeddingPolicy, RoadGraphConfig};
use crate::edges::{EdgeAggregate, EdgeScorer, TileQuery};
use crate::error::{Result, RoadGraphError};
use crate::fusion::{FusedMasks, MaskFusionBuffer, pad_replicate};
use crate::tiles::TilePlanner;
use crate::traits::{CoordinateTransform, InferenceService, PointExtractor};
use crate::types::{MaskPrediction, TopologyQuery};

/// Stages of one pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    PlanTiles,
    FuseMasks,
    ExtractPoints,
    ScoreEdges,
    AssembleGraph,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub windows: Vec<PatchWindow>,
    pub fused: FusedMasks,
    pub keypoint_mask: GrayImage,
    pub road_mask: GrayImage,
    pub graph: PredictedGraph,
    /// Empty when georeferencing failed
    pub segments: Vec<RoadSegment>,
}

impl PipelineOutput {
    pub fn adjacency(&self) -> AdjacencyMap {
        self.graph.to_adjacency()
    }

    pub fn to_geojson_string(&self) -> Result<String> {
        crate::io::geojson::to_geojson_string(&self.segments)
    }
}

/// Two-pass tiled inference: dense masks per tile, then pairwise
/// connectivity over the extracted points, then graph assembly.
pub struct RoadGraphPipeline {
    config: RoadGraphConfig,
    extractor: Box<dyn PointExtractor>,
    /// Overrides the lookup by the raster's CRS id
    transform: Option<Box<dyn CoordinateTransform>>,
}

impl RoadGraphPipeline {
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(config: RoadGraphConfig, extractor: Box<dyn PointExtractor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            transform: None,
        })
    }

    pub fn config(&self) -> &RoadGraphConfig {
        &self.config
    }

    /// Run every stage on one raster. An inference failure aborts the run.
    pub fn run<S: InferenceService>(&self, raster: &RasterImage, service: &S) -> Result<PipelineOutput> {
        let windows = {
            let _span = tracing::info_span!("stage", stage = %PipelineStage::PlanTiles).entered();
            let windows = TilePlanner::plan(&self.config, (raster.width(), raster.height()))?;
            self.check_model_size(&windows, service.model_input_size())?;
            info!(tiles = windows.len(), "planned tiles");
            windows
        };

        let (fused, retained) = {
            let _span = tracing::info_span!("stage", stage = %PipelineStage::FuseMasks).entered();
            self.fuse_masks(raster, service, &windows)?
        };
        let (keypoint_mask, road_mask) = fused.quantize();

        let points = {
            let _span = tracing::info_span!("stage", stage = %PipelineStage::ExtractPoints).entered();
            let points = self.extractor.extract_points(&keypoint_mask, &road_mask)?;
            info!(points = points.len(), "extracted candidate points");
            points
        };

        let aggregate = if points.is_empty() {
            warn!("no candidate points, skipping edge scoring");
            EdgeAggregate::new()
        } else {
            let _span = tracing::info_span!("stage", stage = %PipelineStage::ScoreEdges).entered();
            self.score_edges(raster, service, &windows, &points, retained)?
        };

        let _span = tracing::info_span!("stage", stage = %PipelineStage::AssembleGraph).entered();
        let graph = GraphAssembler::new(self.config.inference.edge_threshold).assemble(points, &aggregate);
        let segments = match &self.transform {
            Some(transform) => georeference_using(&graph, &raster.geo, transform.as_ref()),
            None => georeference(&graph, &raster.geo),
        };
        info!(
            points = graph.points.len(),
            edges = graph.edge_count(),
            segments = segments.len(),
            "assembled road graph"
        );

        Ok(PipelineOutput {
            windows,
            fused,
            keypoint_mask,
            road_mask,
            graph,
            segments,
        })
    }

    fn check_model_size(&self, windows: &[PatchWindow], model_size: u32) -> Result<()> {
        match windows.iter().find(|w| w.width > model_size || w.height > model_size) {
            Some(w) => Err(RoadGraphError::InvalidConfig(format!(
                "window {} is {}x{} but the model accepts {model_size}x{model_size}",
                w.index, w.width, w.height
            ))),
            None => Ok(()),
        }
    }

    /// Pass 1. Returns per-batch embeddings when they are retained for pass 2.
    fn fuse_masks<S: InferenceService>(
        &self,
        raster: &RasterImage,
        service: &S,
        windows: &[PatchWindow],
    ) -> Result<(FusedMasks, Option<Vec<Vec<S::Embedding>>>)> {
        let mut buffer = MaskFusionBuffer::new(raster.width(), raster.height());
        let retain = self.config.inference.embedding_policy == EmbeddingPolicy::Retain;
        let mut retained = Vec::new();

        for (batch_index, batch) in windows.chunks(self.config.inference.batch_size).enumerate() {
            let prediction = predict_batch(raster, service, batch)?;
            for (window, mask) in batch.iter().zip(&prediction.masks) {
                buffer.accumulate(window, mask)?;
            }
            debug!(batch = batch_index, tiles = batch.len(), "fused batch");
            if retain {
                retained.push(prediction.embeddings);
            }
        }

        Ok((buffer.finish(), retain.then_some(retained)))
    }

    /// Pass 2
    fn score_edges<S: InferenceService>(
        &self,
        raster: &RasterImage,
        service: &S,
        windows: &[PatchWindow],
        points: &[[f64; 2]],
        retained: Option<Vec<Vec<S::Embedding>>>,
    ) -> Result<EdgeAggregate> {
        let scorer = EdgeScorer::new(points, &self.config.topology);
        let mut aggregate = EdgeAggregate::new();

        for (batch_index, batch) in windows.chunks(self.config.inference.batch_size).enumerate() {
            let tiles: Vec<TileQuery> = batch.iter().map(|w| scorer.prepare(w)).collect();
            if tiles.iter().all(TileQuery::is_empty) {
                debug!(batch = batch_index, "no candidate points in batch");
                continue;
            }

            let recomputed;
            let embeddings = match &retained {
                Some(retained) => retained.get(batch_index).ok_or_else(|| {
                    RoadGraphError::inference(format!("no retained embeddings for batch {batch_index}"))
                })?,
                None => {
                    recomputed = predict_batch(raster, service, batch)?;
                    &recomputed.embeddings
                }
            };

            let embedding_refs: Vec<&S::Embedding> = embeddings.iter().collect();
            let queries: Vec<TopologyQuery> = tiles.iter().map(|t| t.query.clone()).collect();
            let scores = service.predict_connectivity(&embedding_refs, &queries)?;
            if scores.len() != tiles.len() {
                return Err(RoadGraphError::inference(format!(
                    "connectivity returned {} results for {} tiles",
                    scores.len(),
                    tiles.len()
                )));
            }
            for (tile, tile_scores) in tiles.iter().zip(&scores) {
                EdgeScorer::accumulate(&mut aggregate, tile, tile_scores)?;
            }
        }

        info!(directed_pairs = aggregate.len(), "scored candidate edges");
        Ok(aggregate)
    }
}

/// Read, pad and predict one batch of windows
fn predict_batch<S: InferenceService>(
    raster: &RasterImage,
    service: &S,
    batch: &[PatchWindow],
) -> Result<MaskPrediction<S::Embedding>> {
    let size = service.model_input_size();
    let tiles = batch
        .iter()
        .map(|window| pad_replicate(&raster.read_window(window)?, size))
        .collect::<Result<Vec<RgbImage>>>()?;

    let prediction = service.predict_masks_and_embedding(&tiles)?;
    if prediction.masks.len() != batch.len() || prediction.embeddings.len() != batch.len() {
        return Err(RoadGraphError::inference(format!(
            "service returned {} masks and {} embeddings for {} tiles",
            prediction.masks.len(),
            prediction.embeddings.len(),
            batch.len()
        )));
    }
    Ok(prediction)
}
