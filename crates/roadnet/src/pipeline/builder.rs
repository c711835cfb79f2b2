use crate::{
    algorithms::ThresholdPointExtractor,
    config::{EmbeddingPolicy, RoadGraphConfig, TilingConfig},
    error::Result,
    pipeline::RoadGraphPipeline,
    traits::{CoordinateTransform, PointExtractor},
};

/// Builder for creating road graph pipelines with a fluent API
pub struct PipelineBuilder {
    config: Option<RoadGraphConfig>,
    extractor: Option<Box<dyn PointExtractor>>,
    transform: Option<Box<dyn CoordinateTransform>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: None,
            extractor: None,
            transform: None,
        }
    }

    /// Use this configuration (replaces any existing one)
    pub fn config(mut self, config: RoadGraphConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the point extractor (replaces any existing one)
    pub fn extractor<E>(mut self, extractor: E) -> Self
    where
        E: PointExtractor + 'static,
    {
        self.extractor = Some(Box::new(extractor));
        self
    }

    /// Reproject through `transform` instead of looking one up from the
    /// raster's CRS id
    pub fn coordinate_transform<T>(mut self, transform: T) -> Self
    where
        T: CoordinateTransform + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn embedding_policy(mut self, policy: EmbeddingPolicy) -> Self {
        self.config.get_or_insert_with(RoadGraphConfig::default).inference.embedding_policy = policy;
        self
    }

    pub fn tiling(mut self, tiling: TilingConfig) -> Self {
        self.config.get_or_insert_with(RoadGraphConfig::default).inference.tiling = tiling;
        self
    }

    pub fn edge_threshold(mut self, threshold: f64) -> Self {
        self.config.get_or_insert_with(RoadGraphConfig::default).inference.edge_threshold = threshold;
        self
    }

    /// Build the pipeline, defaulting to the threshold extractor configured
    /// by `config.extraction`
    pub fn build(self) -> Result<RoadGraphPipeline> {
        let config = self.config.unwrap_or_default();
        let extractor = self
            .extractor
            .unwrap_or_else(|| Box::new(ThresholdPointExtractor::new(&config.extraction)));
        let mut pipeline = RoadGraphPipeline::new(config, extractor)?;
        pipeline.transform = self.transform;
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
