use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoadGraphError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tile planning error: {0}")]
    TilePlanning(String),

    #[error("Mask fusion error: {0}")]
    Fusion(String),

    #[error("Inference service error: {0}")]
    Inference(String),

    #[error("Coordinate transform error: {0}")]
    Transform(String),

    #[error("Training data error: {0}")]
    Dataset(String),

    #[error("Raster error: {0}")]
    Raster(#[from] roadnet_common::CommonError),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl RoadGraphError {
    /// Wrap an error raised by an inference backend
    pub fn inference(err: impl std::fmt::Display) -> Self {
        Self::Inference(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RoadGraphError>;
