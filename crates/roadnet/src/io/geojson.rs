use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, Value};

use crate::assembly::RoadSegment;
use crate::error::{Result, RoadGraphError};

/// One two-point `LineString` feature per segment, with empty properties
pub fn to_feature_collection(segments: &[RoadSegment]) -> FeatureCollection {
    let features = segments
        .iter()
        .map(|segment| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                segment.start.to_vec(),
                segment.end.to_vec(),
            ]))),
            id: None,
            properties: Some(serde_json::Map::new()),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn to_geojson_string(segments: &[RoadSegment]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_feature_collection(segments))?)
}

pub fn save_geojson<P: AsRef<Path>>(segments: &[RoadSegment], path: P) -> Result<()> {
    std::fs::write(path, to_geojson_string(segments)?)?;
    Ok(())
}

/// Read segments back from a collection of two-point `LineString`s
pub fn from_geojson_str(content: &str) -> Result<Vec<RoadSegment>> {
    let collection: FeatureCollection = content.parse()?;
    collection
        .features
        .into_iter()
        .filter_map(|feature| feature.geometry)
        .map(|geometry| match geometry.value {
            Value::LineString(coords) if coords.len() == 2 && coords.iter().all(|c| c.len() >= 2) => {
                Ok(RoadSegment {
                    start: [coords[0][0], coords[0][1]],
                    end: [coords[1][0], coords[1][1]],
                })
            }
            _ => Err(RoadGraphError::Transform(
                "expected two-point LineString geometries".to_string(),
            )),
        })
        .collect()
}
