mod common;

use common::synthetic::{
    ColorMaskService, ROAD_END, ROAD_ROW, ROAD_START, black_raster, road_raster, test_config,
};
use roadnet::config::EmbeddingPolicy;
use roadnet::{CoordinateTransform, RoadGraphError, RoadGraphPipeline, RoadSegment};

/// Shifts every coordinate by (+1, -1)
struct OffsetTransform;

impl CoordinateTransform for OffsetTransform {
    fn transform(&self, x: f64, y: f64) -> roadnet::Result<(f64, f64)> {
        Ok((x + 1.0, y - 1.0))
    }
}

fn pipeline(policy: EmbeddingPolicy) -> RoadGraphPipeline {
    RoadGraphPipeline::builder()
        .config(test_config())
        .embedding_policy(policy)
        .build()
        .expect("test config is valid")
}

#[test]
fn road_between_two_keypoints_becomes_one_segment() {
    let service = ColorMaskService::new(256);
    let output = pipeline(EmbeddingPolicy::Retain)
        .run(&road_raster("EPSG:4326"), &service)
        .expect("pipeline should run");

    assert_eq!(output.windows.len(), 9);
    assert_eq!(output.keypoint_mask.dimensions(), (512, 512));
    assert_eq!(output.road_mask.get_pixel(256, ROAD_ROW)[0], 255);

    let start = [ROAD_START as f64, ROAD_ROW as f64];
    let end = [ROAD_END as f64, ROAD_ROW as f64];
    assert_eq!(output.graph.points, vec![start, end]);
    assert_eq!(output.graph.edges, vec![(0, 1)]);
    assert_eq!(
        output.segments,
        vec![RoadSegment {
            start: [3405.0, 2435.0],
            end: [3725.0, 2435.0],
        }]
    );

    // one pass-1 call for the whole image, embeddings reused afterwards
    assert_eq!(service.mask_calls.get(), 1);
    assert_eq!(service.connectivity_calls.get(), 1);

    let geojson: serde_json::Value = serde_json::from_str(&output.to_geojson_string().unwrap()).unwrap();
    assert_eq!(geojson["features"].as_array().unwrap().len(), 1);
}

#[test]
fn symmetric_scores_keep_both_directions() {
    let service = ColorMaskService::new(256).symmetric();
    let output = pipeline(EmbeddingPolicy::Retain)
        .run(&road_raster("EPSG:4326"), &service)
        .unwrap();

    assert_eq!(output.graph.edges, vec![(0, 1), (1, 0)]);
    assert_eq!(output.segments.len(), 2);

    let adjacency = output.adjacency();
    assert_eq!(adjacency.len(), 2);
    assert_eq!(adjacency[&(256, 240)], vec![(256, 272)]);
    assert_eq!(adjacency[&(256, 272)], vec![(256, 240)]);
}

#[test]
fn recompute_matches_retain() {
    let raster = road_raster("EPSG:4326");
    let retained = pipeline(EmbeddingPolicy::Retain)
        .run(&raster, &ColorMaskService::new(256))
        .unwrap();

    let service = ColorMaskService::new(256);
    let recomputed = pipeline(EmbeddingPolicy::Recompute).run(&raster, &service).unwrap();

    assert_eq!(recomputed.graph, retained.graph);
    assert_eq!(recomputed.segments, retained.segments);
    assert_eq!(service.mask_calls.get(), 2);
}

#[test]
fn blank_image_gives_empty_graph() {
    let service = ColorMaskService::new(256);
    let output = pipeline(EmbeddingPolicy::Retain)
        .run(&black_raster(512, 512), &service)
        .unwrap();

    assert!(output.graph.points.is_empty());
    assert!(output.graph.is_empty());
    assert!(output.segments.is_empty());
    assert_eq!(service.connectivity_calls.get(), 0);
}

#[test]
fn unsupported_crs_keeps_graph_without_segments() {
    let output = pipeline(EmbeddingPolicy::Retain)
        .run(&road_raster("LOCAL:site"), &ColorMaskService::new(256))
        .unwrap();

    assert_eq!(output.graph.edge_count(), 1);
    assert!(output.segments.is_empty());
}

#[test]
fn utm_raster_is_reprojected_to_wgs84() {
    let output = pipeline(EmbeddingPolicy::Retain)
        .run(&road_raster("EPSG:32633"), &ColorMaskService::new(256))
        .unwrap();

    assert_eq!(output.segments.len(), 1);
    let RoadSegment { start, end } = output.segments[0];
    // a few km east of false easting 0, so roughly 4.5 degrees west of 15E
    for [lon, lat] in [start, end] {
        assert!((10.0..15.0).contains(&lon), "{lon}");
        assert!(lat.abs() < 0.1, "{lat}");
    }
    assert!(end[0] > start[0]);
}

#[test]
fn supplied_transform_overrides_crs_lookup() {
    let pipeline = RoadGraphPipeline::builder()
        .config(test_config())
        .coordinate_transform(OffsetTransform)
        .build()
        .unwrap();
    let output = pipeline
        .run(&road_raster("LOCAL:site"), &ColorMaskService::new(256))
        .unwrap();

    assert_eq!(
        output.segments,
        vec![RoadSegment {
            start: [3406.0, 2434.0],
            end: [3726.0, 2434.0],
        }]
    );
}

#[test]
fn edge_tiles_are_padded_to_model_size() {
    let output = pipeline(EmbeddingPolicy::Retain)
        .run(&black_raster(300, 200), &ColorMaskService::new(256))
        .expect("short edge tiles should be padded");

    assert_eq!(output.windows.len(), 2);
    assert!(output.windows.iter().all(|w| w.height == 200));
    assert_eq!(output.fused.road.dimensions(), (300, 200));
}

#[test]
fn inference_failure_aborts_the_run() {
    let err = pipeline(EmbeddingPolicy::Retain)
        .run(&road_raster("EPSG:4326"), &ColorMaskService::new(256).failing())
        .unwrap_err();
    assert!(matches!(err, RoadGraphError::Inference(_)));
}

#[test]
fn model_smaller_than_patch_is_rejected() {
    let err = pipeline(EmbeddingPolicy::Retain)
        .run(&road_raster("EPSG:4326"), &ColorMaskService::new(128))
        .unwrap_err();
    assert!(matches!(err, RoadGraphError::InvalidConfig(_)));
}
