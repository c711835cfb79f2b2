//! Planar self-intersection of an embedded graph.
//!
//! Two segments that intersect in the plane without sharing an endpoint
//! vertex produce a crossover (a bridge or tunnel in road terms). Segments
//! that share a vertex meet at a real junction and are skipped.

use geo::Line;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use rstar::{AABB, RTree, RTreeObject};

const DEDUP_EPSILON: f64 = 1e-6;

struct IndexedSegment {
    id: usize,
    line: Line<f64>,
    vertices: [usize; 2],
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let (p1, p2) = self.line.points();
        AABB::from_corners([p1.x(), p1.y()], [p2.x(), p2.y()])
    }
}

/// Find the crossing points among `segments`, each given with the ids of
/// its two endpoint vertices. Collinear overlaps contribute both overlap
/// endpoints. Results are de-duplicated.
pub fn find_crossings(segments: &[(Line<f64>, [usize; 2])]) -> Vec<[f64; 2]> {
    let tree = RTree::bulk_load(
        segments
            .iter()
            .enumerate()
            .map(|(id, (line, vertices))| IndexedSegment {
                id,
                line: *line,
                vertices: *vertices,
            })
            .collect(),
    );

    let mut crossings: Vec<[f64; 2]> = Vec::new();
    for segment in tree.iter() {
        for candidate in tree.locate_in_envelope_intersecting(&segment.envelope()) {
            // each unordered pair once
            if candidate.id <= segment.id {
                continue;
            }
            let shares_vertex = segment
                .vertices
                .iter()
                .any(|v| candidate.vertices.contains(v));
            if shares_vertex {
                continue;
            }

            match line_intersection(segment.line, candidate.line) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    crossings.push([intersection.x, intersection.y]);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    crossings.push([intersection.start.x, intersection.start.y]);
                    crossings.push([intersection.end.x, intersection.end.y]);
                }
                None => {}
            }
        }
    }

    crossings.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    crossings.dedup_by(|a, b| {
        (a[0] - b[0]).abs() < DEDUP_EPSILON && (a[1] - b[1]).abs() < DEDUP_EPSILON
    });
    crossings
}
