use super::RoadGraph;
use crate::spatial::distance;

/// Densified graph plus each point's degree in the graph it came from.
#[derive(Debug, Clone)]
pub struct SubdividedGraph {
    pub graph: RoadGraph,
    /// Degree in the source graph; inserted points report 2
    pub original_degree: Vec<usize>,
}

/// Re-sample every edge at `step`: an edge of length `L` becomes
/// `ceil(L / step)` segments (at least one) of equal length `<= step`.
/// Source vertices keep their indices; inserted points are appended.
pub fn subdivide(graph: &RoadGraph, step: f64) -> SubdividedGraph {
    let mut points = graph.points.clone();
    let mut original_degree = graph.degrees();
    let mut edges = Vec::with_capacity(graph.edges.len());

    for &(a, b) in &graph.edges {
        let (pa, pb) = (graph.points[a], graph.points[b]);
        let dx = pb[0] - pa[0];
        let dy = pb[1] - pa[1];
        let length = distance(pa, pb);
        let segments = ((length / step).ceil() as usize).max(1);

        let mut previous = a;
        for i in 1..segments {
            let t = i as f64 / segments as f64;
            points.push([pa[0] + dx * t, pa[1] + dy * t]);
            original_degree.push(2);
            let current = points.len() - 1;
            edges.push((previous, current));
            previous = current;
        }
        edges.push((previous, b));
    }

    SubdividedGraph {
        graph: RoadGraph { points, edges },
        original_degree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_edge(length: f64) -> RoadGraph {
        RoadGraph {
            points: vec![[0.0, 0.0], [length, 0.0]],
            edges: vec![(0, 1)],
        }
    }

    #[test]
    fn test_segment_count_is_ceil_of_length_over_step() {
        for (length, step, expected) in [
            (10.0, 4.0, 3),
            (12.0, 4.0, 3),
            (3.0, 4.0, 1),
            (100.0, 4.0, 25),
            (4.1, 4.0, 2),
        ] {
            let dense = subdivide(&single_edge(length), step);
            assert_eq!(dense.graph.edge_count(), expected, "length {length}");
            for &(a, b) in &dense.graph.edges {
                let d = distance(dense.graph.points[a], dense.graph.points[b]);
                assert!(d <= step + 1e-9);
            }
        }
    }

    #[test]
    fn test_inserted_points_are_collinear_chain() {
        let dense = subdivide(&single_edge(20.0), 4.0);
        let degrees = dense.graph.degrees();

        assert_eq!(dense.graph.vertex_count(), 6);
        assert_eq!(degrees[0], 1);
        assert_eq!(degrees[1], 1);
        assert!(degrees[2..].iter().all(|&d| d == 2));
        assert_eq!(dense.original_degree, vec![1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_original_degree_survives_subdivision() {
        // star with three arms
        let graph = RoadGraph {
            points: vec![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [-10.0, 0.0]],
            edges: vec![(0, 1), (0, 2), (0, 3)],
        };
        let dense = subdivide(&graph, 4.0);

        assert_eq!(dense.original_degree[0], 3);
        assert_eq!(dense.graph.degrees()[0], 3);
        assert_eq!(dense.graph.edge_count(), 9);
    }
}
