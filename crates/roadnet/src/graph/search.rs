use std::collections::{HashSet, VecDeque};

/// Breadth-first search from `source` over `adjacency`, at most `max_depth`
/// hops. Returns the members of `targets` that were reached. Expansion
/// stops at a reached target, so a target only counts when no other target
/// lies between it and the source.
pub fn reachable_within(
    adjacency: &[Vec<usize>],
    source: usize,
    targets: &HashSet<usize>,
    max_depth: usize,
) -> HashSet<usize> {
    let mut reached = HashSet::new();
    if targets.is_empty() {
        return reached;
    }

    let mut visited = HashSet::from([source]);
    let mut queue = VecDeque::from([(source, 0usize)]);

    while let Some((vertex, depth)) = queue.pop_front() {
        if vertex != source && targets.contains(&vertex) {
            reached.insert(vertex);
            if reached.len() == targets.len() {
                break;
            }
            continue;
        }
        if depth >= max_depth {
            continue;
        }
        for &next in &adjacency[vertex] {
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: usize) -> Vec<Vec<usize>> {
        (0..n)
            .map(|i| {
                let mut neighbors = Vec::new();
                if i > 0 {
                    neighbors.push(i - 1);
                }
                if i + 1 < n {
                    neighbors.push(i + 1);
                }
                neighbors
            })
            .collect()
    }

    #[test]
    fn test_reaches_targets_within_depth() {
        let adjacency = path(20);
        let reached = reachable_within(&adjacency, 0, &HashSet::from([4]), 4);
        assert_eq!(reached, HashSet::from([4]));

        let too_far = reachable_within(&adjacency, 0, &HashSet::from([5]), 4);
        assert!(too_far.is_empty());
    }

    #[test]
    fn test_expansion_stops_at_first_target() {
        let adjacency = path(20);
        let reached = reachable_within(&adjacency, 10, &HashSet::from([8, 6, 13]), 16);
        assert_eq!(reached, HashSet::from([8, 13]));
    }

    #[test]
    fn test_disconnected_components() {
        let mut adjacency = path(5);
        adjacency.extend(path(5).into_iter().map(|n| n.into_iter().map(|v| v + 5).collect()));
        let reached = reachable_within(&adjacency, 2, &HashSet::from([7]), 10);
        assert!(reached.is_empty());
    }
}
