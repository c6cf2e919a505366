// src/resolver/breaker.rs

//! Picking the edge to drop from a dependency loop
//!
//! When the loop carries hard edges, nodes are ranked by how far (over soft
//! edges) they sit from the targets of hard edges; the edge into the farthest
//! node is dropped, preferring a soft edge and then the farthest requirer.
//! Without hard edges every edge is scored by how many nodes removing it
//! would free.

use crate::resolver::graph::{DependencyGraph, EdgeKind, NodeId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Choose one edge `(from, to)` inside `scope` to remove
///
/// `scope` must be strongly connected; `None` means it has no internal edge.
pub fn choose_edge(graph: &DependencyGraph, scope: &BTreeSet<NodeId>) -> Option<(NodeId, NodeId)> {
    let hard: Vec<(NodeId, NodeId)> = scope
        .iter()
        .flat_map(|&u| {
            graph
                .pre(u)
                .iter()
                .filter(|(v, k)| **k == EdgeKind::Hard && scope.contains(v))
                .map(move |(&v, _)| (u, v))
        })
        .collect();

    if hard.is_empty() {
        choose_by_score(graph, scope)
    } else {
        choose_by_distance(graph, scope, &hard)
    }
}

/// Soft-edge distance of every scope node from the nearest hard-edge target
fn soft_distances(
    graph: &DependencyGraph,
    scope: &BTreeSet<NodeId>,
    hard: &[(NodeId, NodeId)],
) -> BTreeMap<NodeId, i64> {
    let mut dist: BTreeMap<NodeId, i64> = BTreeMap::new();
    let mut queue = VecDeque::new();
    for &(_, target) in hard {
        if dist.insert(target, 0).is_none() {
            queue.push_back(target);
        }
    }

    while let Some(node) = queue.pop_front() {
        let d = dist[&node];
        for (&next, &kind) in graph.pre(node) {
            if kind == EdgeKind::Soft && scope.contains(&next) && !dist.contains_key(&next) {
                dist.insert(next, d + 1);
                queue.push_back(next);
            }
        }
    }
    dist
}

/// Drop an edge into the node farthest from any hard-edge target
///
/// Among that node's dependents a soft edge is always taken over a hard one,
/// whatever the distances; a hard edge is cut only when every incoming edge
/// of the node is hard. Ties go to the farther requirer, then the lower id.
fn choose_by_distance(
    graph: &DependencyGraph,
    scope: &BTreeSet<NodeId>,
    hard: &[(NodeId, NodeId)],
) -> Option<(NodeId, NodeId)> {
    let dist = soft_distances(graph, scope, hard);
    let distance = |n: &NodeId| dist.get(n).copied().unwrap_or(-1);

    // max_by_key keeps the last maximum, so iterate in reverse for lowest id
    let target = scope
        .iter()
        .rev()
        .filter(|n| graph.post(**n).iter().any(|p| scope.contains(p)))
        .max_by_key(|n| distance(*n))
        .copied()?;

    let source = graph
        .post(target)
        .iter()
        .rev()
        .filter(|p| scope.contains(p))
        .max_by_key(|p| (graph.edge(**p, target) == Some(EdgeKind::Soft), distance(*p)))
        .copied()?;

    Some((source, target))
}

fn choose_by_score(graph: &DependencyGraph, scope: &BTreeSet<NodeId>) -> Option<(NodeId, NodeId)> {
    let pre_count = |n: NodeId| graph.pre(n).keys().filter(|t| scope.contains(t)).count() as i64;
    let post_count = |n: NodeId| graph.post(n).iter().filter(|t| scope.contains(t)).count() as i64;

    let mut best: Option<((i64, i64), (NodeId, NodeId))> = None;
    for &u in scope {
        for &v in graph.pre(u).keys().filter(|v| scope.contains(v)) {
            let (pre_u, post_u) = (pre_count(u), post_count(u));
            let (pre_v, post_v) = (pre_count(v), post_count(v));
            let mut score = 0;
            if pre_u == 1 {
                score += post_u + 1;
            }
            if post_v == 1 {
                score += pre_v + 1;
            }
            let key = (score, post_u - pre_u);
            if best.is_none_or(|(b, _)| key > b) {
                best = Some((key, (u, v)));
            }
        }
    }
    best.map(|(_, edge)| edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::record::PkgId;
    use crate::resolver::graph::Direction;

    fn graph(n: usize, edges: &[(usize, usize, EdgeKind)]) -> (DependencyGraph, Vec<NodeId>) {
        let mut g = DependencyGraph::new(Direction::Install);
        let ids: Vec<NodeId> = (0..n).map(|i| g.add_package(PkgId(i))).collect();
        for &(a, b, k) in edges {
            g.add_edge(ids[a], ids[b], k);
        }
        (g, ids)
    }

    #[test]
    fn test_all_hard_triangle() {
        use EdgeKind::Hard;
        let (g, ids) = graph(3, &[(0, 1, Hard), (1, 2, Hard), (2, 0, Hard)]);
        let scope = ids.iter().copied().collect();
        assert_eq!(choose_edge(&g, &scope), Some((ids[2], ids[0])));
    }

    #[test]
    fn test_prefers_soft_edge_in_mixed_loop() {
        use EdgeKind::{Hard, Soft};
        // 0 -hard-> 1 -soft-> 2 -soft-> 0
        let (g, ids) = graph(3, &[(0, 1, Hard), (1, 2, Soft), (2, 0, Soft)]);
        let scope = ids.iter().copied().collect();
        let (from, to) = choose_edge(&g, &scope).unwrap();
        assert_eq!(g.edge(from, to), Some(Soft));
        assert_eq!((from, to), (ids[2], ids[0]));
    }

    #[test]
    fn test_soft_dependent_wins_over_hard() {
        use EdgeKind::{Hard, Soft};
        // every node is a hard target; 0 is required hard by 1 and soft by 2
        let (g, ids) = graph(3, &[(1, 0, Hard), (2, 0, Soft), (0, 1, Hard), (0, 2, Hard)]);
        let scope = ids.iter().copied().collect();
        assert_eq!(choose_edge(&g, &scope), Some((ids[2], ids[0])));
    }

    #[test]
    fn test_score_frees_most() {
        use EdgeKind::Soft;
        // 0 <-> 1 <-> 2: every edge scores alike, dropping 0 -> 1 frees 0
        let (g, ids) = graph(3, &[(0, 1, Soft), (1, 0, Soft), (1, 2, Soft), (2, 1, Soft)]);
        let scope = ids.iter().copied().collect();
        let (from, to) = choose_edge(&g, &scope).unwrap();
        assert!(scope.contains(&from) && scope.contains(&to));
        assert_eq!((from, to), (ids[0], ids[1]));
    }

    #[test]
    fn test_empty_scope() {
        let (g, _) = graph(1, &[]);
        assert_eq!(choose_edge(&g, &BTreeSet::new()), None);
    }
}
