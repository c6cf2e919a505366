// src/resolver/scc.rs

//! Strongly connected components (Gabow's path-based algorithm)
//!
//! Runs over a scope of live nodes and follows `pre` edges that stay inside
//! the scope. The DFS is iterative so deep dependency chains cannot overflow
//! the stack.

use crate::resolver::graph::{DependencyGraph, NodeId};
use std::collections::BTreeSet;

struct Frame {
    node: NodeId,
    successors: Vec<NodeId>,
    next: usize,
}

/// Find every strongly connected set with more than one member
///
/// Members are sorted and the sets are ordered by their smallest member.
pub fn find_components(graph: &DependencyGraph, scope: &BTreeSet<NodeId>) -> Vec<Vec<NodeId>> {
    let size = graph.capacity();
    let mut preorder: Vec<Option<usize>> = vec![None; size];
    let mut assigned = vec![false; size];
    let mut path: Vec<NodeId> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut counter = 0usize;
    let mut found = Vec::new();

    let successors = |node: NodeId| -> Vec<NodeId> {
        graph
            .pre(node)
            .keys()
            .filter(|t| scope.contains(t))
            .copied()
            .collect()
    };

    for &start in scope {
        if preorder[start.0].is_some() {
            continue;
        }

        let mut stack: Vec<Frame> = Vec::new();
        preorder[start.0] = Some(counter);
        roots.push(counter);
        counter += 1;
        path.push(start);
        stack.push(Frame {
            node: start,
            successors: successors(start),
            next: 0,
        });

        while let Some(frame) = stack.last_mut() {
            if let Some(&w) = frame.successors.get(frame.next) {
                frame.next += 1;
                match preorder[w.0] {
                    None => {
                        preorder[w.0] = Some(counter);
                        roots.push(counter);
                        counter += 1;
                        path.push(w);
                        stack.push(Frame {
                            node: w,
                            successors: successors(w),
                            next: 0,
                        });
                    }
                    Some(pw) if !assigned[w.0] => {
                        while roots.last().is_some_and(|&r| r > pw) {
                            roots.pop();
                        }
                    }
                    Some(_) => {}
                }
                continue;
            }

            let v = frame.node;
            stack.pop();
            let Some(pv) = preorder[v.0] else { continue };
            if roots.last() != Some(&pv) {
                continue;
            }
            roots.pop();

            let Some(pos) = path.iter().rposition(|n| *n == v) else {
                continue;
            };
            let mut component = path.split_off(pos);
            for n in &component {
                assigned[n.0] = true;
            }
            if component.len() > 1 {
                component.sort();
                found.push(component);
            }
        }
    }

    found.sort_by_key(|c| c[0]);
    found
}
