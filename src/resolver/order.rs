// src/resolver/order.rs

//! Topological ordering with cycle breaking
//!
//! Strongly connected sets are collapsed into components first, which makes
//! the top-level graph acyclic. Leaves (nodes with nothing left in `pre`)
//! are then peeled off, always taking the leaf the most other nodes wait on.
//! Reaching a component breaks it up: edges are dropped one at a time until
//! the members no longer form a single loop, the remaining sub-loops are
//! collapsed, and the members are peeled the same way.

use crate::config::OrderConfig;
use crate::error::{CycleBrokenWarning, Error, Result};
use crate::packages::record::{PackagePool, PkgId};
use crate::resolver::breaker::choose_edge;
use crate::resolver::graph::{DependencyGraph, Direction, EdgeKind, NodeId, NodeKind};
use crate::resolver::index::DependencyIndex;
use crate::resolver::scc::find_components;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use tracing::{debug, warn};

/// Packages in placement order plus the pre-requirements that were ignored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordering {
    pub packages: Vec<PkgId>,
    pub warnings: Vec<CycleBrokenWarning>,
}

/// Index, graph and order a package set in one go
pub fn order_packages(
    pool: &PackagePool,
    packages: &[PkgId],
    direction: Direction,
    config: &OrderConfig,
) -> Result<Ordering> {
    let index = DependencyIndex::build(pool, packages.iter().copied());
    let mut graph = DependencyGraph::build(pool, &index, packages, direction, config);
    order(&mut graph, pool)
}

/// Order every package node of `graph`
///
/// The graph is consumed in the process: placed nodes are detached and
/// dropped edges are gone afterwards.
pub fn order(graph: &mut DependencyGraph, pool: &PackagePool) -> Result<Ordering> {
    let expected = graph.package_nodes();
    let mut scope: BTreeSet<NodeId> = expected.iter().copied().collect();

    for members in find_components(graph, &scope) {
        debug!("Collapsing dependency loop of {} packages", members.len());
        for m in &members {
            scope.remove(m);
        }
        scope.insert(graph.collapse(&members));
    }

    let mut orderer = Orderer {
        graph,
        pool,
        placed: Vec::with_capacity(expected.len()),
        warnings: Vec::new(),
    };
    orderer.peel(scope)?;

    let Orderer { placed, warnings, .. } = orderer;
    let unique: HashSet<PkgId> = placed.iter().copied().collect();
    if placed.len() != expected.len() || unique.len() != placed.len() {
        return Err(Error::GraphInvariantError(format!(
            "ordered {} packages ({} distinct) out of {}",
            placed.len(),
            unique.len(),
            expected.len()
        )));
    }

    Ok(Ordering {
        packages: placed,
        warnings,
    })
}

struct Orderer<'a> {
    graph: &'a mut DependencyGraph,
    pool: &'a PackagePool,
    placed: Vec<PkgId>,
    warnings: Vec<CycleBrokenWarning>,
}

fn pop_highest(buckets: &mut BTreeMap<usize, VecDeque<NodeId>>) -> Option<NodeId> {
    let mut entry = buckets.last_entry()?;
    let node = entry.get_mut().pop_front();
    if entry.get().is_empty() {
        entry.remove();
    }
    node
}

impl Orderer<'_> {
    /// Peel leaves off an acyclic scope until it is empty
    fn peel(&mut self, scope: BTreeSet<NodeId>) -> Result<()> {
        let mut buckets: BTreeMap<usize, VecDeque<NodeId>> = BTreeMap::new();
        for &node in &scope {
            if self.graph.pre(node).is_empty() {
                buckets.entry(self.graph.post(node).len()).or_default().push_back(node);
            }
        }

        let mut remaining = scope.len();
        while let Some(node) = pop_highest(&mut buckets) {
            match self.graph.kind(node).clone() {
                NodeKind::Package(pkg) => self.placed.push(pkg),
                NodeKind::Component(members) => self.break_up(&members)?,
            }
            remaining -= 1;

            for waiter in self.graph.remove_node(node) {
                if self.graph.pre(waiter).is_empty() {
                    buckets.entry(self.graph.post(waiter).len()).or_default().push_back(waiter);
                }
            }
        }

        if remaining != 0 {
            let stuck: Vec<String> = scope
                .iter()
                .filter(|n| self.graph.is_alive(**n))
                .map(|n| self.label(*n))
                .collect();
            return Err(Error::GraphInvariantError(format!(
                "{} nodes still have unplaced pre-requisites: {}",
                remaining,
                stuck.join(", ")
            )));
        }
        Ok(())
    }

    /// Order the members of a collapsed loop
    fn break_up(&mut self, members: &[NodeId]) -> Result<()> {
        let mut scope: BTreeSet<NodeId> = members.iter().copied().collect();

        loop {
            let (from, to) = choose_edge(self.graph, &scope).ok_or_else(|| {
                Error::GraphInvariantError(format!(
                    "component of {} nodes has no edge to remove",
                    scope.len()
                ))
            })?;
            self.drop_edge(from, to);

            let loops = find_components(self.graph, &scope);
            if loops.len() == 1 && loops[0].len() == scope.len() {
                continue;
            }
            for sub in loops {
                for m in &sub {
                    scope.remove(m);
                }
                scope.insert(self.graph.collapse(&sub));
            }
            break;
        }

        self.peel(scope)
    }

    fn drop_edge(&mut self, from: NodeId, to: NodeId) {
        let Some(kind) = self.graph.remove_edge(from, to) else {
            return;
        };
        let (requirer, required) = match self.graph.direction() {
            Direction::Install => (from, to),
            Direction::Erase => (to, from),
        };
        if kind == EdgeKind::Hard {
            let w = CycleBrokenWarning {
                requirer: self.label(requirer),
                required: self.label(required),
            };
            warn!("{}", w);
            self.warnings.push(w);
        } else {
            debug!(
                "Dependency loop: dropping requirement of {} on {}",
                self.label(requirer),
                self.label(required)
            );
        }
    }

    fn label(&self, node: NodeId) -> String {
        match self.graph.kind(node) {
            NodeKind::Package(pkg) => self.pool[*pkg].nevra(),
            NodeKind::Component(members) => {
                let names: Vec<String> = members.iter().map(|m| self.label(*m)).collect();
                format!("({})", names.join(" "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::record::{Dependency, PackageRecord};
    use crate::version::DepFlags;

    fn pool(specs: &[(&str, &[(&str, DepFlags)])]) -> (PackagePool, Vec<PkgId>) {
        let mut pool = PackagePool::new();
        let ids = specs
            .iter()
            .map(|(name, reqs)| {
                let mut rec = PackageRecord::new(name, "1.0", "1");
                for (req, flags) in reqs.iter() {
                    rec.requires.push(Dependency::new(*req, *flags, ""));
                }
                pool.add(rec)
            })
            .collect();
        (pool, ids)
    }

    fn names(pool: &PackagePool, order: &[PkgId]) -> Vec<String> {
        order.iter().map(|id| pool[*id].name.clone()).collect()
    }

    #[test]
    fn test_chain_install_and_erase() {
        let (pool, ids) = pool(&[
            ("app", &[("lib", DepFlags::ANY)]),
            ("lib", &[("base", DepFlags::ANY)]),
            ("base", &[]),
        ]);
        let config = OrderConfig::default();
        let install = order_packages(&pool, &ids, Direction::Install, &config).unwrap();
        assert_eq!(names(&pool, &install.packages), ["base", "lib", "app"]);
        assert!(install.warnings.is_empty());

        let erase = order_packages(&pool, &ids, Direction::Erase, &config).unwrap();
        assert_eq!(names(&pool, &erase.packages), ["app", "lib", "base"]);
    }

    #[test]
    fn test_hard_triangle() {
        let hard = DepFlags::SCRIPT_PRE;
        let (pool, ids) = pool(&[("a", &[("b", hard)]), ("b", &[("c", hard)]), ("c", &[("a", hard)])]);
        let result = order_packages(&pool, &ids, Direction::Install, &OrderConfig::default()).unwrap();
        assert_eq!(names(&pool, &result.packages), ["c", "b", "a"]);
        assert_eq!(
            result.warnings,
            vec![CycleBrokenWarning {
                requirer: "c-1.0-1.noarch".into(),
                required: "a-1.0-1.noarch".into(),
            }]
        );
    }

    #[test]
    fn test_soft_loop_breaks_silently() {
        let (pool, ids) = pool(&[
            ("x", &[("y", DepFlags::ANY)]),
            ("y", &[("x", DepFlags::ANY)]),
            ("z", &[("x", DepFlags::ANY)]),
        ]);
        let result = order_packages(&pool, &ids, Direction::Install, &OrderConfig::default()).unwrap();
        assert!(result.warnings.is_empty());
        let order = names(&pool, &result.packages);
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], "z");
    }

    #[test]
    fn test_nested_loops() {
        let (pool, ids) = pool(&[
            ("a", &[("b", DepFlags::ANY)]),
            ("b", &[("c", DepFlags::ANY), ("a", DepFlags::ANY)]),
            ("c", &[("d", DepFlags::ANY)]),
            ("d", &[("c", DepFlags::ANY), ("e", DepFlags::ANY)]),
            ("e", &[]),
            ("f", &[("a", DepFlags::ANY)]),
        ]);
        let result = order_packages(&pool, &ids, Direction::Install, &OrderConfig::default()).unwrap();
        let order = names(&pool, &result.packages);
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert_eq!(order.len(), 6);
        assert_eq!(pos("e"), 0);
        assert_eq!(pos("f"), 5);
        assert!(pos("c").max(pos("d")) < pos("a").min(pos("b")));
    }

    #[test]
    fn test_leaf_with_most_dependents_first() {
        let (pool, ids) = pool(&[
            ("lonely", &[]),
            ("popular", &[]),
            ("u1", &[("popular", DepFlags::ANY)]),
            ("u2", &[("popular", DepFlags::ANY)]),
        ]);
        let result = order_packages(&pool, &ids, Direction::Install, &OrderConfig::default()).unwrap();
        assert_eq!(names(&pool, &result.packages)[0], "popular");
    }

    #[test]
    fn test_deterministic() {
        let (pool, ids) = pool(&[
            ("a", &[("b", DepFlags::ANY), ("c", DepFlags::SCRIPT_POST)]),
            ("b", &[("c", DepFlags::ANY), ("a", DepFlags::ANY)]),
            ("c", &[("a", DepFlags::SCRIPT_PRE)]),
            ("d", &[]),
        ]);
        let config = OrderConfig::default();
        let first = order_packages(&pool, &ids, Direction::Install, &config).unwrap();
        for _ in 0..5 {
            assert_eq!(order_packages(&pool, &ids, Direction::Install, &config).unwrap(), first);
        }
    }
}
