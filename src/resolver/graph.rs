// src/resolver/graph.rs

//! Ordering graph over a package set
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. A node is either a
//! package or a component standing in for a collapsed strongly connected
//! set. Every node keeps both directions of its edges: `pre` holds the nodes
//! that must be placed before it (with the edge kind), `post` the nodes that
//! wait on it. Hard edges come from scriptlet pre-requirements and always win
//! over soft ones when both exist between the same pair.

use crate::config::OrderConfig;
use crate::packages::record::{PackagePool, PkgId};
use crate::resolver::index::DependencyIndex;
use crate::version::DepFlags;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Arena handle of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Strength of an ordering edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    Soft,
    Hard,
}

/// Which way requirements point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Required packages go in before their requirers
    Install,
    /// Requirers go out before the packages they require
    Erase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Package(PkgId),
    Component(Vec<NodeId>),
}

#[derive(Debug, Clone)]
struct GraphNode {
    kind: NodeKind,
    pre: BTreeMap<NodeId, EdgeKind>,
    post: BTreeSet<NodeId>,
    alive: bool,
}

impl GraphNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            pre: BTreeMap::new(),
            post: BTreeSet::new(),
            alive: true,
        }
    }
}

/// Classify a requirement for the given direction
pub fn edge_kind(flags: DepFlags, direction: Direction, config: &OrderConfig) -> EdgeKind {
    let hard = (config.legacy_prereq_is_hard && flags.is_legacy_prereq())
        || match direction {
            Direction::Install => flags.is_install_prereq(),
            Direction::Erase => flags.is_erase_prereq(),
        };
    if hard { EdgeKind::Hard } else { EdgeKind::Soft }
}

/// Dependency graph used for ordering
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    by_pkg: HashMap<PkgId, NodeId>,
    direction: Direction,
}

impl DependencyGraph {
    pub fn new(direction: Direction) -> Self {
        Self {
            nodes: Vec::new(),
            by_pkg: HashMap::new(),
            direction,
        }
    }

    /// Build the graph for `packages`, resolving requirements through `index`
    ///
    /// Only packages in the set become edge endpoints; requirements satisfied
    /// from outside the set impose no order. Above the configured threshold
    /// the per-package edge lists are computed on the rayon pool and merged
    /// in package order, so the result does not depend on scheduling.
    pub fn build(
        pool: &PackagePool,
        index: &DependencyIndex,
        packages: &[PkgId],
        direction: Direction,
        config: &OrderConfig,
    ) -> Self {
        let mut graph = Self::new(direction);
        for &pkg in packages {
            graph.add_package(pkg);
        }

        let members: HashSet<PkgId> = packages.iter().copied().collect();
        let edges_of = |&pkg: &PkgId| -> Vec<(PkgId, PkgId, EdgeKind)> {
            let mut edges = Vec::new();
            for req in &pool[pkg].requires {
                if config.skip_rpmlib && req.is_rpmlib() {
                    continue;
                }
                let kind = edge_kind(req.flags, direction, config);
                for provider in index.resolve_dep(req) {
                    if provider == pkg || !members.contains(&provider) {
                        continue;
                    }
                    edges.push(match direction {
                        Direction::Install => (pkg, provider, kind),
                        Direction::Erase => (provider, pkg, kind),
                    });
                }
            }
            edges
        };

        let edge_lists: Vec<Vec<(PkgId, PkgId, EdgeKind)>> = if packages.len() >= config.parallel_threshold {
            packages.par_iter().map(edges_of).collect()
        } else {
            packages.iter().map(edges_of).collect()
        };

        for (from, to, kind) in edge_lists.into_iter().flatten() {
            if let (Some(&a), Some(&b)) = (graph.by_pkg.get(&from), graph.by_pkg.get(&to)) {
                graph.add_edge(a, b, kind);
            }
        }

        let stats = graph.stats();
        debug!(
            "Built {:?} graph: {} packages, {} edges ({} hard)",
            direction, stats.total_packages, stats.total_edges, stats.hard_edges
        );
        graph
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Add a package node, returning the existing node if already present
    pub fn add_package(&mut self, pkg: PkgId) -> NodeId {
        if let Some(&id) = self.by_pkg.get(&pkg) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode::new(NodeKind::Package(pkg)));
        self.by_pkg.insert(pkg, id);
        id
    }

    /// Record that `from` must come after `to`
    ///
    /// Self edges are ignored. A hard edge upgrades an existing soft one.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        if from == to {
            return;
        }
        let slot = self.nodes[from.0].pre.entry(to).or_insert(kind);
        *slot = (*slot).max(kind);
        self.nodes[to.0].post.insert(from);
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Option<EdgeKind> {
        let kind = self.nodes[from.0].pre.remove(&to)?;
        self.nodes[to.0].post.remove(&from);
        Some(kind)
    }

    /// Detach a placed node, returning the nodes that were waiting on it
    pub fn remove_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let node = &mut self.nodes[id.0];
        node.alive = false;
        let pre: Vec<NodeId> = std::mem::take(&mut node.pre).into_keys().collect();
        let post: Vec<NodeId> = std::mem::take(&mut node.post).into_iter().collect();
        for p in &pre {
            self.nodes[p.0].post.remove(&id);
        }
        for p in &post {
            self.nodes[p.0].pre.remove(&id);
        }
        post
    }

    /// Replace a strongly connected set with one component node
    ///
    /// Edges leaving or entering the set are moved onto the component with
    /// their kinds; edges inside the set stay on the members.
    pub fn collapse(&mut self, members: &[NodeId]) -> NodeId {
        let set: BTreeSet<NodeId> = members.iter().copied().collect();
        let comp = NodeId(self.nodes.len());
        self.nodes
            .push(GraphNode::new(NodeKind::Component(set.iter().copied().collect())));

        for &m in &set {
            let outward: Vec<(NodeId, EdgeKind)> = self.nodes[m.0]
                .pre
                .iter()
                .filter(|(t, _)| !set.contains(t))
                .map(|(t, k)| (*t, *k))
                .collect();
            for (target, kind) in outward {
                self.remove_edge(m, target);
                self.add_edge(comp, target, kind);
            }

            let inward: Vec<NodeId> = self.nodes[m.0]
                .post
                .iter()
                .filter(|p| !set.contains(p))
                .copied()
                .collect();
            for waiter in inward {
                if let Some(kind) = self.remove_edge(waiter, m) {
                    self.add_edge(waiter, comp, kind);
                }
            }
        }
        comp
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn pre(&self, id: NodeId) -> &BTreeMap<NodeId, EdgeKind> {
        &self.nodes[id.0].pre
    }

    pub fn post(&self, id: NodeId) -> &BTreeSet<NodeId> {
        &self.nodes[id.0].post
    }

    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<EdgeKind> {
        self.nodes[from.0].pre.get(&to).copied()
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes[id.0].alive
    }

    pub fn node_of(&self, pkg: PkgId) -> Option<NodeId> {
        self.by_pkg.get(&pkg).copied()
    }

    /// Total arena size, dead and component nodes included
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn package_count(&self) -> usize {
        self.by_pkg.len()
    }

    /// Live package nodes in arena order
    pub fn package_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.alive && matches!(n.kind, NodeKind::Package(_)))
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Packages that (transitively) wait on the given package
    pub fn find_dependents(&self, pkg: PkgId) -> Vec<PkgId> {
        let Some(start) = self.node_of(pkg) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut queue = vec![start];
        while let Some(node) = queue.pop() {
            for &waiter in &self.nodes[node.0].post {
                if seen.insert(waiter) {
                    queue.push(waiter);
                }
            }
        }
        seen.into_iter()
            .filter_map(|n| match self.nodes[n.0].kind {
                NodeKind::Package(p) if p != pkg => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            total_packages: self.by_pkg.len(),
            ..Default::default()
        };
        for node in self.nodes.iter().filter(|n| n.alive) {
            stats.total_edges += node.pre.len();
            stats.hard_edges += node.pre.values().filter(|k| **k == EdgeKind::Hard).count();
            stats.max_dependencies = stats.max_dependencies.max(node.pre.len());
            stats.max_dependents = stats.max_dependents.max(node.post.len());
        }
        stats
    }
}

/// Statistics about the dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub total_packages: usize,
    pub total_edges: usize,
    pub hard_edges: usize,
    pub max_dependencies: usize,
    pub max_dependents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::record::{Dependency, PackageRecord};

    fn chain(flags: DepFlags) -> (PackagePool, Vec<PkgId>) {
        let mut pool = PackagePool::new();
        let mut a = PackageRecord::new("a", "1", "1");
        a.requires.push(Dependency::new("b", flags, ""));
        a.requires.push(Dependency::named("rpmlib(PayloadIsXz)"));
        let b = PackageRecord::new("b", "1", "1");
        let ids = vec![pool.add(a), pool.add(b)];
        (pool, ids)
    }

    #[test]
    fn test_install_edge_direction() {
        let (pool, ids) = chain(DepFlags::ANY);
        let index = DependencyIndex::build(&pool, ids.iter().copied());
        let g = DependencyGraph::build(&pool, &index, &ids, Direction::Install, &OrderConfig::default());
        let (a, b) = (g.node_of(ids[0]).unwrap(), g.node_of(ids[1]).unwrap());
        assert_eq!(g.edge(a, b), Some(EdgeKind::Soft));
        assert!(g.post(b).contains(&a));
        assert_eq!(g.stats().total_edges, 1);
    }

    #[test]
    fn test_erase_edge_direction() {
        let (pool, ids) = chain(DepFlags::SCRIPT_PREUN);
        let index = DependencyIndex::build(&pool, ids.iter().copied());
        let g = DependencyGraph::build(&pool, &index, &ids, Direction::Erase, &OrderConfig::default());
        let (a, b) = (g.node_of(ids[0]).unwrap(), g.node_of(ids[1]).unwrap());
        assert_eq!(g.edge(b, a), Some(EdgeKind::Hard));
        assert_eq!(g.edge(a, b), None);
    }

    #[test]
    fn test_edge_kinds() {
        let config = OrderConfig::default();
        assert_eq!(edge_kind(DepFlags::SCRIPT_POST, Direction::Install, &config), EdgeKind::Hard);
        assert_eq!(edge_kind(DepFlags::SCRIPT_POST, Direction::Erase, &config), EdgeKind::Soft);
        assert_eq!(edge_kind(DepFlags::SCRIPT_POSTUN, Direction::Erase, &config), EdgeKind::Hard);
        assert_eq!(edge_kind(DepFlags::PREREQ, Direction::Erase, &config), EdgeKind::Hard);

        let relaxed = OrderConfig {
            legacy_prereq_is_hard: false,
            ..Default::default()
        };
        assert_eq!(edge_kind(DepFlags::PREREQ, Direction::Install, &relaxed), EdgeKind::Soft);
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let (pool, ids) = chain(DepFlags::SCRIPT_PRE);
        let index = DependencyIndex::build(&pool, ids.iter().copied());
        let parallel = OrderConfig {
            parallel_threshold: 1,
            ..Default::default()
        };
        let g1 = DependencyGraph::build(&pool, &index, &ids, Direction::Install, &OrderConfig::default());
        let g2 = DependencyGraph::build(&pool, &index, &ids, Direction::Install, &parallel);
        assert_eq!(g1.stats(), g2.stats());
    }

    #[test]
    fn test_hard_wins_and_collapse() {
        let mut g = DependencyGraph::new(Direction::Install);
        let n: Vec<NodeId> = (0..4).map(|i| g.add_package(PkgId(i))).collect();
        g.add_edge(n[0], n[1], EdgeKind::Soft);
        g.add_edge(n[0], n[1], EdgeKind::Hard);
        g.add_edge(n[0], n[1], EdgeKind::Soft);
        assert_eq!(g.edge(n[0], n[1]), Some(EdgeKind::Hard));
        g.add_edge(n[1], n[0], EdgeKind::Soft);
        g.add_edge(n[1], n[2], EdgeKind::Hard);
        g.add_edge(n[3], n[0], EdgeKind::Soft);
        g.add_edge(n[2], n[2], EdgeKind::Hard);

        let comp = g.collapse(&[n[0], n[1]]);
        assert_eq!(g.kind(comp), &NodeKind::Component(vec![n[0], n[1]]));
        assert_eq!(g.edge(comp, n[2]), Some(EdgeKind::Hard));
        assert_eq!(g.edge(n[3], comp), Some(EdgeKind::Soft));
        assert_eq!(g.edge(n[1], n[2]), None);
        assert_eq!(g.edge(n[0], n[1]), Some(EdgeKind::Hard));
        assert!(g.pre(n[2]).is_empty());

        let freed = g.remove_node(n[2]);
        assert_eq!(freed, vec![comp]);
        assert!(g.pre(comp).is_empty());
        assert!(!g.is_alive(n[2]));
        assert_eq!(g.find_dependents(PkgId(2)), Vec::<PkgId>::new());
    }

    #[test]
    fn test_find_dependents() {
        let mut g = DependencyGraph::new(Direction::Install);
        let n: Vec<NodeId> = (0..3).map(|i| g.add_package(PkgId(i))).collect();
        g.add_edge(n[0], n[1], EdgeKind::Soft);
        g.add_edge(n[1], n[2], EdgeKind::Soft);
        assert_eq!(g.find_dependents(PkgId(2)), vec![PkgId(0), PkgId(1)]);
    }
}
