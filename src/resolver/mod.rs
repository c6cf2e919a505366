// src/resolver/mod.rs

//! Dependency resolution and transaction ordering
//!
//! `index` answers "who provides this", `graph` turns resolved requirements
//! into ordering edges, `scc` and `breaker` deal with loops, and `order`
//! produces the final placement sequence. `conflict` is an advisory check
//! over the same index.

pub mod breaker;
pub mod conflict;
pub mod graph;
pub mod index;
pub mod order;
mod plan;
pub mod scc;

pub use conflict::{Conflict, check_transaction};
pub use graph::{DependencyGraph, Direction, EdgeKind, GraphStats, NodeId, NodeKind};
pub use index::DependencyIndex;
pub use order::{Ordering, order, order_packages};
pub use plan::ResolutionPlan;

use crate::config::OrderConfig;
use crate::error::Result;
use crate::packages::record::{PackagePool, PkgId};
use tracing::info;

/// Resolver over one package set
pub struct Resolver<'a> {
    pool: &'a PackagePool,
    packages: Vec<PkgId>,
    index: DependencyIndex,
    config: OrderConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(pool: &'a PackagePool, packages: &[PkgId], config: OrderConfig) -> Self {
        Self {
            pool,
            packages: packages.to_vec(),
            index: DependencyIndex::build(pool, packages.iter().copied()),
            config,
        }
    }

    /// Check the set and order it for the given direction
    pub fn resolve(&self, direction: Direction) -> Result<ResolutionPlan> {
        let conflicts = check_transaction(self.pool, &self.index, &self.packages);
        let mut graph = self.graph(direction);
        let Ordering { packages, warnings } = order(&mut graph, self.pool)?;

        info!(
            "Resolved {} packages: {} conflicts, {} dropped pre-requirements",
            packages.len(),
            conflicts.len(),
            warnings.len()
        );
        Ok(ResolutionPlan {
            order: packages,
            conflicts,
            warnings,
        })
    }

    /// Packages that would lose a requirement if `pkg` went away
    pub fn check_removal(&self, pkg: PkgId) -> Vec<PkgId> {
        self.graph(Direction::Install).find_dependents(pkg)
    }

    pub fn graph(&self, direction: Direction) -> DependencyGraph {
        DependencyGraph::build(self.pool, &self.index, &self.packages, direction, &self.config)
    }

    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::record::{Dependency, PackageRecord};

    fn pool() -> (PackagePool, Vec<PkgId>) {
        let mut pool = PackagePool::new();
        let mut app = PackageRecord::new("app", "1", "1");
        app.requires.push(Dependency::named("libc"));
        app.requires.push(Dependency::named("libmissing"));
        let mut tool = PackageRecord::new("tool", "1", "1");
        tool.requires.push(Dependency::named("app"));
        let ids = vec![
            pool.add(app),
            pool.add(PackageRecord::new("libc", "2.39", "1")),
            pool.add(tool),
        ];
        (pool, ids)
    }

    #[test]
    fn test_resolve_install() {
        let (pool, ids) = pool();
        let resolver = Resolver::new(&pool, &ids, OrderConfig::default());
        let plan = resolver.resolve(Direction::Install).unwrap();
        assert_eq!(plan.order, vec![ids[1], ids[0], ids[2]]);
        assert_eq!(plan.conflicts.len(), 1);
        assert!(!plan.is_clean());
    }

    #[test]
    fn test_check_removal() {
        let (pool, ids) = pool();
        let resolver = Resolver::new(&pool, &ids, OrderConfig::default());
        assert_eq!(resolver.check_removal(ids[1]), vec![ids[0], ids[2]]);
        assert!(resolver.check_removal(ids[2]).is_empty());
    }
}
