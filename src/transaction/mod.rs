// src/transaction/mod.rs

//! Transaction requests and their ordered operation lists
//!
//! A request names four package sets: packages to install, packages that
//! update installed ones, packages that obsolete installed ones, and
//! packages to erase. Ordering runs in two passes:
//!
//! ```text
//! install + update + obsolete --(install direction)--> placement order
//! erase                       --(erase direction)----> removal order
//! ```
//!
//! The removal order follows the placement order. Packages replaced by an
//! update or obsolete are erased right after their replacement.

use crate::config::OrderConfig;
use crate::error::{CycleBrokenWarning, Error, Result};
use crate::packages::record::{PackagePool, PkgId};
use crate::resolver::{Direction, order_packages};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, info};

/// What happens to a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Install,
    Update,
    Erase,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Erase => "erase",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of an ordered transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub kind: OpKind,
    pub package: PkgId,
    /// Packages erased immediately after this one, in removal order
    pub supersedes: Vec<PkgId>,
}

impl Operation {
    pub fn install(package: PkgId) -> Self {
        Self {
            kind: OpKind::Install,
            package,
            supersedes: Vec::new(),
        }
    }

    pub fn erase(package: PkgId) -> Self {
        Self {
            kind: OpKind::Erase,
            package,
            supersedes: Vec::new(),
        }
    }
}

/// A transaction request over packages in one pool
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    install: BTreeSet<PkgId>,
    updates: BTreeMap<PkgId, Vec<PkgId>>,
    obsoletes: BTreeMap<PkgId, Vec<PkgId>>,
    erase: BTreeSet<PkgId>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, pkg: PkgId) -> &mut Self {
        self.install.insert(pkg);
        self
    }

    /// `new` replaces the installed `old`
    pub fn update(&mut self, new: PkgId, old: PkgId) -> &mut Self {
        let list = self.updates.entry(new).or_default();
        if !list.contains(&old) {
            list.push(old);
        }
        self
    }

    /// `new` obsoletes the installed `old`
    pub fn obsolete(&mut self, new: PkgId, old: PkgId) -> &mut Self {
        let list = self.obsoletes.entry(new).or_default();
        if !list.contains(&old) {
            list.push(old);
        }
        self
    }

    pub fn erase(&mut self, pkg: PkgId) -> &mut Self {
        self.erase.insert(pkg);
        self
    }

    /// Everything that ends up installed, in handle order
    pub fn incoming(&self) -> Vec<PkgId> {
        let mut all: BTreeSet<PkgId> = self.install.clone();
        all.extend(self.updates.keys().copied());
        all.extend(self.obsoletes.keys().copied());
        all.into_iter().collect()
    }

    pub fn erasures(&self) -> Vec<PkgId> {
        self.erase.iter().copied().collect()
    }

    pub fn is_erased(&self, pkg: PkgId) -> bool {
        self.erase.contains(&pkg)
    }

    /// Packages replaced by `pkg`, updates first
    pub fn superseded(&self, pkg: PkgId) -> Vec<PkgId> {
        let mut out: Vec<PkgId> = Vec::new();
        let lists = [self.updates.get(&pkg), self.obsoletes.get(&pkg)];
        for old in lists.into_iter().flatten().flatten() {
            if !out.contains(old) {
                out.push(*old);
            }
        }
        out
    }

    pub fn replaces(&self, pkg: PkgId) -> bool {
        self.updates.contains_key(&pkg) || self.obsoletes.contains_key(&pkg)
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.updates.is_empty() && self.obsoletes.is_empty() && self.erase.is_empty()
    }

    /// Reject requests that install and remove the same package
    pub fn validate(&self, pool: &PackagePool) -> Result<()> {
        let name = |p: PkgId| pool.get(p).map(|r| r.nevra()).unwrap_or_else(|| p.to_string());

        let incoming = self.incoming();
        for &pkg in incoming.iter().chain(self.erase.iter()) {
            if pool.get(pkg).is_none() {
                return Err(Error::InvalidTransaction(format!("unknown package {}", pkg)));
            }
        }

        let incoming: BTreeSet<PkgId> = incoming.into_iter().collect();
        if let Some(&pkg) = incoming.intersection(&self.erase).next() {
            return Err(Error::InvalidTransaction(format!(
                "{} is both installed and erased",
                name(pkg)
            )));
        }
        for &pkg in &incoming {
            for old in self.superseded(pkg) {
                if old == pkg {
                    return Err(Error::InvalidTransaction(format!("{} replaces itself", name(pkg))));
                }
                if incoming.contains(&old) {
                    return Err(Error::InvalidTransaction(format!(
                        "{} is installed and also replaced by {}",
                        name(old),
                        name(pkg)
                    )));
                }
                if pool.get(old).is_none() {
                    return Err(Error::InvalidTransaction(format!("unknown package {}", old)));
                }
            }
        }
        Ok(())
    }
}

/// Operations in execution order plus the loops that had to be cut
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedTransaction {
    pub operations: Vec<Operation>,
    pub warnings: Vec<CycleBrokenWarning>,
}

/// Map a package order onto operations
///
/// Packages in the erase set become `Erase`. Everything else becomes
/// `Install`, or `Update` when it replaces packages; those are erased right
/// after it, ordered through the erase pipeline when there are several.
/// No package is erased twice.
pub fn gen_operations(
    pool: &PackagePool,
    order: &[PkgId],
    tx: &Transaction,
    config: &OrderConfig,
) -> Result<OrderedTransaction> {
    let mut result = OrderedTransaction::default();
    let mut erased: HashSet<PkgId> = HashSet::new();

    for &pkg in order {
        if tx.is_erased(pkg) {
            if erased.insert(pkg) {
                result.operations.push(Operation::erase(pkg));
            }
            continue;
        }

        let pending: Vec<PkgId> = tx.superseded(pkg).into_iter().filter(|p| !erased.contains(p)).collect();
        let removal = if pending.len() > 1 {
            let sub = order_packages(pool, &pending, Direction::Erase, config)?;
            result.warnings.extend(sub.warnings);
            sub.packages
        } else {
            pending
        };

        let kind = if tx.replaces(pkg) { OpKind::Update } else { OpKind::Install };
        result.operations.push(Operation {
            kind,
            package: pkg,
            supersedes: removal.clone(),
        });
        for old in removal {
            if erased.insert(old) {
                result.operations.push(Operation::erase(old));
            }
        }
    }

    debug!("Generated {} operations from {} ordered packages", result.operations.len(), order.len());
    Ok(result)
}

/// Validate, order and expand a transaction request
pub fn order_transaction(pool: &PackagePool, tx: &Transaction, config: &OrderConfig) -> Result<OrderedTransaction> {
    tx.validate(pool)?;

    let install = order_packages(pool, &tx.incoming(), Direction::Install, config)?;
    let erase = order_packages(pool, &tx.erasures(), Direction::Erase, config)?;

    let order: Vec<PkgId> = install.packages.iter().chain(erase.packages.iter()).copied().collect();
    let mut result = gen_operations(pool, &order, tx, config)?;

    let mut warnings = install.warnings;
    warnings.extend(erase.warnings);
    warnings.append(&mut result.warnings);
    result.warnings = warnings;

    info!(
        "Ordered transaction: {} operations, {} dependency loops cut",
        result.operations.len(),
        result.warnings.len()
    );
    Ok(result)
}
