// src/resolver/conflict.rs

//! Transaction consistency checks
//!
//! Reports unresolvable requirements, declared conflicts and file conflicts
//! inside a package set. The check is advisory: ordering never depends on it.

use crate::packages::record::{FileEntry, PackagePool, PkgId};
use crate::resolver::index::DependencyIndex;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// A problem found in the resulting package set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Nothing in the set satisfies a requirement
    #[error("{package} requires {requirement}, which nothing provides")]
    MissingRequirement { package: String, requirement: String },

    /// Two packages declare a conflict with each other
    #[error("{package} conflicts with {conflicts_with} ({dependency})")]
    PackageConflict {
        package: String,
        conflicts_with: String,
        dependency: String,
    },

    /// Two packages ship different content at the same path
    #[error("file {path} from {} conflicts with file from {}", .packages.0, .packages.1)]
    FileConflict {
        path: String,
        packages: (String, String),
    },
}

fn files_differ(a: &FileEntry, b: &FileEntry) -> bool {
    if a.is_dir() && b.is_dir() {
        return false;
    }
    a.mode != b.mode || a.digest != b.digest || a.link_to != b.link_to
}

/// Check `packages` (resolved through `index`) for conflicts
///
/// Packages obsoleted by another member of the set are left out of every
/// report, as they will not remain installed.
pub fn check_transaction(pool: &PackagePool, index: &DependencyIndex, packages: &[PkgId]) -> Vec<Conflict> {
    let members: BTreeSet<PkgId> = packages.iter().copied().collect();
    let obsoleted: BTreeSet<PkgId> = members
        .iter()
        .flat_map(|&p| index.obsoleted_by(p))
        .filter(|p| members.contains(p))
        .collect();
    let live = |p: &PkgId| members.contains(p) && !obsoleted.contains(p);

    let mut conflicts = Vec::new();

    for &pkg in members.iter().filter(|&&p| live(&p)) {
        let record = &pool[pkg];
        for req in &record.requires {
            if req.is_rpmlib() {
                continue;
            }
            if !index.resolve_dep(req).iter().any(live) {
                conflicts.push(Conflict::MissingRequirement {
                    package: record.nevra(),
                    requirement: req.to_string(),
                });
            }
        }

        for (other, dep) in index.conflicts_of(pkg) {
            // each pair once
            if other > pkg && live(&other) {
                conflicts.push(Conflict::PackageConflict {
                    package: record.nevra(),
                    conflicts_with: pool[other].nevra(),
                    dependency: dep.to_string(),
                });
            }
        }
    }

    let shared: BTreeMap<&str, Vec<PkgId>> = index
        .shared_paths()
        .map(|(path, owners)| (path, owners.iter().copied().filter(|p| live(p)).collect::<Vec<_>>()))
        .filter(|(_, owners)| owners.len() > 1)
        .collect();
    for (path, owners) in shared {
        let entries: Vec<(PkgId, &FileEntry)> = owners
            .iter()
            .filter_map(|&p| pool[p].files.iter().find(|f| f.path == path).map(|f| (p, f)))
            .collect();
        for (i, (a, fa)) in entries.iter().enumerate() {
            for (b, fb) in &entries[i + 1..] {
                if files_differ(fa, fb) {
                    conflicts.push(Conflict::FileConflict {
                        path: path.to_string(),
                        packages: (pool[*a].nevra(), pool[*b].nevra()),
                    });
                }
            }
        }
    }

    debug!("Checked {} packages: {} conflicts", members.len(), conflicts.len());
    conflicts
}
