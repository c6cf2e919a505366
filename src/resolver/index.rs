// src/resolver/index.rs

//! Reverse indexes over a package set
//!
//! Provides, requires, conflicts and obsoletes are indexed by name; file
//! paths by path. A requirement on a path is satisfied either by an explicit
//! provide or by owning the file.

use crate::packages::record::{Dependency, PackagePool, PackageRecord, PkgId};
use crate::version::{DepFlags, Evr, ranges_intersect};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

type DepList = Vec<(PkgId, Dependency)>;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    evr: Evr,
    provides: Vec<Dependency>,
    requires: Vec<Dependency>,
    conflicts: Vec<Dependency>,
    obsoletes: Vec<Dependency>,
    files: Vec<String>,
}

/// Multi-key index used to resolve requirements
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    entries: BTreeMap<PkgId, Entry>,
    provides: HashMap<String, DepList>,
    requires: HashMap<String, DepList>,
    conflicts: HashMap<String, DepList>,
    obsoletes: HashMap<String, DepList>,
    names: HashMap<String, Vec<PkgId>>,
    files: HashMap<String, Vec<PkgId>>,
}

fn push(map: &mut HashMap<String, DepList>, id: PkgId, deps: &[Dependency]) {
    for d in deps {
        map.entry(d.name.clone()).or_default().push((id, d.clone()));
    }
}

fn drop_from(map: &mut HashMap<String, DepList>, id: PkgId, deps: &[Dependency]) {
    for d in deps {
        if let Some(list) = map.get_mut(&d.name) {
            list.retain(|(p, _)| *p != id);
            if list.is_empty() {
                map.remove(&d.name);
            }
        }
    }
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the given packages from a pool
    pub fn build(pool: &PackagePool, ids: impl IntoIterator<Item = PkgId>) -> Self {
        let mut index = Self::new();
        for id in ids {
            index.insert(id, &pool[id]);
        }
        debug!(
            "Indexed {} packages: {} provide names, {} file paths",
            index.entries.len(),
            index.provides.len(),
            index.files.len()
        );
        index
    }

    /// Add a package; re-inserting a handle replaces its previous entry
    pub fn insert(&mut self, id: PkgId, rec: &PackageRecord) {
        if self.entries.contains_key(&id) {
            self.remove(id);
        }

        let mut provides = rec.provides.clone();
        if !provides.iter().any(|p| p.name == rec.name) {
            provides.push(rec.self_provide());
        }

        let entry = Entry {
            name: rec.name.clone(),
            evr: rec.evr(),
            provides,
            requires: rec.requires.clone(),
            conflicts: rec.conflicts.clone(),
            obsoletes: rec.obsoletes.clone(),
            files: rec.files.iter().map(|f| f.path.clone()).collect(),
        };

        push(&mut self.provides, id, &entry.provides);
        push(&mut self.requires, id, &entry.requires);
        push(&mut self.conflicts, id, &entry.conflicts);
        push(&mut self.obsoletes, id, &entry.obsoletes);
        self.names.entry(entry.name.clone()).or_default().push(id);
        for path in &entry.files {
            let owners = self.files.entry(path.clone()).or_default();
            if !owners.contains(&id) {
                owners.push(id);
            }
        }
        self.entries.insert(id, entry);
    }

    /// Drop a package from every index
    pub fn remove(&mut self, id: PkgId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        drop_from(&mut self.provides, id, &entry.provides);
        drop_from(&mut self.requires, id, &entry.requires);
        drop_from(&mut self.conflicts, id, &entry.conflicts);
        drop_from(&mut self.obsoletes, id, &entry.obsoletes);
        if let Some(list) = self.names.get_mut(&entry.name) {
            list.retain(|p| *p != id);
            if list.is_empty() {
                self.names.remove(&entry.name);
            }
        }
        for path in &entry.files {
            if let Some(owners) = self.files.get_mut(path) {
                owners.retain(|p| *p != id);
                if owners.is_empty() {
                    self.files.remove(path);
                }
            }
        }
        true
    }

    pub fn contains(&self, id: PkgId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PkgId> + '_ {
        self.entries.keys().copied()
    }

    /// Packages satisfying `name [flags version]`, in handle order
    pub fn resolve(&self, name: &str, flags: DepFlags, version: &str) -> Vec<PkgId> {
        let mut found = BTreeSet::new();
        let query = Evr::parse(version);

        if let Some(list) = self.provides.get(name) {
            for (id, provide) in list {
                if version.is_empty() || ranges_intersect(provide.flags, &provide.evr(), flags, &query) {
                    found.insert(*id);
                }
            }
        }

        if name.starts_with('/')
            && version.is_empty()
            && let Some(owners) = self.files.get(name)
        {
            found.extend(owners.iter().copied());
        }

        found.into_iter().collect()
    }

    pub fn resolve_dep(&self, dep: &Dependency) -> Vec<PkgId> {
        self.resolve(&dep.name, dep.flags, &dep.version)
    }

    /// Packages with a requirement the given package satisfies
    pub fn what_requires(&self, id: PkgId) -> Vec<PkgId> {
        let Some(entry) = self.entries.get(&id) else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();

        for provide in &entry.provides {
            for (other, req) in self.requires.get(&provide.name).into_iter().flatten() {
                if req.version.is_empty() || ranges_intersect(provide.flags, &provide.evr(), req.flags, &req.evr()) {
                    found.insert(*other);
                }
            }
        }
        for path in &entry.files {
            for (other, req) in self.requires.get(path).into_iter().flatten() {
                if req.version.is_empty() {
                    found.insert(*other);
                }
            }
        }

        found.remove(&id);
        found.into_iter().collect()
    }

    /// Packages in conflict with the given one, in either direction
    pub fn conflicts_of(&self, id: PkgId) -> Vec<(PkgId, Dependency)> {
        let Some(entry) = self.entries.get(&id) else {
            return Vec::new();
        };
        let mut found = BTreeMap::new();

        for conflict in &entry.conflicts {
            for other in self.resolve_dep(conflict) {
                if other != id {
                    found.entry(other).or_insert_with(|| conflict.clone());
                }
            }
        }
        for provide in &entry.provides {
            for (other, conflict) in self.conflicts.get(&provide.name).into_iter().flatten() {
                if *other != id
                    && (conflict.version.is_empty()
                        || ranges_intersect(provide.flags, &provide.evr(), conflict.flags, &conflict.evr()))
                {
                    found.entry(*other).or_insert_with(|| conflict.clone());
                }
            }
        }

        found.into_iter().collect()
    }

    /// Packages the given package obsoletes (matched by package name)
    pub fn obsoleted_by(&self, id: PkgId) -> Vec<PkgId> {
        let Some(entry) = self.entries.get(&id) else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();
        for obsolete in &entry.obsoletes {
            for other in self.names.get(&obsolete.name).into_iter().flatten() {
                if *other != id
                    && let Some(target) = self.entries.get(other)
                    && ranges_intersect(obsolete.flags, &obsolete.evr(), DepFlags::EQUAL, &target.evr)
                {
                    found.insert(*other);
                }
            }
        }
        found.into_iter().collect()
    }

    /// Packages that obsolete the given package
    pub fn obsoleters_of(&self, id: PkgId) -> Vec<PkgId> {
        let Some(entry) = self.entries.get(&id) else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();
        for (other, obsolete) in self.obsoletes.get(&entry.name).into_iter().flatten() {
            if *other != id && ranges_intersect(obsolete.flags, &obsolete.evr(), DepFlags::EQUAL, &entry.evr) {
                found.insert(*other);
            }
        }
        found.into_iter().collect()
    }

    /// Packages shipping a path
    pub fn owners(&self, path: &str) -> &[PkgId] {
        self.files.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every indexed path with more than one owner
    pub fn shared_paths(&self) -> impl Iterator<Item = (&str, &[PkgId])> {
        self.files
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(path, owners)| (path.as_str(), owners.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::record::FileEntry;

    fn dep(name: &str, flags: DepFlags, version: &str) -> Dependency {
        Dependency::new(name, flags, version)
    }

    fn pool() -> (PackagePool, PkgId, PkgId, PkgId, PkgId) {
        let mut pool = PackagePool::new();

        let mut x = PackageRecord::new("libx", "2.0", "1");
        x.provides.push(dep("lib.so", DepFlags::EQUAL, "2.0"));
        let x = pool.add(x);

        let mut y = PackageRecord::new("appy", "1.0", "1");
        y.requires.push(dep("lib.so", DepFlags::GE, "1.0"));
        y.conflicts.push(dep("libx", DepFlags::LESS, "1.5"));
        let y = pool.add(y);

        let mut z = PackageRecord::new("toolz", "1", "1");
        z.requires.push(dep("/usr/bin/tool", DepFlags::ANY, ""));
        z.obsoletes.push(dep("oldtool", DepFlags::LE, "3"));
        let z = pool.add(z);

        let mut w = PackageRecord::new("oldtool", "3", "2");
        w.files.push(FileEntry {
            path: "/usr/bin/tool".into(),
            mode: 0o100755,
            ..Default::default()
        });
        let w = pool.add(w);

        (pool, x, y, z, w)
    }

    #[test]
    fn test_resolve_versioned_provide() {
        let (pool, x, y, _, _) = pool();
        let index = DependencyIndex::build(&pool, pool.ids());
        assert_eq!(index.resolve_dep(&pool[y].requires[0]), vec![x]);
        assert!(index.resolve("lib.so", DepFlags::GREATER, "2.0").is_empty());
        assert_eq!(index.resolve("lib.so", DepFlags::ANY, ""), vec![x]);
    }

    #[test]
    fn test_resolve_path_by_ownership() {
        let (pool, _, _, z, w) = pool();
        let index = DependencyIndex::build(&pool, pool.ids());
        assert_eq!(index.resolve_dep(&pool[z].requires[0]), vec![w]);
        assert_eq!(index.owners("/usr/bin/tool"), &[w]);
        assert!(index.owners("/nope").is_empty());
    }

    #[test]
    fn test_implicit_self_provide() {
        let (pool, x, _, _, _) = pool();
        let index = DependencyIndex::build(&pool, pool.ids());
        assert_eq!(index.resolve("libx", DepFlags::GE, "2.0-1"), vec![x]);
        assert!(index.resolve("libx", DepFlags::LESS, "2.0").is_empty());
    }

    #[test]
    fn test_what_requires() {
        let (pool, x, y, z, w) = pool();
        let index = DependencyIndex::build(&pool, pool.ids());
        assert_eq!(index.what_requires(x), vec![y]);
        assert_eq!(index.what_requires(w), vec![z]);
        assert!(index.what_requires(y).is_empty());
    }

    #[test]
    fn test_conflicts_and_obsoletes() {
        let (mut pool, x, y, z, w) = pool();
        let index = DependencyIndex::build(&pool, pool.ids());
        // libx 2.0 is not < 1.5
        assert!(index.conflicts_of(y).is_empty());
        assert_eq!(index.obsoleted_by(z), vec![w]);
        assert_eq!(index.obsoleters_of(w), vec![z]);
        assert!(index.obsoleted_by(x).is_empty());

        let old = pool.add(PackageRecord::new("libx", "1.0", "1"));
        let index = DependencyIndex::build(&pool, pool.ids());
        let conflicts = index.conflicts_of(y);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].0, old);
        assert_eq!(index.conflicts_of(old)[0].0, y);
    }

    #[test]
    fn test_remove() {
        let (pool, x, y, _, w) = pool();
        let mut index = DependencyIndex::build(&pool, pool.ids());
        assert!(index.remove(x));
        assert!(!index.remove(x));
        assert!(index.resolve_dep(&pool[y].requires[0]).is_empty());
        assert!(index.remove(w));
        assert!(index.owners("/usr/bin/tool").is_empty());
        assert_eq!(index.len(), 2);
        assert!(!index.contains(x));
    }

    #[test]
    fn test_remove_leaves_no_empty_keys() {
        let (pool, x, _, _, w) = pool();
        let mut index = DependencyIndex::build(&pool, pool.ids());
        for _ in 0..3 {
            index.remove(x);
            index.insert(x, &pool[x]);
        }
        assert_eq!(index.names["libx"], vec![x]);

        index.remove(x);
        index.remove(w);
        assert!(!index.names.contains_key("libx"));
        assert!(!index.names.contains_key("oldtool"));
        assert!(!index.provides.contains_key("lib.so"));
        assert!(!index.files.contains_key("/usr/bin/tool"));
        assert!(index.names.values().all(|ids| !ids.is_empty()));
    }
}
