// tests/index.rs

//! Capability and file lookups through the dependency index.

mod common;

use common::{hello_package, package, pool_of};
use rpmtx::packages::{Dependency, FileEntry};
use rpmtx::resolver::{Conflict, check_transaction};
use rpmtx::{DepFlags, DependencyIndex, PackageRecord, Resolver};
use rpmtx::config::OrderConfig;

fn owner_of(name: &str, path: &str) -> PackageRecord {
    let mut rec = PackageRecord::new(name, "1.0", "1");
    rec.files.push(FileEntry {
        path: path.to_string(),
        mode: 0o100755,
        ..Default::default()
    });
    rec
}

#[test]
fn test_versioned_capability_lookup() {
    let mut x = PackageRecord::new("x", "1.0", "1");
    x.provides.push(Dependency::new("lib.so", DepFlags::EQUAL, "2.0"));
    let mut y = PackageRecord::new("y", "1.0", "1");
    y.requires.push(Dependency::new("lib.so", DepFlags::GE, "1.0"));
    let (pool, ids) = pool_of(vec![x, y]);
    let index = DependencyIndex::build(&pool, ids.iter().copied());

    assert_eq!(index.resolve_dep(&pool[ids[1]].requires[0]), vec![ids[0]]);
    assert!(index.resolve("lib.so", DepFlags::GE, "3.0").is_empty());
    assert_eq!(index.what_requires(ids[0]), vec![ids[1]]);
}

#[test]
fn test_file_requirement_lookup() {
    let (pool, ids) = pool_of(vec![
        package("z", "1.0", &[("/usr/bin/tool", DepFlags::ANY)]),
        owner_of("w", "/usr/bin/tool"),
    ]);
    let index = DependencyIndex::build(&pool, ids.iter().copied());

    assert_eq!(index.resolve("/usr/bin/tool", DepFlags::ANY, ""), vec![ids[1]]);
    assert_eq!(index.owners("/usr/bin/tool"), &[ids[1]]);
    assert!(index.owners("/usr/bin/other").is_empty());
}

#[test]
fn test_removal_breaks_dependents() {
    let (pool, ids) = pool_of(vec![
        package("glibc", "2.39", &[]),
        package("bash", "5.2", &[("glibc", DepFlags::ANY)]),
        package("vim", "9.1", &[("glibc", DepFlags::ANY), ("bash", DepFlags::ANY)]),
    ]);
    let resolver = Resolver::new(&pool, &ids, OrderConfig::default());

    let mut broken = resolver.check_removal(ids[0]);
    broken.sort();
    assert_eq!(broken, vec![ids[1], ids[2]]);
    assert!(resolver.check_removal(ids[2]).is_empty());
}

#[test]
fn test_transaction_checks() {
    let (hello, _) = hello_package();
    let mut rival = owner_of("hello-compat", "/usr/bin/hello");
    rival.conflicts.push(Dependency::named("hello"));
    let (pool, ids) = pool_of(vec![hello, rival, package("glibc", "2.39", &[])]);
    let index = DependencyIndex::build(&pool, ids.iter().copied());

    let conflicts = check_transaction(&pool, &index, &ids);
    assert!(conflicts.iter().any(|c| matches!(c, Conflict::PackageConflict { .. })));
    assert!(conflicts.iter().any(|c| matches!(c, Conflict::FileConflict { path, .. } if path == "/usr/bin/hello")));
    // glibc >= 2.34 is satisfied and the rpmlib requirement is skipped
    assert!(!conflicts.iter().any(|c| matches!(c, Conflict::MissingRequirement { .. })));
}
