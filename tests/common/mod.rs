// tests/common/mod.rs

//! Shared fixture builders for integration tests.

#![allow(dead_code)]

use rpmtx::compression::CompressionFormat;
use rpmtx::hash::DigestAlgorithm;
use rpmtx::packages::{CpioEntry, CpioWriter, Dependency, FileEntry, PayloadFile};
use rpmtx::{DepFlags, PackagePool, PackageRecord, PkgId, RpmPackage};
use std::path::PathBuf;
use tempfile::TempDir;

/// A record with unversioned requirements carrying the given flags
pub fn package(name: &str, version: &str, requires: &[(&str, DepFlags)]) -> PackageRecord {
    let mut rec = PackageRecord::new(name, version, "1");
    for (req, flags) in requires {
        rec.requires.push(Dependency::new(*req, *flags, ""));
    }
    rec
}

/// Add records to a fresh pool, returning handles in insertion order
pub fn pool_of(records: Vec<PackageRecord>) -> (PackagePool, Vec<PkgId>) {
    let mut pool = PackagePool::new();
    let ids = records.into_iter().map(|r| pool.add(r)).collect();
    (pool, ids)
}

pub fn payload_file(name: &str, mode: u32, data: &[u8]) -> PayloadFile {
    PayloadFile {
        entry: CpioEntry {
            name: name.to_string(),
            mode,
            nlink: 1,
            mtime: 1_700_000_000,
            size: data.len() as u64,
            ..Default::default()
        },
        data: data.to_vec(),
    }
}

/// `hello` with one binary, one config file and a directory, SHA-256 file digests
pub fn hello_package() -> (PackageRecord, Vec<PayloadFile>) {
    let binary = b"\x7fELF fake binary\n".to_vec();
    let config = b"greeting = hi\n".to_vec();

    let mut rec = PackageRecord::new("hello", "2.12", "3");
    rec.arch = "x86_64".into();
    rec.summary = "Prints a friendly greeting".into();
    rec.file_digest_algo = 8;
    rec.provides.push(Dependency::new("hello", DepFlags::EQUAL, "2.12-3"));
    rec.requires.push(Dependency::new("glibc", DepFlags::GE, "2.34"));
    rec.requires.push(Dependency::new("rpmlib(PayloadIsZstd)", DepFlags::LE | DepFlags::RPMLIB, "5.4.18-1"));
    rec.files = vec![
        FileEntry {
            path: "/etc/hello".into(),
            mode: 0o040755,
            ..Default::default()
        },
        FileEntry {
            path: "/etc/hello/hello.conf".into(),
            mode: 0o100644,
            size: config.len() as u64,
            digest: DigestAlgorithm::Sha256.hex_digest(&config),
            ..Default::default()
        },
        FileEntry {
            path: "/usr/bin/hello".into(),
            mode: 0o100755,
            size: binary.len() as u64,
            digest: DigestAlgorithm::Sha256.hex_digest(&binary),
            ..Default::default()
        },
    ];

    let files = vec![
        payload_file("./etc/hello", 0o040755, b""),
        payload_file("./etc/hello/hello.conf", 0o100644, &config),
        payload_file("./usr/bin/hello", 0o100755, &binary),
    ];
    (rec, files)
}

pub fn hello_rpm(format: CompressionFormat) -> Vec<u8> {
    let (rec, files) = hello_package();
    RpmPackage::build(&rec, &files, format).unwrap().to_bytes()
}

pub fn write_temp(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Three entries sharing (dev 1, inode 42); only the last carries `data`
pub fn hardlink_archive(data: &[u8]) -> Vec<u8> {
    hardlink_archive_with_nlink(data, 3)
}

/// Like [`hardlink_archive`] with an arbitrary link count in every header
pub fn hardlink_archive_with_nlink(data: &[u8], nlink: u32) -> Vec<u8> {
    let mut cpio = CpioWriter::new(Vec::new());
    for (i, name) in ["./usr/bin/a", "./usr/bin/b", "./usr/bin/c"].iter().enumerate() {
        let entry = CpioEntry {
            name: name.to_string(),
            ino: 42,
            mode: 0o100755,
            nlink,
            mtime: 1_700_000_000,
            dev_major: 1,
            ..Default::default()
        };
        let body: &[u8] = if i == 2 { data } else { &[] };
        cpio.write_entry(&entry, body).unwrap();
    }
    cpio.finish().unwrap()
}
