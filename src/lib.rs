// src/lib.rs

//! rpmtx: RPM package codec and transaction ordering engine
//!
//! Reads, verifies and orders RPM packages without linking the native
//! packaging library.
//!
//! # Architecture
//!
//! - Headers: tagged index + store blocks, decoded and re-encoded byte-exact
//! - Payloads: compressed cpio archives with hardlink groups rebuilt
//! - Records: typed package metadata; identity is a pool handle, not a NEVRA
//! - Ordering: dependency graph, SCC collapse, loop breaking and leaf peeling
//!   into install/update/erase operations

pub mod compression;
pub mod config;
mod error;
pub mod hash;
pub mod header;
pub mod packages;
pub mod resolver;
pub mod transaction;
pub mod version;

pub use config::{EngineConfig, OrderConfig, PayloadOptions};
pub use error::{CycleBrokenWarning, Error, IntegrityWarning, Result, Warning};
pub use header::{RawHeader, TagSet, TagValue};
pub use packages::{PackagePool, PackageRecord, PkgId, RpmPackage};
pub use resolver::{DependencyIndex, Direction, Resolver};
pub use transaction::{OpKind, Operation, OrderedTransaction, Transaction, gen_operations, order_transaction};
pub use version::{DepFlags, Evr, compare_labels, compare_strings, ranges_intersect};
