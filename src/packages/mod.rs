// src/packages/mod.rs

//! Package files and the records decoded from them
//!
//! `rpm` splits a package file into lead, signature, header and payload;
//! `cpio` decodes the payload; `record` turns header tags into the typed
//! metadata the resolver consumes.

pub mod cpio;
pub mod lead;
pub mod record;
pub mod rpm;
pub mod traits;

pub use cpio::{CpioEntry, CpioReader, CpioWriter, PayloadArchive, PayloadFile, read_archive, write_archive};
pub use lead::{Lead, PackageKind};
pub use record::{Dependency, FileEntry, PackagePool, PackageRecord, PkgId};
pub use rpm::RpmPackage;
pub use traits::{DatabaseBlob, HeaderSource};
