// src/error.rs

//! Error and diagnostic types for rpmtx
//!
//! Fatal conditions are [`Error`] values. Conditions that real-world packages
//! trip over routinely (duplicate tags, odd hardlink groups, a cycle that can
//! only be broken by dropping a pre-dependency) are reported as [`Warning`]s
//! and never abort the operation that produced them.

use crate::compression::CompressionError;
use thiserror::Error;

/// Errors produced by the codecs and the ordering engine
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed header, lead or cpio bytes
    #[error("format error: {0}")]
    FormatError(String),

    /// Payload content contradicts its own metadata (strict mode only)
    #[error("integrity error: {0}")]
    IntegrityError(String),

    /// The ordering algorithm failed to place every package exactly once
    #[error("graph invariant violated: {0}")]
    GraphInvariantError(String),

    /// The transaction request itself is inconsistent
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Configuration could not be loaded or names an unknown tag
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal integrity diagnostics raised while decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// A tag appears more than once with differing values
    #[error("duplicate tag {tag} with differing values")]
    DuplicateTag { tag: u32 },

    /// Declared size disagrees with the bytes actually present
    #[error("{what}: declared size {declared} but found {actual} bytes")]
    SizeMismatch {
        what: String,
        declared: u64,
        actual: u64,
    },

    /// Zero-length hardlink members whose data never arrived
    #[error("hardlink group {}:{}/{ino} never received data ({})", .dev.0, .dev.1, .paths.join(", "))]
    IncompleteHardlink {
        dev: (u32, u32),
        ino: u32,
        paths: Vec<String>,
    },

    /// Members of one hardlink group disagree on mode, mtime or size
    #[error("hardlink group {}:{}/{ino}: {path} disagrees on {field}", .dev.0, .dev.1)]
    HardlinkMismatch {
        dev: (u32, u32),
        ino: u32,
        path: String,
        field: &'static str,
    },

    /// A hardlink group's member count differs from the link count its headers record
    #[error("hardlink group {}:{}/{ino} records {nlink} links but has {found} members", .dev.0, .dev.1)]
    HardlinkCount {
        dev: (u32, u32),
        ino: u32,
        nlink: u32,
        found: usize,
    },

    /// A stored digest does not match the content it covers
    #[error("{what}: digest mismatch (expected {expected}, got {actual})")]
    DigestMismatch {
        what: String,
        expected: String,
        actual: String,
    },
}

/// A hard (pre) dependency edge was dropped to break a cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency loop: ignoring pre-requirement of {requirer} on {required}")]
pub struct CycleBrokenWarning {
    /// Package whose requirement was ignored
    pub requirer: String,
    /// Package it required
    pub required: String,
}

/// Any non-fatal diagnostic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error(transparent)]
    Integrity(IntegrityWarning),
    #[error(transparent)]
    CycleBroken(CycleBrokenWarning),
}

impl From<IntegrityWarning> for Warning {
    fn from(w: IntegrityWarning) -> Self {
        Self::Integrity(w)
    }
}

impl From<CycleBrokenWarning> for Warning {
    fn from(w: CycleBrokenWarning) -> Self {
        Self::CycleBroken(w)
    }
}
