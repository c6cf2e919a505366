// src/hash.rs

//! Digests over header bytes and file content
//!
//! The algorithm for per-file digests comes from the `FILEDIGESTALGO` tag
//! (absent means MD5). Header-level digests in the signature block are
//! SHA-256 over the main header and MD5 over header plus payload.

use crate::error::{Error, IntegrityWarning, Result};
use crate::packages::cpio::PayloadFile;
use crate::packages::record::PackageRecord;
use md5::Md5;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Digest algorithms as numbered in `FILEDIGESTALGO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Map an RPM (OpenPGP hash) algorithm id; SHA-1 and others are not supported
    pub fn from_rpm_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Md5),
            8 => Some(Self::Sha256),
            9 => Some(Self::Sha384),
            10 => Some(Self::Sha512),
            _ => None,
        }
    }

    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `data`
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// SHA-256 of the given parts, hex encoded
pub fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    parts.iter().for_each(|p| hasher.update(p));
    hex::encode(hasher.finalize())
}

/// Raw MD5 of the given parts
pub fn md5_bytes(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    parts.iter().for_each(|p| hasher.update(p));
    hasher.finalize().into()
}

/// Check extracted regular files against the digests recorded in the header
///
/// Files without a recorded digest are skipped, as are payload entries the
/// header does not list.
pub fn verify_file_digests(record: &PackageRecord, files: &[PayloadFile]) -> Result<Vec<IntegrityWarning>> {
    let algo = DigestAlgorithm::from_rpm_id(record.file_digest_algo).ok_or_else(|| {
        Error::IntegrityError(format!(
            "{}: unsupported file digest algorithm {}",
            record.name, record.file_digest_algo
        ))
    })?;

    let expected: HashMap<&str, &str> = record
        .files
        .iter()
        .filter(|f| f.is_regular() && !f.digest.is_empty())
        .map(|f| (f.path.as_str(), f.digest.as_str()))
        .collect();

    let mut warnings = Vec::new();
    let mut checked = 0usize;
    for file in files.iter().filter(|f| f.entry.is_regular()) {
        let path = file.path();
        let Some(&want) = expected.get(path.as_str()) else {
            continue;
        };
        checked += 1;
        let got = algo.hex_digest(&file.data);
        if !got.eq_ignore_ascii_case(want) {
            let w = IntegrityWarning::DigestMismatch {
                what: path,
                expected: want.to_string(),
                actual: got,
            };
            warn!("{}", w);
            warnings.push(w);
        }
    }

    debug!(
        "Verified {} file digests ({}) for {}, {} mismatches",
        checked,
        algo,
        record.name,
        warnings.len()
    );
    Ok(warnings)
}
