// src/packages/traits.rs

//! The seam between byte suppliers and the engine
//!
//! Anything that can hand over a header as `(index, store)` bytes can feed
//! records into the resolver: a package file, an installed-package database
//! record, a catalog entry. The engine never cares which one it got.

use crate::error::{IntegrityWarning, Result};
use crate::header::RawHeader;
use crate::packages::record::PackageRecord;
use tracing::warn;

/// Common interface for raw header suppliers
pub trait HeaderSource {
    /// Short label for diagnostics (file name, database key, ...)
    fn label(&self) -> String;

    /// The header as separate index and store bytes
    fn header_parts(&self) -> Result<(Vec<u8>, Vec<u8>)>;

    /// Decode the supplied header
    fn raw_header(&self) -> Result<RawHeader> {
        let (index, store) = self.header_parts()?;
        RawHeader::from_parts(&index, &store)
    }

    /// Decode the supplied header into a record, logging integrity warnings
    fn load_record(&self) -> Result<(PackageRecord, Vec<IntegrityWarning>)> {
        let (tags, warnings) = self.raw_header()?.parse_all()?;
        for w in &warnings {
            warn!("{}: {}", self.label(), w);
        }
        Ok((PackageRecord::from_tags(&tags)?, warnings))
    }
}

/// An installed-package record in the magic-less blob form
#[derive(Debug, Clone)]
pub struct DatabaseBlob {
    pub key: String,
    pub bytes: Vec<u8>,
}

impl DatabaseBlob {
    pub fn new(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            bytes,
        }
    }
}

impl HeaderSource for DatabaseBlob {
    fn label(&self) -> String {
        self.key.clone()
    }

    fn header_parts(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let raw = RawHeader::decode_blob(&self.bytes)?;
        let mut index = Vec::with_capacity(raw.entries().len() * crate::header::ENTRY_SIZE);
        for e in raw.entries() {
            e.write(&mut index);
        }
        Ok((index, raw.store().to_vec()))
    }

    fn raw_header(&self) -> Result<RawHeader> {
        RawHeader::decode_blob(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{DATABASE_SCHEMA, EncodeOptions, encode_header};
    use crate::header::tags::RPMTAG_INSTALLTIME;
    use crate::header::TagValue;

    #[test]
    fn test_database_blob_record() {
        let mut tags = PackageRecord::new("glibc", "2.39", "5").to_tags();
        tags.insert(RPMTAG_INSTALLTIME, TagValue::Int32(vec![1_700_000_000]));
        let raw = encode_header(&tags, &DATABASE_SCHEMA, &EncodeOptions::for_schema(&DATABASE_SCHEMA)).unwrap();
        let blob = DatabaseBlob::new("Packages/12", raw.to_blob());

        let (record, warnings) = blob.load_record().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(record.name, "glibc");

        let (index, store) = blob.header_parts().unwrap();
        assert_eq!(RawHeader::from_parts(&index, &store).unwrap(), raw);
    }

    #[test]
    fn test_truncated_blob() {
        let blob = DatabaseBlob::new("Packages/1", vec![0, 0, 0, 1]);
        assert!(blob.load_record().is_err());
    }
}
