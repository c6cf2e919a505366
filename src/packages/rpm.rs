// src/packages/rpm.rs

//! RPM package files
//!
//! Layout: 96-byte lead, signature header padded to 8 bytes, main header,
//! compressed cpio payload. Every part is kept as read so the file can be
//! written back byte-for-byte.

use crate::compression::{self, CompressionFormat};
use crate::config::PayloadOptions;
use crate::error::{Error, IntegrityWarning, Result};
use crate::hash::{md5_bytes, sha256_hex};
use crate::header::tags::*;
use crate::header::{
    EncodeOptions, PACKAGE_SCHEMA, RawHeader, SIGNATURE_SCHEMA, TagSet, TagValue, encode, encode_header,
};
use crate::packages::cpio::{PayloadArchive, PayloadFile, read_archive, write_archive};
use crate::packages::lead::{LEAD_SIZE, Lead, PackageKind};
use crate::packages::record::PackageRecord;
use crate::packages::traits::HeaderSource;
use std::path::Path;
use tracing::{debug, warn};

/// A package file split into its parts
#[derive(Debug, Clone)]
pub struct RpmPackage {
    lead: Lead,
    signature: RawHeader,
    sig_padding: Vec<u8>,
    header: RawHeader,
    payload: Vec<u8>,
    sig_tags: TagSet,
    tags: TagSet,
    record: PackageRecord,
    warnings: Vec<IntegrityWarning>,
}

impl RpmPackage {
    /// Parse a package held in memory
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let lead = Lead::parse(bytes)?;
        let mut pos = LEAD_SIZE;

        let signature = RawHeader::decode(&bytes[pos..])?;
        pos += signature.byte_len();
        let pad = (8 - signature.byte_len() % 8) % 8;
        let sig_padding = bytes
            .get(pos..pos + pad)
            .ok_or_else(|| Error::FormatError("truncated package: signature padding".to_string()))?
            .to_vec();
        pos += pad;

        let header = RawHeader::decode(&bytes[pos..])?;
        pos += header.byte_len();
        let payload = bytes[pos..].to_vec();

        let (sig_tags, mut warnings) = signature.parse_all()?;
        let (tags, header_warnings) = header.parse_all()?;
        warnings.extend(header_warnings);
        let record = PackageRecord::from_tags(&tags)?;

        debug!(
            "Parsed {}: signature {} bytes, header {} bytes, payload {} bytes",
            record.nevra(),
            signature.byte_len(),
            header.byte_len(),
            payload.len()
        );

        Ok(Self {
            lead,
            signature,
            sig_padding,
            header,
            payload,
            sig_tags,
            tags,
            record,
            warnings,
        })
    }

    /// Read and parse a package file
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Author a package from a record and its payload files
    ///
    /// Payload tags and the signature digests are filled in here; the
    /// record's own payload fields are overwritten.
    pub fn build(record: &PackageRecord, files: &[PayloadFile], format: CompressionFormat) -> Result<Self> {
        let archive = write_archive(Vec::new(), files)?;
        let mut record = record.clone();
        record.payload_format = Some("cpio".to_string());
        record.payload_compressor = Some(format.name().to_string());
        record.archive_size = Some(archive.len() as u64);

        let header = encode(
            &record.to_tags(),
            &PACKAGE_SCHEMA,
            &EncodeOptions::for_schema(&PACKAGE_SCHEMA),
        )?;
        let payload = compression::compress(&archive, format)?;

        let mut sig = TagSet::new();
        sig.set_u32s(SIGTAG_SIZE, vec![(header.len() + payload.len()) as u32]);
        sig.insert(SIGTAG_MD5, TagValue::Binary(md5_bytes(&[&header, &payload]).to_vec()));
        sig.set_u32s(SIGTAG_PAYLOADSIZE, vec![archive.len() as u32]);
        sig.set_string(SIGTAG_SHA256, sha256_hex(&[&header]));
        let signature = encode_header(&sig, &SIGNATURE_SCHEMA, &EncodeOptions::for_schema(&SIGNATURE_SCHEMA))?;

        let kind = if record.is_source {
            PackageKind::Source
        } else {
            PackageKind::Binary
        };
        let lead = Lead::new(&format!("{}-{}", record.name, record.evr()), kind);

        let mut bytes = lead.to_bytes().to_vec();
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.resize(bytes.len() + (8 - signature.byte_len() % 8) % 8, 0);
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&payload);
        Self::parse(&bytes)
    }

    /// Serialize back to file bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.lead.to_bytes().to_vec();
        out.extend_from_slice(&self.signature.to_bytes());
        out.extend_from_slice(&self.sig_padding);
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn lead(&self) -> &Lead {
        &self.lead
    }

    pub fn signature(&self) -> &RawHeader {
        &self.signature
    }

    pub fn header(&self) -> &RawHeader {
        &self.header
    }

    pub fn signature_tags(&self) -> &TagSet {
        &self.sig_tags
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn record(&self) -> &PackageRecord {
        &self.record
    }

    /// Integrity warnings raised while decoding both headers
    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    /// Compressed payload bytes
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Archive length the package declares for its uncompressed payload
    pub fn declared_archive_size(&self) -> Option<u64> {
        self.record
            .archive_size
            .or_else(|| self.sig_tags.u64(SIGTAG_LONGARCHIVESIZE))
            .or_else(|| self.sig_tags.u64(SIGTAG_PAYLOADSIZE))
    }

    /// Decompress and decode the payload
    pub fn payload(&self, opts: &PayloadOptions) -> Result<PayloadArchive> {
        if let Some(format) = &self.record.payload_format
            && format != "cpio"
        {
            return Err(Error::FormatError(format!(
                "{}: unsupported payload format {}",
                self.record.name, format
            )));
        }

        let format = match &self.record.payload_compressor {
            Some(name) => CompressionFormat::from_compressor_name(name)?,
            None => CompressionFormat::from_magic_bytes(&self.payload),
        };
        debug!("Decoding {} payload of {}", format, self.record.nevra());

        let decoder = compression::create_decoder(self.payload.as_slice(), format)?;
        read_archive(decoder, self.declared_archive_size(), opts)
    }

    /// Check the signature block's digests and size against the actual bytes
    ///
    /// This is integrity checking only; signatures are not evaluated.
    pub fn verify_digests(&self) -> Vec<IntegrityWarning> {
        let header = self.header.to_bytes();
        let mut warnings = Vec::new();

        if let Some(want) = self.sig_tags.string(SIGTAG_SHA256) {
            let got = sha256_hex(&[&header]);
            if !got.eq_ignore_ascii_case(&want) {
                warnings.push(IntegrityWarning::DigestMismatch {
                    what: "header SHA-256".to_string(),
                    expected: want,
                    actual: got,
                });
            }
        }

        if let Some(want) = self.sig_tags.get(SIGTAG_MD5).and_then(TagValue::as_bytes) {
            let got = md5_bytes(&[&header, &self.payload]);
            if want != got.as_slice() {
                warnings.push(IntegrityWarning::DigestMismatch {
                    what: "header+payload MD5".to_string(),
                    expected: hex::encode(want),
                    actual: hex::encode(got),
                });
            }
        }

        let declared = self
            .sig_tags
            .u64(SIGTAG_LONGSIZE)
            .or_else(|| self.sig_tags.u64(SIGTAG_SIZE));
        let actual = (header.len() + self.payload.len()) as u64;
        if let Some(declared) = declared
            && declared != actual
        {
            warnings.push(IntegrityWarning::SizeMismatch {
                what: "header+payload".to_string(),
                declared,
                actual,
            });
        }

        for w in &warnings {
            warn!("{}: {}", self.record.nevra(), w);
        }
        warnings
    }

    /// Whether re-encoding the decoded main header reproduces it exactly
    pub fn header_is_stable(&self) -> Result<bool> {
        let opts = EncodeOptions::from_layout(&self.header, &PACKAGE_SCHEMA);
        let again = encode_header(&self.tags, &PACKAGE_SCHEMA, &opts)?.with_reserved(self.header.reserved());
        Ok(again.to_bytes() == self.header.to_bytes())
    }
}

impl HeaderSource for RpmPackage {
    fn label(&self) -> String {
        self.record.nevra()
    }

    fn header_parts(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut index = Vec::new();
        for e in self.header.entries() {
            e.write(&mut index);
        }
        Ok((index, self.header.store().to_vec()))
    }

    fn raw_header(&self) -> Result<RawHeader> {
        Ok(self.header.clone())
    }
}
