// src/header/mod.rs

//! RPM header codec
//!
//! A header is an index of `(tag, kind, offset, count)` entries followed by a
//! data store the offsets point into. The same layout is used for the
//! signature header and the main header of a package file, and (without the
//! leading magic) for installed-package records.
//!
//! Decoding validates structure up front so that later tag lookups only have
//! to deal with value-level problems such as unterminated strings.

mod encode;
pub mod tags;
mod value;

pub use encode::{EncodeOptions, encode, encode_header};
pub use tags::{Cardinality, DATABASE_SCHEMA, PACKAGE_SCHEMA, SIGNATURE_SCHEMA, TagDef, TagSchema};
pub use value::{TagKind, TagSet, TagValue};

use crate::error::{Error, IntegrityWarning, Result};
use tracing::{debug, warn};

/// Header magic, version byte and four reserved bytes
pub const HEADER_MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0, 0, 0, 0];
/// Size of one index entry
pub const ENTRY_SIZE: usize = 16;
/// Upper bound on index entries accepted from untrusted input
pub const MAX_ENTRIES: usize = 0xffff;
/// Upper bound on store size accepted from untrusted input
pub const MAX_STORE: usize = 0x0fff_ffff;

const REGION_TAGS: [u32; 3] = [tags::HEADER_IMAGE, tags::HEADER_SIGNATURES, tags::HEADER_IMMUTABLE];

/// One index entry as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub tag: u32,
    /// Raw kind; see [`TagKind::from_raw`]
    pub kind: u32,
    pub offset: i32,
    pub count: u32,
}

impl IndexEntry {
    fn read(b: &[u8]) -> Self {
        Self {
            tag: be_u32(&b[0..4]),
            kind: be_u32(&b[4..8]),
            offset: be_u32(&b[8..12]) as i32,
            count: be_u32(&b[12..16]),
        }
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tag.to_be_bytes());
        out.extend_from_slice(&self.kind.to_be_bytes());
        out.extend_from_slice(&self.offset.to_be_bytes());
        out.extend_from_slice(&self.count.to_be_bytes());
    }
}

/// The immutable region marker found at the head of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub tag: u32,
    /// Index entries covered by the region, the region entry included
    pub entries: usize,
}

/// An undecoded header: index plus store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    entries: Vec<IndexEntry>,
    store: Vec<u8>,
    region: Option<Region>,
    /// Bytes 4..8 of the magic, zero in headers rpm writes
    reserved: [u8; 4],
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn truncated(what: &str, need: usize, have: usize) -> Error {
    Error::FormatError(format!(
        "truncated {}: need {} bytes, have {}",
        what, need, have
    ))
}

impl RawHeader {
    /// Decode a header that starts with [`HEADER_MAGIC`]
    ///
    /// Trailing bytes after the store are ignored; use [`byte_len`](Self::byte_len)
    /// to find where the header ends.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 {
            return Err(truncated("header preamble", 16, bytes.len()));
        }
        if bytes[0..4] != HEADER_MAGIC[0..4] {
            return Err(Error::FormatError(format!(
                "bad header magic {:02x}{:02x}{:02x}{:02x}",
                bytes[0], bytes[1], bytes[2], bytes[3]
            )));
        }
        let mut raw = Self::decode_counted(&bytes[8..])?;
        raw.reserved = [bytes[4], bytes[5], bytes[6], bytes[7]];
        Ok(raw)
    }

    /// Decode the magic-less form used by installed-package records
    pub fn decode_blob(bytes: &[u8]) -> Result<Self> {
        Self::decode_counted(bytes)
    }

    fn decode_counted(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(truncated("header counts", 8, bytes.len()));
        }
        let il = be_u32(&bytes[0..4]) as usize;
        let dl = be_u32(&bytes[4..8]) as usize;
        if il < 1 {
            return Err(Error::FormatError("header has no index entries".to_string()));
        }
        if il > MAX_ENTRIES || dl > MAX_STORE {
            return Err(Error::FormatError(format!(
                "header too large: {} entries, {} store bytes",
                il, dl
            )));
        }

        let index_len = il * ENTRY_SIZE;
        let need = 8 + index_len + dl;
        if bytes.len() < need {
            return Err(truncated("header", need, bytes.len()));
        }
        Self::from_parts(&bytes[8..8 + index_len], &bytes[8 + index_len..need])
    }

    /// Build a header from separately supplied index and store bytes
    pub fn from_parts(index: &[u8], store: &[u8]) -> Result<Self> {
        if index.is_empty() {
            return Err(Error::FormatError("header has no index entries".to_string()));
        }
        if index.len() % ENTRY_SIZE != 0 {
            return Err(Error::FormatError(format!(
                "index length {} is not a multiple of {}",
                index.len(),
                ENTRY_SIZE
            )));
        }

        let entries: Vec<IndexEntry> = index.chunks_exact(ENTRY_SIZE).map(IndexEntry::read).collect();
        let region = find_region(&entries, store)?;
        validate_entries(&entries, store, region.is_some())?;

        debug!(
            "Decoded header: {} entries, {} store bytes, region {:?}",
            entries.len(),
            store.len(),
            region.map(|r| r.tag)
        );

        Ok(Self {
            entries,
            store: store.to_vec(),
            region,
            reserved: [0; 4],
        })
    }

    pub(crate) fn from_encoded(entries: Vec<IndexEntry>, store: Vec<u8>, region: Option<Region>) -> Self {
        Self {
            entries,
            store,
            region,
            reserved: [0; 4],
        }
    }

    /// The reserved magic bytes as read by [`decode`](Self::decode)
    pub fn reserved(&self) -> [u8; 4] {
        self.reserved
    }

    pub fn with_reserved(mut self, reserved: [u8; 4]) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn store(&self) -> &[u8] {
        &self.store
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// Tags stored after the region boundary, in index order
    pub fn tail_tags(&self) -> Vec<u32> {
        match self.region {
            Some(r) => self.entries[r.entries..].iter().map(|e| e.tag).collect(),
            None => Vec::new(),
        }
    }

    /// Size of the serialized header including magic
    pub fn byte_len(&self) -> usize {
        16 + self.entries.len() * ENTRY_SIZE + self.store.len()
    }

    /// Serialize with the leading magic
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(&HEADER_MAGIC[0..4]);
        out.extend_from_slice(&self.reserved);
        self.write_counted(&mut out);
        out
    }

    /// Serialize in the magic-less record form
    pub fn to_blob(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len() - 8);
        self.write_counted(&mut out);
        out
    }

    fn write_counted(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        out.extend_from_slice(&(self.store.len() as u32).to_be_bytes());
        for e in &self.entries {
            e.write(out);
        }
        out.extend_from_slice(&self.store);
    }

    /// Decode the value of one tag (the last occurrence wins)
    pub fn parse_tag(&self, tag: u32) -> Result<Option<TagValue>> {
        match self.entries.iter().rev().find(|e| e.tag == tag) {
            Some(e) => self.parse_entry(e).map(Some),
            None => Ok(None),
        }
    }

    /// Decode every tag except the region marker
    ///
    /// Repeated tags keep every occurrence in index order. A repeat of a tag
    /// outside [`tags::DUPLICATE_ALLOWED`] whose value differs from the one
    /// before it is reported.
    pub fn parse_all(&self) -> Result<(TagSet, Vec<IntegrityWarning>)> {
        let mut set = TagSet::new();
        let mut warnings = Vec::new();
        let skip = usize::from(self.region.is_some());

        for e in &self.entries[skip..] {
            let value = self.parse_entry(e)?;
            if !tags::DUPLICATE_ALLOWED.contains(&e.tag)
                && set.get(e.tag).is_some_and(|prev| *prev != value)
            {
                warn!("Duplicate header tag {} with differing values", e.tag);
                warnings.push(IntegrityWarning::DuplicateTag { tag: e.tag });
            }
            set.push(e.tag, value);
        }

        Ok((set, warnings))
    }

    fn parse_entry(&self, e: &IndexEntry) -> Result<TagValue> {
        let kind = TagKind::from_raw(e.kind)
            .filter(|k| *k != TagKind::Null)
            .ok_or_else(|| {
                Error::FormatError(format!("tag {} has unrecognized kind {}", e.tag, e.kind))
            })?;
        let offset = usize::try_from(e.offset)
            .map_err(|_| Error::FormatError(format!("tag {} has negative offset", e.tag)))?;
        let count = e.count as usize;

        if let Some(width) = kind.width() {
            let end = count
                .checked_mul(width)
                .and_then(|n| n.checked_add(offset))
                .filter(|&end| end <= self.store.len())
                .ok_or_else(|| {
                    Error::FormatError(format!("tag {} reads past end of store", e.tag))
                })?;
            let data = &self.store[offset..end];
            return Ok(match kind {
                TagKind::Char => TagValue::Char(data.to_vec()),
                TagKind::Int8 => TagValue::Int8(data.to_vec()),
                TagKind::Binary => TagValue::Binary(data.to_vec()),
                TagKind::Int16 => TagValue::Int16(
                    data.chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]))
                        .collect(),
                ),
                TagKind::Int32 => TagValue::Int32(data.chunks_exact(4).map(be_u32).collect()),
                _ => TagValue::Int64(
                    data.chunks_exact(8)
                        .map(|c| u64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                        .collect(),
                ),
            });
        }

        let strings = self.read_strings(e.tag, offset, if kind == TagKind::String { 1 } else { count })?;
        Ok(match kind {
            TagKind::String => TagValue::String(strings.into_iter().next().unwrap_or_default()),
            TagKind::I18nString => TagValue::I18nString(strings),
            _ => TagValue::StringArray(strings),
        })
    }

    fn read_strings(&self, tag: u32, mut offset: usize, count: usize) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let rest = self.store.get(offset..).unwrap_or_default();
            let len = rest.iter().position(|&b| b == 0).ok_or_else(|| {
                Error::FormatError(format!("tag {} has an unterminated string", tag))
            })?;
            out.push(rest[..len].to_vec());
            offset += len + 1;
        }
        Ok(out)
    }
}

fn find_region(entries: &[IndexEntry], store: &[u8]) -> Result<Option<Region>> {
    if let Some(pos) = entries
        .iter()
        .skip(1)
        .position(|e| REGION_TAGS.contains(&e.tag) && e.kind == TagKind::Binary.raw())
    {
        return Err(Error::FormatError(format!(
            "region tag {} at index position {}, expected first",
            entries[pos + 1].tag,
            pos + 1
        )));
    }

    let first = entries[0];
    if !REGION_TAGS.contains(&first.tag)
        || first.kind != TagKind::Binary.raw()
        || first.count as usize != ENTRY_SIZE
    {
        return Ok(None);
    }

    let start = usize::try_from(first.offset)
        .map_err(|_| Error::FormatError("region trailer has negative offset".to_string()))?;
    let trailer_bytes = store
        .get(start..start + ENTRY_SIZE)
        .ok_or_else(|| truncated("region trailer", start + ENTRY_SIZE, store.len()))?;
    let trailer = IndexEntry::read(trailer_bytes);

    if trailer.tag != first.tag && trailer.tag != tags::HEADER_IMAGE {
        return Err(Error::FormatError(format!(
            "region trailer tag {} does not match region {}",
            trailer.tag, first.tag
        )));
    }
    let span = -(trailer.offset as i64);
    if span <= 0 || span % ENTRY_SIZE as i64 != 0 || span as usize / ENTRY_SIZE > entries.len() {
        return Err(Error::FormatError(format!(
            "region trailer offset {} is invalid for {} entries",
            trailer.offset,
            entries.len()
        )));
    }

    Ok(Some(Region {
        tag: first.tag,
        entries: span as usize / ENTRY_SIZE,
    }))
}

fn validate_entries(entries: &[IndexEntry], store: &[u8], has_region: bool) -> Result<()> {
    let skip = usize::from(has_region);
    let mut last_offset = 0i64;

    for e in &entries[skip..] {
        if e.offset < 0 {
            return Err(Error::FormatError(format!(
                "tag {} has negative store offset {}",
                e.tag, e.offset
            )));
        }
        let offset = e.offset as usize;
        let Some(kind) = TagKind::from_raw(e.kind) else {
            if offset > store.len() {
                return Err(Error::FormatError(format!("tag {} offset past end of store", e.tag)));
            }
            continue;
        };

        if let Some(width) = kind.width() {
            if offset % kind.alignment() != 0 {
                return Err(Error::FormatError(format!(
                    "tag {} offset {} is not {}-byte aligned",
                    e.tag,
                    offset,
                    kind.alignment()
                )));
            }
            let end = (e.count as usize).checked_mul(width).and_then(|n| n.checked_add(offset));
            if end.is_none_or(|end| end > store.len()) {
                return Err(Error::FormatError(format!(
                    "tag {} ({} x {} bytes at {}) reads past end of store ({} bytes)",
                    e.tag,
                    e.count,
                    width,
                    offset,
                    store.len()
                )));
            }
        } else if e.count > 0 && offset >= store.len() {
            return Err(Error::FormatError(format!("tag {} offset past end of store", e.tag)));
        }

        if (offset as i64) < last_offset {
            debug!("Header tag {} stored out of order at {}", e.tag, offset);
        }
        last_offset = offset as i64;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::tags::*;
    use super::*;

    fn sample() -> TagSet {
        let mut set = TagSet::new();
        set.set_string(RPMTAG_NAME, "bash");
        set.set_string(RPMTAG_VERSION, "5.2");
        set.set_string(RPMTAG_RELEASE, "1");
        set.set_u32s(RPMTAG_EPOCH, vec![1]);
        set.insert(RPMTAG_FILEMODES, TagValue::Int16(vec![0o100755, 0o40755]));
        set.insert(RPMTAG_LONGFILESIZES, TagValue::Int64(vec![1 << 33, 0]));
        set.set_strings(RPMTAG_BASENAMES, vec!["bash".into(), "bin".into()]);
        set.insert(RPMTAG_SUMMARY, TagValue::I18nString(vec!["The shell".into()]));
        set
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = encode(&sample(), &PACKAGE_SCHEMA, &EncodeOptions::default()).unwrap();
        bytes[0] = 0;
        assert!(matches!(RawHeader::decode(&bytes), Err(Error::FormatError(_))));
    }

    #[test]
    fn test_decode_rejects_empty_index() {
        let mut bytes = HEADER_MAGIC.to_vec();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(RawHeader::decode(&bytes), Err(Error::FormatError(_))));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = encode(&sample(), &PACKAGE_SCHEMA, &EncodeOptions::default()).unwrap();
        for cut in [10, 20, bytes.len() - 1] {
            assert!(RawHeader::decode(&bytes[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_decode_rejects_misaligned_int32() {
        let mut index = Vec::new();
        IndexEntry {
            tag: RPMTAG_EPOCH,
            kind: TagKind::Int32.raw(),
            offset: 2,
            count: 1,
        }
        .write(&mut index);
        let store = [0u8; 8];
        let err = RawHeader::from_parts(&index, &store).unwrap_err();
        assert!(err.to_string().contains("aligned"));
    }

    #[test]
    fn test_decode_rejects_read_past_end() {
        let mut index = Vec::new();
        IndexEntry {
            tag: RPMTAG_FILESIZES,
            kind: TagKind::Int32.raw(),
            offset: 0,
            count: 3,
        }
        .write(&mut index);
        assert!(RawHeader::from_parts(&index, &[0u8; 8]).is_err());
    }

    #[test]
    fn test_parse_tag_unterminated_string() {
        let mut index = Vec::new();
        IndexEntry {
            tag: RPMTAG_NAME,
            kind: TagKind::String.raw(),
            offset: 0,
            count: 1,
        }
        .write(&mut index);
        let raw = RawHeader::from_parts(&index, b"abc").unwrap();
        assert!(matches!(raw.parse_tag(RPMTAG_NAME), Err(Error::FormatError(_))));
    }

    #[test]
    fn test_parse_tag_unknown_kind() {
        let mut index = Vec::new();
        IndexEntry {
            tag: 5000,
            kind: 42,
            offset: 0,
            count: 1,
        }
        .write(&mut index);
        let raw = RawHeader::from_parts(&index, b"x").unwrap();
        assert!(raw.parse_tag(5000).is_err());
        assert_eq!(raw.parse_tag(RPMTAG_NAME).unwrap(), None);
    }

    #[test]
    fn test_parse_all_round_trips_values() {
        let set = sample();
        let opts = EncodeOptions::for_schema(&PACKAGE_SCHEMA);
        let bytes = encode(&set, &PACKAGE_SCHEMA, &opts).unwrap();
        let raw = RawHeader::decode(&bytes).unwrap();
        assert_eq!(raw.region().map(|r| r.tag), Some(HEADER_IMMUTABLE));
        let (decoded, warnings) = raw.parse_all().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(decoded, set);
        assert_eq!(raw.to_bytes(), bytes);
        assert_eq!(raw.byte_len(), bytes.len());
    }

    #[test]
    fn test_duplicate_tag_warning() {
        let mut index = Vec::new();
        for (tag, off) in [(RPMTAG_NAME, 0), (RPMTAG_NAME, 2), (RPMTAG_BASENAMES, 0), (RPMTAG_BASENAMES, 2)] {
            IndexEntry {
                tag,
                kind: if tag == RPMTAG_NAME {
                    TagKind::String.raw()
                } else {
                    TagKind::StringArray.raw()
                },
                offset: off,
                count: 1,
            }
            .write(&mut index);
        }
        let raw = RawHeader::from_parts(&index, b"a\0b\0").unwrap();
        let (set, warnings) = raw.parse_all().unwrap();
        assert_eq!(set.string(RPMTAG_NAME).as_deref(), Some("b"));
        assert_eq!(set.occurrences(RPMTAG_BASENAMES).len(), 2);
        assert_eq!(warnings, vec![IntegrityWarning::DuplicateTag { tag: RPMTAG_NAME }]);
    }

    #[test]
    fn test_allowed_duplicates_survive_reencode() {
        let mut set = TagSet::new();
        set.set_string(RPMTAG_NAME, "split");
        set.push(RPMTAG_BASENAMES, TagValue::strings(["a", "b"]));
        set.push(RPMTAG_BASENAMES, TagValue::strings(["c"]));
        let opts = EncodeOptions::for_schema(&PACKAGE_SCHEMA);
        let bytes = encode(&set, &PACKAGE_SCHEMA, &opts).unwrap();

        let raw = RawHeader::decode(&bytes).unwrap();
        let (decoded, warnings) = raw.parse_all().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            decoded.occurrences(RPMTAG_BASENAMES),
            &[TagValue::strings(["a", "b"]), TagValue::strings(["c"])]
        );
        let again = encode(&decoded, &PACKAGE_SCHEMA, &EncodeOptions::from_layout(&raw, &PACKAGE_SCHEMA)).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_non_utf8_string_round_trips() {
        let mut set = sample();
        set.insert(RPMTAG_SUMMARY, TagValue::I18nString(vec![b"Caf\xe9 \xff shell".to_vec()]));
        set.insert(RPMTAG_LICENSE, TagValue::String(b"J\xfcrgen".to_vec()));
        let opts = EncodeOptions::for_schema(&PACKAGE_SCHEMA);
        let bytes = encode(&set, &PACKAGE_SCHEMA, &opts).unwrap();

        let raw = RawHeader::decode(&bytes).unwrap();
        let (decoded, _) = raw.parse_all().unwrap();
        assert_eq!(decoded.get(RPMTAG_LICENSE).and_then(TagValue::as_byte_str), Some(&b"J\xfcrgen"[..]));
        assert_eq!(decoded.string(RPMTAG_LICENSE).as_deref(), Some("J\u{fffd}rgen"));
        let again = encode(&decoded, &PACKAGE_SCHEMA, &EncodeOptions::from_layout(&raw, &PACKAGE_SCHEMA)).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_reserved_magic_bytes_kept() {
        let mut bytes = encode(&sample(), &PACKAGE_SCHEMA, &EncodeOptions::default()).unwrap();
        bytes[4..8].copy_from_slice(&[0, 0, 0, 7]);
        let raw = RawHeader::decode(&bytes).unwrap();
        assert_eq!(raw.reserved(), [0, 0, 0, 7]);
        assert_eq!(raw.to_bytes(), bytes);
        assert_eq!(RawHeader::decode_blob(&raw.to_blob()).unwrap().reserved(), [0; 4]);
    }

    #[test]
    fn test_region_must_be_first() {
        let set = sample();
        let bytes = encode(&set, &PACKAGE_SCHEMA, &EncodeOptions::for_schema(&PACKAGE_SCHEMA)).unwrap();
        let raw = RawHeader::decode(&bytes).unwrap();
        let mut entries = raw.entries().to_vec();
        entries.swap(0, 1);
        let mut index = Vec::new();
        entries.iter().for_each(|e| e.write(&mut index));
        assert!(RawHeader::from_parts(&index, raw.store()).is_err());
    }

    #[test]
    fn test_blob_form() {
        let bytes = encode(&sample(), &PACKAGE_SCHEMA, &EncodeOptions::default()).unwrap();
        let raw = RawHeader::decode(&bytes).unwrap();
        let blob = raw.to_blob();
        assert_eq!(RawHeader::decode_blob(&blob).unwrap(), raw);
    }
}
