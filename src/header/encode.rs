// src/header/encode.rs

//! Header encoder
//!
//! Entries are laid out in ascending tag order. With a region tag the
//! region entry comes first and its 16-byte trailer is written into the
//! store right after the data of the tags it covers. Install-only tags, when
//! split out, follow the trailer so they sit outside the immutable region.

use super::tags::TagSchema;
use super::value::{TagSet, TagValue};
use super::{ENTRY_SIZE, IndexEntry, RawHeader, Region};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::tags::Cardinality;

/// Layout choices for [`encode`]
///
/// Tags are named the way [`TagSchema::id_of`] accepts them; a plain decimal
/// number is taken as a raw tag id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeOptions {
    /// Region marker tag, or none for an unsealed header
    pub region_tag: Option<String>,
    /// Tags dropped from the output
    pub excluded: Vec<String>,
    /// Tags written after the region boundary when `install_split` is set
    pub install_only: Vec<String>,
    pub install_split: bool,
}

impl EncodeOptions {
    /// The layout a schema's headers are normally written with
    pub fn for_schema(schema: &TagSchema) -> Self {
        let name = |id: u32| schema.name_of(id).map_or_else(|| id.to_string(), str::to_string);
        Self {
            region_tag: Some(name(schema.region_tag)),
            excluded: Vec::new(),
            install_only: schema.install_only.iter().map(|&id| name(id)).collect(),
            install_split: !schema.install_only.is_empty(),
        }
    }

    /// Options that reproduce the layout of an already decoded header
    pub fn from_layout(raw: &RawHeader, schema: &TagSchema) -> Self {
        let name = |id: u32| schema.name_of(id).map_or_else(|| id.to_string(), str::to_string);
        let tail: Vec<String> = raw.tail_tags().into_iter().map(name).collect();
        Self {
            region_tag: raw.region().map(|r| name(r.tag)),
            excluded: Vec::new(),
            install_split: !tail.is_empty(),
            install_only: tail,
        }
    }
}

fn resolve(schema: &TagSchema, name: &str) -> Result<u32> {
    name.parse::<u32>()
        .ok()
        .or_else(|| schema.id_of(name))
        .ok_or_else(|| Error::ConfigError(format!("unknown tag '{}' in {} schema", name, schema.name)))
}

fn check_value(schema: &TagSchema, tag: u32, value: &TagValue) -> Result<()> {
    let Some(def) = schema.get(tag) else {
        return Ok(());
    };
    if def.kind != value.kind() {
        return Err(Error::FormatError(format!(
            "tag {} ({}) expects {:?}, got {:?}",
            tag,
            def.name,
            def.kind,
            value.kind()
        )));
    }
    let count = value.count();
    let ok = match def.cardinality {
        Cardinality::Scalar => count == 1,
        Cardinality::Fixed(n) => count == n as usize,
        Cardinality::Array => true,
    };
    if !ok {
        return Err(Error::FormatError(format!(
            "tag {} ({}) has {} values, expected {:?}",
            tag, def.name, count, def.cardinality
        )));
    }
    Ok(())
}

fn push_value(entries: &mut Vec<IndexEntry>, store: &mut Vec<u8>, tag: u32, value: &TagValue) {
    let align = value.kind().alignment();
    let pad = (align - store.len() % align) % align;
    store.resize(store.len() + pad, 0);
    entries.push(IndexEntry {
        tag,
        kind: value.kind().raw(),
        offset: store.len() as i32,
        count: value.count() as u32,
    });
    value.write_to(store);
}

/// Encode a tag set into a [`RawHeader`]
pub fn encode_header(tags: &TagSet, schema: &TagSchema, opts: &EncodeOptions) -> Result<RawHeader> {
    let region_tag = opts.region_tag.as_deref().map(|n| resolve(schema, n)).transpose()?;
    let excluded = opts
        .excluded
        .iter()
        .map(|n| resolve(schema, n))
        .collect::<Result<HashSet<u32>>>()?;
    let install_only = opts
        .install_only
        .iter()
        .map(|n| resolve(schema, n))
        .collect::<Result<HashSet<u32>>>()?;

    let mut main = Vec::new();
    let mut tail = Vec::new();
    for (tag, value) in tags.iter() {
        if excluded.contains(&tag) || Some(tag) == region_tag {
            continue;
        }
        check_value(schema, tag, value)?;
        if opts.install_split && install_only.contains(&tag) {
            tail.push((tag, value));
        } else {
            main.push((tag, value));
        }
    }

    if main.is_empty() && tail.is_empty() && region_tag.is_none() {
        return Err(Error::FormatError("cannot encode an empty header".to_string()));
    }

    let mut entries = Vec::with_capacity(main.len() + tail.len() + 1);
    let mut store = Vec::new();
    for (tag, value) in &main {
        push_value(&mut entries, &mut store, *tag, value);
    }

    let region = match region_tag {
        Some(rtag) => {
            let covered = main.len() + 1;
            let trailer_offset = store.len() as i32;
            IndexEntry {
                tag: rtag,
                kind: super::TagKind::Binary.raw(),
                offset: -((covered * ENTRY_SIZE) as i32),
                count: ENTRY_SIZE as u32,
            }
            .write(&mut store);
            entries.insert(
                0,
                IndexEntry {
                    tag: rtag,
                    kind: super::TagKind::Binary.raw(),
                    offset: trailer_offset,
                    count: ENTRY_SIZE as u32,
                },
            );
            Some(Region {
                tag: rtag,
                entries: covered,
            })
        }
        None => None,
    };

    for (tag, value) in &tail {
        push_value(&mut entries, &mut store, *tag, value);
    }

    debug!(
        "Encoded {} header: {} entries ({} after region), {} store bytes",
        schema.name,
        entries.len(),
        tail.len(),
        store.len()
    );

    Ok(RawHeader::from_encoded(entries, store, region))
}

/// Encode a tag set to header bytes, magic included
pub fn encode(tags: &TagSet, schema: &TagSchema, opts: &EncodeOptions) -> Result<Vec<u8>> {
    encode_header(tags, schema, opts).map(|raw| raw.to_bytes())
}
