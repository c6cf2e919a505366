// src/header/value.rs

//! Typed tag values
//!
//! Header strings are kept as raw bytes. Most are UTF-8, but legacy packages
//! carry Latin-1 names and summaries, and decoding them lossily would change
//! the bytes a re-encode produces. The `*_str` accessors give a lossy view.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// On-disk value kind of an index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TagKind {
    Null = 0,
    Char = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    String = 6,
    Binary = 7,
    StringArray = 8,
    I18nString = 9,
}

impl TagKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Null,
            1 => Self::Char,
            2 => Self::Int8,
            3 => Self::Int16,
            4 => Self::Int32,
            5 => Self::Int64,
            6 => Self::String,
            7 => Self::Binary,
            8 => Self::StringArray,
            9 => Self::I18nString,
            _ => return None,
        })
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Natural alignment of values of this kind in the store
    pub fn alignment(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Int64 => 8,
            _ => 1,
        }
    }

    /// Width of one element for fixed-width kinds
    pub fn width(self) -> Option<usize> {
        match self {
            Self::Char | Self::Int8 | Self::Binary => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 => Some(4),
            Self::Int64 => Some(8),
            _ => None,
        }
    }
}

/// A decoded tag value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Char(Vec<u8>),
    Int8(Vec<u8>),
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    Int64(Vec<u64>),
    /// One NUL-terminated string, terminator not included
    String(Vec<u8>),
    Binary(Vec<u8>),
    StringArray(Vec<Vec<u8>>),
    I18nString(Vec<Vec<u8>>),
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

impl TagValue {
    pub fn kind(&self) -> TagKind {
        match self {
            Self::Char(_) => TagKind::Char,
            Self::Int8(_) => TagKind::Int8,
            Self::Int16(_) => TagKind::Int16,
            Self::Int32(_) => TagKind::Int32,
            Self::Int64(_) => TagKind::Int64,
            Self::String(_) => TagKind::String,
            Self::Binary(_) => TagKind::Binary,
            Self::StringArray(_) => TagKind::StringArray,
            Self::I18nString(_) => TagKind::I18nString,
        }
    }

    /// Element count as stored in the index entry
    pub fn count(&self) -> usize {
        match self {
            Self::Char(v) | Self::Int8(v) | Self::Binary(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::String(_) => 1,
            Self::StringArray(v) | Self::I18nString(v) => v.len(),
        }
    }

    /// Append the store representation (without alignment padding)
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Char(v) | Self::Int8(v) | Self::Binary(v) => out.extend_from_slice(v),
            Self::Int16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Self::Int32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Self::Int64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Self::String(s) => {
                out.extend_from_slice(s);
                out.push(0);
            }
            Self::StringArray(v) | Self::I18nString(v) => {
                for s in v {
                    out.extend_from_slice(s);
                    out.push(0);
                }
            }
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into().into_bytes())
    }

    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringArray(items.into_iter().map(|s| s.into().into_bytes()).collect())
    }

    /// Raw bytes of the first string (the untranslated text for i18n)
    pub fn as_byte_str(&self) -> Option<&[u8]> {
        match self {
            Self::String(s) => Some(s),
            Self::StringArray(v) | Self::I18nString(v) => v.first().map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn as_byte_strings(&self) -> Option<&[Vec<u8>]> {
        match self {
            Self::StringArray(v) | Self::I18nString(v) => Some(v),
            _ => None,
        }
    }

    /// First string, with invalid UTF-8 replaced
    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        self.as_byte_str().map(lossy)
    }

    /// Every string of an array, with invalid UTF-8 replaced
    pub fn to_strings(&self) -> Option<Vec<String>> {
        self.as_byte_strings()
            .map(|v| v.iter().map(|s| lossy(s).into_owned()).collect())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Char(v) | Self::Int8(v) | Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Integer elements widened to u64
    pub fn to_u64s(&self) -> Option<Vec<u64>> {
        match self {
            Self::Char(v) | Self::Int8(v) => Some(v.iter().map(|&x| x as u64).collect()),
            Self::Int16(v) => Some(v.iter().map(|&x| x as u64).collect()),
            Self::Int32(v) => Some(v.iter().map(|&x| x as u64).collect()),
            Self::Int64(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Integer elements sign- or zero-extended to i64
    pub fn to_i64s(&self, signed: bool) -> Option<Vec<i64>> {
        if !signed {
            return self
                .to_u64s()
                .map(|v| v.into_iter().map(|x| x as i64).collect());
        }
        match self {
            Self::Char(v) | Self::Int8(v) => Some(v.iter().map(|&x| x as i8 as i64).collect()),
            Self::Int16(v) => Some(v.iter().map(|&x| x as i16 as i64).collect()),
            Self::Int32(v) => Some(v.iter().map(|&x| x as i32 as i64).collect()),
            Self::Int64(v) => Some(v.iter().map(|&x| x as i64).collect()),
            _ => None,
        }
    }
}

/// Tag id to value map
///
/// A tag that occurs more than once in a header keeps every occurrence in
/// index order; lookups see the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    values: BTreeMap<u32, Vec<TagValue>>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag's only value, returning the last previous occurrence
    pub fn insert(&mut self, tag: u32, value: TagValue) -> Option<TagValue> {
        self.values.insert(tag, vec![value]).and_then(|mut v| v.pop())
    }

    /// Add another occurrence after the existing ones
    pub fn push(&mut self, tag: u32, value: TagValue) {
        self.values.entry(tag).or_default().push(value);
    }

    pub fn remove(&mut self, tag: u32) -> Option<TagValue> {
        self.values.remove(&tag).and_then(|mut v| v.pop())
    }

    pub fn get(&self, tag: u32) -> Option<&TagValue> {
        self.values.get(&tag).and_then(|v| v.last())
    }

    /// All occurrences of a tag, in index order
    pub fn occurrences(&self, tag: u32) -> &[TagValue] {
        self.values.get(&tag).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, tag: u32) -> bool {
        self.values.contains_key(&tag)
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate every occurrence in ascending tag order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TagValue)> {
        self.values
            .iter()
            .flat_map(|(k, vals)| vals.iter().map(move |v| (*k, v)))
    }

    pub fn string(&self, tag: u32) -> Option<String> {
        self.get(tag).and_then(TagValue::as_str).map(Cow::into_owned)
    }

    pub fn strings(&self, tag: u32) -> Option<Vec<String>> {
        self.get(tag).and_then(TagValue::to_strings)
    }

    pub fn u64s(&self, tag: u32) -> Option<Vec<u64>> {
        self.get(tag).and_then(TagValue::to_u64s)
    }

    /// First integer of a numeric tag
    pub fn u64(&self, tag: u32) -> Option<u64> {
        self.u64s(tag).and_then(|v| v.first().copied())
    }

    pub fn set_string(&mut self, tag: u32, s: impl Into<String>) {
        self.insert(tag, TagValue::string(s));
    }

    pub fn set_strings(&mut self, tag: u32, v: Vec<String>) {
        self.insert(tag, TagValue::strings(v));
    }

    pub fn set_u32s(&mut self, tag: u32, v: Vec<u32>) {
        self.insert(tag, TagValue::Int32(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_alignment() {
        assert_eq!(TagKind::Int16.alignment(), 2);
        assert_eq!(TagKind::Int32.alignment(), 4);
        assert_eq!(TagKind::Int64.alignment(), 8);
        assert_eq!(TagKind::StringArray.alignment(), 1);
        assert_eq!(TagKind::from_raw(10), None);
    }

    #[test]
    fn test_write_string_array() {
        let mut out = Vec::new();
        TagValue::StringArray(vec!["a".into(), "bc".into()]).write_to(&mut out);
        assert_eq!(out, b"a\0bc\0");
    }

    #[test]
    fn test_latin1_string_kept_raw() {
        let v = TagValue::String(b"caf\xe9".to_vec());
        let mut out = Vec::new();
        v.write_to(&mut out);
        assert_eq!(out, b"caf\xe9\0");
        assert_eq!(v.as_str().as_deref(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_occurrences_keep_order() {
        let mut set = TagSet::new();
        set.push(1117, TagValue::strings(["a"]));
        set.push(1117, TagValue::strings(["b"]));
        assert_eq!(set.occurrences(1117).len(), 2);
        assert_eq!(set.strings(1117), Some(vec!["b".to_string()]));
        assert_eq!(set.iter().count(), 2);
        assert_eq!(set.len(), 1);

        assert_eq!(set.insert(1117, TagValue::strings(["c"])), Some(TagValue::strings(["b"])));
        assert_eq!(set.occurrences(1117).len(), 1);
        assert!(set.occurrences(1000).is_empty());
    }

    #[test]
    fn test_signed_widening() {
        let v = TagValue::Int32(vec![0xffff_ffff]);
        assert_eq!(v.to_i64s(true), Some(vec![-1]));
        assert_eq!(v.to_i64s(false), Some(vec![0xffff_ffff]));
    }
}
