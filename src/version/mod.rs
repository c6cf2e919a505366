// src/version/mod.rs

//! Version handling and range intersection for package dependencies
//!
//! This module provides the segment-wise comparison used for RPM-style
//! version strings, comparison of full epoch:version-release labels, and the
//! range test used when matching a requirement against a provide.

mod sense;

pub use sense::DepFlags;

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// An epoch:version-release label
///
/// Every component is kept as text: epochs are compared with the same
/// segment rules as versions, and an empty release means "unspecified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Evr {
    pub epoch: String,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: &str, version: &str, release: &str) -> Self {
        Self {
            epoch: epoch.to_string(),
            version: version.to_string(),
            release: release.to_string(),
        }
    }

    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch="", version="1.2.3", release=""
    /// - "2:1.2.3" → epoch="2", version="1.2.3", release=""
    /// - "1.2.3-4.el8" → epoch="", version="1.2.3", release="4.el8"
    ///
    /// The release starts after the last dash. A prefix before ':' is only
    /// taken as an epoch when it is all digits.
    pub fn parse(s: &str) -> Self {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) if e.bytes().all(|b| b.is_ascii_digit()) => (e, r),
            _ => ("", s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v, r),
            None => (rest, ""),
        };

        Self::new(epoch, version, release)
    }

    /// True when no version was given at all
    pub fn is_empty(&self) -> bool {
        self.epoch.is_empty() && self.version.is_empty() && self.release.is_empty()
    }

    /// The epoch with an absent value read as "0"
    fn effective_epoch(&self) -> &str {
        if self.epoch.is_empty() { "0" } else { &self.epoch }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.epoch.is_empty() {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if !self.release.is_empty() {
            write!(f, "-{}", self.release)?;
        }
        Ok(())
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|b| b.is_ascii_alphanumeric())
        .unwrap_or(s.len());
    &s[start..]
}

fn split_run(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|b| {
            if numeric {
                !b.is_ascii_digit()
            } else {
                !b.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn strip_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&b| b != b'0').unwrap_or(s.len());
    &s[start..]
}

/// Compare two version strings segment by segment
///
/// Separators (anything that is not an ASCII letter or digit) only delimit
/// segments. Numeric runs compare by value, where a longer run (after
/// dropping leading zeros) always wins; alphabetic runs compare bytewise.
/// A numeric run beats a missing run and an alphabetic run loses to one, so
/// `"1.0" > "1.0a"` while `"1.0" < "1.0.1"`.
pub fn compare_strings(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);
        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg1, rest1) = split_run(one, numeric);
        let (seg2, rest2) = split_run(two, numeric);

        // Runs of different kinds: digits beat letters
        if seg2.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let (seg1, seg2) = if numeric {
            let (s1, s2) = (strip_zeros(seg1), strip_zeros(seg2));
            match s1.len().cmp(&s2.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
            (s1, s2)
        } else {
            (seg1, seg2)
        };

        match seg1.cmp(seg2) {
            Ordering::Equal => {}
            ord => return ord,
        }

        one = rest1;
        two = rest2;
    }

    match (one.first(), two.first()) {
        (None, None) => Ordering::Equal,
        (None, Some(c)) if c.is_ascii_alphabetic() => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(c), None) if c.is_ascii_alphabetic() => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(_), Some(_)) => Ordering::Equal,
    }
}

/// Compare two epoch:version-release labels
///
/// The release is only compared when both sides carry one, so a requirement
/// on "= 1.0" matches every release of 1.0.
pub fn compare_labels(a: &Evr, b: &Evr) -> Ordering {
    match compare_strings(a.effective_epoch(), b.effective_epoch()) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match compare_strings(&a.version, &b.version) {
        Ordering::Equal => {}
        ord => return ord,
    }

    if a.release.is_empty() || b.release.is_empty() {
        return Ordering::Equal;
    }
    compare_strings(&a.release, &b.release)
}

/// Check whether two version ranges overlap
///
/// An unversioned side (no comparison bits, or an empty label) overlaps
/// everything.
pub fn ranges_intersect(flags1: DepFlags, evr1: &Evr, flags2: DepFlags, evr2: &Evr) -> bool {
    let sense1 = flags1.sense();
    let sense2 = flags2.sense();

    if sense1.is_empty() || sense2.is_empty() || evr1.is_empty() || evr2.is_empty() {
        return true;
    }

    match compare_labels(evr1, evr2) {
        Ordering::Less => sense1.contains(DepFlags::GREATER) || sense2.contains(DepFlags::LESS),
        Ordering::Greater => {
            sense1.contains(DepFlags::LESS) || sense2.contains(DepFlags::GREATER)
        }
        Ordering::Equal => {
            (sense1.contains(DepFlags::EQUAL) && sense2.contains(DepFlags::EQUAL))
                || (sense1.contains(DepFlags::LESS) && sense2.contains(DepFlags::LESS))
                || (sense1.contains(DepFlags::GREATER) && sense2.contains(DepFlags::GREATER))
        }
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_labels(self, other)
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
