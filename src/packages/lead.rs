// src/packages/lead.rs

//! The 96-byte lead at the start of every package file
//!
//! Modern tools ignore most of it, but it has to be present and it has to
//! survive a rewrite byte-for-byte.

use crate::error::{Error, Result};

pub const LEAD_SIZE: usize = 96;
pub const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
/// The only signature type in use: a header-style signature block
pub const SIGTYPE_HEADERSIG: u16 = 5;

const NAME_LEN: usize = 66;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Binary,
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub major: u8,
    pub minor: u8,
    pub kind: PackageKind,
    pub archnum: u16,
    name: [u8; NAME_LEN],
    pub osnum: u16,
    pub signature_type: u16,
    reserved: [u8; 16],
}

impl Lead {
    /// A v3.0 lead as current rpmbuild writes it
    pub fn new(name: &str, kind: PackageKind) -> Self {
        let mut field = [0u8; NAME_LEN];
        let bytes = name.as_bytes();
        let n = bytes.len().min(NAME_LEN - 1);
        field[..n].copy_from_slice(&bytes[..n]);
        Self {
            major: 3,
            minor: 0,
            kind,
            archnum: 1,
            name: field,
            osnum: 1,
            signature_type: SIGTYPE_HEADERSIG,
            reserved: [0; 16],
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEAD_SIZE {
            return Err(Error::FormatError(format!(
                "truncated lead: {} of {} bytes",
                bytes.len(),
                LEAD_SIZE
            )));
        }
        if bytes[0..4] != LEAD_MAGIC {
            return Err(Error::FormatError("not an RPM package (bad lead magic)".to_string()));
        }

        let u16_at = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);
        let major = bytes[4];
        if !(3..=4).contains(&major) {
            return Err(Error::FormatError(format!("unsupported lead version {}", major)));
        }
        let kind = match u16_at(6) {
            0 => PackageKind::Binary,
            1 => PackageKind::Source,
            other => return Err(Error::FormatError(format!("unknown package type {}", other))),
        };
        let signature_type = u16_at(78);
        if signature_type != SIGTYPE_HEADERSIG {
            return Err(Error::FormatError(format!(
                "unsupported signature type {}",
                signature_type
            )));
        }

        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[10..10 + NAME_LEN]);
        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&bytes[80..96]);

        Ok(Self {
            major,
            minor: bytes[5],
            kind,
            archnum: u16_at(8),
            name,
            osnum: u16_at(76),
            signature_type,
            reserved,
        })
    }

    /// Package name as recorded in the lead (NEVR, possibly truncated)
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn to_bytes(&self) -> [u8; LEAD_SIZE] {
        let mut out = [0u8; LEAD_SIZE];
        out[0..4].copy_from_slice(&LEAD_MAGIC);
        out[4] = self.major;
        out[5] = self.minor;
        let kind: u16 = match self.kind {
            PackageKind::Binary => 0,
            PackageKind::Source => 1,
        };
        out[6..8].copy_from_slice(&kind.to_be_bytes());
        out[8..10].copy_from_slice(&self.archnum.to_be_bytes());
        out[10..76].copy_from_slice(&self.name);
        out[76..78].copy_from_slice(&self.osnum.to_be_bytes());
        out[78..80].copy_from_slice(&self.signature_type.to_be_bytes());
        out[80..96].copy_from_slice(&self.reserved);
        out
    }
}
