// src/version/sense.rs

//! Dependency sense flags
//!
//! Bit values match the `RPMSENSE_*` constants stored in the
//! `*FLAGS` header tags, so they round-trip through headers unchanged.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DepFlags: u32 {
        const ANY = 0;
        const LESS = 1 << 1;
        const GREATER = 1 << 2;
        const EQUAL = 1 << 3;

        const LE = Self::LESS.bits() | Self::EQUAL.bits();
        const GE = Self::GREATER.bits() | Self::EQUAL.bits();

        const POSTTRANS = 1 << 5;
        const PREREQ = 1 << 6;
        const PRETRANS = 1 << 7;
        const INTERP = 1 << 8;
        const SCRIPT_PRE = 1 << 9;
        const SCRIPT_POST = 1 << 10;
        const SCRIPT_PREUN = 1 << 11;
        const SCRIPT_POSTUN = 1 << 12;
        const SCRIPT_VERIFY = 1 << 13;
        const FIND_REQUIRES = 1 << 14;
        const FIND_PROVIDES = 1 << 15;
        const TRIGGERIN = 1 << 16;
        const TRIGGERUN = 1 << 17;
        const TRIGGERPOSTUN = 1 << 18;
        const MISSINGOK = 1 << 19;
        const RPMLIB = 1 << 24;
        const TRIGGERPREIN = 1 << 25;
        const KEYRING = 1 << 26;
        const CONFIG = 1 << 28;

        // Unknown bits from newer rpm versions must survive a round trip
        const _ = !0;
    }
}

impl DepFlags {
    /// The comparison bits only
    pub fn sense(self) -> DepFlags {
        self & (DepFlags::LESS | DepFlags::GREATER | DepFlags::EQUAL)
    }

    /// Old-style `PreReq:` marker
    pub fn is_legacy_prereq(self) -> bool {
        self.contains(DepFlags::PREREQ)
    }

    /// Needed by %pre/%post (or pretrans) of the requiring package
    pub fn is_install_prereq(self) -> bool {
        self.intersects(DepFlags::SCRIPT_PRE | DepFlags::SCRIPT_POST | DepFlags::PRETRANS)
    }

    /// Needed by %preun/%postun of the requiring package
    pub fn is_erase_prereq(self) -> bool {
        self.intersects(DepFlags::SCRIPT_PREUN | DepFlags::SCRIPT_POSTUN)
    }

    /// Parse a comparison operator (`<`, `<=`, `=`, `==`, `>=`, `>`)
    pub fn from_operator(op: &str) -> Option<DepFlags> {
        match op {
            "<" => Some(DepFlags::LESS),
            "<=" | "=<" => Some(DepFlags::LE),
            "=" | "==" => Some(DepFlags::EQUAL),
            ">=" | "=>" => Some(DepFlags::GE),
            ">" => Some(DepFlags::GREATER),
            _ => None,
        }
    }

    /// Render the comparison bits as an operator, empty when unversioned
    pub fn operator(self) -> &'static str {
        let sense = self.sense();
        if sense == DepFlags::LE {
            "<="
        } else if sense == DepFlags::GE {
            ">="
        } else if sense == DepFlags::LESS {
            "<"
        } else if sense == DepFlags::GREATER {
            ">"
        } else if sense == DepFlags::EQUAL {
            "="
        } else if sense == DepFlags::LESS | DepFlags::GREATER {
            "!="
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sense_strips_context_bits() {
        let flags = DepFlags::GE | DepFlags::PREREQ | DepFlags::SCRIPT_POST;
        assert_eq!(flags.sense(), DepFlags::GE);
        assert!(flags.is_legacy_prereq());
        assert!(flags.is_install_prereq());
        assert!(!flags.is_erase_prereq());
    }

    #[test]
    fn test_operator_round_trip() {
        for op in ["<", "<=", "=", ">=", ">"] {
            let flags = DepFlags::from_operator(op).unwrap();
            assert_eq!(flags.operator(), op);
        }
        assert_eq!(DepFlags::ANY.operator(), "");
        assert!(DepFlags::from_operator("~>").is_none());
    }

    #[test]
    fn test_unknown_bits_preserved() {
        let raw = (1 << 30) | DepFlags::EQUAL.bits();
        assert_eq!(DepFlags::from_bits_retain(raw).bits(), raw);
    }
}
