// src/resolver/plan.rs

//! Resolution plan data structures
//!
//! Contains the result types for dependency resolution.

use super::conflict::Conflict;
use crate::error::CycleBrokenWarning;
use crate::packages::record::PkgId;

/// Result of resolving and ordering a package set
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    /// Packages in placement order
    pub order: Vec<PkgId>,
    /// Consistency problems in the set (advisory)
    pub conflicts: Vec<Conflict>,
    /// Pre-requirements dropped to break loops
    pub warnings: Vec<CycleBrokenWarning>,
}

impl ResolutionPlan {
    /// No conflicts and no dropped pre-requirements
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.warnings.is_empty()
    }
}
