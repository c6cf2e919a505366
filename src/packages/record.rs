// src/packages/record.rs

//! Typed package metadata
//!
//! A [`PackageRecord`] is built once from a decoded tag set and never
//! changes afterwards. The resolver works on records through [`PkgId`]
//! handles into a [`PackagePool`], so two records with the same NEVRA (an
//! installed copy and a candidate, say) stay distinct.

use crate::error::{Error, Result};
use crate::header::tags::*;
use crate::header::{TagSet, TagValue};
use crate::version::{DepFlags, Evr};
use serde::Serialize;
use std::fmt;
use std::ops::Index;

/// RPMFILE_CONFIG
const FILE_CONFIG: u32 = 1 << 0;
/// RPM's default file digest algorithm (MD5)
pub const DEFAULT_DIGEST_ALGO: u32 = 1;

/// One provides/requires/conflicts/obsoletes entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub name: String,
    pub flags: DepFlags,
    /// `[epoch:]version[-release]`, empty when unversioned
    pub version: String,
}

impl Dependency {
    /// A comparison with no version to compare against means any version,
    /// so the sense bits are dropped when `version` is empty.
    pub fn new(name: impl Into<String>, flags: DepFlags, version: impl Into<String>) -> Self {
        let version = version.into();
        let flags = if version.is_empty() {
            flags.difference(DepFlags::LESS | DepFlags::GREATER | DepFlags::EQUAL)
        } else {
            flags
        };
        Self {
            name: name.into(),
            flags,
            version,
        }
    }

    /// An unversioned dependency on a name
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DepFlags::ANY, "")
    }

    pub fn evr(&self) -> Evr {
        Evr::parse(&self.version)
    }

    /// `rpmlib(...)` features are satisfied by the package manager itself
    pub fn is_rpmlib(&self) -> bool {
        self.name.starts_with("rpmlib(") || self.flags.contains(DepFlags::RPMLIB)
    }

    /// A file path rather than a capability name
    pub fn is_path(&self) -> bool {
        self.name.starts_with('/')
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.flags.operator() {
            "" => write!(f, "{}", self.name),
            op => write!(f, "{} {} {}", self.name, op, self.version),
        }
    }
}

/// One file shipped by a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub mode: u32,
    pub size: u64,
    /// Hex digest, empty for non-regular files
    pub digest: String,
    pub link_to: String,
    pub device: u32,
    pub inode: u32,
    pub user: String,
    pub group: String,
    pub flags: u32,
    pub mtime: u32,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }

    pub fn is_regular(&self) -> bool {
        self.mode & 0o170000 == 0o100000
    }

    pub fn is_config(&self) -> bool {
        self.flags & FILE_CONFIG != 0
    }
}

/// Decoded metadata of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub is_source: bool,
    pub summary: String,
    pub payload_format: Option<String>,
    pub payload_compressor: Option<String>,
    pub archive_size: Option<u64>,
    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub files: Vec<FileEntry>,
    /// `FILEDIGESTALGO` value the file digests were computed with
    pub file_digest_algo: u32,
}

fn int_column(tags: &TagSet, tag: u32, n: usize) -> Result<Vec<u64>> {
    match tags.u64s(tag) {
        None => Ok(vec![0; n]),
        Some(v) if v.len() == n => Ok(v),
        Some(v) => Err(Error::FormatError(format!(
            "tag {} has {} values, expected {}",
            tag,
            v.len(),
            n
        ))),
    }
}

fn str_column(tags: &TagSet, tag: u32, n: usize) -> Result<Vec<String>> {
    match tags.strings(tag) {
        None => Ok(vec![String::new(); n]),
        Some(v) if v.len() == n => Ok(v),
        Some(v) => Err(Error::FormatError(format!(
            "tag {} has {} values, expected {}",
            tag,
            v.len(),
            n
        ))),
    }
}

fn dependencies(tags: &TagSet, names: u32, flags: u32, versions: u32) -> Result<Vec<Dependency>> {
    let Some(list) = tags.strings(names) else {
        return Ok(Vec::new());
    };
    let n = list.len();
    let flags = int_column(tags, flags, n)?;
    let versions = str_column(tags, versions, n)?;
    Ok(list
        .into_iter()
        .zip(flags)
        .zip(versions)
        .map(|((name, f), version)| Dependency::new(name, DepFlags::from_bits_retain(f as u32), version))
        .collect())
}

fn file_paths(tags: &TagSet) -> Result<Vec<String>> {
    if let Some(bases) = tags.strings(RPMTAG_BASENAMES) {
        let dirs = tags.strings(RPMTAG_DIRNAMES).unwrap_or_default();
        let indexes = int_column(tags, RPMTAG_DIRINDEXES, bases.len())?;
        bases
            .iter()
            .zip(indexes)
            .map(|(base, i)| {
                dirs.get(i as usize)
                    .map(|dir| format!("{}{}", dir, base))
                    .ok_or_else(|| {
                        Error::FormatError(format!("{}: directory index {} out of range", base, i))
                    })
            })
            .collect()
    } else if let Some(old) = tags.strings(RPMTAG_OLDFILENAMES) {
        Ok(old)
    } else {
        Ok(Vec::new())
    }
}

impl PackageRecord {
    /// A bare binary record, mostly for authoring and tests
    pub fn new(name: &str, version: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch: None,
            version: version.to_string(),
            release: release.to_string(),
            arch: "noarch".to_string(),
            is_source: false,
            summary: String::new(),
            payload_format: None,
            payload_compressor: None,
            archive_size: None,
            provides: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            files: Vec::new(),
            file_digest_algo: DEFAULT_DIGEST_ALGO,
        }
    }

    /// Build a record from a package or database header's tags
    pub fn from_tags(tags: &TagSet) -> Result<Self> {
        let name = tags
            .string(RPMTAG_NAME)
            .ok_or_else(|| Error::FormatError("header has no name tag".to_string()))?;
        let version = tags
            .string(RPMTAG_VERSION)
            .ok_or_else(|| Error::FormatError(format!("{}: header has no version tag", name)))?;

        let paths = file_paths(tags)?;
        let n = paths.len();
        let sizes = match tags.u64s(RPMTAG_LONGFILESIZES) {
            Some(_) => int_column(tags, RPMTAG_LONGFILESIZES, n)?,
            None => int_column(tags, RPMTAG_FILESIZES, n)?,
        };
        let modes = int_column(tags, RPMTAG_FILEMODES, n)?;
        let digests = str_column(tags, RPMTAG_FILEDIGESTS, n)?;
        let links = str_column(tags, RPMTAG_FILELINKTOS, n)?;
        let devices = int_column(tags, RPMTAG_FILEDEVICES, n)?;
        let inodes = int_column(tags, RPMTAG_FILEINODES, n)?;
        let users = str_column(tags, RPMTAG_FILEUSERNAME, n)?;
        let groups = str_column(tags, RPMTAG_FILEGROUPNAME, n)?;
        let flags = int_column(tags, RPMTAG_FILEFLAGS, n)?;
        let mtimes = int_column(tags, RPMTAG_FILEMTIMES, n)?;

        let files = (0..n)
            .map(|i| FileEntry {
                path: paths[i].clone(),
                mode: modes[i] as u32,
                size: sizes[i],
                digest: digests[i].clone(),
                link_to: links[i].clone(),
                device: devices[i] as u32,
                inode: inodes[i] as u32,
                user: users[i].clone(),
                group: groups[i].clone(),
                flags: flags[i] as u32,
                mtime: mtimes[i] as u32,
            })
            .collect();

        Ok(Self {
            name,
            epoch: tags.u64(RPMTAG_EPOCH).map(|e| e as u32),
            version,
            release: tags.string(RPMTAG_RELEASE).unwrap_or_default(),
            arch: tags.string(RPMTAG_ARCH).unwrap_or_default(),
            is_source: tags.contains(RPMTAG_SOURCEPACKAGE),
            summary: tags.string(RPMTAG_SUMMARY).unwrap_or_default(),
            payload_format: tags.string(RPMTAG_PAYLOADFORMAT),
            payload_compressor: tags.string(RPMTAG_PAYLOADCOMPRESSOR),
            archive_size: tags
                .u64(RPMTAG_LONGARCHIVESIZE)
                .or_else(|| tags.u64(RPMTAG_ARCHIVESIZE)),
            provides: dependencies(tags, RPMTAG_PROVIDENAME, RPMTAG_PROVIDEFLAGS, RPMTAG_PROVIDEVERSION)?,
            requires: dependencies(tags, RPMTAG_REQUIRENAME, RPMTAG_REQUIREFLAGS, RPMTAG_REQUIREVERSION)?,
            conflicts: dependencies(tags, RPMTAG_CONFLICTNAME, RPMTAG_CONFLICTFLAGS, RPMTAG_CONFLICTVERSION)?,
            obsoletes: dependencies(tags, RPMTAG_OBSOLETENAME, RPMTAG_OBSOLETEFLAGS, RPMTAG_OBSOLETEVERSION)?,
            files,
            file_digest_algo: tags
                .u64(RPMTAG_FILEDIGESTALGO)
                .map_or(DEFAULT_DIGEST_ALGO, |a| a as u32),
        })
    }

    /// The tag set a header describing this record carries
    pub fn to_tags(&self) -> TagSet {
        let mut tags = TagSet::new();
        tags.set_string(RPMTAG_NAME, &self.name);
        tags.set_string(RPMTAG_VERSION, &self.version);
        tags.set_string(RPMTAG_RELEASE, &self.release);
        if let Some(epoch) = self.epoch {
            tags.set_u32s(RPMTAG_EPOCH, vec![epoch]);
        }
        if !self.arch.is_empty() {
            tags.set_string(RPMTAG_ARCH, &self.arch);
        }
        if !self.summary.is_empty() {
            tags.insert(RPMTAG_SUMMARY, TagValue::I18nString(vec![self.summary.clone().into_bytes()]));
        }
        if self.is_source {
            tags.set_u32s(RPMTAG_SOURCEPACKAGE, vec![1]);
        }
        if let Some(format) = &self.payload_format {
            tags.set_string(RPMTAG_PAYLOADFORMAT, format);
        }
        if let Some(compressor) = &self.payload_compressor {
            tags.set_string(RPMTAG_PAYLOADCOMPRESSOR, compressor);
        }
        match self.archive_size {
            Some(size) if size > u64::from(u32::MAX) => {
                tags.insert(RPMTAG_LONGARCHIVESIZE, TagValue::Int64(vec![size]))
            }
            Some(size) => tags.insert(RPMTAG_ARCHIVESIZE, TagValue::Int32(vec![size as u32])),
            None => None,
        };

        for (deps, names, flags, versions) in [
            (&self.provides, RPMTAG_PROVIDENAME, RPMTAG_PROVIDEFLAGS, RPMTAG_PROVIDEVERSION),
            (&self.requires, RPMTAG_REQUIRENAME, RPMTAG_REQUIREFLAGS, RPMTAG_REQUIREVERSION),
            (&self.conflicts, RPMTAG_CONFLICTNAME, RPMTAG_CONFLICTFLAGS, RPMTAG_CONFLICTVERSION),
            (&self.obsoletes, RPMTAG_OBSOLETENAME, RPMTAG_OBSOLETEFLAGS, RPMTAG_OBSOLETEVERSION),
        ] {
            if deps.is_empty() {
                continue;
            }
            tags.set_strings(names, deps.iter().map(|d| d.name.clone()).collect());
            tags.set_u32s(flags, deps.iter().map(|d| d.flags.bits()).collect());
            tags.set_strings(versions, deps.iter().map(|d| d.version.clone()).collect());
        }

        if !self.files.is_empty() {
            self.file_tags(&mut tags);
        }
        tags
    }

    fn file_tags(&self, tags: &mut TagSet) {
        let mut dirs: Vec<String> = Vec::new();
        let mut bases = Vec::with_capacity(self.files.len());
        let mut indexes = Vec::with_capacity(self.files.len());
        for f in &self.files {
            let (dir, base) = match f.path.rfind('/') {
                Some(pos) => f.path.split_at(pos + 1),
                None => ("", f.path.as_str()),
            };
            let idx = match dirs.iter().position(|d| d == dir) {
                Some(i) => i,
                None => {
                    dirs.push(dir.to_string());
                    dirs.len() - 1
                }
            };
            bases.push(base.to_string());
            indexes.push(idx as u32);
        }
        tags.set_strings(RPMTAG_DIRNAMES, dirs);
        tags.set_strings(RPMTAG_BASENAMES, bases);
        tags.set_u32s(RPMTAG_DIRINDEXES, indexes);

        let column = |get: fn(&FileEntry) -> String| self.files.iter().map(get).collect::<Vec<_>>();
        let ints = |get: fn(&FileEntry) -> u32| self.files.iter().map(get).collect::<Vec<_>>();

        tags.insert(
            RPMTAG_FILEMODES,
            TagValue::Int16(self.files.iter().map(|f| f.mode as u16).collect()),
        );
        if self.files.iter().any(|f| f.size > u64::from(u32::MAX)) {
            tags.insert(
                RPMTAG_LONGFILESIZES,
                TagValue::Int64(self.files.iter().map(|f| f.size).collect()),
            );
        } else {
            tags.set_u32s(RPMTAG_FILESIZES, ints(|f| f.size as u32));
        }
        tags.set_strings(RPMTAG_FILEDIGESTS, column(|f| f.digest.clone()));
        tags.set_strings(RPMTAG_FILELINKTOS, column(|f| f.link_to.clone()));
        tags.set_u32s(RPMTAG_FILEDEVICES, ints(|f| f.device));
        tags.set_u32s(RPMTAG_FILEINODES, ints(|f| f.inode));
        tags.set_strings(RPMTAG_FILEUSERNAME, column(|f| f.user.clone()));
        tags.set_strings(RPMTAG_FILEGROUPNAME, column(|f| f.group.clone()));
        tags.set_u32s(RPMTAG_FILEFLAGS, ints(|f| f.flags));
        tags.set_u32s(RPMTAG_FILEMTIMES, ints(|f| f.mtime));
        if self.file_digest_algo != DEFAULT_DIGEST_ALGO {
            tags.set_u32s(RPMTAG_FILEDIGESTALGO, vec![self.file_digest_algo]);
        }
    }

    pub fn evr(&self) -> Evr {
        Evr {
            epoch: self.epoch.map(|e| e.to_string()).unwrap_or_default(),
            version: self.version.clone(),
            release: self.release.clone(),
        }
    }

    /// name-[epoch:]version-release.arch
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr(), self.arch)
    }

    /// The `name = evr` capability every package provides
    pub fn self_provide(&self) -> Dependency {
        Dependency::new(self.name.clone(), DepFlags::EQUAL, self.evr().to_string())
    }

    pub fn owns(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevra())
    }
}

/// Handle to a record inside a [`PackagePool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PkgId(pub usize);

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena owning every record taking part in a run
#[derive(Debug, Clone, Default)]
pub struct PackagePool {
    records: Vec<PackageRecord>,
}

impl PackagePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: PackageRecord) -> PkgId {
        self.records.push(record);
        PkgId(self.records.len() - 1)
    }

    pub fn get(&self, id: PkgId) -> Option<&PackageRecord> {
        self.records.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PkgId> + '_ {
        (0..self.records.len()).map(PkgId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PkgId, &PackageRecord)> {
        self.records.iter().enumerate().map(|(i, r)| (PkgId(i), r))
    }

    pub fn find(&self, name: &str) -> Vec<PkgId> {
        self.iter().filter(|(_, r)| r.name == name).map(|(id, _)| id).collect()
    }
}

impl Index<PkgId> for PackagePool {
    type Output = PackageRecord;

    fn index(&self, id: PkgId) -> &PackageRecord {
        &self.records[id.0]
    }
}
