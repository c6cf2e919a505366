// src/packages/cpio.rs

//! cpio `newc` payload codec
//!
//! RPM payloads store each hardlink group once: every member but the last
//! carries zero bytes and the last member carries the content. The reader
//! hands back raw entries; [`read_archive`] reassembles the groups so every
//! member ends up with its data.
//!
//! Group membership is decided by `(dev, ino)` alone. The `nlink` field is
//! only checked against the number of members found.

use crate::config::PayloadOptions;
use crate::error::{Error, IntegrityWarning, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

/// CPIO New ASCII Format (newc) header size
pub const HEADER_SIZE: usize = 110;
/// Magic string for newc format
const MAGIC_NEWC: &[u8] = b"070701";
/// Magic string for CRC format
const MAGIC_CRC: &[u8] = b"070702";
/// Name of the end-of-archive sentinel entry
pub const TRAILER_NAME: &str = "TRAILER!!!";
/// Longest entry name accepted
const MAX_NAME: usize = 65536;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

/// Metadata of one archive entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpioEntry {
    pub name: String,
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub size: u64,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
    pub checksum: u32,
}

impl CpioEntry {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    /// (device major, device minor, inode) grouping hardlinked entries; none for directories
    pub fn hardlink_key(&self) -> Option<(u32, u32, u32)> {
        (!self.is_dir()).then_some((self.dev_major, self.dev_minor, self.ino))
    }
}

/// One decoded file with its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    pub entry: CpioEntry,
    pub data: Vec<u8>,
}

impl PayloadFile {
    /// Absolute install path (`./usr/bin/x` becomes `/usr/bin/x`)
    pub fn path(&self) -> String {
        let name = self.entry.name.trim_start_matches('.');
        if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/{}", name)
        }
    }
}

/// Result of decoding a whole payload
#[derive(Debug, Clone, Default)]
pub struct PayloadArchive {
    pub files: Vec<PayloadFile>,
    pub warnings: Vec<IntegrityWarning>,
    /// Bytes consumed from the decompressed stream, trailing padding included
    pub archive_len: u64,
}

impl PayloadArchive {
    pub fn get(&self, path: &str) -> Option<&PayloadFile> {
        self.files.iter().find(|f| f.path() == path)
    }
}

/// A reader for CPIO (New ASCII) archives
pub struct CpioReader<R: Read> {
    reader: R,
    position: u64,
    limit: Option<u64>,
    max_file_size: u64,
    finished: bool,
}

impl<R: Read> CpioReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            limit: None,
            max_file_size: u64::from(u32::MAX),
            finished: false,
        }
    }

    /// Fail any read that would run past a declared archive length
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    fn fill(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        self.check_limit(buf.len() as u64, what)?;
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::FormatError(format!(
                "truncated archive: {} at offset {}",
                what, self.position
            )),
            _ => Error::IoError(e),
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn check_limit(&self, len: u64, what: &str) -> Result<()> {
        match self.limit {
            Some(limit) if self.position + len > limit => Err(Error::FormatError(format!(
                "{} at offset {} runs past declared archive size {}",
                what, self.position, limit
            ))),
            _ => Ok(()),
        }
    }

    fn skip_pad(&mut self, len: u64) -> Result<()> {
        let pad = ((4 - (len % 4)) % 4) as usize;
        if pad > 0 {
            let mut skip = [0u8; 3];
            self.fill(&mut skip[..pad], "padding")?;
        }
        Ok(())
    }

    /// Read the next entry from the archive
    ///
    /// Returns `Ok(None)` once the `TRAILER!!!` entry has been read.
    pub fn next_entry(&mut self) -> Result<Option<(CpioEntry, Vec<u8>)>> {
        if self.finished {
            return Ok(None);
        }

        let mut header_buf = [0u8; HEADER_SIZE];
        self.fill(&mut header_buf, "entry header")?;

        let magic = &header_buf[0..6];
        if magic != MAGIC_NEWC && magic != MAGIC_CRC {
            return Err(Error::FormatError(format!(
                "invalid cpio magic {:?} at offset {}",
                String::from_utf8_lossy(magic),
                self.position - HEADER_SIZE as u64
            )));
        }

        let parse_hex = |start: usize| -> Result<u32> {
            let field = &header_buf[start..start + 8];
            std::str::from_utf8(field)
                .ok()
                .and_then(|s| u32::from_str_radix(s, 16).ok())
                .ok_or_else(|| {
                    Error::FormatError(format!(
                        "invalid cpio header field {:?}",
                        String::from_utf8_lossy(field)
                    ))
                })
        };

        let mut entry = CpioEntry {
            ino: parse_hex(6)?,
            mode: parse_hex(14)?,
            uid: parse_hex(22)?,
            gid: parse_hex(30)?,
            nlink: parse_hex(38)?,
            mtime: parse_hex(46)?,
            size: u64::from(parse_hex(54)?),
            dev_major: parse_hex(62)?,
            dev_minor: parse_hex(70)?,
            rdev_major: parse_hex(78)?,
            rdev_minor: parse_hex(86)?,
            checksum: parse_hex(102)?,
            ..Default::default()
        };
        let namesize = parse_hex(94)? as usize;
        if namesize == 0 || namesize > MAX_NAME {
            return Err(Error::FormatError(format!("invalid cpio name size {}", namesize)));
        }

        let mut name_buf = vec![0u8; namesize];
        self.fill(&mut name_buf, "entry name")?;
        if name_buf.last() == Some(&0) {
            name_buf.pop();
        }
        entry.name = String::from_utf8_lossy(&name_buf).into_owned();
        self.skip_pad((HEADER_SIZE + namesize) as u64)?;

        if entry.name == TRAILER_NAME {
            self.finished = true;
            return Ok(None);
        }

        if entry.size > self.max_file_size {
            return Err(Error::FormatError(format!(
                "{}: entry size {} exceeds limit {}",
                entry.name, entry.size, self.max_file_size
            )));
        }
        self.check_limit(entry.size, &entry.name)?;

        let mut content = Vec::with_capacity(entry.size.min(1 << 20) as usize);
        (&mut self.reader)
            .take(entry.size)
            .read_to_end(&mut content)?;
        if (content.len() as u64) < entry.size {
            return Err(Error::FormatError(format!(
                "truncated archive: {} has {} of {} bytes",
                entry.name,
                content.len(),
                entry.size
            )));
        }
        self.position += entry.size;
        self.skip_pad(entry.size)?;

        Ok(Some((entry, content)))
    }

    /// Consume whatever follows the trailer, returning its length
    fn drain(&mut self) -> Result<u64> {
        let n = io::copy(&mut self.reader, &mut io::sink())?;
        self.position += n;
        Ok(n)
    }
}

struct LinkGroup {
    members: Vec<usize>,
    nlink: u32,
    data_from: Option<usize>,
}

/// Decode a full payload, reassembling hardlink groups
///
/// `expected_len` is the archive size recorded in the package header, if
/// any. Reads that would overrun it fail; a shorter archive is reported as a
/// size mismatch.
pub fn read_archive<R: Read>(
    reader: R,
    expected_len: Option<u64>,
    opts: &PayloadOptions,
) -> Result<PayloadArchive> {
    let mut cpio = CpioReader::new(reader)
        .with_limit(expected_len)
        .with_max_file_size(opts.max_file_size);
    let mut archive = PayloadArchive::default();
    let mut groups: HashMap<(u32, u32, u32), LinkGroup> = HashMap::new();
    let mut order = Vec::new();

    while let Some((entry, data)) = cpio.next_entry()? {
        let idx = archive.files.len();
        if let Some(key) = entry.hardlink_key() {
            let group = groups.entry(key).or_insert_with(|| {
                order.push(key);
                LinkGroup {
                    members: Vec::new(),
                    nlink: entry.nlink,
                    data_from: None,
                }
            });

            if opts.verify_hardlinks
                && let Some(&first) = group.members.first()
            {
                let lead = &archive.files[first].entry;
                let field = if lead.mode != entry.mode {
                    Some("mode")
                } else if lead.mtime != entry.mtime {
                    Some("mtime")
                } else {
                    group
                        .data_from
                        .filter(|&d| entry.size > 0 && archive.files[d].entry.size != entry.size)
                        .map(|_| "size")
                };
                if let Some(field) = field {
                    report(
                        &mut archive.warnings,
                        opts,
                        IntegrityWarning::HardlinkMismatch {
                            dev: (key.0, key.1),
                            ino: key.2,
                            path: entry.name.clone(),
                            field,
                        },
                    )?;
                }
            }

            group.members.push(idx);
            if entry.size > 0 && group.data_from.is_none() {
                group.data_from = Some(idx);
            }
        }
        archive.files.push(PayloadFile { entry, data });
    }

    let trailing = cpio.drain()?;
    archive.archive_len = cpio.position();

    for key in order {
        let Some(group) = groups.get(&key) else { continue };
        let complete = match group.data_from {
            Some(src) => {
                let data = archive.files[src].data.clone();
                for &m in &group.members {
                    if archive.files[m].data.is_empty() {
                        archive.files[m].data = data.clone();
                        archive.files[m].entry.size = data.len() as u64;
                    }
                }
                true
            }
            // every link present and all empty: a hardlinked empty file
            None if group.members.len() >= group.nlink as usize => true,
            None => {
                let paths = group
                    .members
                    .iter()
                    .map(|&m| archive.files[m].entry.name.clone())
                    .collect();
                report(
                    &mut archive.warnings,
                    opts,
                    IntegrityWarning::IncompleteHardlink {
                        dev: (key.0, key.1),
                        ino: key.2,
                        paths,
                    },
                )?;
                false
            }
        };

        if complete && opts.verify_hardlinks && group.members.len() != group.nlink as usize {
            report(
                &mut archive.warnings,
                opts,
                IntegrityWarning::HardlinkCount {
                    dev: (key.0, key.1),
                    ino: key.2,
                    nlink: group.nlink,
                    found: group.members.len(),
                },
            )?;
        }
    }

    if let Some(expected) = expected_len
        && expected != archive.archive_len
        && expected != archive.archive_len - trailing
    {
        report(
            &mut archive.warnings,
            opts,
            IntegrityWarning::SizeMismatch {
                what: "payload archive".to_string(),
                declared: expected,
                actual: archive.archive_len,
            },
        )?;
    }

    debug!(
        "Decoded cpio payload: {} entries, {} hardlink groups, {} bytes",
        archive.files.len(),
        groups.len(),
        archive.archive_len
    );
    Ok(archive)
}

fn report(warnings: &mut Vec<IntegrityWarning>, opts: &PayloadOptions, w: IntegrityWarning) -> Result<()> {
    if opts.strict {
        return Err(Error::IntegrityError(w.to_string()));
    }
    warn!("{}", w);
    warnings.push(w);
    Ok(())
}

/// Writer for `newc` archives
pub struct CpioWriter<W: Write> {
    writer: W,
    position: u64,
}

impl<W: Write> CpioWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn pad(&mut self) -> Result<()> {
        let pad = ((4 - (self.position % 4)) % 4) as usize;
        self.put(&[0u8; 3][..pad])
    }

    /// Write one entry; the size field is taken from `data`
    pub fn write_entry(&mut self, entry: &CpioEntry, data: &[u8]) -> Result<()> {
        let size = u32::try_from(data.len()).map_err(|_| {
            Error::FormatError(format!("{}: too large for a newc archive", entry.name))
        })?;
        let namesize = entry.name.len() + 1;
        let header = format!(
            "070701{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}",
            entry.ino,
            entry.mode,
            entry.uid,
            entry.gid,
            entry.nlink,
            entry.mtime,
            size,
            entry.dev_major,
            entry.dev_minor,
            entry.rdev_major,
            entry.rdev_minor,
            namesize,
            entry.checksum,
        );
        self.put(header.as_bytes())?;
        self.put(entry.name.as_bytes())?;
        self.put(&[0])?;
        self.pad()?;
        self.put(data)?;
        self.pad()
    }

    /// Write the trailer entry and hand back the inner writer
    pub fn finish(mut self) -> Result<W> {
        let trailer = CpioEntry {
            name: TRAILER_NAME.to_string(),
            nlink: 1,
            ..Default::default()
        };
        self.write_entry(&trailer, &[])?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write a complete archive, storing each hardlink group's data on its last member
///
/// Entries with inode 0 are written with fresh inode numbers above every
/// inode in `files`, so only entries naming the same nonzero inode end up
/// linked.
pub fn write_archive<W: Write>(writer: W, files: &[PayloadFile]) -> Result<W> {
    let mut next_ino = files.iter().map(|f| f.entry.ino).max().unwrap_or(0);
    let entries: Vec<CpioEntry> = files
        .iter()
        .map(|f| {
            let mut entry = f.entry.clone();
            if entry.ino == 0 {
                next_ino += 1;
                entry.ino = next_ino;
            }
            entry
        })
        .collect();

    let mut last: HashMap<(u32, u32, u32), usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        if let Some(key) = entry.hardlink_key() {
            last.insert(key, i);
        }
    }

    let mut cpio = CpioWriter::new(writer);
    for (i, (entry, f)) in entries.iter().zip(files).enumerate() {
        let carries = entry.hardlink_key().is_none_or(|k| last.get(&k) == Some(&i));
        cpio.write_entry(entry, if carries { &f.data } else { &[] })?;
    }
    cpio.finish()
}
