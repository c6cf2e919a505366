// src/header/tags.rs

//! Tag identifiers and the static schema tables
//!
//! A schema maps tag ids to names, value kinds and cardinalities. The codec
//! consults it to validate values and to resolve tag names given in
//! [`EncodeOptions`](super::EncodeOptions); nothing else reads it.

use super::value::TagKind;

pub const HEADER_IMAGE: u32 = 61;
pub const HEADER_SIGNATURES: u32 = 62;
pub const HEADER_IMMUTABLE: u32 = 63;
pub const HEADER_I18NTABLE: u32 = 100;

pub const RPMTAG_NAME: u32 = 1000;
pub const RPMTAG_VERSION: u32 = 1001;
pub const RPMTAG_RELEASE: u32 = 1002;
pub const RPMTAG_EPOCH: u32 = 1003;
pub const RPMTAG_SUMMARY: u32 = 1004;
pub const RPMTAG_DESCRIPTION: u32 = 1005;
pub const RPMTAG_BUILDTIME: u32 = 1006;
pub const RPMTAG_BUILDHOST: u32 = 1007;
pub const RPMTAG_INSTALLTIME: u32 = 1008;
pub const RPMTAG_SIZE: u32 = 1009;
pub const RPMTAG_LICENSE: u32 = 1014;
pub const RPMTAG_GROUP: u32 = 1016;
pub const RPMTAG_URL: u32 = 1020;
pub const RPMTAG_OS: u32 = 1021;
pub const RPMTAG_ARCH: u32 = 1022;
pub const RPMTAG_PREIN: u32 = 1023;
pub const RPMTAG_POSTIN: u32 = 1024;
pub const RPMTAG_PREUN: u32 = 1025;
pub const RPMTAG_POSTUN: u32 = 1026;
pub const RPMTAG_OLDFILENAMES: u32 = 1027;
pub const RPMTAG_FILESIZES: u32 = 1028;
pub const RPMTAG_FILESTATES: u32 = 1029;
pub const RPMTAG_FILEMODES: u32 = 1030;
pub const RPMTAG_FILERDEVS: u32 = 1033;
pub const RPMTAG_FILEMTIMES: u32 = 1034;
pub const RPMTAG_FILEDIGESTS: u32 = 1035;
pub const RPMTAG_FILELINKTOS: u32 = 1036;
pub const RPMTAG_FILEFLAGS: u32 = 1037;
pub const RPMTAG_FILEUSERNAME: u32 = 1039;
pub const RPMTAG_FILEGROUPNAME: u32 = 1040;
pub const RPMTAG_SOURCERPM: u32 = 1044;
pub const RPMTAG_ARCHIVESIZE: u32 = 1046;
pub const RPMTAG_PROVIDENAME: u32 = 1047;
pub const RPMTAG_REQUIREFLAGS: u32 = 1048;
pub const RPMTAG_REQUIRENAME: u32 = 1049;
pub const RPMTAG_REQUIREVERSION: u32 = 1050;
pub const RPMTAG_CONFLICTFLAGS: u32 = 1053;
pub const RPMTAG_CONFLICTNAME: u32 = 1054;
pub const RPMTAG_CONFLICTVERSION: u32 = 1055;
pub const RPMTAG_RPMVERSION: u32 = 1064;
pub const RPMTAG_PREINPROG: u32 = 1085;
pub const RPMTAG_POSTINPROG: u32 = 1086;
pub const RPMTAG_PREUNPROG: u32 = 1087;
pub const RPMTAG_POSTUNPROG: u32 = 1088;
pub const RPMTAG_OBSOLETENAME: u32 = 1090;
pub const RPMTAG_FILEDEVICES: u32 = 1095;
pub const RPMTAG_FILEINODES: u32 = 1096;
pub const RPMTAG_FILELANGS: u32 = 1097;
pub const RPMTAG_PREFIXES: u32 = 1098;
pub const RPMTAG_INSTPREFIXES: u32 = 1099;
pub const RPMTAG_SOURCEPACKAGE: u32 = 1106;
pub const RPMTAG_PROVIDEFLAGS: u32 = 1112;
pub const RPMTAG_PROVIDEVERSION: u32 = 1113;
pub const RPMTAG_OBSOLETEFLAGS: u32 = 1114;
pub const RPMTAG_OBSOLETEVERSION: u32 = 1115;
pub const RPMTAG_DIRINDEXES: u32 = 1116;
pub const RPMTAG_BASENAMES: u32 = 1117;
pub const RPMTAG_DIRNAMES: u32 = 1118;
pub const RPMTAG_OPTFLAGS: u32 = 1122;
pub const RPMTAG_PAYLOADFORMAT: u32 = 1124;
pub const RPMTAG_PAYLOADCOMPRESSOR: u32 = 1125;
pub const RPMTAG_PAYLOADFLAGS: u32 = 1126;
pub const RPMTAG_INSTALLCOLOR: u32 = 1127;
pub const RPMTAG_INSTALLTID: u32 = 1128;
pub const RPMTAG_REMOVETID: u32 = 1129;
pub const RPMTAG_PLATFORM: u32 = 1132;
pub const RPMTAG_FILECOLORS: u32 = 1140;
pub const RPMTAG_LONGFILESIZES: u32 = 5008;
pub const RPMTAG_LONGSIZE: u32 = 5009;
pub const RPMTAG_FILEDIGESTALGO: u32 = 5011;
pub const RPMTAG_LONGARCHIVESIZE: u32 = 271;

pub const SIGTAG_SIZE: u32 = 1000;
pub const SIGTAG_PGP: u32 = 1002;
pub const SIGTAG_MD5: u32 = 1004;
pub const SIGTAG_GPG: u32 = 1005;
pub const SIGTAG_PAYLOADSIZE: u32 = 1007;
pub const SIGTAG_DSA: u32 = 267;
pub const SIGTAG_RSA: u32 = 268;
pub const SIGTAG_SHA1: u32 = 269;
pub const SIGTAG_LONGSIZE: u32 = 270;
pub const SIGTAG_LONGARCHIVESIZE: u32 = 271;
pub const SIGTAG_SHA256: u32 = 273;

/// Tags that relocation rewrites; duplicates of these are expected
pub const DUPLICATE_ALLOWED: &[u32] = &[
    RPMTAG_OLDFILENAMES,
    RPMTAG_DIRINDEXES,
    RPMTAG_BASENAMES,
    RPMTAG_DIRNAMES,
];

/// How many values a tag carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one value
    Scalar,
    /// A fixed number of values (e.g. 16-byte digests)
    Fixed(u32),
    /// Any number of values
    Array,
}

/// One schema entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDef {
    pub id: u32,
    pub name: &'static str,
    pub kind: TagKind,
    pub cardinality: Cardinality,
    pub signed: bool,
}

const fn def(id: u32, name: &'static str, kind: TagKind, cardinality: Cardinality) -> TagDef {
    TagDef {
        id,
        name,
        kind,
        cardinality,
        signed: false,
    }
}

const fn signed(id: u32, name: &'static str, kind: TagKind, cardinality: Cardinality) -> TagDef {
    TagDef {
        id,
        name,
        kind,
        cardinality,
        signed: true,
    }
}

/// A versioned, read-only tag table
#[derive(Debug)]
pub struct TagSchema {
    pub name: &'static str,
    pub version: u32,
    /// Region tag used when none is given explicitly
    pub region_tag: u32,
    pub tags: &'static [TagDef],
    /// Tags only present in installed-package records
    pub install_only: &'static [u32],
    /// Schema whose entries are inherited
    pub parent: Option<&'static TagSchema>,
}

impl TagSchema {
    /// Look a tag up by id
    pub fn get(&self, id: u32) -> Option<&'static TagDef> {
        self.tags
            .iter()
            .find(|t| t.id == id)
            .or_else(|| self.parent.and_then(|p| p.get(id)))
    }

    /// Resolve a tag name (case-insensitive, with or without `RPMTAG_`)
    pub fn id_of(&self, name: &str) -> Option<u32> {
        let lower = name.to_ascii_lowercase();
        let short = lower
            .strip_prefix("rpmtag_")
            .or_else(|| lower.strip_prefix("rpmsigtag_"))
            .unwrap_or(&lower);
        self.tags
            .iter()
            .find(|t| t.name == short)
            .map(|t| t.id)
            .or_else(|| self.parent.and_then(|p| p.id_of(short)))
    }

    /// Name for an id, if the schema knows it
    pub fn name_of(&self, id: u32) -> Option<&'static str> {
        self.get(id).map(|t| t.name)
    }

    /// Whether a tag is one of this schema's install-only tags
    pub fn is_install_only(&self, id: u32) -> bool {
        self.install_only.contains(&id)
    }
}

use Cardinality::{Array, Fixed, Scalar};
use TagKind::{Binary, Char, I18nString, Int16, Int32, Int64, StringArray};

/// Tags of the main package header
pub static PACKAGE_SCHEMA: TagSchema = TagSchema {
    name: "package",
    version: 4,
    region_tag: HEADER_IMMUTABLE,
    install_only: &[],
    parent: None,
    tags: &[
        def(HEADER_IMAGE, "headerimage", Binary, Fixed(16)),
        def(HEADER_SIGNATURES, "headersignatures", Binary, Fixed(16)),
        def(HEADER_IMMUTABLE, "headerimmutable", Binary, Fixed(16)),
        def(HEADER_I18NTABLE, "headeri18ntable", StringArray, Array),
        def(RPMTAG_NAME, "name", TagKind::String, Scalar),
        def(RPMTAG_VERSION, "version", TagKind::String, Scalar),
        def(RPMTAG_RELEASE, "release", TagKind::String, Scalar),
        def(RPMTAG_EPOCH, "epoch", Int32, Scalar),
        def(RPMTAG_SUMMARY, "summary", I18nString, Array),
        def(RPMTAG_DESCRIPTION, "description", I18nString, Array),
        signed(RPMTAG_BUILDTIME, "buildtime", Int32, Scalar),
        def(RPMTAG_BUILDHOST, "buildhost", TagKind::String, Scalar),
        def(RPMTAG_SIZE, "size", Int32, Scalar),
        def(RPMTAG_LICENSE, "license", TagKind::String, Scalar),
        def(RPMTAG_GROUP, "group", I18nString, Array),
        def(RPMTAG_URL, "url", TagKind::String, Scalar),
        def(RPMTAG_OS, "os", TagKind::String, Scalar),
        def(RPMTAG_ARCH, "arch", TagKind::String, Scalar),
        def(RPMTAG_PREIN, "prein", TagKind::String, Scalar),
        def(RPMTAG_POSTIN, "postin", TagKind::String, Scalar),
        def(RPMTAG_PREUN, "preun", TagKind::String, Scalar),
        def(RPMTAG_POSTUN, "postun", TagKind::String, Scalar),
        def(RPMTAG_OLDFILENAMES, "oldfilenames", StringArray, Array),
        def(RPMTAG_FILESIZES, "filesizes", Int32, Array),
        def(RPMTAG_FILEMODES, "filemodes", Int16, Array),
        def(RPMTAG_FILERDEVS, "filerdevs", Int16, Array),
        signed(RPMTAG_FILEMTIMES, "filemtimes", Int32, Array),
        def(RPMTAG_FILEDIGESTS, "filedigests", StringArray, Array),
        def(RPMTAG_FILELINKTOS, "filelinktos", StringArray, Array),
        def(RPMTAG_FILEFLAGS, "fileflags", Int32, Array),
        def(RPMTAG_FILEUSERNAME, "fileusername", StringArray, Array),
        def(RPMTAG_FILEGROUPNAME, "filegroupname", StringArray, Array),
        def(RPMTAG_SOURCERPM, "sourcerpm", TagKind::String, Scalar),
        def(RPMTAG_ARCHIVESIZE, "archivesize", Int32, Scalar),
        def(RPMTAG_PROVIDENAME, "providename", StringArray, Array),
        def(RPMTAG_REQUIREFLAGS, "requireflags", Int32, Array),
        def(RPMTAG_REQUIRENAME, "requirename", StringArray, Array),
        def(RPMTAG_REQUIREVERSION, "requireversion", StringArray, Array),
        def(RPMTAG_CONFLICTFLAGS, "conflictflags", Int32, Array),
        def(RPMTAG_CONFLICTNAME, "conflictname", StringArray, Array),
        def(RPMTAG_CONFLICTVERSION, "conflictversion", StringArray, Array),
        def(RPMTAG_RPMVERSION, "rpmversion", TagKind::String, Scalar),
        def(RPMTAG_PREINPROG, "preinprog", StringArray, Array),
        def(RPMTAG_POSTINPROG, "postinprog", StringArray, Array),
        def(RPMTAG_PREUNPROG, "preunprog", StringArray, Array),
        def(RPMTAG_POSTUNPROG, "postunprog", StringArray, Array),
        def(RPMTAG_OBSOLETENAME, "obsoletename", StringArray, Array),
        def(RPMTAG_FILEDEVICES, "filedevices", Int32, Array),
        def(RPMTAG_FILEINODES, "fileinodes", Int32, Array),
        def(RPMTAG_FILELANGS, "filelangs", StringArray, Array),
        def(RPMTAG_PREFIXES, "prefixes", StringArray, Array),
        def(RPMTAG_SOURCEPACKAGE, "sourcepackage", Int32, Scalar),
        def(RPMTAG_PROVIDEFLAGS, "provideflags", Int32, Array),
        def(RPMTAG_PROVIDEVERSION, "provideversion", StringArray, Array),
        def(RPMTAG_OBSOLETEFLAGS, "obsoleteflags", Int32, Array),
        def(RPMTAG_OBSOLETEVERSION, "obsoleteversion", StringArray, Array),
        def(RPMTAG_DIRINDEXES, "dirindexes", Int32, Array),
        def(RPMTAG_BASENAMES, "basenames", StringArray, Array),
        def(RPMTAG_DIRNAMES, "dirnames", StringArray, Array),
        def(RPMTAG_OPTFLAGS, "optflags", TagKind::String, Scalar),
        def(RPMTAG_PAYLOADFORMAT, "payloadformat", TagKind::String, Scalar),
        def(RPMTAG_PAYLOADCOMPRESSOR, "payloadcompressor", TagKind::String, Scalar),
        def(RPMTAG_PAYLOADFLAGS, "payloadflags", TagKind::String, Scalar),
        def(RPMTAG_PLATFORM, "platform", TagKind::String, Scalar),
        def(RPMTAG_FILECOLORS, "filecolors", Int32, Array),
        def(RPMTAG_LONGARCHIVESIZE, "longarchivesize", Int64, Scalar),
        def(RPMTAG_LONGFILESIZES, "longfilesizes", Int64, Array),
        def(RPMTAG_LONGSIZE, "longsize", Int64, Scalar),
        def(RPMTAG_FILEDIGESTALGO, "filedigestalgo", Int32, Scalar),
    ],
};

/// Tags of the signature header
pub static SIGNATURE_SCHEMA: TagSchema = TagSchema {
    name: "signature",
    version: 4,
    region_tag: HEADER_SIGNATURES,
    install_only: &[],
    parent: None,
    tags: &[
        def(HEADER_SIGNATURES, "headersignatures", Binary, Fixed(16)),
        def(SIGTAG_DSA, "dsa", Binary, Array),
        def(SIGTAG_RSA, "rsa", Binary, Array),
        def(SIGTAG_SHA1, "sha1", TagKind::String, Scalar),
        def(SIGTAG_LONGSIZE, "longsize", Int64, Scalar),
        def(SIGTAG_LONGARCHIVESIZE, "longarchivesize", Int64, Scalar),
        def(SIGTAG_SHA256, "sha256", TagKind::String, Scalar),
        def(SIGTAG_SIZE, "size", Int32, Scalar),
        def(SIGTAG_PGP, "pgp", Binary, Array),
        def(SIGTAG_MD5, "md5", Binary, Fixed(16)),
        def(SIGTAG_GPG, "gpg", Binary, Array),
        def(SIGTAG_PAYLOADSIZE, "payloadsize", Int32, Scalar),
    ],
};

/// Installed-package records: package tags plus install-time bookkeeping
pub static DATABASE_SCHEMA: TagSchema = TagSchema {
    name: "database",
    version: 4,
    region_tag: HEADER_IMMUTABLE,
    install_only: &[
        RPMTAG_INSTALLTIME,
        RPMTAG_FILESTATES,
        RPMTAG_INSTPREFIXES,
        RPMTAG_INSTALLCOLOR,
        RPMTAG_INSTALLTID,
        RPMTAG_REMOVETID,
    ],
    parent: Some(&PACKAGE_SCHEMA),
    tags: &[
        signed(RPMTAG_INSTALLTIME, "installtime", Int32, Scalar),
        def(RPMTAG_FILESTATES, "filestates", Char, Array),
        def(RPMTAG_INSTPREFIXES, "instprefixes", StringArray, Array),
        def(RPMTAG_INSTALLCOLOR, "installcolor", Int32, Scalar),
        def(RPMTAG_INSTALLTID, "installtid", Int32, Scalar),
        def(RPMTAG_REMOVETID, "removetid", Int32, Scalar),
        def(HEADER_IMAGE, "headerimage", Binary, Fixed(16)),
    ],
};
