// tests/header_roundtrip.rs

//! Header decode/encode stability on package, signature and database headers.

mod common;

use common::hello_rpm;
use rpmtx::compression::CompressionFormat;
use rpmtx::header::tags::{RPMTAG_INSTALLTIME, RPMTAG_NAME};
use rpmtx::header::{DATABASE_SCHEMA, EncodeOptions, PACKAGE_SCHEMA, SIGNATURE_SCHEMA, encode};
use rpmtx::packages::{DatabaseBlob, HeaderSource};
use rpmtx::{PackageRecord, RawHeader, RpmPackage, TagValue};

#[test]
fn test_package_header_reencodes_exactly() {
    let pkg = RpmPackage::parse(&hello_rpm(CompressionFormat::Gzip)).unwrap();
    let bytes = pkg.header().to_bytes();

    let raw = RawHeader::decode(&bytes).unwrap();
    let (tags, warnings) = raw.parse_all().unwrap();
    assert!(warnings.is_empty());

    let opts = EncodeOptions::from_layout(&raw, &PACKAGE_SCHEMA);
    assert_eq!(opts.region_tag.as_deref(), Some("headerimmutable"));
    let again = encode(&tags, &PACKAGE_SCHEMA, &opts).unwrap();
    assert_eq!(again, bytes);

    let (tags_again, _) = RawHeader::decode(&again).unwrap().parse_all().unwrap();
    assert_eq!(tags_again, tags);
}

#[test]
fn test_signature_header_reencodes_exactly() {
    let pkg = RpmPackage::parse(&hello_rpm(CompressionFormat::Zstd)).unwrap();
    let raw = pkg.signature();
    let (tags, _) = raw.parse_all().unwrap();
    let again = encode(&tags, &SIGNATURE_SCHEMA, &EncodeOptions::from_layout(raw, &SIGNATURE_SCHEMA)).unwrap();
    assert_eq!(again, raw.to_bytes());
}

#[test]
fn test_database_record_install_split() {
    let mut tags = PackageRecord::new("bash", "5.2.26", "3").to_tags();
    tags.insert(RPMTAG_INSTALLTIME, TagValue::Int32(vec![1_717_000_000]));
    let bytes = encode(&tags, &DATABASE_SCHEMA, &EncodeOptions::for_schema(&DATABASE_SCHEMA)).unwrap();

    let raw = RawHeader::decode(&bytes).unwrap();
    assert_eq!(raw.tail_tags(), vec![RPMTAG_INSTALLTIME]);
    assert_eq!(raw.entries().last().map(|e| e.tag), Some(RPMTAG_INSTALLTIME));

    let opts = EncodeOptions::from_layout(&raw, &DATABASE_SCHEMA);
    assert!(opts.install_split);
    let (decoded, _) = raw.parse_all().unwrap();
    assert_eq!(encode(&decoded, &DATABASE_SCHEMA, &opts).unwrap(), bytes);

    // the same record handed over as a database blob
    let blob = DatabaseBlob::new("Packages/7", raw.to_blob());
    let (record, _) = blob.load_record().unwrap();
    assert_eq!(record.nevra(), "bash-5.2.26-3.noarch");
}

#[test]
fn test_split_supplier_parts() {
    let pkg = RpmPackage::parse(&hello_rpm(CompressionFormat::Xz)).unwrap();
    let (index, store) = pkg.header_parts().unwrap();
    assert_eq!(index.len() % 16, 0);
    let raw = RawHeader::from_parts(&index, &store).unwrap();
    assert_eq!(&raw, pkg.header());
    assert_eq!(
        raw.parse_tag(RPMTAG_NAME).unwrap().and_then(|v| v.as_str().map(|s| s.into_owned())),
        Some("hello".to_string())
    );
}

#[test]
fn test_corrupt_headers_fail() {
    let pkg = RpmPackage::parse(&hello_rpm(CompressionFormat::None)).unwrap();
    let bytes = pkg.header().to_bytes();

    let mut bad_magic = bytes.clone();
    bad_magic[0] = 0;
    assert!(RawHeader::decode(&bad_magic).is_err());

    assert!(RawHeader::decode(&bytes[..bytes.len() - 1]).is_err());
    assert!(RawHeader::decode(&bytes[..20]).is_err());
}
