// src/compression/mod.rs
//! Payload compression
//!
//! The cpio payload of a package is wrapped in whatever compressor the
//! `PAYLOADCOMPRESSOR` tag names. Detection falls back to magic bytes when the
//! tag is absent, which older packages rely on.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to decompress {format} payload: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to compress {format} payload: {source}")]
    Compression {
        format: &'static str,
        source: io::Error,
    },

    #[error("Unsupported payload compressor: {0}")]
    UnsupportedFormat(String),
}

/// Payload compressors understood by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    None,
    Gzip,
    Xz,
    /// Legacy `.lzma` streams, decoded through liblzma
    Lzma,
    Zstd,
}

impl CompressionFormat {
    /// Map a `PAYLOADCOMPRESSOR` value to a format
    pub fn from_compressor_name(name: &str) -> Result<Self, CompressionError> {
        match name {
            "" | "identity" | "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "xz" => Ok(Self::Xz),
            "lzma" => Ok(Self::Lzma),
            "zstd" => Ok(Self::Zstd),
            other => Err(CompressionError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    ///
    /// Raw lzma has no magic and is only selected by name.
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "identity",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Lzma => "lzma",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Lzma => {
            let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(|e| {
                CompressionError::DecoderCreation {
                    format: "lzma",
                    source: e.into(),
                }
            })?;
            Ok(Box::new(xz2::read::XzDecoder::new_stream(reader, stream)))
        }
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                format: "zstd",
                source: e,
            })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decompress a payload held in memory
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = create_decoder(data, format)?;
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| CompressionError::Decompression {
            format: format.name(),
            source: e,
        })?;
    Ok(output)
}

/// Compress a payload, used when writing packages back out
pub fn compress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let wrap = |source: io::Error| CompressionError::Compression {
        format: format.name(),
        source,
    };
    match format {
        CompressionFormat::None => Ok(data.to_vec()),
        CompressionFormat::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).map_err(wrap)?;
            enc.finish().map_err(wrap)
        }
        CompressionFormat::Xz => {
            let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
            enc.write_all(data).map_err(wrap)?;
            enc.finish().map_err(wrap)
        }
        CompressionFormat::Lzma => Err(CompressionError::UnsupportedFormat(
            "lzma output".to_string(),
        )),
        CompressionFormat::Zstd => zstd::encode_all(data, 3).map_err(wrap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_compressor_name() {
        assert_eq!(CompressionFormat::from_compressor_name("gzip").unwrap(), CompressionFormat::Gzip);
        assert_eq!(CompressionFormat::from_compressor_name("xz").unwrap(), CompressionFormat::Xz);
        assert_eq!(CompressionFormat::from_compressor_name("zstd").unwrap(), CompressionFormat::Zstd);
        assert_eq!(CompressionFormat::from_compressor_name("").unwrap(), CompressionFormat::None);
        assert!(matches!(
            CompressionFormat::from_compressor_name("bzip2"),
            Err(CompressionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            CompressionFormat::Xz
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            CompressionFormat::Zstd
        );
        assert_eq!(CompressionFormat::from_magic_bytes(b"0707"), CompressionFormat::None);
        assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f]), CompressionFormat::None);
    }

    #[test]
    fn test_decompress_gzip() {
        // gzip of "hello"
        let gzip_data: &[u8] = &[
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xcb, 0x48, 0xcd, 0xc9,
            0xc9, 0x07, 0x00, 0x86, 0xa6, 0x10, 0x36, 0x05, 0x00, 0x00, 0x00,
        ];
        assert_eq!(decompress(gzip_data, CompressionFormat::Gzip).unwrap(), b"hello");
    }

    #[test]
    fn test_compress_then_decompress() {
        let data = b"070701 payload bytes".repeat(20);
        for format in [
            CompressionFormat::None,
            CompressionFormat::Gzip,
            CompressionFormat::Xz,
            CompressionFormat::Zstd,
        ] {
            let packed = compress(&data, format).unwrap();
            assert_eq!(CompressionFormat::from_magic_bytes(&packed), format);
            assert_eq!(decompress(&packed, format).unwrap(), data);
        }
    }

    #[test]
    fn test_truncated_stream_fails() {
        let packed = compress(b"some payload", CompressionFormat::Xz).unwrap();
        assert!(decompress(&packed[..packed.len() / 2], CompressionFormat::Xz).is_err());
    }
}
