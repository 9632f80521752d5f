//! File format identifiers and the binary header layout.
//!
//! # ASCII
//! ```text
//! _SGOBJECT_SERIALIZABLE_ASCII_FILE_V_00_
//! version 1
//! KernelMachine [ bias float64 0.5 ... ]
//! ```
//!
//! # Binary
//! `[Header] [bincode(Document)]`, where the header is
//! Magic(4) + FormatVersion(2) + Checksum(8) = 14 bytes. The checksum is
//! XXH64 (seed 0) over the payload.

use std::fmt;
use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::{ParamError, Result};

/// Magic bytes identifying the binary format: "SGO1".
pub const MAGIC_BYTES: [u8; 4] = *b"SGO1";

/// Binary layout version written after the magic bytes.
pub const BINARY_FORMAT_VERSION: u16 = 1;

/// Size of [`BinaryHeader`] on disk.
pub const BINARY_HEADER_SIZE: usize = 14;

/// Common prefix of every ASCII header line; the reader version follows it.
pub const ASCII_HEADER_PREFIX: &str = "_SGOBJECT_SERIALIZABLE_ASCII_FILE_V_";

/// Header line of the ASCII format version this crate writes.
pub const ASCII_HEADER_V00: &str = "_SGOBJECT_SERIALIZABLE_ASCII_FILE_V_00_";

/// The back-ends a document can be written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum FileFormat {
    /// Line-oriented text, readable and writable.
    #[default]
    Ascii,
    /// JSON, write only.
    Json,
    /// Checksummed bincode, readable and writable.
    Binary,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ascii => "ascii",
            Self::Json => "json",
            Self::Binary => "binary",
        })
    }
}

/// XXH64 of a byte slice.
pub fn checksum(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

/// The fixed header in front of a binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryHeader {
    /// Layout version.
    pub version: u16,
    /// XXH64 of the payload.
    pub checksum: u64,
}

impl BinaryHeader {
    /// Header for `payload`.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            version: BINARY_FORMAT_VERSION,
            checksum: checksum(payload),
        }
    }

    /// Serializes the header (little endian).
    pub fn to_bytes(&self) -> [u8; BINARY_HEADER_SIZE] {
        let mut buf = [0u8; BINARY_HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC_BYTES);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..14].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parses the header at the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..BINARY_HEADER_SIZE)
            .ok_or_else(|| ParamError::Format("input smaller than the binary header".into()))?;
        if header[0..4] != MAGIC_BYTES {
            return Err(ParamError::Format("invalid magic bytes".into()));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        let mut sum = [0u8; 8];
        sum.copy_from_slice(&header[6..14]);
        Ok(Self {
            version,
            checksum: u64::from_le_bytes(sum),
        })
    }
}

/// True when `bytes` starts with the binary magic.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_survives_bytes() -> Result<()> {
        let header = BinaryHeader::for_payload(b"payload");
        let parsed = BinaryHeader::from_bytes(&header.to_bytes())?;
        assert_eq!(parsed, header);
        assert_eq!(parsed.checksum, checksum(b"payload"));
        Ok(())
    }

    #[test]
    fn short_or_foreign_input_is_rejected() {
        assert!(BinaryHeader::from_bytes(b"SGO").is_err());
        assert!(BinaryHeader::from_bytes(b"PAR4xxxxxxxxxxxxxx").is_err());
    }
}
