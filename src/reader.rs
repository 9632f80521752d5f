//! Reader selection.
//!
//! [`new_reader`] looks at the first bytes of the input and returns the
//! reader that understands them: the binary codec for the magic bytes, the
//! versioned ASCII reader for a known text header. Anything else, JSON
//! included, is a format error.

use crate::ascii::AsciiReader00;
use crate::binary::BinaryCodec;
use crate::error::{ParamError, Result};
use crate::format::{is_binary, FileFormat, ASCII_HEADER_PREFIX};
use crate::value::Document;

/// First pass of loading: bytes to a [`Document`].
pub trait DocumentReader: std::fmt::Debug {
    /// Parses the whole input.
    fn read_document(&self, bytes: &[u8]) -> Result<Document>;
}

/// The format `bytes` are in, if recognised.
pub fn detect(bytes: &[u8]) -> Option<FileFormat> {
    if is_binary(bytes) {
        return Some(FileFormat::Binary);
    }
    let text = skip_whitespace(bytes);
    if text.starts_with(ASCII_HEADER_PREFIX.as_bytes()) {
        return Some(FileFormat::Ascii);
    }
    if text.starts_with(b"{") {
        return Some(FileFormat::Json);
    }
    None
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Picks the reader for `bytes`.
pub fn new_reader(bytes: &[u8]) -> Result<Box<dyn DocumentReader>> {
    match detect(bytes) {
        Some(FileFormat::Binary) => Ok(Box::new(BinaryCodec)),
        Some(FileFormat::Ascii) => {
            let text = skip_whitespace(bytes);
            let version = text
                .get(ASCII_HEADER_PREFIX.len()..)
                .and_then(|rest| rest.get(..3))
                .unwrap_or_default();
            match version {
                b"00_" => Ok(Box::new(AsciiReader00)),
                other => Err(ParamError::Format(format!(
                    "no reader for ASCII file version `{}`",
                    String::from_utf8_lossy(other)
                ))),
            }
        }
        Some(FileFormat::Json) => Err(ParamError::Format("JSON files cannot be read back".into())),
        None => Err(ParamError::Format("unrecognised file header".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_header() {
        assert!(new_reader(b"_SGOBJECT_SERIALIZABLE_ASCII_FILE_V_00_\nversion 0").is_ok());
        assert!(new_reader(b"_SGOBJECT_SERIALIZABLE_ASCII_FILE_V_07_\nversion 0").is_err());
        assert!(new_reader(b"{\"name\": \"Foo\"}").is_err());
        assert!(new_reader(b"garbage").is_err());
        assert!(new_reader(b"").is_err());
    }
}
