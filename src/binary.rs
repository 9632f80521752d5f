//! The binary back-end: a [`BinaryHeader`] followed by the bincode-encoded
//! [`Document`].

use tracing::debug;

use crate::error::{ParamError, Result};
use crate::format::{BinaryHeader, BINARY_FORMAT_VERSION, BINARY_HEADER_SIZE};
use crate::reader::DocumentReader;
use crate::value::{Document, MIN_VERSION};

/// Upper bound on the bytes the decoder may claim for one document.
const DECODE_LIMIT: usize = 1 << 30;

/// Writes and reads the checksummed binary format.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl BinaryCodec {
    /// Encodes `doc` with its header.
    pub fn write_document(&self, doc: &Document) -> Result<Vec<u8>> {
        let payload = bincode::serde::encode_to_vec(doc, bincode::config::standard())?;
        let header = BinaryHeader::for_payload(&payload);
        let mut out = Vec::with_capacity(BINARY_HEADER_SIZE + payload.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

impl DocumentReader for BinaryCodec {
    fn read_document(&self, bytes: &[u8]) -> Result<Document> {
        let header = BinaryHeader::from_bytes(bytes)?;
        if header.version != BINARY_FORMAT_VERSION {
            return Err(ParamError::Format(format!(
                "unsupported binary format version {}",
                header.version
            )));
        }
        let payload = bytes.get(BINARY_HEADER_SIZE..).unwrap_or_default();
        let expected = BinaryHeader::for_payload(payload).checksum;
        if expected != header.checksum {
            return Err(ParamError::Format(format!(
                "checksum mismatch: header says {:#018x}, payload hashes to {expected:#018x}",
                header.checksum
            )));
        }
        let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
        let (mut doc, used): (Document, usize) =
            bincode::serde::decode_from_slice(payload, config)?;
        if used != payload.len() {
            return Err(ParamError::Format(format!(
                "{} trailing bytes after the document",
                payload.len() - used
            )));
        }
        if doc.version < MIN_VERSION {
            return Err(ParamError::Format(format!(
                "invalid file version {}",
                doc.version
            )));
        }
        doc.root.normalize()?;
        debug!(bytes = bytes.len(), version = doc.version, "binary document decoded");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{DataType, PrimitiveType};
    use crate::value::{Entry, Record, Scalar, Value, MAX_DEPTH};

    fn nested(levels: usize) -> Record {
        let mut record = Record::new("Node", None);
        for _ in 0..levels {
            let mut parent = Record::new("Node", None);
            parent.entries.push(Entry {
                name: "child".into(),
                datatype: DataType::scalar(PrimitiveType::SGObject),
                value: Value::scalar(Scalar::Object(Some(Box::new(record)))),
            });
            record = parent;
        }
        record
    }

    #[test]
    fn corrupted_payload_is_detected() -> Result<()> {
        let doc = Document {
            version: 3,
            root: Record::new("Foo", None),
        };
        let mut bytes = BinaryCodec.write_document(&doc)?;
        assert_eq!(BinaryCodec.read_document(&bytes)?, doc);

        if let Some(last) = bytes.last_mut() {
            *last ^= 0xff;
        }
        assert!(matches!(BinaryCodec.read_document(&bytes), Err(ParamError::Format(_))));
        Ok(())
    }

    #[test]
    fn entries_are_put_back_in_name_order() -> Result<()> {
        let mut root = Record::new("Foo", None);
        for name in ["zeta", "alpha"] {
            root.entries.push(Entry {
                name: name.into(),
                datatype: DataType::scalar(PrimitiveType::Int32),
                value: Value::scalar(Scalar::Int32(1)),
            });
        }
        let bytes = BinaryCodec.write_document(&Document { version: 0, root })?;
        let doc = BinaryCodec.read_document(&bytes)?;
        let names: Vec<_> = doc.root.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert!(doc.root.get("zeta").is_some());
        Ok(())
    }

    #[test]
    fn duplicate_entries_are_rejected() -> Result<()> {
        let mut root = Record::new("Foo", None);
        for _ in 0..2 {
            root.entries.push(Entry {
                name: "twice".into(),
                datatype: DataType::scalar(PrimitiveType::Int32),
                value: Value::scalar(Scalar::Int32(1)),
            });
        }
        let bytes = BinaryCodec.write_document(&Document { version: 0, root })?;
        assert!(matches!(BinaryCodec.read_document(&bytes), Err(ParamError::Format(_))));
        Ok(())
    }

    #[test]
    fn nesting_is_bounded() -> Result<()> {
        let ok = Document {
            version: 0,
            root: nested(MAX_DEPTH),
        };
        let bytes = BinaryCodec.write_document(&ok)?;
        assert_eq!(BinaryCodec.read_document(&bytes)?, ok);

        let deep = Document {
            version: 0,
            root: nested(MAX_DEPTH + 1),
        };
        let bytes = BinaryCodec.write_document(&deep)?;
        assert!(matches!(BinaryCodec.read_document(&bytes), Err(ParamError::Format(_))));
        Ok(())
    }

    #[test]
    fn versions_below_unversioned_are_rejected() -> Result<()> {
        for (version, accepted) in [(-1, true), (-2, false), (i32::MIN, false)] {
            let doc = Document {
                version,
                root: Record::new("Foo", None),
            };
            let bytes = BinaryCodec.write_document(&doc)?;
            assert_eq!(BinaryCodec.read_document(&bytes).is_ok(), accepted);
        }
        Ok(())
    }
}
