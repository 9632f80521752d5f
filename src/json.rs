//! The JSON writer.
//!
//! Every object becomes
//! `{"name": "<class>", "generic": <primitive index or -1>, "parameters": {...}}`.
//! Vectors are arrays, matrices arrays of rows, n-dimensional arrays nested
//! arrays with the first dimension outermost. Complex numbers are `[re, im]`,
//! sparse vectors arrays of `[feat_index, value]` pairs and `char` strings
//! JSON strings.
//!
//! The writer runs a single forward pass. Containers push a frame holding
//! the number of values still to come and close themselves once it reaches
//! zero, so no look-ahead is needed.
//!
//! There is no JSON reader.

use tracing::warn;

use crate::datatype::PrimitiveType;
use crate::error::{ParamError, Result};
use crate::value::{Document, Item, Record, Scalar, Shape, Value};

/// Writes documents as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWriter {
    allow_non_finite: bool,
}

impl JsonWriter {
    /// A writer that rejects `NaN` and infinities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `NaN`, `Infinity` and `-Infinity` may be written as bare
    /// literals. Such output is not strict JSON.
    pub fn allow_non_finite(mut self, allow: bool) -> Self {
        self.allow_non_finite = allow;
        self
    }

    /// Renders the root object of `doc`.
    pub fn write_document(&self, doc: &Document) -> Result<String> {
        let mut e = Emitter {
            out: String::new(),
            stack: Vec::new(),
            allow_non_finite: self.allow_non_finite,
        };
        e.record(&doc.root)?;
        if !e.stack.is_empty() {
            return Err(ParamError::Internal(format!(
                "{} JSON containers left open",
                e.stack.len()
            )));
        }
        Ok(e.out)
    }
}

#[derive(Debug)]
enum Frame {
    Array { remaining: usize, first: bool },
    Object { first: bool },
}

struct Emitter {
    out: String,
    stack: Vec<Frame>,
    allow_non_finite: bool,
}

impl Emitter {
    /// Separator before a value inside an array.
    fn begin_value(&mut self) {
        if let Some(Frame::Array { first, .. }) = self.stack.last_mut() {
            if !*first {
                self.out.push(',');
            }
            *first = false;
        }
    }

    /// A value finished: count it against the enclosing arrays, closing
    /// every array that is now full. Objects stop the walk.
    fn complete(&mut self) {
        while let Some(Frame::Array { remaining, .. }) = self.stack.last_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                break;
            }
            self.stack.pop();
            self.out.push(']');
        }
    }

    fn open_array(&mut self, len: usize) {
        self.begin_value();
        if len == 0 {
            self.out.push_str("[]");
            self.complete();
            return;
        }
        self.out.push('[');
        self.stack.push(Frame::Array {
            remaining: len,
            first: true,
        });
    }

    fn open_object(&mut self) {
        self.begin_value();
        self.out.push('{');
        self.stack.push(Frame::Object { first: true });
    }

    fn close_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object { .. }) => {
                self.out.push('}');
                self.complete();
                Ok(())
            }
            other => Err(ParamError::Internal(format!(
                "closing a JSON object with {other:?} on top of the stack"
            ))),
        }
    }

    fn key(&mut self, name: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Object { first }) => {
                if !*first {
                    self.out.push(',');
                }
                *first = false;
            }
            _ => return Err(ParamError::Internal(format!("key `{name}` outside an object"))),
        }
        self.out.push_str(&serde_json::to_string(name)?);
        self.out.push(':');
        Ok(())
    }

    fn raw(&mut self, text: &str) {
        self.begin_value();
        self.out.push_str(text);
        self.complete();
    }

    fn float(&mut self, v: f64) -> Result<()> {
        if v.is_finite() {
            let text = serde_json::to_string(&v)?;
            self.raw(&text);
            return Ok(());
        }
        if !self.allow_non_finite {
            return Err(ParamError::Format(format!(
                "{v} cannot be written as JSON unless non-finite literals are allowed"
            )));
        }
        warn!(value = %v, "writing a non-finite literal into JSON output");
        let literal = if v.is_nan() {
            "NaN"
        } else if v > 0.0 {
            "Infinity"
        } else {
            "-Infinity"
        };
        self.raw(literal);
        Ok(())
    }

    fn record(&mut self, record: &Record) -> Result<()> {
        self.open_object();
        self.key("name")?;
        let name = serde_json::to_string(&record.class_name)?;
        self.raw(&name);
        self.key("generic")?;
        let generic = record.generic.map_or(-1, PrimitiveType::index);
        self.raw(&generic.to_string());
        self.key("parameters")?;
        self.open_object();
        for entry in &record.entries {
            entry.value.validate(&entry.datatype)?;
            self.key(&entry.name)?;
            self.value(&entry.value, entry.datatype.ptype)?;
        }
        self.close_object()?;
        self.close_object()
    }

    fn value(&mut self, value: &Value, ptype: PrimitiveType) -> Result<()> {
        match &value.shape {
            Shape::Scalar => value.items.iter().try_for_each(|item| self.item(item, ptype)),
            Shape::Vector(len) => {
                self.open_array(*len);
                value.items.iter().try_for_each(|item| self.item(item, ptype))
            }
            Shape::Matrix { rows, cols } => {
                self.open_array(*rows);
                for r in 0..*rows {
                    self.open_array(*cols);
                    for c in 0..*cols {
                        if let Some(item) = value.items.get(c * rows + r) {
                            self.item(item, ptype)?;
                        }
                    }
                }
                Ok(())
            }
            Shape::NDArray(dims) => self.nd(dims, &value.items, ptype, 0, 0, 1),
        }
    }

    /// Emits dimension `axis` onwards. Items are stored first dimension
    /// fastest, so `stride` is the product of the dimensions before `axis`.
    fn nd(
        &mut self,
        dims: &[usize],
        items: &[Item],
        ptype: PrimitiveType,
        axis: usize,
        offset: usize,
        stride: usize,
    ) -> Result<()> {
        let Some(&len) = dims.get(axis) else {
            return match items.get(offset) {
                Some(item) => self.item(item, ptype),
                None => Err(ParamError::Internal("n-dimensional index out of range".into())),
            };
        };
        self.open_array(len);
        for i in 0..len {
            self.nd(dims, items, ptype, axis + 1, offset + i * stride, stride * len)?;
        }
        Ok(())
    }

    /// Char strings become JSON strings, strings of any other primitive
    /// become arrays, empty ones included.
    fn item(&mut self, item: &Item, ptype: PrimitiveType) -> Result<()> {
        match item {
            Item::Plain(s) => self.scalar(s),
            Item::String(chars) if ptype == PrimitiveType::Char => {
                let text = chars
                    .iter()
                    .map(|c| match c {
                        Scalar::Char(c) => Ok(*c),
                        other => Err(ParamError::Internal(format!("{other:?} in a char string"))),
                    })
                    .collect::<Result<String>>()?;
                let quoted = serde_json::to_string(&text)?;
                self.raw(&quoted);
                Ok(())
            }
            Item::String(chars) => {
                self.open_array(chars.len());
                chars.iter().try_for_each(|c| self.scalar(c))
            }
            Item::Sparse(entries) => {
                self.open_array(entries.len());
                for e in entries {
                    self.open_array(2);
                    self.raw(&e.feat_index.to_string());
                    self.scalar(&e.entry)?;
                }
                Ok(())
            }
        }
    }

    fn scalar(&mut self, scalar: &Scalar) -> Result<()> {
        match scalar {
            Scalar::Bool(b) => self.raw(if *b { "true" } else { "false" }),
            Scalar::Char(c) => self.raw(&u32::from(*c).to_string()),
            Scalar::Int8(v) => self.raw(&v.to_string()),
            Scalar::UInt8(v) => self.raw(&v.to_string()),
            Scalar::Int16(v) => self.raw(&v.to_string()),
            Scalar::UInt16(v) => self.raw(&v.to_string()),
            Scalar::Int32(v) => self.raw(&v.to_string()),
            Scalar::UInt32(v) => self.raw(&v.to_string()),
            Scalar::Int64(v) => self.raw(&v.to_string()),
            Scalar::UInt64(v) => self.raw(&v.to_string()),
            Scalar::Float32(v) => self.float(f64::from(*v))?,
            Scalar::Float64(v) | Scalar::FloatMax(v) => self.float(*v)?,
            Scalar::Complex128(c) => {
                self.open_array(2);
                self.float(c.re)?;
                self.float(c.im)?;
            }
            Scalar::Object(None) => self.raw("null"),
            Scalar::Object(Some(record)) => self.record(record)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{ContainerType, DataType, StructType};
    use crate::value::{Entry, SparseEntry};

    fn doc_with(entry: Entry) -> Result<Document> {
        let mut root = Record::new("Foo", Some(PrimitiveType::Float64));
        root.insert(entry)?;
        Ok(Document { version: 0, root })
    }

    fn f64s(values: &[f64]) -> Vec<Item> {
        values.iter().map(|v| Item::Plain(Scalar::Float64(*v))).collect()
    }

    #[test]
    fn matrices_become_rows() -> Result<()> {
        // Column-major [[1, 3, 5], [2, 4, 6]].
        let doc = doc_with(Entry {
            name: "m".into(),
            datatype: DataType::new(ContainerType::SGMatrix, StructType::None, PrimitiveType::Float64),
            value: Value {
                shape: Shape::Matrix { rows: 2, cols: 3 },
                items: f64s(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            },
        })?;
        let text = JsonWriter::new().write_document(&doc)?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(json["name"], "Foo");
        assert_eq!(json["generic"], PrimitiveType::Float64.index());
        assert_eq!(
            json["parameters"]["m"],
            serde_json::json!([[1.0, 3.0, 5.0], [2.0, 4.0, 6.0]])
        );
        Ok(())
    }

    #[test]
    fn nested_structures_close_correctly() -> Result<()> {
        let doc = doc_with(Entry {
            name: "s".into(),
            datatype: DataType::new(ContainerType::Vector, StructType::Sparse, PrimitiveType::Int32),
            value: Value::vector(vec![
                Item::Sparse(vec![
                    SparseEntry { feat_index: 1, entry: Scalar::Int32(7) },
                    SparseEntry { feat_index: 9, entry: Scalar::Int32(-2) },
                ]),
                Item::Sparse(Vec::new()),
            ]),
        })?;
        let text = JsonWriter::new().write_document(&doc)?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(json["parameters"]["s"], serde_json::json!([[[1, 7], [9, -2]], []]));
        Ok(())
    }

    #[test]
    fn nd_arrays_nest_first_dimension_outermost() -> Result<()> {
        let doc = doc_with(Entry {
            name: "a".into(),
            datatype: DataType::new(ContainerType::NDArray, StructType::None, PrimitiveType::Float64),
            value: Value {
                shape: Shape::NDArray(vec![2, 2]),
                items: f64s(&[1.0, 2.0, 3.0, 4.0]),
            },
        })?;
        let text = JsonWriter::new().write_document(&doc)?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(json["parameters"]["a"], serde_json::json!([[1.0, 3.0], [2.0, 4.0]]));
        Ok(())
    }

    #[test]
    fn non_finite_needs_the_flag() -> Result<()> {
        let doc = doc_with(Entry {
            name: "x".into(),
            datatype: DataType::scalar(PrimitiveType::Float64),
            value: Value::scalar(Scalar::Float64(f64::NEG_INFINITY)),
        })?;
        assert!(JsonWriter::new().write_document(&doc).is_err());
        let text = JsonWriter::new().allow_non_finite(true).write_document(&doc)?;
        assert!(text.contains("\"x\":-Infinity"));
        Ok(())
    }

    #[test]
    fn strings_follow_the_declared_primitive() -> Result<()> {
        let mut root = Record::new("Foo", None);
        root.insert(Entry {
            name: "codes".into(),
            datatype: DataType::new(ContainerType::Vector, StructType::String, PrimitiveType::UInt8),
            value: Value::vector(vec![
                Item::String(vec![Scalar::UInt8(104), Scalar::UInt8(105)]),
                Item::String(Vec::new()),
            ]),
        })?;
        root.insert(Entry {
            name: "words".into(),
            datatype: DataType::new(ContainerType::Vector, StructType::String, PrimitiveType::Char),
            value: Value::vector(vec![
                Item::String(vec![Scalar::Char('h'), Scalar::Char('i')]),
                Item::String(Vec::new()),
            ]),
        })?;
        let text = JsonWriter::new().write_document(&Document { version: 0, root })?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(json["parameters"]["codes"], serde_json::json!([[104, 105], []]));
        assert_eq!(json["parameters"]["words"], serde_json::json!(["hi", ""]));
        Ok(())
    }
}
