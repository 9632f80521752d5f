//! The line-oriented text format.
//!
//! ```text
//! _SGOBJECT_SERIALIZABLE_ASCII_FILE_V_00_
//! version 1
//! Gaussian<float64> [
//!   labels SGVector<int32> 3 ( {1} {2} {3} )
//!   name String<char> 3 [ 97 98 99 ]
//!   kernel SGSerializable* Linear [
//!     scale float64 1.0
//!   ]
//!   weights Matrix<float64> 2 2 ( {1.0} {2.0} {3.0} {4.0} )
//! ]
//! ```
//!
//! Every entry is `name type data`. Containers write their dimensions, then
//! the items in `(` `)` with each item in `{` `}` (matrices column-major).
//! Strings are `len [ ... ]`, sparse vectors `len ( {feat:value} ... )`,
//! objects `Class [ ... ]` or `null`. Booleans are `t`/`f`, chars their code
//! point, complex numbers `(re,im)`. Floats use the shortest form that reads
//! back to the same value. Line breaks and indentation are cosmetic.

use std::fmt::Write as _;

use crate::datatype::{ContainerType, DataType, PrimitiveType, StructType};
use crate::error::{ParamError, Result};
use crate::format::ASCII_HEADER_V00;
use crate::reader::DocumentReader;
use crate::value::{
    Document, Entry, Item, Record, Scalar, Shape, SparseEntry, Value, MAX_DEPTH, MIN_VERSION,
};

/// Writes documents in the `V_00` text format.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiWriter;

impl AsciiWriter {
    /// Renders `doc` as text.
    pub fn write_document(&self, doc: &Document) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "{ASCII_HEADER_V00}")?;
        writeln!(out, "version {}", doc.version)?;
        write_record(&mut out, &doc.root, 0)?;
        out.push('\n');
        Ok(out)
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_record(out: &mut String, record: &Record, depth: usize) -> Result<()> {
    match record.generic {
        Some(g) => write!(out, "{}<{g}> [", record.class_name)?,
        None => write!(out, "{} [", record.class_name)?,
    }
    for entry in &record.entries {
        out.push('\n');
        indent(out, depth + 1);
        write_entry(out, entry, depth + 1)?;
    }
    out.push('\n');
    indent(out, depth);
    out.push(']');
    Ok(())
}

fn write_entry(out: &mut String, entry: &Entry, depth: usize) -> Result<()> {
    entry.value.validate(&entry.datatype)?;
    write!(out, "{} {} ", entry.name, entry.datatype)?;
    let value = &entry.value;
    match &value.shape {
        Shape::Scalar => {
            // validate() guarantees exactly one item.
            for item in &value.items {
                write_item(out, item, depth)?;
            }
            return Ok(());
        }
        Shape::Vector(len) => write!(out, "{len} (")?,
        Shape::Matrix { rows, cols } => write!(out, "{rows} {cols} (")?,
        Shape::NDArray(dims) => {
            write!(out, "{}", dims.len())?;
            for d in dims {
                write!(out, " {d}")?;
            }
            out.push_str(" (");
        }
    }
    for item in &value.items {
        out.push_str(" {");
        write_item(out, item, depth)?;
        out.push('}');
    }
    out.push_str(" )");
    Ok(())
}

fn write_item(out: &mut String, item: &Item, depth: usize) -> Result<()> {
    match item {
        Item::Plain(s) => write_scalar(out, s, depth),
        Item::String(chars) => {
            write!(out, "{} [", chars.len())?;
            for c in chars {
                out.push(' ');
                write_scalar(out, c, depth)?;
            }
            out.push_str(" ]");
            Ok(())
        }
        Item::Sparse(entries) => {
            write!(out, "{} (", entries.len())?;
            for e in entries {
                write!(out, " {{{}:", e.feat_index)?;
                write_scalar(out, &e.entry, depth)?;
                out.push('}');
            }
            out.push_str(" )");
            Ok(())
        }
    }
}

fn write_scalar(out: &mut String, scalar: &Scalar, depth: usize) -> Result<()> {
    match scalar {
        Scalar::Bool(b) => out.push(if *b { 't' } else { 'f' }),
        Scalar::Char(c) => write!(out, "{}", u32::from(*c))?,
        Scalar::Int8(v) => write!(out, "{v}")?,
        Scalar::UInt8(v) => write!(out, "{v}")?,
        Scalar::Int16(v) => write!(out, "{v}")?,
        Scalar::UInt16(v) => write!(out, "{v}")?,
        Scalar::Int32(v) => write!(out, "{v}")?,
        Scalar::UInt32(v) => write!(out, "{v}")?,
        Scalar::Int64(v) => write!(out, "{v}")?,
        Scalar::UInt64(v) => write!(out, "{v}")?,
        Scalar::Float32(v) => write!(out, "{v:?}")?,
        Scalar::Float64(v) | Scalar::FloatMax(v) => write!(out, "{v:?}")?,
        Scalar::Complex128(c) => write!(out, "({:?},{:?})", c.re, c.im)?,
        Scalar::Object(None) => out.push_str("null"),
        Scalar::Object(Some(record)) => write_record(out, record, depth)?,
    }
    Ok(())
}

/// Reads the `V_00` text format.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiReader00;

impl DocumentReader for AsciiReader00 {
    fn read_document(&self, bytes: &[u8]) -> Result<Document> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ParamError::format_at(e.valid_up_to(), "input is not UTF-8"))?;
        let mut p = Parser::new(text);

        let (at, header) = p.next()?;
        if header != ASCII_HEADER_V00 {
            return Err(ParamError::format_at(at, format!("unexpected header `{header}`")));
        }
        p.expect("version")?;
        let (at, _) = p.peek().unwrap_or((p.pos, ""));
        let version = p.number::<i32>()?;
        if version < MIN_VERSION {
            return Err(ParamError::format_at(at, format!("invalid file version {version}")));
        }
        let root = p.object(0)?.ok_or_else(|| {
            ParamError::Format("the root object of a file cannot be null".into())
        })?;
        if let Some((at, tok)) = p.peek() {
            return Err(ParamError::format_at(at, format!("trailing input `{tok}`")));
        }
        Ok(Document { version, root })
    }
}

const DELIMITERS: &[u8] = b"()[]{},:";

/// Whitespace-separated tokens; every delimiter is a token of its own.
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn scan(&self) -> Option<(usize, usize)> {
        let bytes = self.src.as_bytes();
        let mut start = self.pos;
        while bytes.get(start).is_some_and(|b| b.is_ascii_whitespace()) {
            start += 1;
        }
        let first = *bytes.get(start)?;
        if DELIMITERS.contains(&first) {
            return Some((start, start + 1));
        }
        let mut end = start;
        while bytes
            .get(end)
            .is_some_and(|b| !b.is_ascii_whitespace() && !DELIMITERS.contains(b))
        {
            end += 1;
        }
        Some((start, end))
    }

    fn peek(&self) -> Option<(usize, &'a str)> {
        self.scan().map(|(s, e)| (s, &self.src[s..e]))
    }

    fn next(&mut self) -> Result<(usize, &'a str)> {
        let (start, end) = self
            .scan()
            .ok_or_else(|| ParamError::format_at(self.src.len(), "unexpected end of input"))?;
        self.pos = end;
        Ok((start, &self.src[start..end]))
    }

    fn expect(&mut self, want: &str) -> Result<()> {
        let (at, tok) = self.next()?;
        if tok == want {
            Ok(())
        } else {
            Err(ParamError::format_at(at, format!("expected `{want}`, found `{tok}`")))
        }
    }

    fn number<N: std::str::FromStr>(&mut self) -> Result<N> {
        let (at, tok) = self.next()?;
        tok.parse()
            .map_err(|_| ParamError::format_at(at, format!("`{tok}` is not a valid number")))
    }

    fn object(&mut self, depth: usize) -> Result<Option<Record>> {
        if depth > MAX_DEPTH {
            return Err(ParamError::format_at(self.pos, "objects nested too deeply"));
        }
        let (at, head) = self.next()?;
        if head == "null" {
            return Ok(None);
        }
        let (class_name, generic) = match head.split_once('<') {
            Some((name, rest)) => {
                let ptype = rest
                    .strip_suffix('>')
                    .and_then(PrimitiveType::from_name)
                    .ok_or_else(|| ParamError::format_at(at, format!("bad generic tag in `{head}`")))?;
                (name, Some(ptype))
            }
            None => (head, None),
        };
        if class_name.is_empty() || head.bytes().next().is_some_and(|b| DELIMITERS.contains(&b)) {
            return Err(ParamError::format_at(at, format!("expected a class name, found `{head}`")));
        }
        self.expect("[")?;

        let mut record = Record::new(class_name, generic);
        loop {
            match self.peek() {
                Some((_, "]")) => {
                    self.next()?;
                    break;
                }
                Some(_) => {
                    let entry = self.entry(depth)?;
                    record.insert(entry)?;
                }
                None => return Err(ParamError::format_at(self.src.len(), "unterminated object")),
            }
        }
        Ok(Some(record))
    }

    fn entry(&mut self, depth: usize) -> Result<Entry> {
        let (_, name) = self.next()?;
        let (at, type_str) = self.next()?;
        let datatype =
            DataType::parse(type_str).map_err(|e| ParamError::format_at(at, e.to_string()))?;
        let value = self.value(&datatype, depth)?;
        Ok(Entry {
            name: name.to_string(),
            datatype,
            value,
        })
    }

    fn value(&mut self, dt: &DataType, depth: usize) -> Result<Value> {
        let shape = match dt.ctype {
            ContainerType::Scalar => {
                let item = self.item(dt, depth)?;
                return Ok(Value {
                    shape: Shape::Scalar,
                    items: vec![item],
                });
            }
            ContainerType::Vector | ContainerType::SGVector => Shape::Vector(self.number()?),
            ContainerType::Matrix | ContainerType::SGMatrix => Shape::Matrix {
                rows: self.number()?,
                cols: self.number()?,
            },
            ContainerType::NDArray => {
                let ndims: usize = self.number()?;
                let dims = (0..ndims).map(|_| self.number()).collect::<Result<Vec<usize>>>()?;
                Shape::NDArray(dims)
            }
        };
        let at = self.pos;
        let len = shape
            .num_elements()
            .map_err(|_| ParamError::format_at(at, format!("dimensions of {shape:?} overflow")))?;
        self.expect("(")?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            self.expect("{")?;
            items.push(self.item(dt, depth)?);
            self.expect("}")?;
        }
        self.expect(")")
            .map_err(|_| ParamError::format_at(at, format!("container does not hold exactly {len} items")))?;
        Ok(Value { shape, items })
    }

    fn item(&mut self, dt: &DataType, depth: usize) -> Result<Item> {
        match dt.stype {
            StructType::None => Ok(Item::Plain(self.scalar(dt.ptype, depth)?)),
            StructType::String => {
                let len: usize = self.number()?;
                self.expect("[")?;
                let mut chars = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    chars.push(self.scalar(dt.ptype, depth)?);
                }
                self.expect("]")?;
                Ok(Item::String(chars))
            }
            StructType::Sparse => {
                let len: usize = self.number()?;
                self.expect("(")?;
                let mut entries = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    self.expect("{")?;
                    let feat_index = self.number()?;
                    self.expect(":")?;
                    let entry = self.scalar(dt.ptype, depth)?;
                    self.expect("}")?;
                    entries.push(SparseEntry { feat_index, entry });
                }
                self.expect(")")?;
                Ok(Item::Sparse(entries))
            }
        }
    }

    fn scalar(&mut self, ptype: PrimitiveType, depth: usize) -> Result<Scalar> {
        Ok(match ptype {
            PrimitiveType::Bool => match self.next()? {
                (_, "t") => Scalar::Bool(true),
                (_, "f") => Scalar::Bool(false),
                (at, tok) => return Err(ParamError::format_at(at, format!("`{tok}` is not t or f"))),
            },
            PrimitiveType::Char => {
                let (at, tok) = self.next()?;
                tok.parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(Scalar::Char)
                    .ok_or_else(|| ParamError::format_at(at, format!("`{tok}` is not a code point")))?
            }
            PrimitiveType::Int8 => Scalar::Int8(self.number()?),
            PrimitiveType::UInt8 => Scalar::UInt8(self.number()?),
            PrimitiveType::Int16 => Scalar::Int16(self.number()?),
            PrimitiveType::UInt16 => Scalar::UInt16(self.number()?),
            PrimitiveType::Int32 => Scalar::Int32(self.number()?),
            PrimitiveType::UInt32 => Scalar::UInt32(self.number()?),
            PrimitiveType::Int64 => Scalar::Int64(self.number()?),
            PrimitiveType::UInt64 => Scalar::UInt64(self.number()?),
            PrimitiveType::Float32 => Scalar::Float32(self.number()?),
            PrimitiveType::Float64 => Scalar::Float64(self.number()?),
            PrimitiveType::FloatMax => Scalar::FloatMax(self.number()?),
            PrimitiveType::Complex128 => {
                self.expect("(")?;
                let re = self.number()?;
                self.expect(",")?;
                let im = self.number()?;
                self.expect(")")?;
                Scalar::Complex128(num_complex::Complex64::new(re, im))
            }
            PrimitiveType::SGObject => Scalar::Object(self.object(depth + 1)?.map(Box::new)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn entry(name: &str, datatype: DataType, value: Value) -> Entry {
        Entry {
            name: name.into(),
            datatype,
            value,
        }
    }

    fn sample() -> Result<Document> {
        let mut inner = Record::new("Inner", None);
        inner.insert(entry(
            "z",
            DataType::scalar(PrimitiveType::Complex128),
            Value::scalar(Scalar::Complex128(Complex64::new(1.5, -2.0))),
        ))?;

        let mut root = Record::new("Outer", Some(PrimitiveType::Float64));
        root.insert(entry(
            "flag",
            DataType::scalar(PrimitiveType::Bool),
            Value::scalar(Scalar::Bool(true)),
        ))?;
        root.insert(entry(
            "child",
            DataType::scalar(PrimitiveType::SGObject),
            Value::scalar(Scalar::Object(Some(Box::new(inner)))),
        ))?;
        root.insert(entry(
            "nothing",
            DataType::scalar(PrimitiveType::SGObject),
            Value::scalar(Scalar::Object(None)),
        ))?;
        root.insert(entry(
            "m",
            DataType::new(ContainerType::SGMatrix, StructType::None, PrimitiveType::Float64),
            Value {
                shape: Shape::Matrix { rows: 2, cols: 1 },
                items: vec![Item::Plain(Scalar::Float64(0.1)), Item::Plain(Scalar::Float64(f64::NAN))],
            },
        ))?;
        root.insert(entry(
            "words",
            DataType::new(ContainerType::Vector, StructType::String, PrimitiveType::Char),
            Value::vector(vec![Item::String("hi".chars().map(Scalar::Char).collect())]),
        ))?;
        root.insert(entry(
            "sparse",
            DataType::new(ContainerType::Scalar, StructType::Sparse, PrimitiveType::Int32),
            Value::scalar_item(Item::Sparse(vec![SparseEntry {
                feat_index: 4,
                entry: Scalar::Int32(-3),
            }])),
        ))?;
        Ok(Document { version: 2, root })
    }

    #[test]
    fn written_text_reads_back() -> Result<()> {
        let doc = sample()?;
        let text = AsciiWriter.write_document(&doc)?;
        assert!(text.starts_with(ASCII_HEADER_V00));
        assert!(text.contains("Outer<float64> ["));
        let back = AsciiReader00.read_document(text.as_bytes())?;
        assert_eq!(back.version, 2);
        // NaN never compares equal, so compare the text instead.
        assert_eq!(AsciiWriter.write_document(&back)?, text);
        Ok(())
    }

    #[test]
    fn layout_is_not_significant() -> Result<()> {
        let text = format!("{ASCII_HEADER_V00} version 0 Foo [ b int32 2 a Vector<uint8> 2 ( {{1}}{{2}} ) ]");
        let doc = AsciiReader00.read_document(text.as_bytes())?;
        let names: Vec<_> = doc.root.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        Ok(())
    }

    #[test]
    fn short_containers_are_rejected() {
        let text = format!("{ASCII_HEADER_V00}\nversion 0\nFoo [ a Vector<int32> 3 ( {{1}} {{2}} ) ]");
        assert!(AsciiReader00.read_document(text.as_bytes()).is_err());
    }

    #[test]
    fn errors_carry_offsets() {
        let text = format!("{ASCII_HEADER_V00}\nversion 0\nFoo [ a int32 x ]");
        let err = AsciiReader00.read_document(text.as_bytes());
        assert!(matches!(err, Err(ParamError::Format(msg)) if msg.contains("at byte")));
    }

    #[test]
    fn null_root_and_duplicates_fail() {
        let null_root = format!("{ASCII_HEADER_V00}\nversion 0\nnull");
        assert!(AsciiReader00.read_document(null_root.as_bytes()).is_err());
        let dup = format!("{ASCII_HEADER_V00}\nversion 0\nFoo [ a int32 1 a int32 2 ]");
        assert!(AsciiReader00.read_document(dup.as_bytes()).is_err());
    }

    #[test]
    fn versions_below_unversioned_fail() -> Result<()> {
        for version in ["-2", "-100000000", "-2147483648"] {
            let text = format!("{ASCII_HEADER_V00}\nversion {version}\nFoo [ ]");
            assert!(matches!(
                AsciiReader00.read_document(text.as_bytes()),
                Err(ParamError::Format(_))
            ));
        }
        let text = format!("{ASCII_HEADER_V00}\nversion -1\nFoo [ ]");
        assert_eq!(AsciiReader00.read_document(text.as_bytes())?.version, -1);
        Ok(())
    }

    #[test]
    fn overflowing_dimensions_fail() {
        let text = format!(
            "{ASCII_HEADER_V00}\nversion 0\nFoo [ m SGMatrix<int32> 4294967296 4294967296 ( ) ]"
        );
        assert!(matches!(
            AsciiReader00.read_document(text.as_bytes()),
            Err(ParamError::Format(_))
        ));
    }
}
