//! The generic value tree every back-end reads and writes.
//!
//! Saving an object turns it into a [`Record`]: its class name, its generic
//! tag and one [`Entry`] per registered parameter, sorted by name. Nested
//! objects become nested records. Readers produce the same tree, so the
//! name-based resolution of live fields never depends on on-disk order.

use std::cell::Cell;

use num_complex::Complex64;
use num_traits::NumCast;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::datatype::{ContainerType, DataType, PrimitiveType, StructType};
use crate::error::{ParamError, Result};

/// Nested objects deeper than this are rejected while reading.
pub const MAX_DEPTH: usize = 256;

/// Lowest parameter version a file may declare. `-1` marks files written
/// before the object was versioned.
pub const MIN_VERSION: i32 = -1;

/// One primitive element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// `bool`
    Bool(bool),
    /// `char`
    Char(char),
    /// `i8`
    Int8(i8),
    /// `u8`
    UInt8(u8),
    /// `i16`
    Int16(i16),
    /// `u16`
    UInt16(u16),
    /// `i32`
    Int32(i32),
    /// `u32`
    UInt32(u32),
    /// `i64`
    Int64(i64),
    /// `u64`
    UInt64(u64),
    /// `f32`
    Float32(f32),
    /// `f64`
    Float64(f64),
    /// Widest float.
    FloatMax(f64),
    /// Complex number.
    Complex128(Complex64),
    /// A nested object, `None` for a null reference.
    Object(#[serde(deserialize_with = "nested_object")] Option<Box<Record>>),
}

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

/// Tracks how many nested objects the current thread is decoding.
struct NestingGuard;

impl NestingGuard {
    fn enter() -> (Self, usize) {
        let depth = NESTING.with(|n| {
            let depth = n.get() + 1;
            n.set(depth);
            depth
        });
        (Self, depth)
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTING.with(|n| n.set(n.get().saturating_sub(1)));
    }
}

// Serde decoders recurse once per nesting level, so the bound has to be
// enforced while decoding rather than on the finished tree.
fn nested_object<'de, D>(deserializer: D) -> std::result::Result<Option<Box<Record>>, D::Error>
where
    D: Deserializer<'de>,
{
    let (_guard, depth) = NestingGuard::enter();
    if depth > MAX_DEPTH {
        return Err(D::Error::custom(format!(
            "objects nested deeper than {MAX_DEPTH} levels"
        )));
    }
    Option::<Box<Record>>::deserialize(deserializer)
}

impl Scalar {
    fn normalize(&mut self) -> Result<()> {
        match self {
            Self::Object(Some(record)) => record.normalize(),
            _ => Ok(()),
        }
    }

    /// The primitive kind of this element.
    pub fn ptype(&self) -> PrimitiveType {
        match self {
            Self::Bool(_) => PrimitiveType::Bool,
            Self::Char(_) => PrimitiveType::Char,
            Self::Int8(_) => PrimitiveType::Int8,
            Self::UInt8(_) => PrimitiveType::UInt8,
            Self::Int16(_) => PrimitiveType::Int16,
            Self::UInt16(_) => PrimitiveType::UInt16,
            Self::Int32(_) => PrimitiveType::Int32,
            Self::UInt32(_) => PrimitiveType::UInt32,
            Self::Int64(_) => PrimitiveType::Int64,
            Self::UInt64(_) => PrimitiveType::UInt64,
            Self::Float32(_) => PrimitiveType::Float32,
            Self::Float64(_) => PrimitiveType::Float64,
            Self::FloatMax(_) => PrimitiveType::FloatMax,
            Self::Complex128(_) => PrimitiveType::Complex128,
            Self::Object(_) => PrimitiveType::SGObject,
        }
    }

    /// The zero value of a primitive kind (null for objects).
    pub fn zero(ptype: PrimitiveType) -> Self {
        match ptype {
            PrimitiveType::Bool => Self::Bool(false),
            PrimitiveType::Char => Self::Char('\0'),
            PrimitiveType::Int8 => Self::Int8(0),
            PrimitiveType::UInt8 => Self::UInt8(0),
            PrimitiveType::Int16 => Self::Int16(0),
            PrimitiveType::UInt16 => Self::UInt16(0),
            PrimitiveType::Int32 => Self::Int32(0),
            PrimitiveType::UInt32 => Self::UInt32(0),
            PrimitiveType::Int64 => Self::Int64(0),
            PrimitiveType::UInt64 => Self::UInt64(0),
            PrimitiveType::Float32 => Self::Float32(0.0),
            PrimitiveType::Float64 => Self::Float64(0.0),
            PrimitiveType::FloatMax => Self::FloatMax(0.0),
            PrimitiveType::Complex128 => Self::Complex128(Complex64::new(0.0, 0.0)),
            PrimitiveType::SGObject => Self::Object(None),
        }
    }

    fn to_num<T: NumCast>(&self) -> Option<T> {
        match self {
            Self::Bool(v) => T::from(<u8 as From<bool>>::from(*v)),
            Self::Char(v) => T::from(<u32 as From<char>>::from(*v)),
            Self::Int8(v) => T::from(*v),
            Self::UInt8(v) => T::from(*v),
            Self::Int16(v) => T::from(*v),
            Self::UInt16(v) => T::from(*v),
            Self::Int32(v) => T::from(*v),
            Self::UInt32(v) => T::from(*v),
            Self::Int64(v) => T::from(*v),
            Self::UInt64(v) => T::from(*v),
            Self::Float32(v) => T::from(*v),
            Self::Float64(v) | Self::FloatMax(v) => T::from(*v),
            Self::Complex128(c) if c.im == 0.0 => T::from(c.re),
            Self::Complex128(_) | Self::Object(_) => None,
        }
    }

    /// Converts the element to another primitive kind.
    ///
    /// Conversions that lose the value (overflowing integers, complex numbers
    /// with an imaginary part, objects to numbers) fail instead of wrapping.
    pub fn cast(self, target: PrimitiveType) -> Result<Self> {
        let source = self.ptype();
        if source == target {
            return Ok(self);
        }
        let lossy = || {
            ParamError::Migration(format!("cannot convert {self:?} from {source} to {target}"))
        };
        let converted = match target {
            PrimitiveType::SGObject => None,
            PrimitiveType::Bool => match &self {
                Self::Object(_) => None,
                Self::Complex128(c) => Some(Self::Bool(c.re != 0.0 || c.im != 0.0)),
                other => other.to_num::<f64>().map(|v| Self::Bool(v != 0.0)),
            },
            PrimitiveType::Char => self
                .to_num::<u32>()
                .and_then(char::from_u32)
                .map(Self::Char),
            PrimitiveType::Int8 => self.to_num().map(Self::Int8),
            PrimitiveType::UInt8 => self.to_num().map(Self::UInt8),
            PrimitiveType::Int16 => self.to_num().map(Self::Int16),
            PrimitiveType::UInt16 => self.to_num().map(Self::UInt16),
            PrimitiveType::Int32 => self.to_num().map(Self::Int32),
            PrimitiveType::UInt32 => self.to_num().map(Self::UInt32),
            PrimitiveType::Int64 => self.to_num().map(Self::Int64),
            PrimitiveType::UInt64 => self.to_num().map(Self::UInt64),
            PrimitiveType::Float32 => self.to_num().map(Self::Float32),
            PrimitiveType::Float64 => self.to_num().map(Self::Float64),
            PrimitiveType::FloatMax => self.to_num().map(Self::FloatMax),
            PrimitiveType::Complex128 => self
                .to_num::<f64>()
                .map(|re| Self::Complex128(Complex64::new(re, 0.0))),
        };
        converted.ok_or_else(lossy)
    }

    /// Compares two elements, allowing `accuracy` of slack for floats.
    pub fn approx_eq(&self, other: &Self, accuracy: f64) -> bool {
        fn close(a: f64, b: f64, accuracy: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b || (a - b).abs() <= accuracy
        }
        match (self, other) {
            (Self::Float32(a), Self::Float32(b)) => close(
                <f64 as From<f32>>::from(*a),
                <f64 as From<f32>>::from(*b),
                accuracy,
            ),
            (Self::Float64(a), Self::Float64(b)) | (Self::FloatMax(a), Self::FloatMax(b)) => {
                close(*a, *b, accuracy)
            }
            (Self::Complex128(a), Self::Complex128(b)) => {
                close(a.re, b.re, accuracy) && close(a.im, b.im, accuracy)
            }
            (Self::Object(a), Self::Object(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.approx_eq(b, accuracy),
                _ => false,
            },
            (a, b) => a == b,
        }
    }
}

/// A sparse entry: a feature index and its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseEntry {
    /// Feature index inside the sparse vector.
    pub feat_index: i32,
    /// The stored value.
    pub entry: Scalar,
}

/// One container element, shaped by the parameter's [`StructType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    /// A single primitive (`StructType::None`).
    Plain(Scalar),
    /// A string of primitives (`StructType::String`).
    String(Vec<Scalar>),
    /// A sparse vector (`StructType::Sparse`).
    Sparse(Vec<SparseEntry>),
}

impl Item {
    /// The struct kind of this element.
    pub fn stype(&self) -> StructType {
        match self {
            Self::Plain(_) => StructType::None,
            Self::String(_) => StructType::String,
            Self::Sparse(_) => StructType::Sparse,
        }
    }

    /// Iterates over every primitive inside the element.
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &Scalar> + '_> {
        match self {
            Self::Plain(s) => Box::new(std::iter::once(s)),
            Self::String(v) => Box::new(v.iter()),
            Self::Sparse(v) => Box::new(v.iter().map(|e| &e.entry)),
        }
    }

    fn map_scalars(self, f: &mut impl FnMut(Scalar) -> Result<Scalar>) -> Result<Self> {
        Ok(match self {
            Self::Plain(s) => Self::Plain(f(s)?),
            Self::String(v) => Self::String(v.into_iter().map(&mut *f).collect::<Result<_>>()?),
            Self::Sparse(v) => Self::Sparse(
                v.into_iter()
                    .map(|e| {
                        Ok(SparseEntry {
                            feat_index: e.feat_index,
                            entry: f(e.entry)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn approx_eq(&self, other: &Self, accuracy: f64) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a.approx_eq(b, accuracy),
            (Self::String(a), Self::String(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y, accuracy))
            }
            (Self::Sparse(a), Self::Sparse(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| {
                        x.feat_index == y.feat_index && x.entry.approx_eq(&y.entry, accuracy)
                    })
            }
            _ => false,
        }
    }
}

/// Dimensions of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// Exactly one element.
    Scalar,
    /// `len` elements.
    Vector(usize),
    /// `rows * cols` elements, column-major.
    Matrix {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },
    /// Product of `dims` elements.
    NDArray(Vec<usize>),
}

/// Number of elements spanned by `dims`, failing when the product overflows.
pub(crate) fn element_count(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| ParamError::Format(format!("dimensions {dims:?} overflow")))
}

impl Shape {
    /// Total number of elements described by the shape.
    ///
    /// Fails with [`ParamError::Format`] when the dimensions multiply past
    /// `usize::MAX`.
    pub fn num_elements(&self) -> Result<usize> {
        match self {
            Self::Scalar => Ok(1),
            Self::Vector(len) => Ok(*len),
            Self::Matrix { rows, cols } => element_count(&[*rows, *cols]),
            Self::NDArray(dims) => element_count(dims),
        }
    }

    fn fits(&self, ctype: ContainerType) -> bool {
        matches!(
            (self, ctype),
            (Self::Scalar, ContainerType::Scalar)
                | (Self::Vector(_), ContainerType::Vector | ContainerType::SGVector)
                | (Self::Matrix { .. }, ContainerType::Matrix | ContainerType::SGMatrix)
                | (Self::NDArray(_), ContainerType::NDArray)
        )
    }
}

/// The data of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    /// Dimensions.
    pub shape: Shape,
    /// Elements, column-major for matrices.
    pub items: Vec<Item>,
}

impl Value {
    /// A single plain scalar.
    pub fn scalar(s: Scalar) -> Self {
        Self {
            shape: Shape::Scalar,
            items: vec![Item::Plain(s)],
        }
    }

    /// A single item of any struct type.
    pub fn scalar_item(item: Item) -> Self {
        Self {
            shape: Shape::Scalar,
            items: vec![item],
        }
    }

    /// A vector of items.
    pub fn vector(items: Vec<Item>) -> Self {
        Self {
            shape: Shape::Vector(items.len()),
            items,
        }
    }

    /// Checks that the value is complete and matches `datatype`.
    ///
    /// A container whose element count disagrees with its dimensions is
    /// rejected rather than truncated.
    pub fn validate(&self, datatype: &DataType) -> Result<()> {
        if !self.shape.fits(datatype.ctype) {
            return Err(ParamError::InvalidParameter(format!(
                "shape {:?} does not fit container {:?}",
                self.shape, datatype.ctype
            )));
        }
        let expected = self.shape.num_elements()?;
        if self.items.len() != expected {
            return Err(ParamError::InvalidParameter(format!(
                "container declares {expected} elements but holds {}",
                self.items.len()
            )));
        }
        for item in &self.items {
            if item.stype() != datatype.stype {
                return Err(ParamError::InvalidParameter(format!(
                    "element {:?} does not match struct type {:?}",
                    item.stype(),
                    datatype.stype
                )));
            }
            if let Some(bad) = item.scalars().find(|s| s.ptype() != datatype.ptype) {
                return Err(ParamError::InvalidParameter(format!(
                    "element of type {} in a {} container",
                    bad.ptype(),
                    datatype.ptype
                )));
            }
        }
        Ok(())
    }

    /// Converts every element to `ptype`.
    pub fn cast(self, ptype: PrimitiveType) -> Result<Self> {
        let items = self
            .items
            .into_iter()
            .map(|item| item.map_scalars(&mut |s| s.cast(ptype)))
            .collect::<Result<_>>()?;
        Ok(Self {
            shape: self.shape,
            items,
        })
    }

    /// Compares two values, allowing `accuracy` of slack for floats.
    pub fn approx_eq(&self, other: &Self, accuracy: f64) -> bool {
        self.shape == other.shape
            && self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.approx_eq(b, accuracy))
    }
}

/// One named, typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Parameter name.
    pub name: String,
    /// Type descriptor.
    pub datatype: DataType,
    /// Data.
    pub value: Value,
}

/// The serialized form of one managed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Registered class name.
    pub class_name: String,
    /// Primitive type the object was instantiated over, if generic.
    pub generic: Option<PrimitiveType>,
    /// Parameters sorted by name.
    pub entries: Vec<Entry>,
}

impl Record {
    /// Creates an empty record.
    pub fn new(class_name: impl Into<String>, generic: Option<PrimitiveType>) -> Self {
        Self {
            class_name: class_name.into(),
            generic,
            entries: Vec::new(),
        }
    }

    /// Inserts an entry, keeping the name order.
    ///
    /// A second entry with an existing name is a format error: names are
    /// unique within one object.
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        match self
            .entries
            .binary_search_by(|e| e.name.as_str().cmp(&entry.name))
        {
            Ok(_) => Err(ParamError::Format(format!(
                "duplicate parameter `{}` in `{}`",
                entry.name, self.class_name
            ))),
            Err(pos) => {
                self.entries.insert(pos, entry);
                Ok(())
            }
        }
    }

    /// Looks an entry up by name.
    ///
    /// `entries` is public, so a record assembled by hand may be unsorted;
    /// a failed binary search falls back to a scan.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        match self
            .entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
        {
            Ok(i) => self.entries.get(i),
            Err(_) => self.entries.iter().find(|e| e.name == name),
        }
    }

    /// Restores name order in this record and every nested one.
    ///
    /// Decoders that take entries in file order call this so lookups and
    /// comparisons see the same tree as a freshly saved object. Duplicate
    /// names are a format error.
    pub fn normalize(&mut self) -> Result<()> {
        for mut entry in std::mem::take(&mut self.entries) {
            for item in &mut entry.value.items {
                match item {
                    Item::Plain(s) => s.normalize()?,
                    Item::String(chars) => {
                        for s in chars {
                            s.normalize()?;
                        }
                    }
                    Item::Sparse(features) => {
                        for f in features {
                            f.entry.normalize()?;
                        }
                    }
                }
            }
            self.insert(entry)?;
        }
        Ok(())
    }

    /// Compares two records field by field.
    pub fn approx_eq(&self, other: &Self, accuracy: f64) -> bool {
        self.class_name == other.class_name
            && self.generic == other.generic
            && self.entries.len() == other.entries.len()
            && self.entries.iter().zip(&other.entries).all(|(a, b)| {
                a.name == b.name && a.datatype == b.datatype && a.value.approx_eq(&b.value, accuracy)
            })
    }
}

/// A complete serialized file: the parameter version it was written at and
/// the root object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Parameter schema version of every record in the file.
    pub version: i32,
    /// The root object.
    pub root: Record,
}
