//! Conversions between Rust field types and the generic [`Value`] tree.
//!
//! Three layers:
//!
//! * [`Element`]: one primitive (`i32`, `f64`, `char`, [`Complex64`], an
//!   optional object handle, ...).
//! * [`ParamItem`]: one container element; a plain element, an
//!   [`SGString`] or an [`SGSparseVector`].
//! * [`ParamField`]: a whole registered field; an item, or a `Vec`,
//!   [`SGVector`], [`SGMatrix`] or [`SGNDArray`] of items.

use num_complex::Complex64;

use crate::containers::{SGMatrix, SGNDArray, SGSparseVector, SGSparseVectorEntry, SGString, SGVector};
use crate::datatype::{ContainerType, DataType, PrimitiveType, StructType};
use crate::error::{ParamError, Result};
use crate::object::{Context, Managed, ObjectKind, SGObject};
use crate::value::{Item, Record, Scalar, Shape, SparseEntry, Value};

/// Everything needed to turn records back into objects.
#[derive(Debug, Clone, Copy)]
pub struct Loader<'a> {
    context: &'a Context,
    file_version: i32,
    current_version: i32,
}

impl<'a> Loader<'a> {
    /// Creates a loader for records written at `file_version`, producing
    /// objects at `current_version`.
    pub fn new(context: &'a Context, file_version: i32, current_version: i32) -> Self {
        Self {
            context,
            file_version,
            current_version,
        }
    }

    /// The context nested objects are created in.
    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// Parameter version of the records.
    pub fn file_version(&self) -> i32 {
        self.file_version
    }

    /// Parameter version of the live classes.
    pub fn current_version(&self) -> i32 {
        self.current_version
    }

    /// Creates the class named by `record` and loads the record into it.
    pub fn instantiate(&self, record: &Record) -> Result<Managed<dyn SGObject>> {
        let object = self.context.create(&record.class_name, record.generic)?;
        object.write()?.load_record(record, self)?;
        Ok(object)
    }
}

fn mismatch(expected: impl std::fmt::Display, found: impl std::fmt::Debug) -> ParamError {
    ParamError::InvalidParameter(format!("expected {expected}, found {found:?}"))
}

/// One primitive element.
pub trait Element: Clone + Send + Sync + 'static {
    /// Primitive kind written to files.
    const PTYPE: PrimitiveType;

    /// Converts to a scalar.
    fn to_scalar(&self) -> Result<Scalar>;

    /// Converts back from a scalar of kind [`Element::PTYPE`].
    fn from_scalar(scalar: Scalar, loader: &Loader<'_>) -> Result<Self>;
}

macro_rules! impl_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const PTYPE: PrimitiveType = PrimitiveType::$variant;

                fn to_scalar(&self) -> Result<Scalar> {
                    Ok(Scalar::$variant(*self))
                }

                fn from_scalar(scalar: Scalar, _loader: &Loader<'_>) -> Result<Self> {
                    match scalar {
                        Scalar::$variant(v) => Ok(v),
                        other => Err(mismatch(<Self as Element>::PTYPE, other)),
                    }
                }
            }
        )*
    };
}

impl_element!(
    bool => Bool,
    char => Char,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Complex64 => Complex128,
);

/// The widest floating point kind, stored as `f64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct FloatMax(pub f64);

impl Element for FloatMax {
    const PTYPE: PrimitiveType = PrimitiveType::FloatMax;

    fn to_scalar(&self) -> Result<Scalar> {
        Ok(Scalar::FloatMax(self.0))
    }

    fn from_scalar(scalar: Scalar, _loader: &Loader<'_>) -> Result<Self> {
        match scalar {
            Scalar::FloatMax(v) => Ok(Self(v)),
            other => Err(mismatch(<Self as Element>::PTYPE, other)),
        }
    }
}

impl<C: ObjectKind + ?Sized> Element for Option<Managed<C>> {
    const PTYPE: PrimitiveType = PrimitiveType::SGObject;

    fn to_scalar(&self) -> Result<Scalar> {
        Ok(Scalar::Object(match self {
            Some(object) => Some(Box::new(object.to_record()?)),
            None => None,
        }))
    }

    fn from_scalar(scalar: Scalar, loader: &Loader<'_>) -> Result<Self> {
        match scalar {
            Scalar::Object(None) => Ok(None),
            Scalar::Object(Some(record)) => C::from_object(loader.instantiate(&record)?).map(Some),
            other => Err(mismatch(<Self as Element>::PTYPE, other)),
        }
    }
}

/// One container element.
pub trait ParamItem: Clone + Send + Sync + 'static {
    /// Struct kind of the element.
    const STYPE: StructType;
    /// Primitive kind inside the element.
    const PTYPE: PrimitiveType;

    /// Converts to an item.
    fn to_item(&self) -> Result<Item>;

    /// Converts back from an item.
    fn from_item(item: Item, loader: &Loader<'_>) -> Result<Self>;
}

impl<E: Element> ParamItem for E {
    const STYPE: StructType = StructType::None;
    const PTYPE: PrimitiveType = E::PTYPE;

    fn to_item(&self) -> Result<Item> {
        self.to_scalar().map(Item::Plain)
    }

    fn from_item(item: Item, loader: &Loader<'_>) -> Result<Self> {
        match item {
            Item::Plain(s) => E::from_scalar(s, loader),
            other => Err(mismatch("a plain element", other.stype())),
        }
    }
}

impl<E: Element> ParamItem for SGString<E> {
    const STYPE: StructType = StructType::String;
    const PTYPE: PrimitiveType = E::PTYPE;

    fn to_item(&self) -> Result<Item> {
        self.iter()
            .map(Element::to_scalar)
            .collect::<Result<_>>()
            .map(Item::String)
    }

    fn from_item(item: Item, loader: &Loader<'_>) -> Result<Self> {
        match item {
            Item::String(chars) => chars
                .into_iter()
                .map(|s| E::from_scalar(s, loader))
                .collect::<Result<_>>()
                .map(SGString::from_vec),
            other => Err(mismatch("a string", other.stype())),
        }
    }
}

impl<E: Element> ParamItem for SGSparseVector<E> {
    const STYPE: StructType = StructType::Sparse;
    const PTYPE: PrimitiveType = E::PTYPE;

    fn to_item(&self) -> Result<Item> {
        self.features()
            .iter()
            .map(|f| {
                Ok(SparseEntry {
                    feat_index: f.feat_index,
                    entry: f.entry.to_scalar()?,
                })
            })
            .collect::<Result<_>>()
            .map(Item::Sparse)
    }

    fn from_item(item: Item, loader: &Loader<'_>) -> Result<Self> {
        match item {
            Item::Sparse(entries) => entries
                .into_iter()
                .map(|e| {
                    Ok(SGSparseVectorEntry {
                        feat_index: e.feat_index,
                        entry: E::from_scalar(e.entry, loader)?,
                    })
                })
                .collect::<Result<_>>()
                .map(SGSparseVector::from_entries),
            other => Err(mismatch("a sparse vector", other.stype())),
        }
    }
}

/// A field that can be registered with a [`Parameter`](crate::Parameter) table.
pub trait ParamField: Clone + Send + Sync + 'static {
    /// Type descriptor written next to the value.
    fn datatype() -> DataType;

    /// Captures the field.
    fn to_value(&self) -> Result<Value>;

    /// Rebuilds the field from a value matching [`ParamField::datatype`].
    fn from_value(value: Value, loader: &Loader<'_>) -> Result<Self>;
}

fn items_of<I: ParamItem>(items: &[I]) -> Result<Vec<Item>> {
    items.iter().map(ParamItem::to_item).collect()
}

pub(crate) fn items_into<I: ParamItem>(items: Vec<Item>, loader: &Loader<'_>) -> Result<Vec<I>> {
    items.into_iter().map(|i| I::from_item(i, loader)).collect()
}

fn container_of<I: ParamItem>(ctype: ContainerType) -> DataType {
    DataType::new(ctype, I::STYPE, I::PTYPE)
}

impl<I: ParamItem> ParamField for I {
    fn datatype() -> DataType {
        container_of::<I>(ContainerType::Scalar)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value {
            shape: Shape::Scalar,
            items: vec![self.to_item()?],
        })
    }

    fn from_value(value: Value, loader: &Loader<'_>) -> Result<Self> {
        match (value.shape, value.items.len()) {
            (Shape::Scalar, 1) => value
                .items
                .into_iter()
                .next()
                .ok_or_else(|| ParamError::Internal("scalar without element".into()))
                .and_then(|item| I::from_item(item, loader)),
            (shape, _) => Err(mismatch("a scalar", shape)),
        }
    }
}

impl<I: ParamItem> ParamField for Vec<I> {
    fn datatype() -> DataType {
        container_of::<I>(ContainerType::Vector)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::vector(items_of(self)?))
    }

    fn from_value(value: Value, loader: &Loader<'_>) -> Result<Self> {
        match value.shape {
            Shape::Vector(len) if len == value.items.len() => items_into(value.items, loader),
            shape => Err(mismatch("a vector", shape)),
        }
    }
}

impl<I: ParamItem> ParamField for SGVector<I> {
    fn datatype() -> DataType {
        container_of::<I>(ContainerType::SGVector)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::vector(items_of::<I>(&self.read())?))
    }

    fn from_value(value: Value, loader: &Loader<'_>) -> Result<Self> {
        match value.shape {
            Shape::Vector(len) if len == value.items.len() => {
                items_into(value.items, loader).map(SGVector::from_vec)
            }
            shape => Err(mismatch("a vector", shape)),
        }
    }
}

impl<I: ParamItem> ParamField for SGMatrix<I> {
    fn datatype() -> DataType {
        container_of::<I>(ContainerType::SGMatrix)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value {
            shape: Shape::Matrix {
                rows: self.num_rows(),
                cols: self.num_cols(),
            },
            items: items_of::<I>(&self.read())?,
        })
    }

    fn from_value(value: Value, loader: &Loader<'_>) -> Result<Self> {
        match value.shape {
            Shape::Matrix { rows, cols } => {
                SGMatrix::from_vec(items_into(value.items, loader)?, rows, cols)
            }
            shape => Err(mismatch("a matrix", shape)),
        }
    }
}

impl<I: ParamItem> ParamField for SGNDArray<I> {
    fn datatype() -> DataType {
        container_of::<I>(ContainerType::NDArray)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value {
            shape: Shape::NDArray(self.dims().to_vec()),
            items: items_of(self.as_slice())?,
        })
    }

    fn from_value(value: Value, loader: &Loader<'_>) -> Result<Self> {
        match value.shape {
            Shape::NDArray(dims) => SGNDArray::from_vec(items_into(value.items, loader)?, dims),
            shape => Err(mismatch("an n-d array", shape)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_follow_the_rust_type() {
        assert_eq!(<i32 as ParamField>::datatype().to_string(), "int32");
        assert_eq!(<Vec<f64> as ParamField>::datatype().to_string(), "Vector<float64>");
        assert_eq!(
            <Vec<SGString<char>> as ParamField>::datatype().to_string(),
            "Vector<String<char>>"
        );
        assert_eq!(
            <SGMatrix<FloatMax> as ParamField>::datatype().to_string(),
            "SGMatrix<floatmax>"
        );
        assert_eq!(
            <SGSparseVector<f32> as ParamField>::datatype().to_string(),
            "Sparse<float32>"
        );
        assert_eq!(
            <Option<Managed<dyn SGObject>> as ParamField>::datatype().to_string(),
            "SGSerializable*"
        );
    }

    #[test]
    fn values_convert_back() -> Result<()> {
        let ctx = Context::new();
        let loader = Loader::new(&ctx, 0, 0);
        let m = SGMatrix::from_vec(vec![1u16, 2, 3, 4, 5, 6], 3, 2)?;
        let back = SGMatrix::<u16>::from_value(m.to_value()?, &loader)?;
        assert_eq!(back, m);

        let s = SGString::from("hi");
        assert_eq!(SGString::<char>::from_value(s.to_value()?, &loader)?, s);
        Ok(())
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let ctx = Context::new();
        let loader = Loader::new(&ctx, 0, 0);
        let v = Value::vector(vec![Item::Plain(Scalar::Int32(1))]);
        assert!(i32::from_value(v, &loader).is_err());
        assert!(Vec::<i64>::from_value(Value::scalar(Scalar::Int32(1)), &loader).is_err());
    }
}
