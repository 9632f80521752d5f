//! Type descriptors for registered parameters.
//!
//! A [`DataType`] is the product of a container shape, a struct kind and a
//! primitive element type. Its textual form (`Vector<int32>`,
//! `SGMatrix<float64>`, `Vector<String<char>>`, ...) is what the ASCII format
//! writes after every parameter name, so [`DataType::parse`] must accept
//! everything [`fmt::Display`] produces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ParamError, Result};

/// Outer shape of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContainerType {
    /// A single element.
    Scalar,
    /// A plain vector whose length lives next to it.
    Vector,
    /// A plain column-major matrix with separately tracked dimensions.
    Matrix,
    /// A reference-counted [`SGVector`](crate::containers::SGVector).
    SGVector,
    /// A reference-counted [`SGMatrix`](crate::containers::SGMatrix).
    SGMatrix,
    /// An n-dimensional array.
    NDArray,
}

/// Per-element structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructType {
    /// The element is a primitive.
    None,
    /// The element is a string (variable-length run of primitives).
    String,
    /// The element is a sparse vector of feature-indexed primitives.
    Sparse,
}

/// The primitive element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `i8`
    Int8,
    /// `u8`
    UInt8,
    /// `i16`
    Int16,
    /// `u16`
    UInt16,
    /// `i32`
    Int32,
    /// `u32`
    UInt32,
    /// `i64`
    Int64,
    /// `u64`
    UInt64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// Widest float, stored as `f64`.
    FloatMax,
    /// Complex number with two `f64` parts.
    Complex128,
    /// A nested managed object.
    SGObject,
}

impl PrimitiveType {
    /// All primitive kinds in declaration order.
    pub const ALL: [PrimitiveType; 15] = [
        Self::Bool,
        Self::Char,
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::FloatMax,
        Self::Complex128,
        Self::SGObject,
    ];

    /// The name used in type strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::FloatMax => "floatmax",
            Self::Complex128 => "complex128",
            Self::SGObject => "SGSerializable*",
        }
    }

    /// Parses a primitive name produced by [`PrimitiveType::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Stable integer used by the JSON writer's `generic` field.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Returns the primitive for a stable index.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// True for the integer kinds (including `char` and `bool`).
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Char
                | Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }

    /// True for the floating point kinds.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64 | Self::FloatMax)
    }

    /// Bit width used to classify a primitive change as widening or narrowing.
    pub fn width(self) -> u32 {
        match self {
            Self::Bool => 1,
            Self::Char => 32,
            Self::Int8 | Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Int32 | Self::UInt32 | Self::Float32 => 32,
            Self::Int64 | Self::UInt64 | Self::Float64 => 64,
            Self::FloatMax => 80,
            Self::Complex128 => 128,
            Self::SGObject => 0,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type descriptor of one parameter (`TSGDataType`).
///
/// Lengths are not part of the descriptor; they travel with the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataType {
    /// Outer container shape.
    pub ctype: ContainerType,
    /// Element structure.
    pub stype: StructType,
    /// Primitive element kind.
    pub ptype: PrimitiveType,
}

impl DataType {
    /// Creates a descriptor.
    pub const fn new(ctype: ContainerType, stype: StructType, ptype: PrimitiveType) -> Self {
        Self {
            ctype,
            stype,
            ptype,
        }
    }

    /// A scalar of the given primitive.
    pub const fn scalar(ptype: PrimitiveType) -> Self {
        Self::new(ContainerType::Scalar, StructType::None, ptype)
    }

    /// Same descriptor with another primitive.
    pub fn with_ptype(self, ptype: PrimitiveType) -> Self {
        Self { ptype, ..self }
    }

    /// Same descriptor with another container.
    pub fn with_ctype(self, ctype: ContainerType) -> Self {
        Self { ctype, ..self }
    }

    /// Parses the textual form written by the ASCII serializer.
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || ParamError::Format(format!("invalid type string `{s}`"));

        let (ctype, inner) = match split_generic(s) {
            Some(("Vector", inner)) => (ContainerType::Vector, inner),
            Some(("Matrix", inner)) => (ContainerType::Matrix, inner),
            Some(("SGVector", inner)) => (ContainerType::SGVector, inner),
            Some(("SGMatrix", inner)) => (ContainerType::SGMatrix, inner),
            Some(("NDArray", inner)) => (ContainerType::NDArray, inner),
            _ => (ContainerType::Scalar, s),
        };

        let (stype, prim) = match split_generic(inner) {
            Some(("String", prim)) => (StructType::String, prim),
            Some(("Sparse", prim)) => (StructType::Sparse, prim),
            Some(_) => return Err(bad()),
            None => (StructType::None, inner),
        };

        let ptype = PrimitiveType::from_name(prim).ok_or_else(bad)?;
        Ok(Self::new(ctype, stype, ptype))
    }
}

fn split_generic(s: &str) -> Option<(&str, &str)> {
    let open = s.find('<')?;
    let inner = s.get(open + 1..)?.strip_suffix('>')?;
    Some((&s[..open], inner))
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elem = match self.stype {
            StructType::None => self.ptype.as_str().to_string(),
            StructType::String => format!("String<{}>", self.ptype),
            StructType::Sparse => format!("Sparse<{}>", self.ptype),
        };
        match self.ctype {
            ContainerType::Scalar => f.write_str(&elem),
            ContainerType::Vector => write!(f, "Vector<{elem}>"),
            ContainerType::Matrix => write!(f, "Matrix<{elem}>"),
            ContainerType::SGVector => write!(f, "SGVector<{elem}>"),
            ContainerType::SGMatrix => write!(f, "SGMatrix<{elem}>"),
            ContainerType::NDArray => write!(f, "NDArray<{elem}>"),
        }
    }
}

/// Identifies one parameter at one schema version (`SGParamInfo`).
///
/// Version `-1` means "no version" and is the predecessor of version `0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamInfo {
    /// Parameter name.
    pub name: String,
    /// Container shape.
    pub ctype: ContainerType,
    /// Element structure.
    pub stype: StructType,
    /// Primitive kind.
    pub ptype: PrimitiveType,
    /// Schema version.
    pub version: i32,
}

impl ParamInfo {
    /// Creates an info.
    pub fn new(
        name: impl Into<String>,
        ctype: ContainerType,
        stype: StructType,
        ptype: PrimitiveType,
        version: i32,
    ) -> Self {
        Self {
            name: name.into(),
            ctype,
            stype,
            ptype,
            version,
        }
    }

    /// Creates an info from a name, a descriptor and a version.
    pub fn from_datatype(name: impl Into<String>, datatype: DataType, version: i32) -> Self {
        Self::new(name, datatype.ctype, datatype.stype, datatype.ptype, version)
    }

    /// The descriptor part of this info.
    pub fn datatype(&self) -> DataType {
        DataType::new(self.ctype, self.stype, self.ptype)
    }

    /// The same parameter one version earlier, assuming nothing changed.
    pub fn previous(&self) -> Self {
        Self {
            version: self.version - 1,
            ..self.clone()
        }
    }
}

impl fmt::Display for ParamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (version {})", self.name, self.datatype(), self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_strings_parse_back() {
        let samples = [
            DataType::scalar(PrimitiveType::Int32),
            DataType::new(ContainerType::Vector, StructType::String, PrimitiveType::Char),
            DataType::new(ContainerType::SGMatrix, StructType::None, PrimitiveType::Float64),
            DataType::new(ContainerType::Scalar, StructType::Sparse, PrimitiveType::Float32),
            DataType::new(ContainerType::NDArray, StructType::None, PrimitiveType::Complex128),
            DataType::scalar(PrimitiveType::SGObject),
        ];
        for dt in samples {
            assert_eq!(DataType::parse(&dt.to_string()).ok(), Some(dt));
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(DataType::parse("Vector<int128>").is_err());
        assert!(DataType::parse("Tree<int32>").is_err());
    }

    #[test]
    fn descriptors_differ_by_each_component() {
        let base = DataType::scalar(PrimitiveType::Int32);
        assert_ne!(base, base.with_ptype(PrimitiveType::Int64));
        assert_ne!(base, base.with_ctype(ContainerType::Vector));
        assert_ne!(
            base,
            DataType::new(ContainerType::Scalar, StructType::String, PrimitiveType::Int32)
        );
    }

    #[test]
    fn previous_version_keeps_everything_else() {
        let info = ParamInfo::new("number", ContainerType::Scalar, StructType::None, PrimitiveType::Int8, 0);
        let prev = info.previous();
        assert_eq!(prev.version, -1);
        assert_eq!(prev.datatype(), info.datatype());
    }
}
