//! # sgobject
//!
//! The object model underneath a machine-learning toolbox: reference-counted
//! objects whose fields are described at run time, serialized to text, JSON
//! or binary, and loaded back across schema versions.
//!
//! ## Overview
//!
//! Algorithm classes in such a toolbox are long-lived and shared: a kernel
//! is referenced by several machines, a distance by a kernel, and a trained
//! model is saved to disk and read back by a later release in which some of
//! its fields were renamed or retyped. This crate provides the machinery all
//! of those classes rely on.
//!
//! ### Key Features
//!
//! *   **Managed objects:** [`Managed`] handles carry an intrusive reference
//!     count. The count starts at 1, every clone adds a reference and the
//!     object is destroyed with its last handle.
//! *   **Run-time reflection:** `#[derive(Parameterized)]` builds a sorted
//!     [`Parameter`] table of `(name, description, type)` descriptors with
//!     typed accessors. Saving, loading, deep cloning, field-wise comparison
//!     and hashing all run through it.
//! *   **Versioned migration:** a [`ParameterMap`] records how each parameter
//!     looked one version earlier. Files written by older versions are walked
//!     forward edge by edge; anything the map does not explain is an error,
//!     never a guess.
//! *   **Three back-ends:** a line-oriented ASCII format (read and write), a
//!     JSON writer and a checksummed binary codec. Files are read through a
//!     memory map.
//! *   **Containers:** [`SGVector`] and [`SGMatrix`] with shared buffers,
//!     strings, sparse vectors, n-dimensional arrays and [`DynArray`].
//! *   **Fibonacci heap:** [`FibonacciHeap`], the priority queue behind
//!     shortest-path and spanning-tree style algorithms.
//!
//! ## Architecture
//!
//! ### The Context
//!
//! There are no globals. A [`Context`] owns the current message sink
//! ([`Io`]), threading configuration ([`Parallel`]), version information
//! ([`Version`]) and the class registry used to instantiate nested objects
//! while loading. Every object captures its own references to the three
//! collaborators when it is created.
//!
//! ### The Record Model
//!
//! Saving converts an object into a [`Record`](value::Record): class name,
//! generic tag and one typed entry per parameter, nested objects as nested
//! records. Loading is two-pass: a reader parses the bytes into a
//! [`Document`](value::Document), then every live parameter is resolved by
//! name, migrated, validated and assigned. Entry order on disk does not
//! matter and unknown entries are ignored.
//!
//! ## Usage Patterns
//!
//! ### Save and Load
//!
//! ```rust
//! use sgobject::{Context, Managed, Parameterized, SGVector, Serializer};
//!
//! #[derive(Default, Parameterized)]
//! struct Perceptron {
//!     /// Learning rate.
//!     rate: f64,
//!     /// Training epochs.
//!     epochs: i32,
//!     weights: SGVector<f64>,
//! }
//!
//! # fn main() -> sgobject::Result<()> {
//! let ctx = Context::new();
//! ctx.register::<Perceptron>();
//!
//! let model = Managed::new(
//!     &ctx,
//!     Perceptron {
//!         rate: 0.1,
//!         epochs: 10,
//!         weights: SGVector::from_vec(vec![1.0, 2.0, 3.0]),
//!     },
//! );
//!
//! let mut text = Vec::new();
//! Serializer::write(&mut text, &model)?;
//!
//! let loaded = Serializer::load_bytes(&text, &ctx)?.downcast::<Perceptron>()?;
//! assert_eq!(loaded.read()?.epochs, 10);
//! assert!(model.equals(&loaded, 1e-12)?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Migrating Old Files
//!
//! ```rust
//! use sgobject::datatype::{ContainerType, ParamInfo, PrimitiveType, StructType};
//! use sgobject::{Context, Managed, ParameterMap, Parameterized, Serializer};
//!
//! // Version 0 stored `threshold` as an int32 called `cutoff`.
//! #[derive(Default, Parameterized)]
//! #[sgobject(name = "Filter", migrations = filter_migrations)]
//! struct Filter {
//!     threshold: f64,
//! }
//!
//! fn filter_migrations(map: &mut ParameterMap) {
//!     let info = |name: &str, ptype, version| {
//!         ParamInfo::new(name, ContainerType::Scalar, StructType::None, ptype, version)
//!     };
//!     map.put(
//!         info("threshold", PrimitiveType::Float64, 1),
//!         info("cutoff", PrimitiveType::Int32, 0),
//!     );
//! }
//!
//! # fn main() -> sgobject::Result<()> {
//! let ctx = Context::new();
//! ctx.register::<Filter>();
//! let old = b"_SGOBJECT_SERIALIZABLE_ASCII_FILE_V_00_\nversion 0\nFilter [ cutoff int32 3 ]\n";
//!
//! let filter = Serializer::builder()
//!     .version(1)
//!     .load_bytes(old, &ctx)?
//!     .downcast::<Filter>()?;
//! assert_eq!(filter.read()?.threshold, 3.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` block maps input files in
//!   [`io`].
//! * **No Panics:** no `unwrap()` or `panic!()` in the library (enforced by
//!   clippy lints).
//! * **Comprehensive Errors:** every failure is a [`ParamError`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// The derive emits `::sgobject::...` paths; this lets it work inside the crate too.
extern crate self as sgobject;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod ascii;
pub mod binary;
pub mod containers;
pub mod datatype;
pub mod error;
pub mod field;
pub mod format;
pub mod heap;
pub mod inspector;
pub mod json;
pub mod migration;
pub mod object;
pub mod parameter;
pub mod reader;
pub mod refcount;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod io;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

pub use api::{Serializer, SerializerBuilder};
pub use containers::{DynArray, SGMatrix, SGNDArray, SGSparseVector, SGSparseVectorEntry, SGString, SGVector};
pub use datatype::{DataType, ParamInfo};
pub use error::{ParamError, Result};
pub use field::{Element, FloatMax, Loader, ParamField, ParamItem};
pub use format::FileFormat;
pub use heap::FibonacciHeap;
pub use inspector::Inspector;
pub use migration::{ParameterMap, SchemaChange};
pub use object::{Context, HouseKeeper, Io, Managed, MessageLevel, ObjectKind, Parallel, Parameterized, RefValue, SGObject, Version};
pub use parameter::{Lens, Parameter, TParameter};
pub use refcount::RefCount;

// Re-export the derive macro so it is accessible as `sgobject::Parameterized`
pub use sgobject_derive::Parameterized;

/// Constants used throughout the library.
pub mod constants {
    /// The default buffer size for I/O operations.
    pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
}
