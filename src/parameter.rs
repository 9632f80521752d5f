//! Run-time field reflection.
//!
//! A [`Parameter`] table lists the registered fields of one class, sorted by
//! name. Each entry pairs a [`TParameter`] descriptor with typed accessors
//! built from plain function pointers, so the table never holds pointers into
//! a particular instance and can be rebuilt on demand.
//!
//! ```rust
//! use sgobject::{Parameter, Result};
//!
//! #[derive(Default)]
//! struct Kernel {
//!     width: f64,
//!     degree: i32,
//!     weights: Vec<f64>,
//! }
//!
//! # fn main() -> Result<()> {
//! let mut params = Parameter::<Kernel>::new();
//! params.add("width", "kernel width", |k| &k.width, |k| &mut k.width)?;
//! params.add("degree", "polynomial degree", |k| &k.degree, |k| &mut k.degree)?;
//! params.add_vector("weights", "per-feature weights", |k| &k.weights, |k| &mut k.weights)?;
//!
//! let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
//! assert_eq!(names, ["degree", "weights", "width"]);
//! assert!(params.add("width", "again", |k| &k.width, |k| &mut k.width).is_err());
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering;
use std::fmt;

use tracing::trace;

use crate::containers::DynArray;
use crate::datatype::{ContainerType, DataType, ParamInfo, PrimitiveType};
use crate::error::{ParamError, Result};
use crate::field::{items_into, Loader, ParamField, ParamItem};
use crate::migration::ParameterMap;
use crate::object::Parameterized;
use crate::value::{element_count, Entry, Record, Shape, Value};

/// Descriptor of one registered field.
///
/// Ordering and equality consider the name first, then the type; the
/// description is informational only.
#[derive(Debug, Clone)]
pub struct TParameter {
    /// Unique name within the object.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Type descriptor.
    pub datatype: DataType,
}

impl TParameter {
    /// The descriptor as a versioned info.
    pub fn info(&self, version: i32) -> ParamInfo {
        ParamInfo::from_datatype(self.name.clone(), self.datatype, version)
    }
}

impl PartialEq for TParameter {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TParameter {}

impl PartialOrd for TParameter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TParameter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.datatype.cmp(&other.datatype))
    }
}

/// Paired shared and mutable accessors for one field of `T`.
pub struct Lens<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> Lens<T, F> {
    /// Creates a lens.
    pub fn new(get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self {
        Self { get, get_mut }
    }
}

impl<T, F> Clone for Lens<T, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, F> Copy for Lens<T, F> {}

type Getter<T> = Box<dyn Fn(&T) -> Result<Value> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Value, &Loader<'_>) -> Result<()> + Send + Sync>;
type Copier<T> = Box<dyn Fn(&mut T, &T) + Send + Sync>;

struct Descriptor<T> {
    param: TParameter,
    get: Getter<T>,
    set: Setter<T>,
    copy: Copier<T>,
}

/// The sorted field table of one class.
pub struct Parameter<T> {
    entries: Vec<Descriptor<T>>,
}

impl<T: 'static> Default for Parameter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Parameter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Parameterized> Parameter<T> {
    /// The table of a [`Parameterized`] class.
    pub fn build() -> Result<Self> {
        let mut params = Self::new();
        T::register(&mut params)?;
        Ok(params)
    }
}

impl<T: 'static> Parameter<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, descriptor: Descriptor<T>) -> Result<()> {
        let name = &descriptor.param.name;
        match self
            .entries
            .binary_search_by(|d| d.param.name.as_str().cmp(name))
        {
            Ok(_) => Err(ParamError::InvalidParameter(format!(
                "parameter `{name}` registered twice"
            ))),
            Err(pos) => {
                trace!(name = %name, datatype = %descriptor.param.datatype, "parameter registered");
                self.entries.insert(pos, descriptor);
                Ok(())
            }
        }
    }

    /// Registers a field.
    ///
    /// Any [`ParamField`] works: primitives, optional object handles,
    /// strings, sparse vectors and the container types. A `Vec` field
    /// registered here behaves exactly like one passed to
    /// [`Parameter::add_vector`].
    pub fn add<F: ParamField>(
        &mut self,
        name: &str,
        description: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Result<()> {
        self.insert(Descriptor {
            param: TParameter {
                name: name.to_string(),
                description: description.to_string(),
                datatype: F::datatype(),
            },
            get: Box::new(move |obj: &T| get(obj).to_value()),
            set: Box::new(move |obj: &mut T, value: Value, loader: &Loader<'_>| {
                *get_mut(obj) = F::from_value(value, loader)?;
                Ok(())
            }),
            copy: Box::new(move |dst: &mut T, src: &T| *get_mut(dst) = get(src).clone()),
        })
    }

    /// Registers a growable vector field. Its length is read from the `Vec`
    /// every time the object is saved.
    pub fn add_vector<I: ParamItem>(
        &mut self,
        name: &str,
        description: &str,
        get: fn(&T) -> &Vec<I>,
        get_mut: fn(&mut T) -> &mut Vec<I>,
    ) -> Result<()> {
        self.add(name, description, get, get_mut)
    }

    /// Registers a column-major matrix stored as a flat `Vec` with its
    /// dimensions in two separate fields.
    ///
    /// Saving fails when the buffer length disagrees with `rows * cols`;
    /// loading assigns the buffer and both dimensions together.
    pub fn add_matrix<I: ParamItem>(
        &mut self,
        name: &str,
        description: &str,
        data: Lens<T, Vec<I>>,
        rows: Lens<T, usize>,
        cols: Lens<T, usize>,
    ) -> Result<()> {
        let field = name.to_string();
        self.insert(Descriptor {
            param: TParameter {
                name: name.to_string(),
                description: description.to_string(),
                datatype: DataType::new(ContainerType::Matrix, I::STYPE, I::PTYPE),
            },
            get: Box::new(move |obj: &T| {
                let (r, c) = (*(rows.get)(obj), *(cols.get)(obj));
                let items = (data.get)(obj);
                if r.checked_mul(c) != Some(items.len()) {
                    return Err(ParamError::InvalidParameter(format!(
                        "matrix `{field}` is {r}x{c} but holds {} elements",
                        items.len()
                    )));
                }
                Ok(Value {
                    shape: Shape::Matrix { rows: r, cols: c },
                    items: items.iter().map(ParamItem::to_item).collect::<Result<_>>()?,
                })
            }),
            set: Box::new(move |obj: &mut T, value: Value, loader: &Loader<'_>| match value.shape {
                Shape::Matrix { rows: r, cols: c }
                    if element_count(&[r, c])? == value.items.len() =>
                {
                    *(data.get_mut)(obj) = items_into(value.items, loader)?;
                    *(rows.get_mut)(obj) = r;
                    *(cols.get_mut)(obj) = c;
                    Ok(())
                }
                shape => Err(ParamError::InvalidParameter(format!(
                    "expected a matrix, found {shape:?} with {} elements",
                    value.items.len()
                ))),
            }),
            copy: Box::new(move |dst: &mut T, src: &T| {
                *(data.get_mut)(dst) = (data.get)(src).clone();
                *(rows.get_mut)(dst) = *(rows.get)(src);
                *(cols.get_mut)(dst) = *(cols.get)(src);
            }),
        })
    }

    /// Number of registered fields.
    pub fn get_num_parameters(&self) -> usize {
        self.entries.len()
    }

    /// Descriptor at position `index` in name order.
    pub fn get_parameter(&self, index: usize) -> Option<&TParameter> {
        self.entries.get(index).map(|d| &d.param)
    }

    /// True when a field called `name` is registered.
    pub fn contains_parameter(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Descriptor of the field called `name`.
    pub fn find(&self, name: &str) -> Option<&TParameter> {
        self.position(name).and_then(|i| self.get_parameter(i))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .binary_search_by(|d| d.param.name.as_str().cmp(name))
            .ok()
    }

    /// Iterates over the descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TParameter> + '_ {
        self.entries.iter().map(|d| &d.param)
    }

    /// Copies every registered field from `source` into `target`.
    ///
    /// Object handles are shared (a new reference), not deep-copied.
    pub fn set_from_parameters(&self, target: &mut T, source: &T) {
        for d in &self.entries {
            (d.copy)(target, source);
        }
    }

    /// Captures all fields of `obj` as a record.
    pub fn to_record(
        &self,
        obj: &T,
        class_name: &str,
        generic: Option<PrimitiveType>,
    ) -> Result<Record> {
        let mut record = Record::new(class_name, generic);
        record.entries.reserve(self.entries.len());
        for d in &self.entries {
            // Descriptors are name-sorted, so pushing keeps the record sorted.
            record.entries.push(Entry {
                name: d.param.name.clone(),
                datatype: d.param.datatype,
                value: (d.get)(obj)?,
            });
        }
        Ok(record)
    }

    /// Reads the entry of every registered field from a record written at
    /// `file_version`, migrating each one to `current_version` through `map`.
    ///
    /// The result holds one entry per registered field, sorted by name and
    /// already validated against the live type. Entries in the record that
    /// no field asks for are ignored; a field without a usable entry fails
    /// the whole read.
    pub fn load_all_file_parameters(
        &self,
        file_version: i32,
        current_version: i32,
        record: &Record,
        map: &ParameterMap,
    ) -> Result<DynArray<Entry>> {
        let mut loaded = DynArray::new();
        for d in &self.entries {
            let live = d.param.info(current_version);
            let entry = map.migrate(&live, file_version, record)?;
            entry.value.validate(&d.param.datatype)?;
            loaded.append_element(entry);
        }
        Ok(loaded)
    }

    /// Assigns migrated entries to `obj`.
    pub fn apply(&self, obj: &mut T, entries: &DynArray<Entry>, loader: &Loader<'_>) -> Result<()> {
        let entries = entries.get_array();
        for d in &self.entries {
            let entry = entries
                .binary_search_by(|e| e.name.as_str().cmp(&d.param.name))
                .ok()
                .and_then(|i| entries.get(i))
                .ok_or_else(|| {
                    ParamError::InvalidParameter(format!("no value for parameter `{}`", d.param.name))
                })?;
            if entry.datatype != d.param.datatype {
                return Err(ParamError::InvalidParameter(format!(
                    "parameter `{}` expects {}, got {}",
                    d.param.name, d.param.datatype, entry.datatype
                )));
            }
            (d.set)(obj, entry.value.clone(), loader)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::StructType;
    use crate::object::Context;

    #[derive(Default)]
    struct Grid {
        step: f32,
        cells: Vec<i32>,
        rows: usize,
        cols: usize,
    }

    fn table() -> Result<Parameter<Grid>> {
        let mut params = Parameter::<Grid>::new();
        params.add("step", "step size", |g| &g.step, |g| &mut g.step)?;
        params.add_matrix(
            "cells",
            "",
            Lens::<Grid, Vec<i32>>::new(|g| &g.cells, |g| &mut g.cells),
            Lens::<Grid, usize>::new(|g| &g.rows, |g| &mut g.rows),
            Lens::<Grid, usize>::new(|g| &g.cols, |g| &mut g.cols),
        )?;
        Ok(params)
    }

    #[test]
    fn lookups_by_name_and_position() -> Result<()> {
        let params = table()?;
        assert_eq!(params.get_num_parameters(), 2);
        assert_eq!(params.get_parameter(0).map(|p| p.name.as_str()), Some("cells"));
        assert!(params.contains_parameter("step"));
        assert!(!params.contains_parameter("stride"));
        assert_eq!(
            params.find("cells").map(|p| p.datatype.to_string()),
            Some("Matrix<int32>".to_string())
        );
        Ok(())
    }

    #[test]
    fn matrix_dimensions_must_match_the_buffer() -> Result<()> {
        let params = table()?;
        let bad = Grid {
            cells: vec![1, 2, 3],
            rows: 2,
            cols: 2,
            ..Grid::default()
        };
        assert!(matches!(
            params.to_record(&bad, "Grid", None),
            Err(ParamError::InvalidParameter(_))
        ));
        Ok(())
    }

    #[test]
    fn record_round_trip_and_copy() -> Result<()> {
        let params = table()?;
        let source = Grid {
            step: 0.5,
            cells: vec![1, 2, 3, 4, 5, 6],
            rows: 3,
            cols: 2,
        };
        let record = params.to_record(&source, "Grid", None)?;

        let ctx = Context::new();
        let loader = Loader::new(&ctx, 0, 0);
        let mut map = ParameterMap::new();
        map.finalize_map()?;
        let entries = params.load_all_file_parameters(0, 0, &record, &map)?;
        let mut loaded = Grid::default();
        params.apply(&mut loaded, &entries, &loader)?;
        assert_eq!((loaded.rows, loaded.cols), (3, 2));
        assert_eq!(loaded.cells, source.cells);

        let mut copy = Grid::default();
        params.set_from_parameters(&mut copy, &source);
        assert_eq!(copy.step, 0.5);
        assert_eq!(copy.cells.len(), 6);
        Ok(())
    }

    #[test]
    fn overflowing_matrix_dimensions_fail_to_apply() -> Result<()> {
        let params = table()?;
        let huge = 1usize << (usize::BITS / 2);
        let mut entries = DynArray::new();
        entries.append_element(Entry {
            name: "cells".into(),
            datatype: DataType::new(ContainerType::Matrix, StructType::None, PrimitiveType::Int32),
            value: Value {
                shape: Shape::Matrix { rows: huge, cols: huge },
                items: Vec::new(),
            },
        });

        let ctx = Context::new();
        let loader = Loader::new(&ctx, 0, 0);
        let mut grid = Grid::default();
        assert!(matches!(
            params.apply(&mut grid, &entries, &loader),
            Err(ParamError::Format(_))
        ));
        assert_eq!((grid.rows, grid.cols), (0, 0));
        Ok(())
    }
}
