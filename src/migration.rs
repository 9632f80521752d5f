//! Versioned parameter schema migration.
//!
//! A [`ParameterMap`] is a set of edges `target -> source`, each describing
//! how one parameter looked one version earlier. Loading a file written at
//! version `v` into a class at version `w > v` walks back from the live
//! parameter: an edge names the previous shape, and the versions between
//! two edges leave the parameter unchanged. The walk must land
//! exactly on the entry found in the file; the collected edges are then
//! replayed forward as a fold of [`SchemaChange`] steps.
//!
//! ```rust
//! use sgobject::datatype::{ContainerType, ParamInfo, PrimitiveType, StructType};
//! use sgobject::ParameterMap;
//!
//! let info = |ptype, version| {
//!     ParamInfo::new("number", ContainerType::Scalar, StructType::None, ptype, version)
//! };
//! let mut map = ParameterMap::new();
//! map.put(info(PrimitiveType::Float64, 1), info(PrimitiveType::Int8, 0));
//! map.put(info(PrimitiveType::Int8, 0), info(PrimitiveType::Int32, -1));
//! map.finalize_map()?;
//! assert_eq!(map.len(), 2);
//! # Ok::<(), sgobject::ParamError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::datatype::{ContainerType, ParamInfo, PrimitiveType};
use crate::error::{ParamError, Result};
use crate::value::{Entry, Record, Shape, Value, MIN_VERSION};

/// A user supplied value conversion attached to one edge.
#[derive(Clone)]
pub struct Conversion(Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>);

impl Conversion {
    /// Wraps a conversion function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn call(&self, value: Value) -> Result<Value> {
        (self.0)(value)
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Conversion(..)")
    }
}

/// One step of a schema change between two consecutive versions.
#[derive(Debug, Clone)]
pub enum SchemaChange {
    /// The parameter was renamed.
    Rename {
        /// Old name.
        from: String,
        /// New name.
        to: String,
    },
    /// An object-typed parameter was renamed.
    ObjectRename {
        /// Old name.
        from: String,
        /// New name.
        to: String,
    },
    /// The primitive type grew; every old value fits.
    Widen {
        /// Old primitive.
        from: PrimitiveType,
        /// New primitive.
        to: PrimitiveType,
    },
    /// The primitive type shrank; values that do not fit fail the load.
    Narrow {
        /// Old primitive.
        from: PrimitiveType,
        /// New primitive.
        to: PrimitiveType,
    },
    /// A scalar became a one-element container.
    ScalarToVector {
        /// The new container.
        to: ContainerType,
    },
    /// A one-element container became a scalar.
    VectorToScalar,
    /// The elements moved between the plain and the reference-counted
    /// container of the same shape.
    Rewrap {
        /// Old container.
        from: ContainerType,
        /// New container.
        to: ContainerType,
    },
    /// A user supplied conversion.
    Custom(Conversion),
}

impl SchemaChange {
    /// The steps turning `source` into `target`, in application order:
    /// name, then container, then primitive type.
    pub fn plan(source: &ParamInfo, target: &ParamInfo, custom: Option<&Conversion>) -> Result<Vec<Self>> {
        let unsupported = |what: &str| {
            ParamError::Migration(format!("no conversion from {source} to {target}: {what}"))
        };
        let mut steps = Vec::new();
        if source.name != target.name {
            let (from, to) = (source.name.clone(), target.name.clone());
            steps.push(if target.ptype == PrimitiveType::SGObject {
                Self::ObjectRename { from, to }
            } else {
                Self::Rename { from, to }
            });
        }
        if let Some(conversion) = custom {
            steps.push(Self::Custom(conversion.clone()));
            return Ok(steps);
        }
        if source.stype != target.stype {
            return Err(unsupported("struct type changed"));
        }
        if source.ctype != target.ctype {
            use ContainerType::*;
            steps.push(match (source.ctype, target.ctype) {
                (Scalar, to @ (Vector | SGVector | Matrix | SGMatrix)) => Self::ScalarToVector { to },
                (Vector | SGVector | Matrix | SGMatrix, Scalar) => Self::VectorToScalar,
                (from @ (Vector | SGVector), to @ (Vector | SGVector))
                | (from @ (Matrix | SGMatrix), to @ (Matrix | SGMatrix)) => Self::Rewrap { from, to },
                _ => return Err(unsupported("container change")),
            });
        }
        if source.ptype != target.ptype {
            let (from, to) = (source.ptype, target.ptype);
            if from == PrimitiveType::SGObject || to == PrimitiveType::SGObject {
                return Err(unsupported("object and primitive types do not convert"));
            }
            let lossless = to.width() >= from.width() && !(from.is_float() && to.is_integral());
            steps.push(if lossless {
                Self::Widen { from, to }
            } else {
                Self::Narrow { from, to }
            });
        }
        Ok(steps)
    }

    /// Applies the step to an entry.
    pub fn apply(&self, mut entry: Entry) -> Result<Entry> {
        match self {
            Self::Rename { to, .. } | Self::ObjectRename { to, .. } => entry.name = to.clone(),
            Self::Widen { to, .. } | Self::Narrow { to, .. } => {
                entry.value = entry.value.cast(*to)?;
                entry.datatype.ptype = *to;
            }
            Self::ScalarToVector { to } => {
                entry.value.shape = match to {
                    ContainerType::Matrix | ContainerType::SGMatrix => Shape::Matrix { rows: 1, cols: 1 },
                    _ => Shape::Vector(1),
                };
                entry.datatype.ctype = *to;
            }
            Self::VectorToScalar => {
                if entry.value.items.len() != 1 {
                    return Err(ParamError::Migration(format!(
                        "`{}` holds {} elements and cannot become a scalar",
                        entry.name,
                        entry.value.items.len()
                    )));
                }
                entry.value.shape = Shape::Scalar;
                entry.datatype.ctype = ContainerType::Scalar;
            }
            Self::Rewrap { to, .. } => entry.datatype.ctype = *to,
            Self::Custom(conversion) => entry.value = conversion.call(entry.value)?,
        }
        Ok(entry)
    }
}

#[derive(Debug, Clone)]
struct Edge {
    source: ParamInfo,
    conversion: Option<Conversion>,
}

/// The migration graph of one class.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    pending: Vec<(ParamInfo, Edge)>,
    edges: BTreeMap<ParamInfo, Edge>,
    finalized: bool,
}

impl ParameterMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the edge `target -> source`. The map must be finalized again.
    pub fn put(&mut self, target: ParamInfo, source: ParamInfo) {
        self.push(target, source, None);
    }

    /// Adds an edge whose value conversion is `conversion` instead of the
    /// one derived from the two infos.
    pub fn put_with<F>(&mut self, target: ParamInfo, source: ParamInfo, conversion: F)
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.push(target, source, Some(Conversion::new(conversion)));
    }

    /// Like [`ParameterMap::put_with`], for a conversion that is already
    /// wrapped and may be shared between edges.
    pub fn put_conversion(&mut self, target: ParamInfo, source: ParamInfo, conversion: Conversion) {
        self.push(target, source, Some(conversion));
    }

    fn push(&mut self, target: ParamInfo, source: ParamInfo, conversion: Option<Conversion>) {
        self.finalized = false;
        self.pending.push((target, Edge { source, conversion }));
    }

    /// Validates the edges and makes the map usable.
    ///
    /// Every edge must go back exactly one version (`-1` precedes `0`), and
    /// no target may have two different sources. Since versions strictly
    /// decrease along edges, a validated map has no cycles.
    ///
    /// Chains must also line up. A parameter keeps its descriptor between
    /// edges, so the first edge below a source that carries the source's
    /// name has to be keyed by that same descriptor; a name may not map to
    /// two descriptors at one version either. Both cases would leave part
    /// of a chain unreachable.
    pub fn finalize_map(&mut self) -> Result<()> {
        let mut edges = BTreeMap::new();
        for (target, edge) in &self.pending {
            if edge.source.version != target.version - 1 || edge.source.version < -1 {
                return Err(ParamError::Migration(format!(
                    "edge {target} <- {} must step back exactly one version",
                    edge.source
                )));
            }
            if let Some(previous) = edges.insert(target.clone(), edge.clone()) {
                if previous.source != edge.source {
                    return Err(ParamError::Migration(format!(
                        "{target} has two sources: {} and {}",
                        previous.source, edge.source
                    )));
                }
            }
        }
        check_chains(&edges)?;
        self.edges = edges;
        self.finalized = true;
        Ok(())
    }

    /// True once [`ParameterMap::finalize_map`] succeeded and no edge was added since.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of distinct edges (valid after finalizing).
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True when the map has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn ensure_finalized(&self) -> Result<()> {
        if self.finalized {
            Ok(())
        } else {
            Err(ParamError::Migration("parameter map used before finalize_map()".into()))
        }
    }

    /// The source of `target`, if an edge exists.
    pub fn get(&self, target: &ParamInfo) -> Result<Option<&ParamInfo>> {
        self.ensure_finalized()?;
        Ok(self.edges.get(target).map(|e| &e.source))
    }

    /// Produces the entry of the live parameter `live` from a record
    /// written at `file_version`.
    pub fn migrate(&self, live: &ParamInfo, file_version: i32, record: &Record) -> Result<Entry> {
        self.ensure_finalized()?;
        if file_version < MIN_VERSION {
            return Err(ParamError::Migration(format!(
                "invalid file version {file_version}"
            )));
        }
        if file_version > live.version {
            return Err(ParamError::Migration(format!(
                "file version {file_version} is newer than {live}"
            )));
        }

        // Walk back to the file version, remembering every edge taken.
        let mut steps: Vec<(&Edge, ParamInfo)> = Vec::new();
        let mut info = live.clone();
        while info.version > file_version {
            match self.edges.get(&info) {
                Some(edge) => {
                    let previous = edge.source.clone();
                    steps.push((edge, info));
                    info = previous;
                }
                // Keys sort by descriptor, then version, so the next edge
                // for this descriptor is the closest smaller key.
                None => {
                    let next = self
                        .edges
                        .range::<ParamInfo, _>(..&info)
                        .next_back()
                        .map(|(k, _)| k)
                        .filter(|k| k.name == info.name && k.datatype() == info.datatype())
                        .map(|k| k.version);
                    info.version = next.map_or(file_version, |v| v.max(file_version));
                }
            }
        }

        let entry = record.get(&info.name).ok_or_else(|| {
            ParamError::Migration(format!(
                "`{}` has no entry `{}` for {live}",
                record.class_name, info.name
            ))
        })?;
        if entry.datatype != info.datatype() {
            return Err(ParamError::Migration(format!(
                "file stores `{}` as {} but {info} was expected and no mapping edge explains the difference",
                entry.name, entry.datatype
            )));
        }
        entry.value.validate(&entry.datatype)?;

        let mut entry = entry.clone();
        for (edge, target) in steps.into_iter().rev() {
            let plan = SchemaChange::plan(&edge.source, &target, edge.conversion.as_ref())?;
            debug!(source = %edge.source, target = %target, ?plan, "migrating parameter");
            entry = plan.iter().try_fold(entry, |e, step| step.apply(e))?;
            entry.name = target.name.clone();
            entry.datatype = target.datatype();
            entry.value.validate(&entry.datatype)?;
        }
        Ok(entry)
    }
}

fn check_chains(edges: &BTreeMap<ParamInfo, Edge>) -> Result<()> {
    for (i, target) in edges.keys().enumerate() {
        if let Some(other) = edges.keys().skip(i + 1).find(|o| {
            o.name == target.name && o.version == target.version && o.datatype() != target.datatype()
        }) {
            return Err(ParamError::Migration(format!(
                "`{}` has two descriptors at version {}: {} and {}",
                target.name,
                target.version,
                target.datatype(),
                other.datatype()
            )));
        }
    }
    for edge in edges.values() {
        let source = &edge.source;
        let next = edges
            .keys()
            .filter(|t| t.name == source.name && t.version <= source.version)
            .max_by_key(|t| t.version);
        if let Some(next) = next {
            if next.datatype() != source.datatype() {
                return Err(ParamError::Migration(format!(
                    "chain of `{}` breaks between {source} and {next}",
                    source.name
                )));
            }
        }
    }
    Ok(())
}
