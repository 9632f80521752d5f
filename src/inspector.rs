//! Structural reports of saved files, for debugging migrations and checking
//! what a file actually holds without registering any class.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{ParamError, Result};
use crate::format::FileFormat;
use crate::io::Source;
use crate::reader::{detect, new_reader};
use crate::value::{Item, Record, Scalar, Shape};

/// A structural report of one file.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Detected format.
    pub format: FileFormat,
    /// Parameter version stamped into the file.
    pub version: i32,
    /// Input size in bytes.
    pub size: u64,
    /// The root object.
    pub root: ObjectInfo,
}

/// One object in the file.
#[derive(Debug, Serialize)]
pub struct ObjectInfo {
    /// The parameter holding this object, `None` for the root.
    pub field: Option<String>,
    /// Class name.
    pub class_name: String,
    /// Generic tag, if any.
    pub generic: Option<String>,
    /// Parameters in file order.
    pub parameters: Vec<ParameterInfo>,
    /// Nested objects, depth first.
    pub children: Vec<ObjectInfo>,
}

/// One parameter entry.
#[derive(Debug, Serialize)]
pub struct ParameterInfo {
    /// Parameter name.
    pub name: String,
    /// Type string as written in ASCII files.
    pub datatype: String,
    /// Dimensions, e.g. `3x4`.
    pub shape: String,
    /// Number of container elements.
    pub elements: usize,
}

/// Builds [`Report`]s.
#[derive(Debug)]
pub struct Inspector;

impl Inspector {
    /// Reports on the file at `path`.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Report> {
        let source = Source::open(path.as_ref())?;
        Self::inspect_bytes(&source)
    }

    /// Reports on serialized bytes.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<Report> {
        let format =
            detect(bytes).ok_or_else(|| ParamError::Format("unrecognised file header".into()))?;
        let doc = new_reader(bytes)?.read_document(bytes)?;
        Ok(Report {
            format,
            version: doc.version,
            size: bytes.len() as u64,
            root: Self::inspect_record(None, &doc.root),
        })
    }

    fn inspect_record(field: Option<String>, record: &Record) -> ObjectInfo {
        let mut children = Vec::new();
        let parameters = record
            .entries
            .iter()
            .map(|entry| {
                let nested = entry
                    .value
                    .items
                    .iter()
                    .flat_map(Item::scalars)
                    .filter_map(|s| match s {
                        Scalar::Object(Some(r)) => Some(r),
                        _ => None,
                    });
                for child in nested {
                    children.push(Self::inspect_record(Some(entry.name.clone()), child));
                }
                ParameterInfo {
                    name: entry.name.clone(),
                    datatype: entry.datatype.to_string(),
                    shape: shape_string(&entry.value.shape),
                    elements: entry.value.items.len(),
                }
            })
            .collect();
        ObjectInfo {
            field,
            class_name: record.class_name.clone(),
            generic: record.generic.map(|g| g.to_string()),
            parameters,
            children,
        }
    }
}

fn shape_string(shape: &Shape) -> String {
    match shape {
        Shape::Scalar => "scalar".to_string(),
        Shape::Vector(len) => len.to_string(),
        Shape::Matrix { rows, cols } => format!("{rows}x{cols}"),
        Shape::NDArray(dims) => dims
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("x"),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== SGOBJECT INSPECTOR REPORT ===")?;
        writeln!(f, "Format:         {}", self.format)?;
        writeln!(f, "Version:        {}", self.version)?;
        writeln!(f, "Size:           {}b", self.size)?;
        writeln!(f, "\n[OBJECT TREE]")?;
        self.root.fmt_recursive(f, "", true)
    }
}

impl ObjectInfo {
    fn fmt_recursive(&self, f: &mut fmt::Formatter<'_>, prefix: &str, is_last: bool) -> fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let field = self
            .field
            .as_deref()
            .map(|name| format!("{name}: "))
            .unwrap_or_default();
        let generic = self
            .generic
            .as_deref()
            .map(|g| format!("<{g}>"))
            .unwrap_or_default();
        writeln!(
            f,
            "{prefix}{connector}{field}{}{generic} | Parameters: {}",
            self.class_name,
            self.parameters.len()
        )?;
        for p in &self.parameters {
            writeln!(f, "{child_prefix}  - {} {} [{}]", p.name, p.datatype, p.shape)?;
        }
        for (i, child) in self.children.iter().enumerate() {
            child.fmt_recursive(f, &child_prefix, i + 1 == self.children.len())?;
        }
        Ok(())
    }
}
