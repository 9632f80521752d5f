//! The save/load facade.
//!
//! ```rust
//! use sgobject::{Context, FileFormat, Managed, Parameterized, Serializer};
//!
//! #[derive(Default, Parameterized)]
//! struct Threshold {
//!     cutoff: f64,
//! }
//!
//! # fn main() -> sgobject::Result<()> {
//! let ctx = Context::new();
//! ctx.register::<Threshold>();
//!
//! let obj = Managed::new(&ctx, Threshold { cutoff: 0.25 });
//! let bytes = Serializer::builder().format(FileFormat::Binary).to_bytes(&obj)?;
//! let back = Serializer::load_bytes(&bytes, &ctx)?.downcast::<Threshold>()?;
//! assert_eq!(back.read()?.cutoff, 0.25);
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::ascii::AsciiWriter;
use crate::binary::BinaryCodec;
use crate::error::Result;
use crate::field::Loader;
use crate::format::FileFormat;
use crate::io::{SeqWriter, Source};
use crate::json::JsonWriter;
use crate::object::{Context, Managed, ObjectKind, SGObject};
use crate::reader::new_reader;
use crate::value::Document;

/// Shorthands for the default options. Use [`Serializer::builder`] to pick
/// the format or the parameter version.
#[derive(Debug)]
pub struct Serializer;

impl Serializer {
    /// Options starting from ASCII output and the versions of the objects
    /// and context involved.
    pub fn builder() -> SerializerBuilder {
        SerializerBuilder::default()
    }

    /// Saves `obj` as ASCII.
    pub fn save<T, P>(path: P, obj: &Managed<T>) -> Result<()>
    where
        T: ?Sized + SGObject,
        P: AsRef<Path>,
    {
        Self::builder().save(path, obj)
    }

    /// Writes `obj` as ASCII into `sink`.
    pub fn write<T, W>(sink: &mut W, obj: &Managed<T>) -> Result<()>
    where
        T: ?Sized + SGObject,
        W: Write,
    {
        Self::builder().write(sink, obj)
    }

    /// Loads the object stored at `path`, whatever its format.
    pub fn load<P: AsRef<Path>>(path: P, ctx: &Context) -> Result<Managed<dyn SGObject>> {
        Self::builder().load(path, ctx)
    }

    /// Loads an object from bytes in any readable format.
    pub fn load_bytes(bytes: &[u8], ctx: &Context) -> Result<Managed<dyn SGObject>> {
        Self::builder().load_bytes(bytes, ctx)
    }
}

/// Save and load options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializerBuilder {
    format: FileFormat,
    version: Option<i32>,
    allow_non_finite: bool,
}

impl SerializerBuilder {
    /// Output format. Loading detects the format on its own.
    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    /// Parameter version.
    ///
    /// When saving, the version stamped into the file (default: the
    /// version of the saved object's context). When loading, the version
    /// the records are migrated to (default: the loading context's).
    pub fn version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    /// Lets the JSON writer emit `NaN` and infinities.
    pub fn allow_non_finite(mut self, allow: bool) -> Self {
        self.allow_non_finite = allow;
        self
    }

    /// The document that would be written for `obj`.
    pub fn to_document<T: ?Sized + SGObject>(&self, obj: &Managed<T>) -> Result<Document> {
        let version = self
            .version
            .unwrap_or_else(|| obj.keeper().version().parameter_version());
        Ok(Document {
            version,
            root: obj.to_record()?,
        })
    }

    /// Encodes `obj` in the configured format.
    pub fn to_bytes<T: ?Sized + SGObject>(&self, obj: &Managed<T>) -> Result<Vec<u8>> {
        let doc = self.to_document(obj)?;
        let bytes = match self.format {
            FileFormat::Ascii => AsciiWriter.write_document(&doc)?.into_bytes(),
            FileFormat::Json => JsonWriter::new()
                .allow_non_finite(self.allow_non_finite)
                .write_document(&doc)?
                .into_bytes(),
            FileFormat::Binary => BinaryCodec.write_document(&doc)?,
        };
        debug!(
            class = obj.class_name(),
            format = %self.format,
            version = doc.version,
            bytes = bytes.len(),
            "object serialized"
        );
        Ok(bytes)
    }

    /// Writes `obj` into `sink`.
    pub fn write<T, W>(&self, sink: &mut W, obj: &Managed<T>) -> Result<()>
    where
        T: ?Sized + SGObject,
        W: Write,
    {
        let bytes = self.to_bytes(obj)?;
        let writer = SeqWriter::new(sink);
        writer.write_all(&bytes)?;
        writer.flush()
    }

    /// Writes `obj` to a new file at `path`.
    pub fn save<T, P>(&self, path: P, obj: &Managed<T>) -> Result<()>
    where
        T: ?Sized + SGObject,
        P: AsRef<Path>,
    {
        let bytes = self.to_bytes(obj)?;
        let writer = SeqWriter::create(path.as_ref())?;
        writer.write_all(&bytes)?;
        writer.flush()
    }

    /// Parses `bytes` without building objects.
    pub fn read_document(&self, bytes: &[u8]) -> Result<Document> {
        new_reader(bytes)?.read_document(bytes)
    }

    /// Loads an object from bytes.
    ///
    /// Nested objects are created through the classes registered with
    /// `ctx`, and every record is migrated from the file's version to the
    /// target version.
    pub fn load_bytes(&self, bytes: &[u8], ctx: &Context) -> Result<Managed<dyn SGObject>> {
        let doc = self.read_document(bytes)?;
        let current = self
            .version
            .unwrap_or_else(|| ctx.version().parameter_version());
        debug!(
            class = %doc.root.class_name,
            file_version = doc.version,
            current_version = current,
            "loading object"
        );
        Loader::new(ctx, doc.version, current).instantiate(&doc.root)
    }

    /// Loads the object stored at `path`.
    pub fn load<P: AsRef<Path>>(&self, path: P, ctx: &Context) -> Result<Managed<dyn SGObject>> {
        let source = Source::open(path.as_ref())?;
        self.load_bytes(&source, ctx)
    }

    /// Loads the object stored at `path` as a `C`.
    pub fn load_as<C, P>(&self, path: P, ctx: &Context) -> Result<Managed<C>>
    where
        C: ?Sized + ObjectKind,
        P: AsRef<Path>,
    {
        C::from_object(self.load(path, ctx)?)
    }
}
