//! Centralized error handling for sgobject.
//!
//! Every fallible operation in the crate returns [`Result`], never panics.
//! The library enforces this with `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! - **I/O Errors** ([`ParamError::Io`]): file system and stream failures
//! - **Format Errors** ([`ParamError::Format`]): grammar mismatches while scanning a file,
//!   undecodable binary payloads, overflowing dimensions, nesting past the depth limit
//! - **Serialization Errors** ([`ParamError::Serialization`]): bincode encoding and serde_json failures
//! - **Migration Errors** ([`ParamError::Migration`]): no mapping edge, lossy narrowing,
//!   unfinalized parameter maps
//! - **Downcast Errors** ([`ParamError::Downcast`]): a managed handle is not of the requested type
//! - **Parameter Errors** ([`ParamError::InvalidParameter`]): duplicate or unknown names,
//!   type mismatches during assignment
//! - **Registry Errors** ([`ParamError::UnknownClass`]): a nested object names a class that was
//!   never registered with the [`Context`](crate::object::Context)
//! - **Internal Errors** ([`ParamError::Internal`]): poisoned locks and other logic errors
//!
//! ## Usage
//!
//! ```rust
//! use sgobject::{ParamError, Result};
//!
//! fn check(version: i32) -> Result<i32> {
//!     if version < -1 {
//!         return Err(ParamError::Migration(format!("invalid version {version}")));
//!     }
//!     Ok(version)
//! }
//!
//! assert!(check(-2).is_err());
//! # Ok::<(), ParamError>(())
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for sgobject operations.
pub type Result<T> = std::result::Result<T, ParamError>;

/// The master error enum covering all failure domains.
///
/// The type is `Clone` so a failure can be stored next to the object that
/// produced it; I/O errors are wrapped in an `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum ParamError {
    /// Low-level I/O failure (file not found, permission denied, disk full).
    Io(Arc<io::Error>),

    /// The on-disk representation does not match the expected grammar.
    ///
    /// The read of the enclosing object is aborted; no partial object is
    /// handed back to the caller.
    Format(String),

    /// Bincode encoding or decoding failed.
    Serialization(String),

    /// A schema migration step could not be carried out.
    ///
    /// ## Common Causes
    ///
    /// - The on-disk parameter differs from the live one and no mapping edge
    ///   explains the difference
    /// - A narrowing cast overflows the target primitive type
    /// - The parameter map was used before `finalize_map()`
    Migration(String),

    /// A guarded downcast of a managed object failed.
    Downcast {
        /// The type that was requested.
        expected: &'static str,
        /// The class name of the object that was found.
        found: String,
    },

    /// A parameter was registered twice, is unknown, or received a value of
    /// the wrong shape.
    InvalidParameter(String),

    /// A serialized object names a class that is not registered.
    UnknownClass(String),

    /// Logic error in the library (poisoned lock, violated invariant).
    Internal(String),
}

impl ParamError {
    /// Creates a format error anchored at a byte offset of the input.
    pub(crate) fn format_at(offset: usize, msg: impl fmt::Display) -> Self {
        Self::Format(format!("at byte {offset}: {msg}"))
    }

    /// Creates the error used when an `RwLock` guarding an object is poisoned.
    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal(format!("lock poisoned on {what}"))
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Migration(s) => write!(f, "Migration Error: {s}"),
            Self::Downcast { expected, found } => {
                write!(f, "Downcast Error: object `{found}` is not a `{expected}`")
            }
            Self::InvalidParameter(s) => write!(f, "Parameter Error: {s}"),
            Self::UnknownClass(s) => write!(f, "Unknown Class: `{s}` is not registered"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for ParamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParamError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<fmt::Error> for ParamError {
    fn from(_: fmt::Error) -> Self {
        Self::Internal("formatter error while writing text output".into())
    }
}

impl From<serde_json::Error> for ParamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ParamError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

// Decoding only ever sees file bytes, so a failure means a malformed file.
impl From<bincode::error::DecodeError> for ParamError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::Format(format!("malformed binary payload: {err}"))
    }
}
