//! The reference-counted object model.
//!
//! * [`Managed`] is the owning handle. Its count starts at 1 and every clone
//!   is another reference; the object goes away with the last handle.
//! * [`HouseKeeper`] is the per-object bookkeeping behind the handle: count,
//!   generic tag and the object's own references to the [`Context`]
//!   collaborators.
//! * [`SGObject`] / [`Parameterized`] connect a class to its parameter table,
//!   which drives saving, loading, cloning, comparison and hashing.

mod context;
mod housekeeper;
mod managed;
mod sgobject;

pub use context::{Context, Io, MessageLevel, Parallel, Version};
pub use housekeeper::HouseKeeper;
pub use managed::{Managed, ObjectKind, RefValue};
pub use sgobject::{Parameterized, SGObject};
