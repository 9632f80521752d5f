//! Container primitives shared by the object model and its consumers.
//!
//! [`SGVector`] and [`SGMatrix`] wrap an `Arc<RwLock<_>>` buffer: a plain
//! clone is another reference to the same memory and sees every write made
//! through the others, [`SGVector::clone_deep`] is a copy.
//! [`DynArray`] is the growable list used for parameter lists.

mod dynarray;
mod sgmatrix;
mod sgvector;
mod structs;

pub use dynarray::DynArray;
pub use sgmatrix::SGMatrix;
pub use sgvector::SGVector;
pub use structs::{SGNDArray, SGSparseVector, SGSparseVectorEntry, SGString};
