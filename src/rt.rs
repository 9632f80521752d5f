//! Runtime support for `#[derive(Parameterized)]`.
//! Do not use directly.

pub use crate::datatype::PrimitiveType;
pub use crate::error::Result;
pub use crate::field::Element;
pub use crate::migration::ParameterMap;
pub use crate::object::Parameterized;
pub use crate::parameter::{Lens, Parameter};

/// Generic tag of a class instantiated over `E`.
pub fn generic_of<E: Element>() -> Option<PrimitiveType> {
    Some(E::PTYPE)
}
