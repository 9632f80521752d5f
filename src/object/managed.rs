use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use num_complex::Complex64;
use tracing::debug;

use crate::error::{ParamError, Result};
use crate::object::context::Context;
use crate::object::housekeeper::HouseKeeper;
use crate::object::sgobject::{Parameterized, SGObject};

pub(crate) struct Slot<T: ?Sized> {
    keeper: HouseKeeper,
    value: RwLock<T>,
}

/// An owning handle to a reference-counted object.
///
/// Every live handle is one reference: `Clone` (or [`Managed::ref_`]) adds
/// one, dropping a handle (or [`Managed::unref`]) releases one. The object is
/// destroyed when the last handle goes away. The state sits behind an
/// `RwLock`; [`Managed::read`] and [`Managed::write`] report a poisoned lock
/// as [`ParamError::Internal`].
pub struct Managed<T: ?Sized> {
    slot: Arc<Slot<T>>,
    erased: Arc<dyn Any + Send + Sync>,
    released: bool,
}

impl<T: Parameterized> Managed<T> {
    /// Wraps `value` as a managed object. The returned handle is the first
    /// reference, so the count starts at 1.
    pub fn new(context: &Context, value: T) -> Self {
        let slot = Arc::new(Slot {
            keeper: HouseKeeper::new(context, T::class_name(), T::generic()),
            value: RwLock::new(value),
        });
        slot.keeper.ref_();
        let erased: Arc<dyn Any + Send + Sync> = slot.clone();
        Self {
            slot,
            erased,
            released: false,
        }
    }

    /// Converts the handle into a type-erased one, keeping its reference.
    pub fn into_object(mut self) -> Managed<dyn SGObject> {
        self.released = true;
        let slot: Arc<Slot<dyn SGObject>> = self.slot.clone();
        Managed {
            slot,
            erased: Arc::clone(&self.erased),
            released: false,
        }
    }
}

impl<T: ?Sized> Managed<T> {
    /// Takes another reference to the object.
    pub fn ref_(&self) -> Self {
        self.clone()
    }

    /// Releases this reference and returns the remaining count.
    ///
    /// A result of 0 means the object has been destroyed.
    pub fn unref(mut self) -> i32 {
        self.released = true;
        self.release()
    }

    fn release(&self) -> i32 {
        let remaining = self.slot.keeper.unref();
        if remaining == 0 {
            debug!(class = self.slot.keeper.class_name(), "object released");
        }
        remaining
    }

    /// Current number of references.
    pub fn ref_count(&self) -> i32 {
        self.slot.keeper.ref_count()
    }

    /// Bookkeeping shared by all handles to this object.
    pub fn keeper(&self) -> &HouseKeeper {
        &self.slot.keeper
    }

    /// Registered class name.
    pub fn class_name(&self) -> &'static str {
        self.slot.keeper.class_name()
    }

    /// True when both handles refer to the same object.
    pub fn ptr_eq<U: ?Sized>(&self, other: &Managed<U>) -> bool {
        Arc::ptr_eq(&self.erased, &other.erased)
    }

    /// Shared access to the object state.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>> {
        self.slot
            .value
            .read()
            .map_err(|_| ParamError::poisoned(self.class_name()))
    }

    /// Exclusive access to the object state.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>> {
        self.slot
            .value
            .write()
            .map_err(|_| ParamError::poisoned(self.class_name()))
    }

    /// Guarded downcast to a concrete class; takes a new reference on success.
    pub fn downcast<C: Parameterized>(&self) -> Result<Managed<C>> {
        match Arc::clone(&self.erased).downcast::<Slot<C>>() {
            Ok(slot) => {
                slot.keeper.ref_();
                Ok(Managed {
                    slot,
                    erased: Arc::clone(&self.erased),
                    released: false,
                })
            }
            Err(_) => Err(ParamError::Downcast {
                expected: C::class_name(),
                found: self.class_name().to_string(),
            }),
        }
    }
}

impl<T: ?Sized> Clone for Managed<T> {
    fn clone(&self) -> Self {
        self.slot.keeper.ref_();
        Self {
            slot: Arc::clone(&self.slot),
            erased: Arc::clone(&self.erased),
            released: false,
        }
    }
}

impl<T: ?Sized> Drop for Managed<T> {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

impl<T: ?Sized> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("class", &self.class_name())
            .field("generic", &self.keeper().generic())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Types that can be the target of a typed object reference: any concrete
/// [`Parameterized`] class, or `dyn SGObject` for "any object".
pub trait ObjectKind: SGObject {
    /// Narrows a type-erased handle to this kind.
    fn from_object(object: Managed<dyn SGObject>) -> Result<Managed<Self>>;
}

impl ObjectKind for dyn SGObject {
    fn from_object(object: Managed<dyn SGObject>) -> Result<Managed<Self>> {
        Ok(object)
    }
}

impl<C: Parameterized> ObjectKind for C {
    fn from_object(object: Managed<dyn SGObject>) -> Result<Managed<Self>> {
        object.downcast::<C>()
    }
}

/// Takes a new owning reference to a value when it is a managed object and
/// copies it otherwise.
///
/// The choice is made at compile time, so generic container code can hold
/// object handles and plain scalars alike.
pub trait RefValue {
    /// Returns the referenced (or copied) value.
    fn ref_value(&self) -> Self;
}

impl<T: ?Sized> RefValue for Managed<T> {
    fn ref_value(&self) -> Self {
        self.ref_()
    }
}

impl<T: RefValue> RefValue for Option<T> {
    fn ref_value(&self) -> Self {
        self.as_ref().map(RefValue::ref_value)
    }
}

macro_rules! impl_ref_value_copy {
    ($($t:ty),* $(,)?) => {
        $(
            impl RefValue for $t {
                fn ref_value(&self) -> Self {
                    *self
                }
            }
        )*
    };
}

impl_ref_value_copy!(bool, char, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, Complex64);
