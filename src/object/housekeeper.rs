use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::datatype::PrimitiveType;
use crate::object::context::{Context, Io, Parallel, Version};
use crate::refcount::RefCount;

const NO_GENERIC: u8 = u8::MAX;

/// Per-object bookkeeping shared by all handles to one object.
///
/// Holds the reference count, the generic tag, the object's own references
/// to the context collaborators and the last recorded parameter hash.
#[derive(Debug)]
pub struct HouseKeeper {
    refs: RefCount,
    class_name: &'static str,
    generic: AtomicU8,
    io: Arc<Io>,
    parallel: Arc<Parallel>,
    version: Arc<Version>,
    context: Context,
    hash: AtomicU64,
}

impl HouseKeeper {
    pub(crate) fn new(context: &Context, class_name: &'static str, generic: Option<PrimitiveType>) -> Self {
        let keeper = Self {
            refs: RefCount::new(0),
            class_name,
            generic: AtomicU8::new(NO_GENERIC),
            io: context.io(),
            parallel: context.parallel(),
            version: context.version(),
            context: context.clone(),
            hash: AtomicU64::new(0),
        };
        keeper.set_generic_tag(generic);
        keeper
    }

    pub(crate) fn ref_(&self) -> i32 {
        self.refs.ref_()
    }

    pub(crate) fn unref(&self) -> i32 {
        self.refs.unref()
    }

    /// Current number of owning handles.
    pub fn ref_count(&self) -> i32 {
        self.refs.ref_count()
    }

    /// Registered class name of the object.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The primitive type the object was instantiated over, if any.
    pub fn generic(&self) -> Option<PrimitiveType> {
        match self.generic.load(Ordering::Acquire) {
            NO_GENERIC => None,
            index => PrimitiveType::from_index(i32::from(index)),
        }
    }

    /// True when the object carries a generic tag.
    pub fn is_generic(&self) -> bool {
        self.generic().is_some()
    }

    /// Tags the object with the primitive type it was instantiated over.
    pub fn set_generic(&self, ptype: PrimitiveType) {
        self.set_generic_tag(Some(ptype));
    }

    /// Removes the generic tag.
    pub fn unset_generic(&self) {
        self.set_generic_tag(None);
    }

    pub(crate) fn set_generic_tag(&self, generic: Option<PrimitiveType>) {
        let raw = generic
            .and_then(|p| u8::try_from(p.index()).ok())
            .unwrap_or(NO_GENERIC);
        self.generic.store(raw, Ordering::Release);
    }

    /// The message sink captured at construction.
    pub fn io(&self) -> &Arc<Io> {
        &self.io
    }

    /// The threading configuration captured at construction.
    pub fn parallel(&self) -> &Arc<Parallel> {
        &self.parallel
    }

    /// The version information captured at construction.
    pub fn version(&self) -> &Arc<Version> {
        &self.version
    }

    /// The context the object was built in (used to instantiate nested objects).
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn stored_hash(&self) -> u64 {
        self.hash.load(Ordering::Acquire)
    }

    pub(crate) fn store_hash(&self, hash: u64) {
        self.hash.store(hash, Ordering::Release);
    }
}
