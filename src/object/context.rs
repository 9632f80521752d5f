//! The collaborators every managed object holds and the class registry.
//!
//! A [`Context`] replaces process-wide singletons: it owns the current
//! [`Io`], [`Parallel`] and [`Version`] objects and the table of classes that
//! can be instantiated by name while loading. Objects capture their own
//! references to the three collaborators when they are constructed, so
//! swapping a collaborator on the context never affects live objects.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, trace, warn};

use crate::datatype::PrimitiveType;
use crate::error::{ParamError, Result};
use crate::object::managed::Managed;
use crate::object::sgobject::{Parameterized, SGObject};

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MessageLevel {
    /// Allocation and reference-count chatter.
    GcDebug,
    /// Developer diagnostics.
    Debug,
    /// Progress information.
    Info,
    /// Noteworthy but expected conditions.
    Notice,
    /// Suspicious conditions.
    #[default]
    Warn,
    /// Failed operations.
    Error,
    /// Failures that leave an object unusable.
    Critical,
    /// Conditions needing immediate attention.
    Alert,
    /// The library cannot continue.
    Emergency,
}

/// The message sink.
///
/// Messages below the configured level are dropped; the rest become
/// `tracing` events, so the subscriber installed by the application decides
/// where they end up.
#[derive(Debug, Default)]
pub struct Io {
    level: MessageLevel,
}

impl Io {
    /// Creates a sink passing messages at `level` and above.
    pub fn new(level: MessageLevel) -> Self {
        Self { level }
    }

    /// The threshold.
    pub fn level(&self) -> MessageLevel {
        self.level
    }

    /// True when a message at `level` would be emitted.
    pub fn is_enabled(&self, level: MessageLevel) -> bool {
        level >= self.level
    }

    /// Emits `msg` if `level` passes the threshold.
    pub fn message(&self, level: MessageLevel, msg: impl fmt::Display) {
        if !self.is_enabled(level) {
            return;
        }
        match level {
            MessageLevel::GcDebug => trace!(target: "sgobject::io", "{msg}"),
            MessageLevel::Debug => debug!(target: "sgobject::io", "{msg}"),
            MessageLevel::Info | MessageLevel::Notice => info!(target: "sgobject::io", "{msg}"),
            MessageLevel::Warn => warn!(target: "sgobject::io", "{msg}"),
            MessageLevel::Error
            | MessageLevel::Critical
            | MessageLevel::Alert
            | MessageLevel::Emergency => error!(target: "sgobject::io", ?level, "{msg}"),
        }
    }
}

/// Threading configuration for numeric consumers of the object model.
#[derive(Debug)]
pub struct Parallel {
    num_threads: usize,
}

impl Default for Parallel {
    fn default() -> Self {
        Self::new(rayon::current_num_threads())
    }
}

impl Parallel {
    /// Creates a configuration using `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Configured number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Builds a dedicated rayon pool with the configured number of threads.
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|e| ParamError::Internal(format!("thread pool: {e}")))
    }
}

/// Library and schema version information.
#[derive(Debug)]
pub struct Version {
    parameter_version: i32,
}

impl Default for Version {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PARAMETER_VERSION)
    }
}

impl Version {
    /// Parameter version used when nothing else is configured.
    pub const DEFAULT_PARAMETER_VERSION: i32 = 0;

    /// Creates version information with the given parameter schema version.
    pub fn new(parameter_version: i32) -> Self {
        Self { parameter_version }
    }

    /// The crate version string.
    pub fn library_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// The parameter schema version written to and expected from files.
    pub fn parameter_version(&self) -> i32 {
        self.parameter_version
    }
}

#[derive(Debug, Default)]
struct Collaborators {
    io: Arc<Io>,
    parallel: Arc<Parallel>,
    version: Arc<Version>,
}

type Factory = Arc<dyn Fn(&Context) -> Managed<dyn SGObject> + Send + Sync>;

#[derive(Default)]
struct Registry {
    factories: HashMap<(String, Option<PrimitiveType>), Factory>,
}

/// Shared state handed to every managed object at construction.
///
/// Cloning a context is cheap and yields another handle to the same state.
#[derive(Clone, Default)]
pub struct Context {
    collaborators: Arc<RwLock<Collaborators>>,
    registry: Arc<RwLock<Registry>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .factories
            .len();
        f.debug_struct("Context")
            .field("collaborators", &self.collaborators)
            .field("registered_classes", &registered)
            .finish()
    }
}

impl Context {
    /// Creates a context with default collaborators and no registered classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with the given collaborators.
    pub fn with_collaborators(io: Arc<Io>, parallel: Arc<Parallel>, version: Arc<Version>) -> Self {
        Self {
            collaborators: Arc::new(RwLock::new(Collaborators {
                io,
                parallel,
                version,
            })),
            registry: Arc::default(),
        }
    }

    fn collaborators(&self) -> std::sync::RwLockReadGuard<'_, Collaborators> {
        self.collaborators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn collaborators_mut(&self) -> std::sync::RwLockWriteGuard<'_, Collaborators> {
        self.collaborators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The current message sink.
    pub fn io(&self) -> Arc<Io> {
        Arc::clone(&self.collaborators().io)
    }

    /// Replaces the message sink. Objects built earlier keep the previous one.
    pub fn set_io(&self, io: Arc<Io>) {
        self.collaborators_mut().io = io;
    }

    /// The current threading configuration.
    pub fn parallel(&self) -> Arc<Parallel> {
        Arc::clone(&self.collaborators().parallel)
    }

    /// Replaces the threading configuration.
    pub fn set_parallel(&self, parallel: Arc<Parallel>) {
        self.collaborators_mut().parallel = parallel;
    }

    /// The current version information.
    pub fn version(&self) -> Arc<Version> {
        Arc::clone(&self.collaborators().version)
    }

    /// Replaces the version information.
    pub fn set_version(&self, version: Arc<Version>) {
        self.collaborators_mut().version = version;
    }

    /// Registers `T` so that files naming its class can be loaded.
    pub fn register<T: Parameterized + Default>(&self) -> &Self {
        self.register_factory(T::class_name(), T::generic(), |ctx| {
            Managed::new(ctx, T::default()).into_object()
        })
    }

    /// Registers a custom constructor for a class name and generic tag.
    pub fn register_factory<F>(&self, class_name: &str, generic: Option<PrimitiveType>, factory: F) -> &Self
    where
        F: Fn(&Context) -> Managed<dyn SGObject> + Send + Sync + 'static,
    {
        debug!(class = class_name, ?generic, "registering class");
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .factories
            .insert((class_name.to_string(), generic), Arc::new(factory));
        self
    }

    /// True when `class_name` with `generic` can be instantiated.
    pub fn is_registered(&self, class_name: &str, generic: Option<PrimitiveType>) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .factories
            .contains_key(&(class_name.to_string(), generic))
    }

    /// Instantiates a registered class with its default state.
    pub fn create(&self, class_name: &str, generic: Option<PrimitiveType>) -> Result<Managed<dyn SGObject>> {
        let factory = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .factories
            .get(&(class_name.to_string(), generic))
            .cloned()
            .ok_or_else(|| match generic {
                Some(p) => ParamError::UnknownClass(format!("{class_name}<{p}>")),
                None => ParamError::UnknownClass(class_name.to_string()),
            })?;
        let object = factory(self);
        object.keeper().set_generic_tag(generic);
        Ok(object)
    }
}
