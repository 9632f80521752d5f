use std::any::Any;
use std::fmt::Write as _;
use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::datatype::PrimitiveType;
use crate::error::{ParamError, Result};
use crate::field::Loader;
use crate::migration::ParameterMap;
use crate::object::context::MessageLevel;
use crate::object::managed::{Managed, ObjectKind};
use crate::parameter::{Parameter, TParameter};
use crate::value::Record;

/// A class whose fields are exposed through a [`Parameter`] table.
///
/// Usually derived with `#[derive(Parameterized)]`; the derive registers
/// every named field in declaration order and the table sorts them by name.
pub trait Parameterized: Send + Sync + Sized + 'static {
    /// Name written to files and used to find the class while loading.
    fn class_name() -> &'static str;

    /// The primitive type a generic class is instantiated over.
    fn generic() -> Option<PrimitiveType> {
        None
    }

    /// Registers the fields of the class.
    fn register(params: &mut Parameter<Self>) -> Result<()>;

    /// Declares how older versions of the parameters map onto the current ones.
    fn map_parameters(_map: &mut ParameterMap) {}

    /// Runs before loaded values are assigned to the fields.
    fn load_pre(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs once every loaded value is assigned. Rebuilds state that is
    /// derived from the parameters and not saved itself.
    fn load_post(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs before the parameters are captured.
    fn save_pre(&self) -> Result<()> {
        Ok(())
    }

    /// Runs after the parameters were captured.
    fn save_post(&self) -> Result<()> {
        Ok(())
    }
}

/// The object-safe face of a [`Parameterized`] class.
///
/// Every `Parameterized` type implements it; `Managed<dyn SGObject>` is the
/// handle type for "any object".
pub trait SGObject: Any + Send + Sync {
    /// Registered class name.
    fn get_name(&self) -> &'static str;

    /// Descriptors of all registered parameters, sorted by name.
    fn parameters(&self) -> Result<Vec<TParameter>>;

    /// The finalized migration map of the class.
    fn parameter_map(&self) -> Result<ParameterMap>;

    /// Captures the current parameter values.
    fn to_record(&self, generic: Option<PrimitiveType>) -> Result<Record>;

    /// Assigns parameter values from a record written at `loader.file_version()`,
    /// migrating them to `loader.current_version()` first.
    fn load_record(&mut self, record: &Record, loader: &Loader<'_>) -> Result<()>;

    /// Upcast for dynamic inspection.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Parameterized> SGObject for T {
    fn get_name(&self) -> &'static str {
        T::class_name()
    }

    fn parameters(&self) -> Result<Vec<TParameter>> {
        Ok(Parameter::<T>::build()?.iter().cloned().collect())
    }

    fn parameter_map(&self) -> Result<ParameterMap> {
        let mut map = ParameterMap::new();
        T::map_parameters(&mut map);
        map.finalize_map()?;
        Ok(map)
    }

    fn to_record(&self, generic: Option<PrimitiveType>) -> Result<Record> {
        self.save_pre()?;
        let record = Parameter::<T>::build()?.to_record(self, T::class_name(), generic)?;
        self.save_post()?;
        Ok(record)
    }

    fn load_record(&mut self, record: &Record, loader: &Loader<'_>) -> Result<()> {
        if record.class_name != T::class_name() {
            return Err(ParamError::Format(format!(
                "record of class `{}` cannot be loaded into `{}`",
                record.class_name,
                T::class_name()
            )));
        }
        let params = Parameter::<T>::build()?;
        let map = SGObject::parameter_map(self)?;
        let entries = params.load_all_file_parameters(
            loader.file_version(),
            loader.current_version(),
            record,
            &map,
        )?;
        self.load_pre()?;
        params.apply(self, &entries, loader)?;
        self.load_post()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: ?Sized + SGObject> Managed<T> {
    /// Captures the current parameter values, tagged with the handle's generic type.
    pub fn to_record(&self) -> Result<Record> {
        self.read()?.to_record(self.keeper().generic())
    }

    /// Descriptors of all registered parameters, sorted by name.
    pub fn parameters(&self) -> Result<Vec<TParameter>> {
        self.read()?.parameters()
    }

    /// Compares the parameter values of two objects field by field,
    /// recursing into nested objects and allowing `accuracy` of slack for
    /// floating point values.
    pub fn equals<U: ?Sized + SGObject>(&self, other: &Managed<U>, accuracy: f64) -> Result<bool> {
        if self.ptr_eq(other) {
            return Ok(true);
        }
        Ok(self.to_record()?.approx_eq(&other.to_record()?, accuracy))
    }

    /// Hash of the serialized parameter values.
    pub fn parameter_hash(&self) -> Result<u64> {
        let bytes = bincode::serde::encode_to_vec(self.to_record()?, bincode::config::standard())?;
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&bytes);
        Ok(hasher.finish())
    }

    /// Records the current parameter hash.
    pub fn update_parameter_hash(&self) -> Result<()> {
        let hash = self.parameter_hash()?;
        self.keeper().store_hash(hash);
        Ok(())
    }

    /// True when the parameters changed since the last [`Managed::update_parameter_hash`].
    pub fn parameter_hash_changed(&self) -> Result<bool> {
        Ok(self.parameter_hash()? != self.keeper().stored_hash())
    }

    /// One line per parameter: name, type and description.
    pub fn describe(&self) -> Result<String> {
        let mut out = String::new();
        for p in self.parameters()? {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{} ({}): {}", p.name, p.datatype, p.description);
        }
        Ok(out)
    }

    /// Sends [`Managed::describe`] to the object's message sink.
    pub fn print_parameters(&self) -> Result<()> {
        let description = self.describe()?;
        self.keeper().io().message(
            MessageLevel::Info,
            format_args!("parameters of {}:\n{description}", self.class_name()),
        );
        Ok(())
    }
}

impl<T: ?Sized + ObjectKind> Managed<T> {
    /// Deep copy through the parameter values: nested objects are copied too.
    pub fn clone_object(&self) -> Result<Managed<T>> {
        let record = self.to_record()?;
        let version = self.keeper().version().parameter_version();
        let loader = Loader::new(self.keeper().context(), version, version);
        T::from_object(loader.instantiate(&record)?)
    }
}
