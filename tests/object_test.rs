#![allow(missing_docs)]
use std::sync::Arc;

use proptest::prelude::*;
use sgobject::datatype::PrimitiveType;
use sgobject::{
    Context, Io, Managed, MessageLevel, ObjectKind, Parallel, ParamError, Parameterized, RefValue,
    SGObject, Version,
};

#[derive(Default, Parameterized)]
struct Kernel {
    /// Bandwidth of the kernel.
    width: f64,
}

#[derive(Default, Parameterized)]
struct Machine {
    bias: f64,
    kernel: Option<Managed<Kernel>>,
    extra: Option<Managed<dyn SGObject>>,
}

fn context() -> Context {
    let ctx = Context::new();
    ctx.register::<Kernel>().register::<Machine>();
    ctx
}

fn machine(ctx: &Context, width: f64) -> Managed<Machine> {
    let kernel = Managed::new(ctx, Kernel { width });
    Managed::new(
        ctx,
        Machine {
            bias: 0.5,
            extra: Some(kernel.ref_().into_object()),
            kernel: Some(kernel),
        },
    )
}

#[test]
fn test_reference_counting() {
    let ctx = context();
    let obj = Managed::new(&ctx, Kernel { width: 1.0 });
    assert_eq!(obj.ref_count(), 1);

    let second = obj.ref_();
    let third = obj.clone();
    assert_eq!(obj.ref_count(), 3);
    assert!(second.ptr_eq(&third));

    assert_eq!(second.unref(), 2);
    drop(third);
    assert_eq!(obj.ref_count(), 1);
    assert_eq!(obj.unref(), 0);
}

#[test]
fn test_shared_children_are_counted_once_per_holder() -> sgobject::Result<()> {
    let ctx = context();
    let m = machine(&ctx, 1.0);
    let guard = m.read()?;
    let count = guard.kernel.as_ref().map(Managed::ref_count);
    // Held by `kernel` and `extra`.
    assert_eq!(count, Some(2));
    Ok(())
}

#[test]
fn test_guarded_downcast() -> sgobject::Result<()> {
    let ctx = context();
    let any = Managed::new(&ctx, Kernel { width: 3.0 }).into_object();
    assert_eq!(any.ref_count(), 1);

    let kernel = any.downcast::<Kernel>()?;
    assert_eq!(kernel.read()?.width, 3.0);
    assert_eq!(any.ref_count(), 2);

    match any.downcast::<Machine>() {
        Err(ParamError::Downcast { expected, found }) => {
            assert_eq!(expected, "Machine");
            assert_eq!(found, "Kernel");
        }
        other => return Err(ParamError::Internal(format!("unexpected {other:?}"))),
    }
    assert!(Kernel::from_object(any).is_ok());
    Ok(())
}

#[test]
fn test_objects_keep_the_collaborators_they_were_built_with() {
    let ctx = context();
    let before = Managed::new(&ctx, Kernel::default());

    ctx.set_io(Arc::new(Io::new(MessageLevel::Error)));
    ctx.set_parallel(Arc::new(Parallel::new(3)));
    ctx.set_version(Arc::new(Version::new(4)));
    let after = Managed::new(&ctx, Kernel::default());

    assert_ne!(before.keeper().io().level(), MessageLevel::Error);
    assert_eq!(after.keeper().io().level(), MessageLevel::Error);
    assert_eq!(after.keeper().parallel().num_threads(), 3);
    assert_eq!(before.keeper().version().parameter_version(), 0);
    assert_eq!(after.keeper().version().parameter_version(), 4);
}

#[test]
fn test_clone_object_is_deep() -> sgobject::Result<()> {
    let ctx = context();
    let original = machine(&ctx, 2.0);
    let copy = original.clone_object()?;

    assert!(!copy.ptr_eq(&original));
    assert!(copy.equals(&original, 0.0)?);
    assert_eq!(copy.ref_count(), 1);

    let shared = match (&original.read()?.kernel, &copy.read()?.kernel) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => true,
    };
    assert!(!shared);

    if let Some(k) = &copy.read()?.kernel {
        k.write()?.width = 2.5;
    }
    assert!(!copy.equals(&original, 0.0)?);
    assert!(copy.equals(&original, 1.0)?);
    Ok(())
}

#[test]
fn test_parameter_hash_tracks_changes() -> sgobject::Result<()> {
    let ctx = context();
    let a = machine(&ctx, 1.0);
    let b = machine(&ctx, 1.0);
    assert_eq!(a.parameter_hash()?, b.parameter_hash()?);

    a.update_parameter_hash()?;
    assert!(!a.parameter_hash_changed()?);
    a.write()?.bias = -1.0;
    assert!(a.parameter_hash_changed()?);
    assert_ne!(a.parameter_hash()?, b.parameter_hash()?);
    Ok(())
}

#[test]
fn test_describe_lists_parameters() -> sgobject::Result<()> {
    let ctx = context();
    let k = Managed::new(&ctx, Kernel::default());
    assert_eq!(k.describe()?, "width (float64): Bandwidth of the kernel.\n");
    k.print_parameters()
}

#[test]
fn test_generic_tag() {
    let ctx = context();
    let k = Managed::new(&ctx, Kernel::default());
    assert!(!k.keeper().is_generic());

    k.keeper().set_generic(PrimitiveType::Float32);
    assert_eq!(k.keeper().generic(), Some(PrimitiveType::Float32));
    k.keeper().unset_generic();
    assert_eq!(k.keeper().generic(), None);
}

#[test]
fn test_registry() -> sgobject::Result<()> {
    let ctx = context();
    assert!(ctx.is_registered("Kernel", None));
    let created = ctx.create("Kernel", None)?;
    assert_eq!(created.class_name(), "Kernel");
    assert_eq!(created.ref_count(), 1);

    assert!(matches!(
        ctx.create("Kernel", Some(PrimitiveType::Float64)),
        Err(ParamError::UnknownClass(_))
    ));

    // Registering twice replaces the factory.
    ctx.register_factory("Kernel", None, |ctx| {
        Managed::new(ctx, Kernel { width: 9.0 }).into_object()
    });
    let created = ctx.create("Kernel", None)?.downcast::<Kernel>()?;
    assert_eq!(created.read()?.width, 9.0);
    Ok(())
}

#[test]
fn test_ref_value() {
    let ctx = context();
    let k = Managed::new(&ctx, Kernel::default());
    let held = Some(k.clone());

    let taken = held.ref_value();
    assert_eq!(k.ref_count(), 3);
    drop(taken);
    assert_eq!(k.ref_count(), 2);
    assert_eq!(7i32.ref_value(), 7);
    assert!(None::<Managed<Kernel>>.ref_value().is_none());
}

proptest! {
    #[test]
    fn prop_count_matches_live_handles(ops in prop::collection::vec(any::<bool>(), 0..64)) {
        let ctx = Context::new();
        let root = Managed::new(&ctx, Kernel::default());
        let mut handles = Vec::new();
        for take in ops {
            if take {
                handles.push(root.ref_());
            } else if let Some(h) = handles.pop() {
                h.unref();
            }
            prop_assert_eq!(root.ref_count(), 1 + handles.len() as i32);
        }
    }
}
