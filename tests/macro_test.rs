#![allow(missing_docs)]

use std::collections::HashMap;

use sgobject::datatype::PrimitiveType;
use sgobject::{
    Context, FileFormat, Managed, ParamError, Parameterized, SGObject, SGString, SGVector,
    Serializer,
};

#[derive(Default, Parameterized)]
#[sgobject(name = "GaussianKernel", generic = T)]
struct Gaussian<T> {
    /// Kernel width.
    width: f64,
    #[param(name = "cache_values", description = "Cached kernel rows")]
    cache: SGVector<T>,
    #[param(matrix(rows = num_rows, cols = num_cols))]
    block: Vec<T>,
    #[param(skip)]
    num_rows: usize,
    #[param(skip)]
    num_cols: usize,
    #[param(skip)]
    scratch: Vec<u8>,
}

fn gaussian(ctx: &Context) -> Managed<Gaussian<f32>> {
    Managed::new(
        ctx,
        Gaussian {
            width: 2.0,
            cache: SGVector::from_vec(vec![0.5, 0.25]),
            block: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            num_rows: 3,
            num_cols: 2,
            scratch: vec![1, 2, 3],
        },
    )
}

#[test]
fn test_macro_ergonomics() -> sgobject::Result<()> {
    let ctx = Context::new();
    let obj = gaussian(&ctx);

    let params = obj.parameters()?;
    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["block", "cache_values", "width"]);

    let described: Vec<(&str, String)> = params
        .iter()
        .map(|p| (p.description.as_str(), p.datatype.to_string()))
        .collect();
    assert_eq!(
        described,
        [
            ("", "Matrix<float32>".to_string()),
            ("Cached kernel rows", "SGVector<float32>".to_string()),
            ("Kernel width.", "float64".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_generic_classes_register_per_instantiation() -> sgobject::Result<()> {
    let ctx = Context::new();
    ctx.register::<Gaussian<f32>>().register::<Gaussian<f64>>();
    assert!(ctx.is_registered("GaussianKernel", Some(PrimitiveType::Float32)));
    assert!(ctx.is_registered("GaussianKernel", Some(PrimitiveType::Float64)));
    assert!(!ctx.is_registered("GaussianKernel", None));

    let obj = gaussian(&ctx);
    assert_eq!(obj.keeper().generic(), Some(PrimitiveType::Float32));
    assert_eq!(obj.class_name(), "GaussianKernel");

    let text = Serializer::builder().to_bytes(&obj)?;
    assert!(String::from_utf8_lossy(&text).contains("GaussianKernel<float32> ["));

    let json: serde_json::Value = serde_json::from_slice(
        &Serializer::builder().format(FileFormat::Json).to_bytes(&obj)?,
    )?;
    assert_eq!(json["generic"], PrimitiveType::Float32.index());

    let loaded = Serializer::load_bytes(&text, &ctx)?;
    assert!(loaded.downcast::<Gaussian<f64>>().is_err());
    let loaded = loaded.downcast::<Gaussian<f32>>()?;
    let guard = loaded.read()?;
    assert_eq!((guard.num_rows, guard.num_cols), (3, 2));
    assert_eq!(guard.block, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    // Skipped fields come back at their default.
    assert!(guard.scratch.is_empty());
    Ok(())
}

#[derive(Default, Parameterized)]
struct Marker;

#[test]
fn test_unit_structs_have_no_parameters() -> sgobject::Result<()> {
    let ctx = Context::new();
    let obj = Managed::new(&ctx, Marker);
    assert!(obj.parameters()?.is_empty());
    assert_eq!(obj.read()?.get_name(), "Marker");
    Ok(())
}

// `index` is derived from `words` and rebuilt after every load.
#[derive(Default, Parameterized)]
#[sgobject(load_post = rebuild_index, save_pre = reject_empty_words)]
struct Vocabulary {
    words: Vec<SGString<char>>,
    #[param(skip)]
    index: HashMap<String, usize>,
}

fn rebuild_index(vocab: &mut Vocabulary) -> sgobject::Result<()> {
    vocab.index = vocab
        .words
        .iter()
        .enumerate()
        .map(|(i, w)| (w.to_std_string(), i))
        .collect();
    Ok(())
}

fn reject_empty_words(vocab: &Vocabulary) -> sgobject::Result<()> {
    if vocab.words.iter().any(|w| w.is_empty()) {
        return Err(ParamError::InvalidParameter("empty word".into()));
    }
    Ok(())
}

#[test]
fn test_hooks_rebuild_derived_state() -> sgobject::Result<()> {
    let ctx = Context::new();
    ctx.register::<Vocabulary>();
    let vocab = Managed::new(
        &ctx,
        Vocabulary {
            words: vec!["alpha".into(), "beta".into()],
            index: HashMap::new(),
        },
    );

    for format in [FileFormat::Ascii, FileFormat::Binary] {
        let bytes = Serializer::builder().format(format).to_bytes(&vocab)?;
        let loaded = Serializer::load_bytes(&bytes, &ctx)?.downcast::<Vocabulary>()?;
        let guard = loaded.read()?;
        assert_eq!(guard.index.get("beta"), Some(&1));
        assert_eq!(guard.index.len(), 2);
    }

    let copy = vocab.clone_object()?;
    assert_eq!(copy.read()?.index.get("alpha"), Some(&0));

    vocab.write()?.words.push(SGString::from(""));
    assert!(matches!(
        Serializer::builder().to_bytes(&vocab),
        Err(ParamError::InvalidParameter(_))
    ));
    Ok(())
}
