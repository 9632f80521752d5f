#![allow(missing_docs)]
use sgobject::{Context, FileFormat, Inspector, Managed, Parameterized, SGMatrix, Serializer};
use tempfile::tempdir;

#[derive(Default, Parameterized)]
struct Distance {
    power: f64,
}

#[derive(Default, Parameterized)]
struct Classifier {
    distance: Option<Managed<Distance>>,
    labels: Vec<i32>,
    centers: SGMatrix<f64>,
}

fn classifier(ctx: &Context) -> sgobject::Result<Managed<Classifier>> {
    Ok(Managed::new(
        ctx,
        Classifier {
            distance: Some(Managed::new(ctx, Distance { power: 2.0 })),
            labels: vec![0, 1, 1],
            centers: SGMatrix::from_vec(vec![0.0; 6], 2, 3)?,
        },
    ))
}

#[test]
fn test_inspect_saved_files() -> sgobject::Result<()> {
    let ctx = Context::new();
    let obj = classifier(&ctx)?;
    let dir = tempdir()?;

    for format in [FileFormat::Ascii, FileFormat::Binary] {
        let path = dir.path().join(format!("model.{format}"));
        Serializer::builder().format(format).version(3).save(&path, &obj)?;

        let report = Inspector::inspect(&path)?;
        assert_eq!(report.format, format);
        assert_eq!(report.version, 3);
        assert_eq!(report.size, std::fs::metadata(&path)?.len());
        assert_eq!(report.root.class_name, "Classifier");
        assert_eq!(report.root.field, None);

        let shapes: Vec<(&str, &str)> = report
            .root
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.shape.as_str()))
            .collect();
        assert_eq!(
            shapes,
            [("centers", "2x3"), ("distance", "scalar"), ("labels", "3")]
        );

        assert_eq!(report.root.children.len(), 1);
        let child = &report.root.children[0];
        assert_eq!(child.field.as_deref(), Some("distance"));
        assert_eq!(child.class_name, "Distance");
    }
    Ok(())
}

#[test]
fn test_report_rendering() -> sgobject::Result<()> {
    let ctx = Context::new();
    let bytes = Serializer::builder().to_bytes(&classifier(&ctx)?)?;
    let report = Inspector::inspect_bytes(&bytes)?;

    let text = report.to_string();
    assert!(text.contains("=== SGOBJECT INSPECTOR REPORT ==="));
    assert!(text.contains("└── Classifier | Parameters: 3"));
    assert!(text.contains("- centers SGMatrix<float64> [2x3]"));
    assert!(text.contains("└── distance: Distance | Parameters: 1"));

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["root"]["children"][0]["class_name"], "Distance");
    Ok(())
}

#[test]
fn test_inspecting_garbage_fails() {
    assert!(Inspector::inspect_bytes(b"\x00\x01garbage").is_err());
}
