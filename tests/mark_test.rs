use iso_export::inkscape::{ExportDirective, Rasterizer};
use iso_export::sprite::{GeometricBounds, find_iso_groups, parse_marker_text};
use iso_export::{
    Document, ExportError, MarkOptions, SearchScope, SpriteExportOptions, export_sprites,
    mark_groups,
};
use std::fs;
use std::path::Path;

fn read_world() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/artifacts/world.svg");
    fs::read_to_string(&path).expect("Failed to read world.svg")
}

struct NoImages;

impl Rasterizer for NoImages {
    fn rasterize(&self, _: &str, _: &[ExportDirective], _: f64) -> iso_export::Result<()> {
        Ok(())
    }
}

fn mark(ids: &[&str], origin_location: u8) -> MarkOptions {
    MarkOptions {
        selection: ids.iter().map(|s| s.to_string()).collect(),
        origin_location,
        z_value: 1.5,
        show_origin: true,
    }
}

#[test]
fn test_marked_group_becomes_sprite() {
    let svg = read_world();
    let doc = Document::parse(&svg).unwrap();

    // Bottom center of the trunk
    let result = mark_groups(&doc, &svg, &mark(&["tree"], 8)).unwrap();
    assert_eq!(result.markers.len(), 1);
    // Four markers already in the document
    assert_eq!(result.markers[0].label, "[ISO ORIGIN][#4][Z=1.5000]");
    assert_eq!(parse_marker_text(&result.markers[0].label), (Some(4), Some(1.5)));

    let marked = Document::parse(&result.svg).unwrap();
    let scope = marked.scope(SearchScope::Auto, &[]).unwrap();
    let groups: Vec<String> = find_iso_groups(&scope)
        .iter()
        .filter_map(|c| c.last().map(|n| n.id.clone()))
        .collect();
    assert_eq!(groups, vec!["house1", "house2", "flat", "tree", "stray"]);

    let dir = tempfile::tempdir().unwrap();
    let opts = SpriteExportOptions {
        export_path: dir.path().to_path_buf(),
        selection: vec!["tree".to_string()],
        ..Default::default()
    };
    let export = export_sprites(&marked, &result.svg, &opts, &GeometricBounds, &NoImages).unwrap();
    let tree = &export.descriptors[0];
    assert_eq!(tree.name, "Tree");
    assert_eq!(tree.location.z, 1.5);
    assert!((tree.anchor.x - 0.5).abs() < 1e-6, "{:?}", tree.anchor);
    assert!((tree.anchor.y - 1.0).abs() < 1e-6, "{:?}", tree.anchor);
    assert_eq!((tree.size.width, tree.size.height), (40, 120));
}

#[test]
fn test_remark_replaces_marker() {
    let svg = read_world();
    let doc = Document::parse(&svg).unwrap();

    let result = mark_groups(&doc, &svg, &mark(&["house1"], 1)).unwrap();
    // house1 loses its own marker, three others remain
    assert_eq!(result.markers[0].label, "[ISO ORIGIN][#3][Z=1.5000]");
    assert!(!result.svg.contains("[ISO ORIGIN][#0][Z=0.5000]"));

    let marked = Document::parse(&result.svg).unwrap();
    let chain = marked.find("house1").unwrap();
    let house = chain[chain.len() - 1];
    assert_eq!(house.children.len(), 2);
    assert_eq!(house.children[0].id, "house1-body");

    // Everything outside the group is left as it was
    assert!(result.svg.contains(r#"<sodipodi:namedview id="namedview1""#));
    assert!(result.svg.contains("marker-start:url(#Square)"));
}

#[test]
fn test_mark_requires_groups() {
    let svg = read_world();
    let doc = Document::parse(&svg).unwrap();
    assert!(matches!(
        mark_groups(&doc, &svg, &mark(&["road1"], 5)),
        Err(ExportError::Config(_))
    ));
}
