//! Placing origin markers on groups

use std::collections::HashSet;

use super::{ISO_ORIGIN_TAG, is_origin_marker};
use crate::config::MarkOptions;
use crate::document::rewrite::{MarkerInsert, insert_origin_markers};
use crate::document::{Bounds, Document, Node, node_bounds};
use crate::error::{Diagnostic, ExportError, Result, report_diagnostics};
use crate::types::{Point, XForm};

/// Result of marking: the new document text and what was placed
#[derive(Debug)]
pub struct MarkResult {
    pub svg: String,
    pub markers: Vec<MarkerInsert>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn marker_label(number: usize, z: f64) -> String {
    format!("{}[#{}][Z={:.4}]", ISO_ORIGIN_TAG, number, z)
}

/// Compass point of `bounds`: 1 top left, 2 top, 3 top right, 4 left,
/// 5 center, 6 right, 7 bottom left, 8 bottom, 9 bottom right
pub fn compass_point(bounds: &Bounds, location: u8) -> Result<Point> {
    if !(1..=9).contains(&location) {
        return Err(ExportError::Config(format!(
            "Origin location must be between 1 and 9, got {}",
            location
        )));
    }
    let column = (location - 1) % 3;
    let row = (location - 1) / 3;
    let pick = |min: f64, max: f64, i: u8| match i {
        0 => min,
        1 => (min + max) / 2.0,
        _ => max,
    };
    Ok(Point::new(
        pick(bounds.min_x, bounds.max_x, column),
        pick(bounds.min_y, bounds.max_y, row),
    ))
}

fn count_markers(node: &Node) -> usize {
    let own = usize::from(is_origin_marker(node));
    own + node.children.iter().map(count_markers).sum::<usize>()
}

/// Transform from the document root to the local space of the last node
fn user_transform(chain: &[&Node]) -> XForm {
    chain
        .iter()
        .fold(XForm::identity(), |acc, node| acc.compose(&node.transform))
}

/// Give every selected group a fresh origin marker.
///
/// Old markers of the group are removed. Markers are numbered by how many
/// other markers the document holds at that point, counting the ones placed
/// earlier in the same run.
pub fn mark_groups(doc: &Document, svg: &str, opts: &MarkOptions) -> Result<MarkResult> {
    let mut seen = HashSet::new();
    let mut groups = Vec::new();
    for id in &opts.selection {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let chain = doc
            .find(id)
            .ok_or_else(|| ExportError::Config(format!("Selected object '{}' not found", id)))?;
        match chain.last() {
            Some(node) if node.is_group() => groups.push(chain),
            _ => log::debug!("Skipping '{}', not a group", id),
        }
    }
    if groups.is_empty() {
        return Err(ExportError::Config(
            "No groups selected, nothing to mark.".to_string(),
        ));
    }

    let mut total = count_markers(&doc.root);
    let mut markers = Vec::new();
    let mut diagnostics = Vec::new();

    for chain in &groups {
        let Some((group, ancestors)) = chain.split_last() else {
            continue;
        };
        let parent = user_transform(ancestors);
        let Some(bounds) = node_bounds(group, &parent, &is_origin_marker) else {
            diagnostics.push(Diagnostic::new(
                &group.id,
                ExportError::MissingBounds {
                    group_id: group.id.clone(),
                },
            ));
            continue;
        };
        let position = compass_point(&bounds, opts.origin_location)?;

        let group_xform = parent.compose(&group.transform);
        let Some(inverse) = group_xform.inverse() else {
            diagnostics.push(Diagnostic::new(
                &group.id,
                ExportError::Svg(format!("Group '{}' has a singular transform", group.id)),
            ));
            continue;
        };

        let old = group.children.iter().filter(|c| is_origin_marker(c)).count();
        let number = total - old;
        total = number + 1;

        let label = marker_label(number, opts.z_value);
        log::info!(
            "Marking '{}' with {} at ({:.2}, {:.2})",
            group.id,
            label,
            position.x,
            position.y
        );
        markers.push(MarkerInsert {
            group_id: group.id.clone(),
            label,
            transform: inverse.compose(&XForm::translate(position.x, position.y)),
            visible: opts.show_origin,
        });
    }

    let svg = insert_origin_markers(svg, &markers)?;
    report_diagnostics("Mark", &diagnostics);
    Ok(MarkResult {
        svg,
        markers,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg width="200" height="100">
  <g id="layer1" transform="translate(5,0)">
    <g id="house" transform="scale(2)">
      <rect x="0" y="0" width="10" height="20"/>
      <circle id="old" inkscape:label="[ISO ORIGIN][#0][Z=0.0000]" r="4" cx="50" cy="50"/>
    </g>
    <g id="tree">
      <rect x="100" y="0" width="4" height="4"/>
    </g>
    <rect id="lonely" width="1" height="1"/>
  </g>
  <circle id="elsewhere" inkscape:label="[ISO ORIGIN]" r="1"/>
</svg>"#;

    fn opts(selection: &[&str]) -> MarkOptions {
        MarkOptions {
            selection: selection.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_marker_label() {
        assert_eq!(marker_label(3, 1.5), "[ISO ORIGIN][#3][Z=1.5000]");
    }

    #[test]
    fn test_compass_points() {
        let b = Bounds::new(0.0, 0.0, 10.0, 20.0);
        assert_eq!(compass_point(&b, 1).unwrap(), Point::new(0.0, 0.0));
        assert_eq!(compass_point(&b, 3).unwrap(), Point::new(10.0, 0.0));
        assert_eq!(compass_point(&b, 5).unwrap(), Point::new(5.0, 10.0));
        assert_eq!(compass_point(&b, 8).unwrap(), Point::new(5.0, 20.0));
        assert_eq!(compass_point(&b, 9).unwrap(), Point::new(10.0, 20.0));
        assert!(compass_point(&b, 0).is_err());
        assert!(compass_point(&b, 10).is_err());
    }

    #[test]
    fn test_marker_lands_on_group_center() {
        let doc = Document::parse(SVG).unwrap();
        let result = mark_groups(&doc, SVG, &opts(&["house"])).unwrap();
        assert_eq!(result.markers.len(), 1);

        let marked = Document::parse(&result.svg).unwrap();
        let chain = marked.find(&result.markers[0].label).unwrap();
        // Old marker replaced, rect kept
        assert_eq!(chain[chain.len() - 2].children.len(), 2);
        let p = user_transform(&chain).transform_point(Point::new(0.0, 0.0));
        // rect 0..10 x 0..20 scaled by 2 and shifted by 5
        assert!((p.x - 15.0).abs() < 1e-9 && (p.y - 20.0).abs() < 1e-9, "{:?}", p);
    }

    #[test]
    fn test_numbering_counts_other_markers() {
        let doc = Document::parse(SVG).unwrap();
        let result = mark_groups(&doc, SVG, &opts(&["house", "tree"])).unwrap();
        let labels: Vec<&str> = result.markers.iter().map(|m| m.label.as_str()).collect();
        // Two markers in the document, one of them replaced
        assert_eq!(
            labels,
            vec!["[ISO ORIGIN][#1][Z=0.0000]", "[ISO ORIGIN][#2][Z=0.0000]"]
        );
    }

    #[test]
    fn test_non_groups_are_ignored() {
        let doc = Document::parse(SVG).unwrap();
        let result = mark_groups(&doc, SVG, &opts(&["lonely", "tree"])).unwrap();
        assert_eq!(result.markers.len(), 1);
        assert_eq!(result.markers[0].group_id, "tree");
    }

    #[test]
    fn test_nothing_to_mark() {
        let doc = Document::parse(SVG).unwrap();
        assert!(matches!(
            mark_groups(&doc, SVG, &opts(&["lonely"])),
            Err(ExportError::Config(_))
        ));
        assert!(matches!(
            mark_groups(&doc, SVG, &opts(&[])),
            Err(ExportError::Config(_))
        ));
        assert!(matches!(
            mark_groups(&doc, SVG, &opts(&["missing"])),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn test_hidden_marker_option() {
        let doc = Document::parse(SVG).unwrap();
        let options = MarkOptions {
            show_origin: false,
            origin_location: 1,
            z_value: 2.0,
            ..opts(&["tree"])
        };
        let result = mark_groups(&doc, SVG, &options).unwrap();
        let marked = Document::parse(&result.svg).unwrap();
        let chain = marked.find("[ISO ORIGIN][#2][Z=2.0000]").unwrap();
        let marker = chain[chain.len() - 1];
        assert!(marker.style.is_hidden());
        let p = user_transform(&chain).transform_point(Point::new(0.0, 0.0));
        assert!((p.x - 105.0).abs() < 1e-9 && p.y.abs() < 1e-9, "{:?}", p);
    }
}
