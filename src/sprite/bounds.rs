//! Bounding box sources for sprite groups

use std::collections::HashMap;

use super::is_origin_marker;
use crate::document::{Document, node_bounds};
use crate::error::{ExportError, Result};
use crate::inkscape::Inkscape;
use crate::types::BBox;

/// Measures groups in canvas pixels, all ids in one batch. Ids that cannot be
/// measured are left out of the result.
pub trait BoundsProvider {
    /// `svg` is the document text with origin markers hidden; `doc` is the
    /// parsed source.
    fn bounding_boxes(
        &self,
        doc: &Document,
        svg: &str,
        ids: &[String],
    ) -> Result<HashMap<String, BBox>>;
}

/// Rendered bounds including stroke width, computed by usvg
#[derive(Debug, Default)]
pub struct VisualBounds;

impl BoundsProvider for VisualBounds {
    fn bounding_boxes(
        &self,
        _doc: &Document,
        svg: &str,
        ids: &[String],
    ) -> Result<HashMap<String, BBox>> {
        let opt = usvg::Options::default();
        let tree = usvg::Tree::from_str(svg, &opt)
            .map_err(|e| ExportError::Svg(format!("Failed to parse SVG: {}", e)))?;

        let mut boxes = HashMap::new();
        for id in ids {
            let Some(node) = tree.node_by_id(id) else {
                log::debug!("usvg dropped '{}'", id);
                continue;
            };
            let rect = node.abs_stroke_bounding_box();
            boxes.insert(
                id.clone(),
                BBox::new(
                    rect.x() as f64,
                    rect.y() as f64,
                    rect.width() as f64,
                    rect.height() as f64,
                ),
            );
        }
        Ok(boxes)
    }
}

/// Shape geometry bounds from the parsed document, origin markers skipped
#[derive(Debug, Default)]
pub struct GeometricBounds;

impl BoundsProvider for GeometricBounds {
    fn bounding_boxes(
        &self,
        doc: &Document,
        _svg: &str,
        ids: &[String],
    ) -> Result<HashMap<String, BBox>> {
        let mut boxes = HashMap::new();
        for id in ids {
            let Some(chain) = doc.find(id) else {
                continue;
            };
            let Some((node, ancestors)) = chain.split_last() else {
                continue;
            };
            let parent = doc.canvas_transform(ancestors);
            if let Some(bounds) = node_bounds(node, &parent, &is_origin_marker) {
                boxes.insert(id.clone(), bounds.to_bbox());
            }
        }
        Ok(boxes)
    }
}

impl BoundsProvider for Inkscape {
    fn bounding_boxes(
        &self,
        _doc: &Document,
        svg: &str,
        ids: &[String],
    ) -> Result<HashMap<String, BBox>> {
        self.query_bounds(svg, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" width="100" height="100">
  <g id="layer">
    <g id="box" transform="translate(10,20)">
      <rect x="0" y="0" width="30" height="10" style="fill:#000000;stroke:#000000;stroke-width:2"/>
      <circle id="marker" inkscape:label="[ISO ORIGIN]" cx="100" cy="100" r="4"/>
    </g>
  </g>
</svg>"#;

    fn near(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_geometric_bounds_skip_markers() {
        let doc = Document::parse(SVG).unwrap();
        let boxes = GeometricBounds
            .bounding_boxes(&doc, SVG, &["box".to_string(), "nope".to_string()])
            .unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes["box"], BBox::new(10.0, 20.0, 30.0, 10.0));
    }

    #[test]
    fn test_visual_bounds_include_stroke() {
        let hidden = crate::document::rewrite::hide_origin_markers(SVG).unwrap();
        let doc = Document::parse(&hidden).unwrap();
        let boxes = VisualBounds
            .bounding_boxes(&doc, &hidden, &["box".to_string()])
            .unwrap();
        let b = boxes["box"];
        assert!(near(b.x, 9.0) && near(b.y, 19.0), "{:?}", b);
        assert!(near(b.width, 32.0) && near(b.height, 12.0), "{:?}", b);
    }
}
