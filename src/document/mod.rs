//! Read-only SVG object tree
//!
//! This module parses an Inkscape SVG into a tree of [`Node`]s with labels,
//! transforms, styles and expanded path commands. It also provides geometric
//! bounds and stream rewriting of the SVG text.

pub mod bounds;
pub mod parser;
pub mod path_data;
pub mod rewrite;

use std::collections::HashMap;

use crate::config::SearchScope;
use crate::error::{ExportError, Result};
use crate::types::{PathCommand, Point, XForm};

pub use bounds::{Bounds, node_bounds, shape_bounds};
pub use parser::{parse_document, parse_length, parse_transform};
pub use path_data::parse_path_data;

/// Ancestors of a node from the document root down to the node itself
pub type NodeChain<'a> = Vec<&'a Node>;

/// Node geometry and role
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Group {
        layer: bool,
    },
    Path {
        commands: Vec<PathCommand>,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },
    Line {
        from: Point,
        to: Point,
    },
    Polyline {
        points: Vec<Point>,
    },
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Anything not drawn directly (`defs`, `text`, `use`, metadata)
    Other(String),
}

/// Style properties from presentation attributes and the `style` attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    properties: HashMap<String, String>,
}

impl Style {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn set(&mut self, property: &str, value: &str) {
        self.properties
            .insert(property.trim().to_string(), value.trim().to_string());
    }

    /// Apply a `style="a:b;c:d"` declaration list on top of existing values
    pub fn apply_declarations(&mut self, declarations: &str) {
        for decl in declarations.split(';') {
            if let Some((key, value)) = decl.split_once(':')
                && !key.trim().is_empty()
            {
                self.set(key, value);
            }
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.get("display") == Some("none")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Element id, or a synthetic `<tag>-auto<N>` when the element has none
    pub id: String,
    /// `inkscape:label`
    pub label: Option<String>,
    pub kind: NodeKind,
    pub transform: XForm,
    pub style: Style,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: None,
            kind,
            transform: XForm::identity(),
            style: Style::default(),
            children: Vec::new(),
        }
    }

    /// Label if present, else id
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Root | NodeKind::Group { .. })
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }

    /// True if the label or the id contains `tag`
    pub fn is_tagged(&self, tag: &str) -> bool {
        self.label.as_deref().is_some_and(|l| l.contains(tag)) || self.id.contains(tag)
    }
}

/// Parsed SVG document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Page width in pixels
    pub width: f64,
    /// Page height in pixels
    pub height: f64,
    /// User units to canvas pixels (the `viewBox` mapping)
    pub view_transform: XForm,
    pub root: Node,
}

impl Document {
    pub fn parse(svg: &str) -> Result<Document> {
        parse_document(svg)
    }

    pub fn page_center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Chain of nodes from the root down to the node with `id`
    pub fn find(&self, id: &str) -> Option<NodeChain<'_>> {
        fn search<'a>(node: &'a Node, id: &str, chain: &mut NodeChain<'a>) -> bool {
            chain.push(node);
            if node.id == id {
                return true;
            }
            for child in &node.children {
                if search(child, id, chain) {
                    return true;
                }
            }
            chain.pop();
            false
        }

        let mut chain = Vec::new();
        search(&self.root, id, &mut chain).then_some(chain)
    }

    /// Transform from the local space of the last node in `chain` to canvas
    /// pixels. Includes that node's own transform.
    pub fn canvas_transform(&self, chain: &[&Node]) -> XForm {
        chain
            .iter()
            .fold(self.view_transform, |acc, node| acc.compose(&node.transform))
    }

    /// Starting points for a walk, honoring the search scope
    pub fn scope(&self, scope: SearchScope, selection: &[String]) -> Result<Vec<NodeChain<'_>>> {
        let use_selection = match scope {
            SearchScope::Auto => !selection.is_empty(),
            SearchScope::Everything => false,
            SearchScope::Selection => {
                if selection.is_empty() {
                    return Err(ExportError::Config(
                        "Search scope is \"selection\" but nothing selected.".to_string(),
                    ));
                }
                true
            }
        };

        if !use_selection {
            return Ok(vec![vec![&self.root]]);
        }

        selection
            .iter()
            .map(|id| {
                self.find(id).ok_or_else(|| {
                    ExportError::Config(format!("Selected object '{}' not found", id))
                })
            })
            .collect()
    }
}

/// Synthetic ids for elements without one, numbered in document order.
/// The parser and the rewriter must see the same element sequence.
#[derive(Debug, Default)]
pub(crate) struct AutoIds {
    next: usize,
}

impl AutoIds {
    pub(crate) fn resolve(&mut self, tag: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => id.to_string(),
            None => {
                let id = format!("{}-auto{}", tag, self.next);
                self.next += 1;
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">
  <g id="layer1" inkscape:label="Layer 1" inkscape:groupmode="layer">
    <g id="house" transform="translate(10,20)">
      <rect id="wall" x="0" y="0" width="5" height="5"/>
    </g>
  </g>
</svg>"#;

    #[test]
    fn test_find_returns_chain_from_root() {
        let doc = Document::parse(SVG).unwrap();
        let chain = doc.find("wall").unwrap();
        let ids: Vec<&str> = chain.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["svg-auto0", "layer1", "house", "wall"]);
        assert!(doc.find("missing").is_none());
    }

    #[test]
    fn test_canvas_transform_composes_ancestors() {
        let doc = Document::parse(SVG).unwrap();
        let chain = doc.find("wall").unwrap();
        let p = doc.canvas_transform(&chain).transform_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(11.0, 21.0));
    }

    #[test]
    fn test_scope_auto_without_selection_is_root() {
        let doc = Document::parse(SVG).unwrap();
        let scope = doc.scope(SearchScope::Auto, &[]).unwrap();
        assert_eq!(scope.len(), 1);
        assert_eq!(scope[0].len(), 1);
    }

    #[test]
    fn test_scope_selection_requires_selection() {
        let doc = Document::parse(SVG).unwrap();
        assert!(matches!(
            doc.scope(SearchScope::Selection, &[]),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn test_scope_unknown_id_is_config_error() {
        let doc = Document::parse(SVG).unwrap();
        let selection = vec!["nope".to_string()];
        assert!(matches!(
            doc.scope(SearchScope::Auto, &selection),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn test_style_declarations_override() {
        let mut style = Style::default();
        style.set("display", "inline");
        style.apply_declarations("display:none; marker-end:url(#Triangle)");
        assert!(style.is_hidden());
        assert_eq!(style.get("marker-end"), Some("url(#Triangle)"));
    }
}
