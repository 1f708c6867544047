use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::path_data::{parse_number_list, parse_path_data};
use super::{AutoIds, Document, Node, NodeKind, Style};
use crate::error::{ExportError, Result};
use crate::types::{Point, XForm};

/// Presentation attributes that feed [`Style`]
const STYLE_ATTRIBUTES: [&str; 6] = [
    "display",
    "marker-start",
    "marker-mid",
    "marker-end",
    "fill",
    "stroke",
];

/// Attributes of an element as written in the source, entities left escaped
pub(crate) fn raw_attributes(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
            let value = std::str::from_utf8(&attr.value).unwrap_or("");
            (key.to_string(), value.to_string())
        })
        .collect()
}

/// Attributes of an element in source order, with entities unescaped.
/// A value with a malformed entity is kept as written.
pub(crate) fn attributes(e: &BytesStart) -> Vec<(String, String)> {
    raw_attributes(e)
        .into_iter()
        .map(|(key, value)| {
            let value = match quick_xml::escape::unescape(&value) {
                Ok(unescaped) => unescaped.into_owned(),
                Err(err) => {
                    log::debug!("Keeping '{}' escaped: {}", key, err);
                    value
                }
            };
            (key, value)
        })
        .collect()
}

pub(crate) fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Local tag name of an element (`svg:path` -> `path`)
pub(crate) fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// Parse a length into pixels. Unitless values are pixels.
pub fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let split = value
        .find(|ch: char| ch.is_ascii_alphabetic() || ch == '%')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.trim().parse().ok()?;

    let factor = match unit.trim() {
        "" | "px" => 1.0,
        "in" => 96.0,
        "mm" => 96.0 / 25.4,
        "cm" => 96.0 / 2.54,
        "q" | "Q" => 96.0 / 101.6,
        "pt" => 96.0 / 72.0,
        "pc" => 16.0,
        _ => return None,
    };
    Some(number * factor)
}

fn length_attr(attrs: &[(String, String)], key: &str) -> f64 {
    attr(attrs, key).and_then(parse_length).unwrap_or(0.0)
}

/// Parse an SVG `transform` attribute. Functions compose left to right.
pub fn parse_transform(value: &str) -> XForm {
    let mut result = XForm::identity();
    let mut rest = value.trim();

    while !rest.is_empty() {
        let (Some(open), Some(close)) = (rest.find('('), rest.find(')')) else {
            log::warn!("Invalid transform, using identity: {}", value);
            return XForm::identity();
        };
        if close < open {
            log::warn!("Invalid transform, using identity: {}", value);
            return XForm::identity();
        }

        let name = rest[..open].trim_matches(|ch: char| ch.is_whitespace() || ch == ',');
        let args = parse_number_list(&rest[open + 1..close]);

        let t = match (name, args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => XForm {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            },
            ("translate", [tx]) => XForm::translate(*tx, 0.0),
            ("translate", [tx, ty]) => XForm::translate(*tx, *ty),
            ("scale", [s]) => XForm::scale(*s, *s),
            ("scale", [sx, sy]) => XForm::scale(*sx, *sy),
            ("rotate", [angle]) => XForm::rotate(*angle),
            ("rotate", [angle, cx, cy]) => XForm::translate(*cx, *cy)
                .compose(&XForm::rotate(*angle))
                .compose(&XForm::translate(-cx, -cy)),
            ("skewX", [angle]) => XForm::skew_x(*angle),
            ("skewY", [angle]) => XForm::skew_y(*angle),
            _ => {
                log::warn!("Invalid transform, using identity: {}", value);
                return XForm::identity();
            }
        };

        result = result.compose(&t);
        rest = rest[close + 1..].trim_start();
    }

    result
}

/// Page size and `viewBox` mapping from the root `<svg>` attributes
fn parse_canvas(attrs: &[(String, String)]) -> (f64, f64, XForm) {
    let view_box = attr(attrs, "viewBox")
        .map(parse_number_list)
        .filter(|vb| vb.len() == 4 && vb[2] > 0.0 && vb[3] > 0.0);

    let width = attr(attrs, "width").and_then(parse_length);
    let height = attr(attrs, "height").and_then(parse_length);

    match view_box {
        Some(vb) => {
            let width = width.unwrap_or(vb[2]);
            let height = height.unwrap_or(vb[3]);
            let view = XForm::scale(width / vb[2], height / vb[3])
                .compose(&XForm::translate(-vb[0], -vb[1]));
            (width, height, view)
        }
        None => (
            width.unwrap_or(100.0),
            height.unwrap_or(100.0),
            XForm::identity(),
        ),
    }
}

fn parse_points(value: &str) -> Vec<Point> {
    parse_number_list(value)
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], pair[1]))
        .collect()
}

fn build_kind(tag: &str, id: &str, attrs: &[(String, String)]) -> NodeKind {
    match tag {
        "g" | "a" | "switch" | "svg" => NodeKind::Group {
            layer: attr(attrs, "inkscape:groupmode") == Some("layer"),
        },
        "path" => {
            let d = attr(attrs, "d").unwrap_or("");
            let commands = match parse_path_data(d) {
                Ok(commands) => commands,
                Err(e) => {
                    log::warn!("Path '{}' has invalid data ({}), keeping what parsed", id, e);
                    e.parsed
                }
            };
            NodeKind::Path { commands }
        }
        "rect" => NodeKind::Rect {
            x: length_attr(attrs, "x"),
            y: length_attr(attrs, "y"),
            width: length_attr(attrs, "width"),
            height: length_attr(attrs, "height"),
        },
        "circle" => NodeKind::Circle {
            cx: length_attr(attrs, "cx"),
            cy: length_attr(attrs, "cy"),
            r: length_attr(attrs, "r"),
        },
        "ellipse" => NodeKind::Ellipse {
            cx: length_attr(attrs, "cx"),
            cy: length_attr(attrs, "cy"),
            rx: length_attr(attrs, "rx"),
            ry: length_attr(attrs, "ry"),
        },
        "line" => NodeKind::Line {
            from: Point::new(length_attr(attrs, "x1"), length_attr(attrs, "y1")),
            to: Point::new(length_attr(attrs, "x2"), length_attr(attrs, "y2")),
        },
        "polyline" | "polygon" => {
            let mut points = parse_points(attr(attrs, "points").unwrap_or(""));
            if tag == "polygon"
                && let Some(first) = points.first().copied()
            {
                points.push(first);
            }
            NodeKind::Polyline { points }
        }
        "image" => NodeKind::Image {
            x: length_attr(attrs, "x"),
            y: length_attr(attrs, "y"),
            width: length_attr(attrs, "width"),
            height: length_attr(attrs, "height"),
        },
        other => NodeKind::Other(other.to_string()),
    }
}

fn build_node(e: &BytesStart, ids: &mut AutoIds) -> Node {
    let attrs = attributes(e);
    let tag = tag_name(e);
    let id = ids.resolve(&tag, attr(&attrs, "id"));

    let mut style = Style::default();
    for key in STYLE_ATTRIBUTES {
        if let Some(value) = attr(&attrs, key) {
            style.set(key, value);
        }
    }
    if let Some(decls) = attr(&attrs, "style") {
        style.apply_declarations(decls);
    }

    Node {
        kind: build_kind(&tag, &id, &attrs),
        label: attr(&attrs, "inkscape:label").map(str::to_string),
        transform: attr(&attrs, "transform")
            .map(parse_transform)
            .unwrap_or_default(),
        style,
        children: Vec::new(),
        id,
    }
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    }
}

/// Parse an SVG string into a [`Document`]
pub fn parse_document(svg: &str) -> Result<Document> {
    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(true);

    let mut ids = AutoIds::default();
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;
    let mut canvas: Option<(f64, f64, XForm)> = None;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if root.is_some() && stack.is_empty() =>
            {
                // Content after the root element closes
                log::warn!("Ignoring <{}> after the root element", tag_name(e));
            }
            Ok(Event::Start(ref e)) => {
                let mut node = build_node(e, &mut ids);
                if stack.is_empty() {
                    canvas = Some(root_canvas(e, &mut node)?);
                }
                stack.push(node);
            }
            Ok(Event::Empty(ref e)) => {
                let mut node = build_node(e, &mut ids);
                if stack.is_empty() {
                    canvas = Some(root_canvas(e, &mut node)?);
                }
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::End(_)) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExportError::Xml(format!("XML parsing error: {:?}", e))),
            _ => {}
        }
        buf.clear();
    }

    let (Some(root), Some((width, height, view_transform))) = (root, canvas) else {
        return Err(ExportError::Svg("Document has no root element".to_string()));
    };

    log::debug!(
        "Parsed document {}x{} px with {} top-level node(s)",
        width,
        height,
        root.children.len()
    );

    Ok(Document {
        width,
        height,
        view_transform,
        root,
    })
}

/// Turn the first element into the document root
fn root_canvas(e: &BytesStart, node: &mut Node) -> Result<(f64, f64, XForm)> {
    let tag = tag_name(e);
    if tag != "svg" {
        return Err(ExportError::Svg(format!(
            "Expected <svg> root element, found <{}>",
            tag
        )));
    }
    node.kind = NodeKind::Root;
    // The viewBox mapping replaces any root transform
    node.transform = XForm::identity();
    Ok(parse_canvas(&attributes(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PathCommand;

    fn near(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_length_units() {
        assert_eq!(parse_length("12"), Some(12.0));
        assert_eq!(parse_length("4px"), Some(4.0));
        assert_eq!(parse_length("1in"), Some(96.0));
        assert!(near(parse_length("25.4mm").unwrap(), 96.0));
        assert!(near(parse_length("72pt").unwrap(), 96.0));
        assert_eq!(parse_length("50%"), None);
        assert_eq!(parse_length("abc"), None);
    }

    #[test]
    fn test_parse_transform_translate() {
        let t = parse_transform("translate(10, -5)");
        assert_eq!(t, XForm::translate(10.0, -5.0));
    }

    #[test]
    fn test_parse_transform_matrix() {
        let t = parse_transform("matrix(1 0 0 1 55 55)");
        assert_eq!(t.e, 55.0);
        assert_eq!(t.f, 55.0);
    }

    #[test]
    fn test_parse_transform_list_composes_left_to_right() {
        let t = parse_transform("translate(10,0) scale(2)");
        let p = t.transform_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }

    #[test]
    fn test_parse_transform_rotate_about_center() {
        let t = parse_transform("rotate(180 5 5)");
        let p = t.transform_point(Point::new(0.0, 0.0));
        assert!(near(p.x, 10.0) && near(p.y, 10.0));
    }

    #[test]
    fn test_parse_transform_invalid_is_identity() {
        assert_eq!(parse_transform("wobble(3)"), XForm::identity());
        assert_eq!(parse_transform("translate(1"), XForm::identity());
    }

    #[test]
    fn test_viewbox_scaling() {
        let doc = parse_document(
            r#"<svg width="210mm" height="297mm" viewBox="0 0 210 297"></svg>"#,
        )
        .unwrap();
        assert!(near(doc.width, 793.7007874015749));
        let p = doc.view_transform.transform_point(Point::new(105.0, 0.0));
        assert!(near(p.x, doc.width / 2.0));
    }

    #[test]
    fn test_viewbox_offset() {
        let doc =
            parse_document(r#"<svg width="100" height="100" viewBox="-50 -50 100 100"/>"#).unwrap();
        let p = doc.view_transform.transform_point(Point::new(0.0, 0.0));
        assert_eq!(p, Point::new(50.0, 50.0));
    }

    #[test]
    fn test_attribute_entities_are_unescaped() {
        let svg = r#"<svg width="10" height="10">
  <g id="shops" inkscape:groupmode="layer" inkscape:label="Shops &amp; Bars">
    <g id="fish&amp;chips" inkscape:label="Fish &amp; Chips"/>
    <path id="lane" inkscape:label="lane [tags=a&lt;b]" d="M0 0 L1 1"/>
  </g>
</svg>"#;
        let doc = parse_document(svg).unwrap();
        let layer = &doc.root.children[0];
        assert_eq!(layer.name(), "Shops & Bars");
        assert_eq!(layer.children[0].id, "fish&chips");
        assert_eq!(layer.children[0].name(), "Fish & Chips");
        assert_eq!(layer.children[1].label.as_deref(), Some("lane [tags=a<b]"));
    }

    #[test]
    fn test_parse_tree() {
        let svg = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg width="100" height="50">
  <defs><marker id="Square"><path d="M0 0 L1 1"/></marker></defs>
  <g id="layer1" inkscape:groupmode="layer" inkscape:label="Ground">
    <path id="road" inkscape:label="road [tags=asphalt]" d="M0 0 L10 0"
          style="fill:none;marker-end:url(#Triangle)"/>
    <circle cx="1" cy="2" r="4px"/>
  </g>
</svg>"##;
        let doc = parse_document(svg).unwrap();
        assert_eq!(doc.width, 100.0);
        assert_eq!(doc.root.kind, NodeKind::Root);
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(doc.root.children[0].kind, NodeKind::Other("defs".to_string()));

        let layer = &doc.root.children[1];
        assert_eq!(layer.kind, NodeKind::Group { layer: true });
        assert_eq!(layer.name(), "Ground");

        let road = &layer.children[0];
        assert_eq!(road.label.as_deref(), Some("road [tags=asphalt]"));
        assert_eq!(road.style.get("marker-end"), Some("url(#Triangle)"));
        assert_eq!(
            road.kind,
            NodeKind::Path {
                commands: vec![
                    PathCommand::Move(Point::new(0.0, 0.0)),
                    PathCommand::Line(Point::new(10.0, 0.0)),
                ]
            }
        );

        // svg root, defs, marker path and circle have no id
        assert_eq!(layer.children[1].id, "circle-auto3");
        assert_eq!(
            layer.children[1].kind,
            NodeKind::Circle {
                cx: 1.0,
                cy: 2.0,
                r: 4.0
            }
        );
    }

    #[test]
    fn test_root_must_be_svg() {
        assert!(parse_document("<html></html>").is_err());
        assert!(parse_document("").is_err());
    }
}
