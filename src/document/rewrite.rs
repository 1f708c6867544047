//! Stream rewriting of SVG text
//!
//! The export never edits the parsed tree back into XML. Instead the source
//! text is copied event by event with targeted changes, so everything the
//! tree does not model survives untouched.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::AutoIds;
use super::parser::{attr, attributes, raw_attributes, tag_name};
use crate::error::{ExportError, Result};
use crate::sprite::ISO_ORIGIN_TAG;
use crate::types::XForm;

/// Origin marker to place inside a group
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerInsert {
    pub group_id: String,
    pub label: String,
    /// Transform from the marker's local space to the group's local space
    pub transform: XForm,
    pub visible: bool,
}

impl MarkerInsert {
    fn element(&self) -> BytesStart<'static> {
        let mut circle = BytesStart::new("circle");
        let display = if self.visible { "inline" } else { "none" };
        circle.push_attribute(("id", self.label.as_str()));
        circle.push_attribute(("inkscape:label", self.label.as_str()));
        circle.push_attribute(("cx", "0"));
        circle.push_attribute(("cy", "0"));
        circle.push_attribute(("r", "4"));
        circle.push_attribute(("style", format!("display:{};fill:#ff0000", display).as_str()));
        circle.push_attribute(("transform", self.transform.to_svg().as_str()));
        circle
    }
}

#[derive(Default)]
struct RewriteOptions<'a> {
    hide_markers: bool,
    materialize_ids: bool,
    markers: &'a [MarkerInsert],
}

fn xml_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::Xml(format!("XML rewrite error: {}", e))
}

fn is_marker(attrs: &[(String, String)]) -> bool {
    attr(attrs, "inkscape:label").is_some_and(|l| l.contains(ISO_ORIGIN_TAG))
        || attr(attrs, "id").is_some_and(|id| id.contains(ISO_ORIGIN_TAG))
}

/// Copy of the document with every origin marker set to `display:none` and
/// every element carrying an id (synthetic ids match the parsed tree).
pub fn hide_origin_markers(svg: &str) -> Result<String> {
    rewrite(
        svg,
        &RewriteOptions {
            hide_markers: true,
            materialize_ids: true,
            ..Default::default()
        },
    )
}

/// Copy of the document where each target group loses its old origin
/// markers and gains the new one as its last child.
pub fn insert_origin_markers(svg: &str, markers: &[MarkerInsert]) -> Result<String> {
    rewrite(
        svg,
        &RewriteOptions {
            markers,
            ..Default::default()
        },
    )
}

/// Rebuild the start tag if it needs a hidden style or a synthetic id
fn patch_start<'a>(
    e: BytesStart<'a>,
    attrs: &[(String, String)],
    id: &str,
    options: &RewriteOptions,
) -> BytesStart<'a> {
    let hide = options.hide_markers && is_marker(attrs);
    let add_id = options.materialize_ids && attr(attrs, "id").is_none();
    if !hide && !add_id {
        return e;
    }

    let mut patched = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).to_string());
    if add_id {
        patched.push_attribute(("id", id));
    }
    for (key, value) in raw_attributes(&e) {
        if hide && key == "style" {
            continue;
        }
        // Raw values are still escaped as in the source
        patched.push_attribute((key.as_bytes(), value.as_bytes()));
    }
    if hide {
        patched.push_attribute(("style", "display:none"));
    }
    patched
}

fn rewrite(svg: &str, options: &RewriteOptions) -> Result<String> {
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Vec::new());
    let mut ids = AutoIds::default();

    // One entry per open element: index of the marker to insert before its end tag
    let mut open: Vec<Option<usize>> = Vec::new();
    // Depth inside an element being dropped
    let mut skipping = 0usize;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let attrs = attributes(&e);
                let id = ids.resolve(&tag_name(&e), attr(&attrs, "id"));
                if skipping > 0 {
                    skipping += 1;
                    continue;
                }
                if open.last().copied().flatten().is_some() && is_marker(&attrs) {
                    skipping = 1;
                    continue;
                }
                open.push(options.markers.iter().position(|m| m.group_id == id));
                let e = patch_start(e, &attrs, &id, options);
                writer.write_event(Event::Start(e)).map_err(xml_error)?;
            }
            Event::Empty(e) => {
                let attrs = attributes(&e);
                let id = ids.resolve(&tag_name(&e), attr(&attrs, "id"));
                if skipping > 0 {
                    continue;
                }
                if open.last().copied().flatten().is_some() && is_marker(&attrs) {
                    continue;
                }
                let target = options.markers.iter().position(|m| m.group_id == id);
                let e = patch_start(e, &attrs, &id, options);
                match target {
                    Some(idx) => {
                        // <g/> becomes <g><circle/></g>
                        let end = BytesEnd::new(String::from_utf8_lossy(e.name().as_ref()).to_string());
                        writer.write_event(Event::Start(e)).map_err(xml_error)?;
                        writer
                            .write_event(Event::Empty(options.markers[idx].element()))
                            .map_err(xml_error)?;
                        writer.write_event(Event::End(end)).map_err(xml_error)?;
                    }
                    None => writer.write_event(Event::Empty(e)).map_err(xml_error)?,
                }
            }
            Event::End(e) => {
                if skipping > 0 {
                    skipping -= 1;
                    continue;
                }
                if let Some(Some(idx)) = open.pop() {
                    writer
                        .write_event(Event::Empty(options.markers[idx].element()))
                        .map_err(xml_error)?;
                }
                writer.write_event(Event::End(e)).map_err(xml_error)?;
            }
            other => {
                if skipping == 0 {
                    writer.write_event(other).map_err(xml_error)?;
                }
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    const SVG: &str = r#"<svg width="100" height="100">
  <g id="house">
    <rect x="0" y="0" width="10" height="10"/>
    <circle id="[ISO ORIGIN][#0][Z=0.0000]" inkscape:label="[ISO ORIGIN][#0][Z=0.0000]" r="4" style="display:inline;fill:#ff0000"/>
  </g>
  <g id="tree"><rect width="1" height="1"/></g>
  <g id="empty"/>
  <text data-x="a &amp; b">A</text>
</svg>"#;

    #[test]
    fn test_hide_origin_markers() {
        let out = hide_origin_markers(SVG).unwrap();
        let doc = parse_document(&out).unwrap();
        let house = &doc.root.children[0];
        assert!(house.children[1].style.is_hidden());
        assert!(!house.children[0].style.is_hidden());
        assert!(!out.contains("display:inline"));
        assert!(out.contains(r#"data-x="a &amp; b""#));
    }

    #[test]
    fn test_hidden_copy_keeps_synthetic_ids() {
        let original = parse_document(SVG).unwrap();
        let out = hide_origin_markers(SVG).unwrap();
        assert!(out.contains(r#"id="rect-auto1""#));
        let reparsed = parse_document(&out).unwrap();
        assert_eq!(
            original.root.children[0].children[0].id,
            reparsed.root.children[0].children[0].id
        );
    }

    #[test]
    fn test_insert_replaces_old_marker() {
        let markers = vec![MarkerInsert {
            group_id: "house".to_string(),
            label: "[ISO ORIGIN][#3][Z=1.5000]".to_string(),
            transform: XForm::translate(5.0, 5.0),
            visible: false,
        }];
        let out = insert_origin_markers(SVG, &markers).unwrap();
        assert!(!out.contains("[#0]"));
        let doc = parse_document(&out).unwrap();
        let house = &doc.root.children[0];
        assert_eq!(house.children.len(), 2);
        let marker = &house.children[1];
        assert_eq!(marker.label.as_deref(), Some("[ISO ORIGIN][#3][Z=1.5000]"));
        assert_eq!(marker.transform, XForm::translate(5.0, 5.0));
        assert!(marker.style.is_hidden());
        // Untouched groups keep their content and no ids are added
        assert_eq!(doc.root.children[1].children.len(), 1);
        assert!(!out.contains("rect-auto"));
    }

    #[test]
    fn test_insert_into_empty_group() {
        let markers = vec![MarkerInsert {
            group_id: "empty".to_string(),
            label: "[ISO ORIGIN][#1][Z=0.0000]".to_string(),
            transform: XForm::identity(),
            visible: true,
        }];
        let out = insert_origin_markers(SVG, &markers).unwrap();
        let doc = parse_document(&out).unwrap();
        let empty = &doc.root.children[2];
        assert_eq!(empty.id, "empty");
        assert_eq!(empty.children.len(), 1);
        assert!(!empty.children[0].style.is_hidden());
    }

    #[test]
    fn test_insert_into_group_with_escaped_id() {
        let svg = r#"<svg width="10" height="10"><g id="fish&amp;chips" inkscape:label="Fish &amp; Chips"><rect width="1" height="1"/></g></svg>"#;
        let markers = vec![MarkerInsert {
            group_id: "fish&chips".to_string(),
            label: "[ISO ORIGIN][#0][Z=0.0000]".to_string(),
            transform: XForm::identity(),
            visible: true,
        }];
        let out = insert_origin_markers(svg, &markers).unwrap();
        assert!(out.contains(r#"inkscape:label="Fish &amp; Chips""#));
        let doc = parse_document(&out).unwrap();
        assert_eq!(doc.root.children[0].children.len(), 2);

        let hidden = hide_origin_markers(&out).unwrap();
        assert!(hidden.contains(r#"id="fish&amp;chips""#));
        assert!(!hidden.contains("display:inline"));
    }
}
