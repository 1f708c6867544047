//! Path to curve export
//!
//! Every drawing command of a path becomes one cubic [`CurveRecord`] in world
//! space. Lines are degenerate cubics whose control points sit on the
//! endpoints.

use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{CurveExportOptions, SearchScope};
use crate::document::{Document, Node, NodeChain, NodeKind};
use crate::error::{Diagnostic, ExportError, Result, report_diagnostics};
use crate::projection::World;
use crate::types::{IsoPoint, PathCommand};

static TAGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r".*\[tags=(.*)\]").expect("valid tags pattern")
});

/// Travel direction along a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// Connector flags and tags of one path
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathMeta {
    pub id: String,
    pub tags: Option<String>,
    pub start: bool,
    pub end: bool,
    pub direction: Direction,
}

/// One cubic segment in world space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveRecord {
    pub cp1: IsoPoint,
    pub cp2: IsoPoint,
    pub cp3: IsoPoint,
    pub cp4: IsoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<bool>,
    pub forward: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl CurveRecord {
    fn new(cp1: IsoPoint, cp2: IsoPoint, cp3: IsoPoint, cp4: IsoPoint) -> Self {
        Self {
            cp1,
            cp2,
            cp3,
            cp4,
            start: None,
            forward: true,
            end: None,
            tags: None,
        }
    }
}

/// Read tags from the label and connector flags from the marker styles.
///
/// `marker-start` containing `Square` sets the start flag. Without a
/// `marker-end` the path runs forward with no end connector; otherwise it runs
/// forward only if the end marker is a `Triangle`, and `Square` sets the end
/// flag.
pub fn path_meta(node: &Node) -> PathMeta {
    let tags = node
        .label
        .as_deref()
        .and_then(|label| TAGS_RE.captures(label))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.is_empty());

    let start = node
        .style
        .get("marker-start")
        .is_some_and(|s| s.contains("Square"));

    let (direction, end) = match node.style.get("marker-end") {
        None | Some("") | Some("none") => (Direction::Forward, false),
        Some(marker) => {
            let direction = if marker.contains("Triangle") {
                Direction::Forward
            } else {
                Direction::Reverse
            };
            (direction, marker.contains("Square"))
        }
    };

    PathMeta {
        id: node.id.clone(),
        tags,
        start,
        end,
        direction,
    }
}

/// Records of one path plus the commands that could not become records
#[derive(Debug, Default)]
pub struct NormalizedPath {
    pub records: Vec<CurveRecord>,
    pub skipped: Vec<ExportError>,
}

/// Turn canvas-space commands into curve records.
///
/// The first command must be a move. A later move starts a new subpath
/// without emitting a record. An arc emits no record: it is listed in
/// `skipped` and the pen moves to its end point.
pub fn normalize_path(
    commands: &[PathCommand],
    meta: &PathMeta,
    world: &World,
    iso_z: f64,
) -> Result<NormalizedPath> {
    let mut out = NormalizedPath::default();
    let mut last: Option<IsoPoint> = None;

    for cmd in commands {
        let record = match cmd {
            PathCommand::Move(p) => {
                last = Some(world.unproject(*p, iso_z));
                continue;
            }
            PathCommand::Line(p) => {
                let from = last.ok_or_else(|| missing_start(meta))?;
                let to = world.unproject(*p, iso_z);
                last = Some(to);
                CurveRecord::new(from, from, to, to)
            }
            PathCommand::Cubic(c1, c2, p) => {
                let from = last.ok_or_else(|| missing_start(meta))?;
                let to = world.unproject(*p, iso_z);
                last = Some(to);
                CurveRecord::new(
                    from,
                    world.unproject(*c1, iso_z),
                    world.unproject(*c2, iso_z),
                    to,
                )
            }
            PathCommand::Arc { .. } => {
                if last.is_none() {
                    return Err(missing_start(meta));
                }
                last = Some(world.unproject(cmd.end(), iso_z));
                out.skipped.push(ExportError::UnsupportedCommand {
                    path_id: meta.id.clone(),
                    command: cmd.name(),
                });
                continue;
            }
        };
        out.records.push(record);
    }

    let records = &mut out.records;
    for record in records.iter_mut() {
        record.forward = meta.direction == Direction::Forward;
        record.tags = meta.tags.clone();
    }
    if meta.start
        && let Some(first) = records.first_mut()
    {
        first.start = Some(true);
    }
    if meta.end
        && let Some(last) = records.last_mut()
    {
        last.end = Some("end".to_string());
    }

    Ok(out)
}

fn missing_start(meta: &PathMeta) -> ExportError {
    ExportError::MissingStartPoint {
        path_id: meta.id.clone(),
    }
}

/// Result of a curve export run
#[derive(Debug, Default)]
pub struct CurveExport {
    pub curves: Vec<CurveRecord>,
    /// Paths that contributed records (or were empty)
    pub exported_paths: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Path nodes under the scope, in pre-order, each with its ancestor chain
fn collect_paths<'a>(scope: &[NodeChain<'a>]) -> Vec<NodeChain<'a>> {
    fn walk<'a>(
        chain: &mut NodeChain<'a>,
        seen: &mut HashSet<&'a str>,
        out: &mut Vec<NodeChain<'a>>,
    ) {
        let Some(node) = chain.last().copied() else {
            return;
        };
        match &node.kind {
            NodeKind::Path { .. } => {
                if seen.insert(node.id.as_str()) {
                    out.push(chain.clone());
                }
            }
            NodeKind::Root | NodeKind::Group { .. } => {
                for child in &node.children {
                    chain.push(child);
                    walk(chain, seen, out);
                    chain.pop();
                }
            }
            _ => {}
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for start in scope {
        let mut chain = start.clone();
        walk(&mut chain, &mut seen, &mut out);
    }
    out
}

/// Normalize every path in scope. Paths that fail are reported as
/// diagnostics and left out.
pub fn export_curves(doc: &Document, opts: &CurveExportOptions) -> Result<CurveExport> {
    if opts.search_scope == SearchScope::Everything {
        return Err(ExportError::Config(
            "Exporting everything to curves is not supported".to_string(),
        ));
    }
    let world = opts.world.resolve(doc)?;
    let scope = doc.scope(opts.search_scope, &opts.selection)?;

    let mut export = CurveExport::default();
    for chain in collect_paths(&scope) {
        let Some(node) = chain.last() else {
            continue;
        };
        let NodeKind::Path { commands } = &node.kind else {
            continue;
        };

        let xform = doc.canvas_transform(&chain);
        let canvas: Vec<PathCommand> = commands.iter().map(|c| c.transformed(&xform)).collect();
        let meta = path_meta(node);

        match normalize_path(&canvas, &meta, &world, opts.z_value) {
            Ok(NormalizedPath { records, skipped }) => {
                log::debug!("Path '{}': {} curve(s)", node.id, records.len());
                if !records.is_empty() || skipped.is_empty() {
                    export.exported_paths += 1;
                }
                export.curves.extend(records);
                export
                    .diagnostics
                    .extend(skipped.into_iter().map(|e| Diagnostic::new(&node.id, e)));
            }
            Err(e) => export.diagnostics.push(Diagnostic::new(&node.id, e)),
        }
    }

    Ok(export)
}

/// Export curves and write them to `opts.export_path` as pretty JSON
pub fn write_curves(doc: &Document, opts: &CurveExportOptions) -> Result<CurveExport> {
    let export = export_curves(doc, opts)?;
    let json = serde_json::to_string_pretty(&export.curves)?;
    fs::write(&opts.export_path, json)?;

    log::info!(
        "Wrote {} curve(s) from {} path(s) to {}",
        export.curves.len(),
        export.exported_paths,
        opts.export_path.display()
    );
    report_diagnostics("Curve", &export.diagnostics);
    Ok(export)
}
