//! Sprite metadata export
//!
//! An iso group is a group with an origin marker among its direct children.
//! For each one the export writes a `<name>.spr` descriptor with the group's
//! world location, its anchor inside the image and the image size, then
//! rasterizes all groups to `<name>.png` in a single batch.

pub mod bounds;
pub mod marker;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SpriteExportOptions;
use crate::document::rewrite::hide_origin_markers;
use crate::document::{Document, Node, NodeChain, shape_bounds};
use crate::error::{Diagnostic, ExportError, Result, report_diagnostics};
use crate::inkscape::{ExportDirective, Rasterizer};
use crate::projection::World;
use crate::types::{BBox, IsoPoint, Point};

pub use bounds::{BoundsProvider, GeometricBounds, VisualBounds};

/// Text marking a node as an origin marker, in its label or id
pub const ISO_ORIGIN_TAG: &str = "[ISO ORIGIN]";

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[#(\d+)\]").expect("valid number pattern"));
static Z_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Z=([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").expect("valid Z pattern")
});

pub fn is_origin_marker(node: &Node) -> bool {
    node.is_tagged(ISO_ORIGIN_TAG)
}

pub fn is_iso_group(node: &Node) -> bool {
    node.is_group() && node.children.iter().any(is_origin_marker)
}

/// Iso groups under the scope, in pre-order.
///
/// The walk does not descend into an iso group. Duplicates are removed, as is
/// any group lying inside another result, so no two results nest.
pub fn find_iso_groups<'a>(scope: &[NodeChain<'a>]) -> Vec<NodeChain<'a>> {
    fn walk<'a>(chain: &mut NodeChain<'a>, out: &mut Vec<NodeChain<'a>>) {
        let Some(node) = chain.last().copied() else {
            return;
        };
        if is_iso_group(node) {
            out.push(chain.clone());
            return;
        }
        if !node.is_container() {
            return;
        }
        for child in node.children.iter().filter(|c| c.is_group()) {
            chain.push(child);
            walk(chain, out);
            chain.pop();
        }
    }

    let mut found = Vec::new();
    for start in scope {
        let mut chain = start.clone();
        walk(&mut chain, &mut found);
    }

    let mut seen = HashSet::new();
    found.retain(|chain| chain.last().is_some_and(|n| seen.insert(n.id.clone())));

    let ids: HashSet<&str> = found
        .iter()
        .filter_map(|chain| chain.last().map(|n| n.id.as_str()))
        .collect();
    found
        .iter()
        .filter(|chain| {
            let ancestors = &chain[..chain.len().saturating_sub(1)];
            !ancestors.iter().any(|a| ids.contains(a.id.as_str()))
        })
        .cloned()
        .collect()
}

/// Unique sprite names within one run: `Label`, `Label#2`, `Label#3`.
/// Names double as file stems, so path separators become `_`.
#[derive(Debug, Default)]
pub struct NameRegistry {
    counts: HashMap<String, usize>,
    taken: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, label: &str) -> String {
        let base = file_stem(label);
        let count = self.counts.entry(base.clone()).or_insert(0);
        loop {
            *count += 1;
            let name = if *count == 1 {
                base.clone()
            } else {
                format!("{}#{}", base, count)
            };
            // A label may already read like a generated name
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}

fn file_stem(label: &str) -> String {
    let stem: String = label
        .trim()
        .chars()
        .map(|ch| {
            if ch == '/' || ch == '\\' || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => stem,
    }
}

/// Name of the layer (the child of the root) holding the last node of `chain`
pub fn layer_name(chain: &[&Node]) -> Result<String> {
    match chain {
        [_root, layer, _, ..] => Ok(layer.name().to_string()),
        _ => Err(ExportError::MissingLayer {
            group_id: chain.last().map(|n| n.id.clone()).unwrap_or_default(),
        }),
    }
}

/// `[#N]` sequence number and `Z=<float>` height embedded in a marker label
pub fn parse_marker_text(text: &str) -> (Option<u32>, Option<f64>) {
    let number = NUMBER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    let z = Z_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    (number, z)
}

/// Origin marker of a group, positioned in canvas pixels
#[derive(Debug, Clone, PartialEq)]
pub struct OriginMarker {
    pub id: String,
    pub number: Option<u32>,
    pub z: Option<f64>,
    pub position: Point,
}

/// Locate the origin marker of the last group in `chain`.
///
/// The first marker in child order wins. Its position is the center of its
/// geometric bounds, measured even when the marker is hidden.
pub fn resolve_origin(doc: &Document, chain: &[&Node]) -> Result<OriginMarker> {
    let Some(group) = chain.last() else {
        return Err(ExportError::MissingOrigin {
            group_id: String::new(),
        });
    };
    let mut markers = group.children.iter().filter(|c| is_origin_marker(c));
    let marker = markers.next().ok_or_else(|| ExportError::MissingOrigin {
        group_id: group.id.clone(),
    })?;
    let extra = markers.count();
    if extra > 0 {
        log::warn!(
            "Group '{}' has {} origin markers, using '{}'",
            group.id,
            extra + 1,
            marker.id
        );
    }

    let xform = doc.canvas_transform(chain);
    let bounds =
        shape_bounds(marker, &xform, &|_| false).ok_or_else(|| ExportError::MissingBounds {
            group_id: marker.id.clone(),
        })?;
    let (number, z) = parse_marker_text(marker.name());

    Ok(OriginMarker {
        id: marker.id.clone(),
        number,
        z,
        position: bounds.center(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(rename = "anchorX")]
    pub x: f64,
    #[serde(rename = "anchorY")]
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteSize {
    pub width: u32,
    pub height: u32,
}

/// Contents of a `.spr` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub name: String,
    pub layer_name: String,
    pub image: String,
    pub location: IsoPoint,
    pub anchor: Anchor,
    pub size: SpriteSize,
}

/// Compute the descriptor of one group from its origin and bounding box
pub fn describe_group(
    group_id: &str,
    name: &str,
    layer_name: &str,
    origin: &OriginMarker,
    bbox: &BBox,
    world: &World,
    default_z: f64,
    dpi_scale: f64,
) -> Result<GroupDescriptor> {
    if bbox.width <= 0.0 || bbox.height <= 0.0 {
        return Err(ExportError::ZeroSizedBounds {
            group_id: group_id.to_string(),
            width: bbox.width,
            height: bbox.height,
        });
    }

    let iso_z = origin.z.unwrap_or(default_z);
    let location = world.unproject(origin.position, iso_z);
    let anchor = Anchor {
        x: (origin.position.x - bbox.x) / bbox.width,
        y: (origin.position.y - bbox.y) / bbox.height,
    };
    let size = SpriteSize {
        width: (dpi_scale * bbox.width).ceil() as u32,
        height: (dpi_scale * bbox.height).ceil() as u32,
    };

    Ok(GroupDescriptor {
        name: name.to_string(),
        layer_name: layer_name.to_string(),
        image: format!("{}.png", name),
        location,
        anchor,
        size,
    })
}

/// Result of a sprite export run
#[derive(Debug, Default)]
pub struct SpriteExport {
    pub descriptors: Vec<GroupDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A group that has a name, a layer and an origin
struct Candidate<'a> {
    node: &'a Node,
    name: String,
    layer: String,
    origin: OriginMarker,
}

/// Export descriptors and images for every iso group in scope.
///
/// `svg` is the source text of `doc`. Bounds are measured and images rendered
/// on a copy with all origin markers hidden.
pub fn export_sprites(
    doc: &Document,
    svg: &str,
    opts: &SpriteExportOptions,
    bounds: &dyn BoundsProvider,
    rasterizer: &dyn Rasterizer,
) -> Result<SpriteExport> {
    let world = opts.world.resolve(doc)?;
    let scope = doc.scope(opts.search_scope, &opts.selection)?;
    if !opts.export_path.exists() {
        log::info!("Creating directory: {}", opts.export_path.display());
    }
    fs::create_dir_all(&opts.export_path)?;

    let groups = find_iso_groups(&scope);
    log::info!("Found {} iso group(s)", groups.len());

    let mut export = SpriteExport::default();
    let mut names = NameRegistry::new();
    let mut candidates = Vec::new();
    for chain in &groups {
        let Some(node) = chain.last().copied() else {
            continue;
        };
        let name = names.assign(node.name());
        let resolved = layer_name(chain)
            .and_then(|layer| resolve_origin(doc, chain).map(|origin| (layer, origin)));
        match resolved {
            Ok((layer, origin)) => candidates.push(Candidate {
                node,
                name,
                layer,
                origin,
            }),
            Err(e) => export.diagnostics.push(Diagnostic::new(&node.id, e)),
        }
    }

    let hidden = hide_origin_markers(svg)?;
    let ids: Vec<String> = candidates.iter().map(|c| c.node.id.clone()).collect();
    let boxes = bounds.bounding_boxes(doc, &hidden, &ids)?;

    let mut directives = Vec::new();
    for candidate in &candidates {
        let id = &candidate.node.id;
        let described = boxes
            .get(id)
            .ok_or_else(|| ExportError::MissingBounds {
                group_id: id.clone(),
            })
            .and_then(|bbox| {
                describe_group(
                    id,
                    &candidate.name,
                    &candidate.layer,
                    &candidate.origin,
                    bbox,
                    &world,
                    opts.default_z,
                    opts.dpi_scale(),
                )
            });
        let descriptor = match described {
            Ok(d) => d,
            Err(e) => {
                export.diagnostics.push(Diagnostic::new(id, e));
                continue;
            }
        };

        let spr_path = opts.export_path.join(format!("{}.spr", descriptor.name));
        fs::write(&spr_path, serde_json::to_string_pretty(&descriptor)?)?;
        log::debug!("Wrote {}", spr_path.display());

        directives.push(ExportDirective {
            id: id.clone(),
            filename: opts.export_path.join(&descriptor.image),
        });
        export.descriptors.push(descriptor);
    }
    log::info!(
        "Wrote {} sprite descriptor(s) to {}",
        export.descriptors.len(),
        opts.export_path.display()
    );

    if opts.no_images {
        log::info!("Image export disabled");
    } else {
        rasterizer.rasterize(&hidden, &directives, opts.export_dpi)?;
        for (directive, descriptor) in directives.iter().zip(&export.descriptors) {
            if let Err(e) = verify_image(&directive.filename, &descriptor.size) {
                export.diagnostics.push(Diagnostic::new(&directive.id, e));
            }
        }
    }

    report_diagnostics("Sprite", &export.diagnostics);
    Ok(export)
}

/// Check that a rendered image exists. A size other than expected is only
/// logged.
fn verify_image(path: &Path, expected: &SpriteSize) -> Result<()> {
    let (width, height) =
        image::image_dimensions(path).map_err(|e| ExportError::MissingImage {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    if width != expected.width || height != expected.height {
        log::warn!(
            "{} is {}x{}, expected {}x{}",
            path.display(),
            width,
            height,
            expected.width,
            expected.height
        );
    }
    Ok(())
}
