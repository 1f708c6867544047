use std::f64::consts::PI;

use super::{Node, NodeKind};
use crate::types::{BBox, PathCommand, Point, XForm};

/// Bounding box accumulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Bounds> {
        let first = points.first()?;
        let mut bounds = Bounds::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bounds.include(*p);
        }
        Some(bounds)
    }

    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn expand(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn to_bbox(&self) -> BBox {
        BBox::new(self.min_x, self.min_y, self.width(), self.height())
    }
}

/// Calculate Bezier curve extrema (t values where derivative is zero)
fn bezier_extrema(p0: Point, c0: Point, c1: Point, p1: Point) -> Vec<f64> {
    fn get_extrema(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
        let mut res = Vec::new();
        let aa = -a + 3.0 * b - 3.0 * c + d;
        let bb = 2.0 * (a - 2.0 * b + c);
        let cc = b - a;

        if aa.abs() < 1e-8 {
            if bb.abs() > 1e-8 {
                let t = -cc / bb;
                if t > 0.0 && t < 1.0 {
                    res.push(t);
                }
            }
        } else {
            let disc = bb * bb - 4.0 * aa * cc;
            if disc >= 0.0 {
                let sqrt_d = disc.sqrt();
                let t1 = (-bb + sqrt_d) / (2.0 * aa);
                let t2 = (-bb - sqrt_d) / (2.0 * aa);
                if t1 > 0.0 && t1 < 1.0 {
                    res.push(t1);
                }
                if t2 > 0.0 && t2 < 1.0 {
                    res.push(t2);
                }
            }
        }
        res
    }

    let mut result = get_extrema(p0.x, c0.x, c1.x, p1.x);
    result.extend(get_extrema(p0.y, c0.y, c1.y, p1.y));
    result
}

/// Evaluate a cubic Bezier curve at parameter t
fn bezier_point(t: f64, p0: Point, c0: Point, c1: Point, p1: Point) -> Point {
    let mt = 1.0 - t;
    let mt2 = mt * mt;
    let mt3 = mt2 * mt;
    let t2 = t * t;
    let t3 = t2 * t;

    Point::new(
        mt3 * p0.x + 3.0 * mt2 * t * c0.x + 3.0 * mt * t2 * c1.x + t3 * p1.x,
        mt3 * p0.y + 3.0 * mt2 * t * c0.y + 3.0 * mt * t2 * c1.y + t3 * p1.y,
    )
}

/// Outline points of an axis-aligned ellipse, sampled
fn ellipse_points(cx: f64, cy: f64, rx: f64, ry: f64) -> Vec<Point> {
    let steps = 32;
    (0..steps)
        .map(|i| {
            let theta = 2.0 * PI * (i as f64) / (steps as f64);
            Point::new(cx + rx * theta.cos(), cy + ry * theta.sin())
        })
        .collect()
}

fn rect_points(x: f64, y: f64, w: f64, h: f64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + w, y),
        Point::new(x + w, y + h),
        Point::new(x, y + h),
    ]
}

/// Points whose hull bounds the path, in the space of `xform`
fn path_points(commands: &[PathCommand], xform: &XForm) -> Vec<Point> {
    let mut points = Vec::new();
    let mut current: Option<Point> = None;

    for cmd in commands {
        let cmd = cmd.transformed(xform);
        match cmd {
            PathCommand::Cubic(c0, c1, p1) => {
                points.push(p1);
                if let Some(p0) = current {
                    for t in bezier_extrema(p0, c0, c1, p1) {
                        points.push(bezier_point(t, p0, c0, c1, p1));
                    }
                } else {
                    points.push(c0);
                    points.push(c1);
                }
            }
            _ => points.push(cmd.end()),
        }
        current = Some(cmd.end());
    }

    points
}

/// Geometric bounds of `node` with `parent` applied on top of the node's own
/// transform. Hidden nodes and children matching `skip` are left out.
pub fn node_bounds(node: &Node, parent: &XForm, skip: &dyn Fn(&Node) -> bool) -> Option<Bounds> {
    if node.style.is_hidden() {
        return None;
    }
    shape_bounds(node, parent, skip)
}

/// Like [`node_bounds`] but measures `node` even when it is hidden itself
pub fn shape_bounds(node: &Node, parent: &XForm, skip: &dyn Fn(&Node) -> bool) -> Option<Bounds> {
    let xform = parent.compose(&node.transform);
    let tx = |points: Vec<Point>| -> Vec<Point> {
        points.into_iter().map(|p| xform.transform_point(p)).collect()
    };

    let points = match &node.kind {
        NodeKind::Root | NodeKind::Group { .. } => {
            let mut combined: Option<Bounds> = None;
            for child in node.children.iter().filter(|c| !skip(c)) {
                if let Some(child_bounds) = node_bounds(child, &xform, skip) {
                    match &mut combined {
                        None => combined = Some(child_bounds),
                        Some(cb) => cb.expand(&child_bounds),
                    }
                }
            }
            return combined;
        }
        NodeKind::Path { commands } => path_points(commands, &xform),
        NodeKind::Rect {
            x,
            y,
            width,
            height,
        }
        | NodeKind::Image {
            x,
            y,
            width,
            height,
        } => tx(rect_points(*x, *y, *width, *height)),
        NodeKind::Circle { cx, cy, r } => tx(ellipse_points(*cx, *cy, *r, *r)),
        NodeKind::Ellipse { cx, cy, rx, ry } => tx(ellipse_points(*cx, *cy, *rx, *ry)),
        NodeKind::Line { from, to } => tx(vec![*from, *to]),
        NodeKind::Polyline { points } => tx(points.clone()),
        NodeKind::Other(_) => return None,
    };

    Bounds::from_points(&points)
}
