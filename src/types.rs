use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Canvas-space coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

/// World coordinate on the isometric grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsoPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Axis-aligned box in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// 2D affine transformation matrix [a, b, c, d, e, f]
/// Represents: | a  c  e |
///             | b  d  f |
///             | 0  0  1 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XForm {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for XForm {
    fn default() -> Self {
        Self::identity()
    }
}

impl XForm {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::identity()
        }
    }

    /// Rotation by `degrees` around the origin
    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn skew_x(degrees: f64) -> Self {
        Self {
            c: degrees.to_radians().tan(),
            ..Self::identity()
        }
    }

    pub fn skew_y(degrees: f64) -> Self {
        Self {
            b: degrees.to_radians().tan(),
            ..Self::identity()
        }
    }

    /// Compose two transforms: self * other
    pub fn compose(&self, other: &XForm) -> XForm {
        XForm {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Inverse transform, `None` for a singular matrix
    pub fn inverse(&self) -> Option<XForm> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(XForm {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    /// Transform a point
    pub fn transform_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// SVG `transform` attribute value
    pub fn to_svg(&self) -> String {
        format!(
            "matrix({} {} {} {} {} {})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Path drawing command, already expanded to absolute move/line/cubic form.
/// Elliptical arcs are kept as they are.
#[derive(Debug, Clone, PartialEq)]
pub enum PathCommand {
    Move(Point),
    Line(Point),
    Cubic(Point, Point, Point),
    Arc {
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
}

impl PathCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PathCommand::Move(_) => "move",
            PathCommand::Line(_) => "line",
            PathCommand::Cubic(..) => "cubic",
            PathCommand::Arc { .. } => "arc",
        }
    }

    /// End point of the command
    pub fn end(&self) -> Point {
        match self {
            PathCommand::Move(p) | PathCommand::Line(p) => *p,
            PathCommand::Cubic(_, _, p) => *p,
            PathCommand::Arc { to, .. } => *to,
        }
    }

    pub fn transformed(&self, xform: &XForm) -> PathCommand {
        let t = |p: &Point| xform.transform_point(*p);
        match self {
            PathCommand::Move(p) => PathCommand::Move(t(p)),
            PathCommand::Line(p) => PathCommand::Line(t(p)),
            PathCommand::Cubic(c1, c2, p) => PathCommand::Cubic(t(c1), t(c2), t(p)),
            // Radii are left in local units; arcs never reach the curve output.
            PathCommand::Arc {
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                to,
            } => PathCommand::Arc {
                rx: *rx,
                ry: *ry,
                x_axis_rotation: *x_axis_rotation,
                large_arc: *large_arc,
                sweep: *sweep,
                to: t(to),
            },
        }
    }
}
