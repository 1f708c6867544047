//! Isometric projection math
//!
//! The forward projection maps a world point `(x, y, z)` onto the canvas:
//!
//! ```text
//! a = x * p - y * p
//! b = x * q + y * q - z * r
//! ```
//!
//! with `p` the half tile width, `q` the half tile height and `r` the
//! vertical step. [`unproject`] is the closed-form inverse for a known `z`.

use crate::error::{ExportError, Result};
use crate::types::{IsoPoint, Point};

/// Geometry of one isometric grid cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGeometry {
    half_tile_width: f64,
    half_tile_height: f64,
    vertical_step: f64,
}

impl TileGeometry {
    /// Build from full tile sizes. Zero width or height is rejected.
    pub fn new(tile_width: f64, tile_height: f64, vertical_step: f64) -> Result<Self> {
        if tile_width == 0.0 || tile_height == 0.0 {
            return Err(ExportError::InvalidTileGeometry {
                width: tile_width,
                height: tile_height,
            });
        }
        Ok(Self {
            half_tile_width: tile_width / 2.0,
            half_tile_height: tile_height / 2.0,
            vertical_step,
        })
    }

    pub fn half_tile_width(&self) -> f64 {
        self.half_tile_width
    }

    pub fn half_tile_height(&self) -> f64 {
        self.half_tile_height
    }

    pub fn vertical_step(&self) -> f64 {
        self.vertical_step
    }
}

impl Default for TileGeometry {
    fn default() -> Self {
        Self {
            half_tile_width: 128.0,
            half_tile_height: 64.0,
            vertical_step: 128.0,
        }
    }
}

/// Solve the forward projection for x, then y:
///
/// ```text
/// x = (a * q + b * p + p * r * z) / (2 * p * q)
/// y = x - a / p
/// ```
pub fn unproject(position_x: f64, position_y: f64, iso_z: f64, tiles: &TileGeometry) -> IsoPoint {
    let htw = tiles.half_tile_width;
    let hth = tiles.half_tile_height;
    let v_step = tiles.vertical_step;

    let iso_x = (position_x * hth + position_y * htw + htw * v_step * iso_z) / (2.0 * htw * hth);
    let iso_y = iso_x - position_x / htw;

    IsoPoint {
        x: iso_x,
        y: iso_y,
        z: iso_z,
    }
}

/// Forward projection of a world point to a canvas offset
pub fn project(iso: &IsoPoint, tiles: &TileGeometry) -> Point {
    let p = tiles.half_tile_width;
    let q = tiles.half_tile_height;
    let r = tiles.vertical_step;
    Point::new(iso.x * p - iso.y * p, iso.x * q + iso.y * q - iso.z * r)
}

/// World placement on the canvas: where the world origin sits, and the tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct World {
    pub center: Point,
    pub tiles: TileGeometry,
}

impl World {
    pub fn new(center: Point, tiles: TileGeometry) -> Self {
        Self { center, tiles }
    }

    /// Canvas point (pixels) to world point
    pub fn unproject(&self, canvas: Point, iso_z: f64) -> IsoPoint {
        unproject(
            canvas.x - self.center.x,
            canvas.y - self.center.y,
            iso_z,
            &self.tiles,
        )
    }

    /// World point to canvas point (pixels)
    pub fn project(&self, iso: &IsoPoint) -> Point {
        let offset = project(iso, &self.tiles);
        Point::new(offset.x + self.center.x, offset.y + self.center.y)
    }
}
