//! Run options shared by the library and the command line

use std::path::PathBuf;

use clap::ValueEnum;

use crate::document::Document;
use crate::error::Result;
use crate::projection::{TileGeometry, World};
use crate::types::Point;

/// Where a run starts looking for objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SearchScope {
    /// The selection if there is one, else the whole document
    #[default]
    Auto,
    Everything,
    Selection,
}

/// Canvas point that maps to the world origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum WorldCenter {
    /// Center of the page
    #[default]
    Page,
    /// `custom_center_x`, `custom_center_y`
    Custom,
}

/// How sprite bounding boxes are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BoundsSource {
    /// Rendered bounds including strokes, computed in process
    #[default]
    Visual,
    /// Shape geometry only
    Geometric,
    /// Ask Inkscape
    Inkscape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    pub world_center: WorldCenter,
    pub custom_center_x: f64,
    pub custom_center_y: f64,
    pub tile_width: f64,
    pub tile_height: f64,
    pub vertical_step: f64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            world_center: WorldCenter::Page,
            custom_center_x: 1.0,
            custom_center_y: 1.0,
            tile_width: 256.0,
            tile_height: 128.0,
            vertical_step: 128.0,
        }
    }
}

impl WorldSettings {
    /// Build the world for `doc`. Fails on a zero tile size.
    pub fn resolve(&self, doc: &Document) -> Result<World> {
        let tiles = TileGeometry::new(self.tile_width, self.tile_height, self.vertical_step)?;
        let center = match self.world_center {
            WorldCenter::Page => doc.page_center(),
            WorldCenter::Custom => Point::new(self.custom_center_x, self.custom_center_y),
        };
        log::debug!("World center at ({}, {})", center.x, center.y);
        Ok(World::new(center, tiles))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurveExportOptions {
    /// Output JSON file
    pub export_path: PathBuf,
    pub search_scope: SearchScope,
    /// Selected object ids, in selection order
    pub selection: Vec<String>,
    pub world: WorldSettings,
    /// Height of every curve point
    pub z_value: f64,
}

impl Default for CurveExportOptions {
    fn default() -> Self {
        Self {
            export_path: PathBuf::from("curves.json"),
            search_scope: SearchScope::Auto,
            selection: Vec::new(),
            world: WorldSettings::default(),
            z_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteExportOptions {
    /// Output directory for `.spr` and `.png` files
    pub export_path: PathBuf,
    pub search_scope: SearchScope,
    pub selection: Vec<String>,
    pub world: WorldSettings,
    /// Height used when a marker has no `Z=` value
    pub default_z: f64,
    pub export_dpi: f64,
    pub bounds: BoundsSource,
    /// Skip rasterization, only write descriptors
    pub no_images: bool,
}

impl Default for SpriteExportOptions {
    fn default() -> Self {
        Self {
            export_path: PathBuf::from("."),
            search_scope: SearchScope::Auto,
            selection: Vec::new(),
            world: WorldSettings::default(),
            default_z: 0.0,
            export_dpi: 96.0,
            bounds: BoundsSource::Visual,
            no_images: false,
        }
    }
}

impl SpriteExportOptions {
    /// Pixels per canvas pixel at the export resolution
    pub fn dpi_scale(&self) -> f64 {
        self.export_dpi / 96.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkOptions {
    /// Group ids to mark
    pub selection: Vec<String>,
    /// Compass point of the bounding box, 1 (top left) to 9 (bottom right)
    pub origin_location: u8,
    pub z_value: f64,
    pub show_origin: bool,
}

impl Default for MarkOptions {
    fn default() -> Self {
        Self {
            selection: Vec::new(),
            origin_location: 5,
            z_value: 0.0,
            show_origin: true,
        }
    }
}
