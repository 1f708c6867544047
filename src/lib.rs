//! # iso-export
//!
//! A Rust library for exporting Inkscape drawings to an isometric game world.
//!
//! ## Features
//!
//! - **Curves**: Convert SVG paths to cubic curve records in world space (`curves.json`)
//! - **Sprites**: Write `.spr` descriptors for marked groups and render them to PNG
//! - **Marking**: Place `[ISO ORIGIN]` markers on groups
//!
//! ## Example - Curve Export
//!
//! ```rust,ignore
//! use iso_export::{CurveExportOptions, Document, write_curves};
//!
//! let svg = std::fs::read_to_string("world.svg").unwrap();
//! let doc = Document::parse(&svg).unwrap();
//! write_curves(&doc, &CurveExportOptions::default()).unwrap();
//! ```
//!
//! ## Example - Projection
//!
//! ```rust
//! use iso_export::projection::{TileGeometry, project, unproject};
//!
//! let tiles = TileGeometry::new(256.0, 128.0, 128.0).unwrap();
//! let iso = unproject(64.0, 96.0, 1.0, &tiles);
//! let back = project(&iso, &tiles);
//! assert!((back.x - 64.0).abs() < 1e-9 && (back.y - 96.0).abs() < 1e-9);
//! ```

pub mod config;
pub mod curves;
pub mod document;
pub mod error;
pub mod inkscape;
pub mod projection;
pub mod sprite;
pub mod types;

// Re-export commonly used items
pub use config::{
    BoundsSource, CurveExportOptions, MarkOptions, SearchScope, SpriteExportOptions, WorldCenter,
    WorldSettings,
};
pub use curves::{CurveRecord, NormalizedPath, export_curves, normalize_path, write_curves};
pub use document::Document;
pub use error::{Diagnostic, ExportError, Result};
pub use inkscape::{Inkscape, Rasterizer};
pub use projection::{TileGeometry, World};
pub use sprite::marker::mark_groups;
pub use sprite::{BoundsProvider, GroupDescriptor, export_sprites};
