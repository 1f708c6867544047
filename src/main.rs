use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;

use iso_export::sprite::{GeometricBounds, VisualBounds};
use iso_export::{
    BoundsProvider, BoundsSource, CurveExportOptions, Document, Inkscape, MarkOptions,
    SearchScope, SpriteExportOptions, WorldCenter, WorldSettings, export_sprites, mark_groups,
    write_curves,
};

#[derive(Parser)]
#[command(name = "iso-export")]
#[command(about = "Export Inkscape drawings to an isometric world", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export paths as isometric curves (curves.json)
    Curves(CurvesArgs),

    /// Export marked groups as sprites (.spr descriptors and .png images)
    Sprites(SpritesArgs),

    /// Place [ISO ORIGIN] markers on groups
    Mark(MarkArgs),
}

#[derive(Args, Debug, Clone)]
struct WorldArgs {
    /// Canvas point that maps to the world origin
    #[arg(long, value_enum, default_value_t = WorldCenter::Page)]
    world_center: WorldCenter,

    #[arg(long, default_value_t = 1.0)]
    custom_center_x: f64,

    #[arg(long, default_value_t = 1.0)]
    custom_center_y: f64,

    #[arg(long, default_value_t = 256.0)]
    tile_width: f64,

    #[arg(long, default_value_t = 128.0)]
    tile_height: f64,

    /// Canvas pixels per unit of world height
    #[arg(long, default_value_t = 128.0)]
    vertical_step: f64,
}

impl From<WorldArgs> for WorldSettings {
    fn from(args: WorldArgs) -> Self {
        WorldSettings {
            world_center: args.world_center,
            custom_center_x: args.custom_center_x,
            custom_center_y: args.custom_center_y,
            tile_width: args.tile_width,
            tile_height: args.tile_height,
            vertical_step: args.vertical_step,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct CurvesArgs {
    /// Input SVG file
    #[arg(value_name = "SVG")]
    input: PathBuf,

    /// Output JSON file
    #[arg(short = 'o', long, default_value = "curves.json")]
    export_path: PathBuf,

    #[arg(long, value_enum, default_value_t = SearchScope::Auto)]
    search_scope: SearchScope,

    /// Selected object id (repeatable, order is kept)
    #[arg(long = "id", value_name = "ID")]
    ids: Vec<String>,

    /// World height of every curve point
    #[arg(long, default_value_t = 0.0)]
    z_value: f64,

    #[command(flatten)]
    world: WorldArgs,
}

#[derive(Args, Debug, Clone)]
struct SpritesArgs {
    /// Input SVG file
    #[arg(value_name = "SVG")]
    input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    export_path: PathBuf,

    #[arg(long, value_enum, default_value_t = SearchScope::Auto)]
    search_scope: SearchScope,

    /// Selected object id (repeatable, order is kept)
    #[arg(long = "id", value_name = "ID")]
    ids: Vec<String>,

    /// World height for markers without a Z= value
    #[arg(long, default_value_t = 0.0)]
    default_z: f64,

    #[arg(long, default_value_t = 96.0)]
    export_dpi: f64,

    /// How group bounding boxes are measured
    #[arg(long, value_enum, default_value_t = BoundsSource::Visual)]
    bounds: BoundsSource,

    /// Inkscape executable
    #[arg(long, default_value = "inkscape")]
    inkscape: PathBuf,

    /// Only write .spr files
    #[arg(long)]
    no_images: bool,

    #[command(flatten)]
    world: WorldArgs,
}

#[derive(Args, Debug, Clone)]
struct MarkArgs {
    /// Input SVG file
    #[arg(value_name = "SVG")]
    input: PathBuf,

    /// Output SVG file
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Group to mark (repeatable)
    #[arg(long = "id", value_name = "ID", required = true)]
    ids: Vec<String>,

    /// 1 top left .. 5 center .. 9 bottom right
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=9))]
    origin_location: u8,

    #[arg(long, default_value_t = 0.0)]
    z_value: f64,

    /// Leave the new markers visible
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    show_origin: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("info")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Curves(args) => curves(args),
        Commands::Sprites(args) => sprites(args),
        Commands::Mark(args) => mark(args),
    }
}

fn load(input: &Path) -> Result<(String, Document)> {
    let svg = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file '{}'", input.display()))?;
    let doc = Document::parse(&svg)
        .with_context(|| format!("Failed to parse '{}'", input.display()))?;
    Ok((svg, doc))
}

fn curves(args: CurvesArgs) -> Result<()> {
    let (_, doc) = load(&args.input)?;
    let opts = CurveExportOptions {
        export_path: args.export_path,
        search_scope: args.search_scope,
        selection: args.ids,
        world: args.world.into(),
        z_value: args.z_value,
    };
    write_curves(&doc, &opts).context("Curve export failed")?;
    Ok(())
}

fn sprites(args: SpritesArgs) -> Result<()> {
    let (svg, doc) = load(&args.input)?;
    let inkscape = Inkscape::new(args.inkscape);
    let opts = SpriteExportOptions {
        export_path: args.export_path,
        search_scope: args.search_scope,
        selection: args.ids,
        world: args.world.into(),
        default_z: args.default_z,
        export_dpi: args.export_dpi,
        bounds: args.bounds,
        no_images: args.no_images,
    };

    let bounds: &dyn BoundsProvider = match opts.bounds {
        BoundsSource::Visual => &VisualBounds,
        BoundsSource::Geometric => &GeometricBounds,
        BoundsSource::Inkscape => &inkscape,
    };
    let export =
        export_sprites(&doc, &svg, &opts, bounds, &inkscape).context("Sprite export failed")?;
    println!(
        "Exported {} sprite(s) to '{}'",
        export.descriptors.len(),
        opts.export_path.display()
    );
    Ok(())
}

fn mark(args: MarkArgs) -> Result<()> {
    if args.output == args.input {
        bail!("Refusing to overwrite the input file; choose another --output");
    }
    let (svg, doc) = load(&args.input)?;
    let opts = MarkOptions {
        selection: args.ids,
        origin_location: args.origin_location,
        z_value: args.z_value,
        show_origin: args.show_origin,
    };
    let result = mark_groups(&doc, &svg, &opts).context("Marking failed")?;
    fs::write(&args.output, &result.svg)
        .with_context(|| format!("Error writing output file '{}'", args.output.display()))?;
    println!(
        "Marked {} group(s), wrote '{}'",
        result.markers.len(),
        args.output.display()
    );
    Ok(())
}
