//! Tile mosaic command line reader.
//!
//! Reads a directory tile pyramid (`catalog.json` plus
//! `{table}/{zoom}/{col}/{row}.{ext}`) and either describes its coverages
//! or composites a read request into a PNG with a JSON envelope sidecar.

mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mosaic_common::EpsgRegistry;
use mosaic_renderer::ImageTileDecoder;
use pyramid_reader::{PyramidReader, ReadOutcome};
use serde_json::json;
use tile_storage::DirectoryTileStore;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mosaic-cli")]
#[command(about = "Composite rasters out of directory tile pyramids")]
struct Args {
    /// Pyramid root directory (holds catalog.json)
    #[arg(short, long, env = "MOSAIC_PYRAMID_DIR")]
    pyramid: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the coverages of the pyramid as JSON
    Info,

    /// Composite a read into a PNG
    Read {
        /// Coverage to read (default: first in the catalog)
        #[arg(short, long)]
        coverage: Option<String>,

        /// Envelope as minx,miny,maxx,maxy in the pyramid's units
        #[arg(long)]
        bbox: Option<String>,

        /// Requested output width in pixels, drives the zoom level choice
        #[arg(long)]
        width: Option<u32>,

        /// Requested output height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Output PNG path; the envelope is written next to it as .json
        #[arg(short, long)]
        output: PathBuf,

        /// Decode tiles on the calling thread only
        #[arg(long)]
        sequential: bool,

        /// Largest composite in pixels
        #[arg(long, env = "MOSAIC_MAX_OUTPUT_PIXELS")]
        max_output_pixels: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let store = DirectoryTileStore::open(&args.pyramid)
        .with_context(|| format!("opening pyramid at {}", args.pyramid.display()))?;

    match args.command {
        Command::Info => describe(store),
        Command::Read {
            coverage,
            bbox,
            width,
            height,
            output,
            sequential,
            max_output_pixels,
        } => {
            let reader = PyramidReader::open(
                Arc::new(store),
                Arc::new(ImageTileDecoder::new()),
                &EpsgRegistry,
                config::reader_config(sequential, max_output_pixels)?,
            )?;
            let request = config::read_request(bbox.as_deref(), width, height)?;
            let coverage = coverage.unwrap_or_else(|| reader.default_coverage().to_string());

            info!(coverage = %coverage, request = ?request, "Reading");
            match reader.read_coverage(&coverage, &request)? {
                ReadOutcome::Coverage(result) => {
                    write_output(&output, &coverage, &result)?;
                    Ok(())
                }
                ReadOutcome::Empty => {
                    warn!(coverage = %coverage, "No stored tiles intersect the request");
                    bail!("no coverage for the request, nothing written");
                }
            }
        }
    }
}

fn describe(store: DirectoryTileStore) -> Result<()> {
    let reader = PyramidReader::with_defaults(Arc::new(store))?;

    let mut coverages = Vec::with_capacity(reader.coverage_count());
    for name in reader.coverage_names() {
        let pyramid = reader.pyramid(name)?;
        let crs = reader.crs(name)?;
        coverages.push(json!({
            "name": name,
            "srid": pyramid.srid,
            "crs": crs.as_ref().map(|crs| crs.to_string()),
            "geographic": crs.as_ref().map(|crs| crs.code.is_geographic()),
            "envelope": reader.original_envelope(name)?,
            "grid_range": reader.original_grid_range(name)?,
            "highest_resolution": reader.highest_resolution(name)?,
            "levels": pyramid.levels(),
        }));
    }

    let summary = json!({
        "default_coverage": reader.default_coverage(),
        "coverages": coverages,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn write_output(
    output: &Path,
    coverage: &str,
    result: &mosaic_renderer::CompositeResult,
) -> Result<()> {
    let png = result.encode_png()?;
    fs::write(output, &png).with_context(|| format!("writing {}", output.display()))?;

    let sidecar = output.with_extension("json");
    let metadata = json!({
        "coverage": coverage,
        "composite": result.metadata(),
    });
    fs::write(&sidecar, serde_json::to_vec_pretty(&metadata)?)
        .with_context(|| format!("writing {}", sidecar.display()))?;

    info!(
        output = %output.display(),
        bytes = png.len(),
        width = result.width(),
        height = result.height(),
        zoom = result.zoom,
        "Wrote composite"
    );
    Ok(())
}
