use anyhow::Context;
use basemap_common::{CellKey, MapRect, parse_cell_keys};
use basemap_kernel::{BasemapConfig, BasemapEngine};
use basemap_render::{DebugTextRenderer, RenderView, Renderer, blits};
use basemap_stream::{FetchRequest, cells_around};
use basemap_tile::{BitmapHandle, DonorTileCalculator, Tile};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "basemap-cli", about = "CLI tool for basemap cache operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Compute the donor tile for a cell from a set of loaded cells
    Donor {
        /// Loaded cells, comma separated quadkeys (e.g. "0,01,23")
        #[arg(short, long)]
        tiles: String,
        /// Cell to build a placeholder for
        #[arg(short, long)]
        request: String,
    },
    /// Pan a viewport across the grid and print cache statistics
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "32")]
        frames: u64,
        /// Zoom level of the visible cells
        #[arg(short, long, default_value = "4")]
        zoom: usize,
        /// Overrides the configured tile cache limit
        #[arg(short = 'l', long)]
        cache_limit: Option<i64>,
        /// YAML or JSON engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Viewport half-size in cells
        #[arg(short, long, default_value = "1")]
        radius: i64,
        /// Fail every Nth downloaded tile (0 = never)
        #[arg(long, default_value = "0")]
        fail_every: u64,
        /// Dump the visible cells after the last frame
        #[arg(long)]
        render: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("basemap-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", basemap_common::crate_info());
            println!("tile: {}", basemap_tile::crate_info());
            println!("ecs: {}", basemap_ecs::crate_info());
            println!("stream: {}", basemap_stream::crate_info());
            println!("render: {}", basemap_render::crate_info());
            println!("kernel: {}", basemap_kernel::crate_info());
        }
        Commands::Donor { tiles, request } => donor(&tiles, &request)?,
        Commands::Simulate {
            frames,
            zoom,
            cache_limit,
            config,
            radius,
            fail_every,
            render,
        } => {
            let mut config = match config {
                Some(path) => BasemapConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => BasemapConfig::default(),
            };
            if let Some(limit) = cache_limit {
                config.tile_cache_limit = limit;
            }
            simulate(config, frames, zoom, radius, fail_every, render)?;
        }
    }

    Ok(())
}

fn donor(tiles: &str, request: &str) -> anyhow::Result<()> {
    let loaded = parse_cell_keys(tiles).context("parsing --tiles")?;
    let requested: CellKey = request.parse().context("parsing --request")?;

    let calculator: DonorTileCalculator = loaded
        .iter()
        .enumerate()
        .map(|(i, key)| (key.clone(), Tile::Snapshot(BitmapHandle(i as u64))))
        .collect();
    for (i, key) in loaded.iter().enumerate() {
        println!("bitmap {i}: {key}");
    }

    let tile = calculator.create_donor_tile(&requested);
    println!("donor for {requested}: {tile:?}");
    for op in tile.resolve() {
        println!(
            "  bitmap {} src={:?} dst={:?}",
            op.bitmap.0, op.source, op.destination
        );
    }
    for blit in blits(&tile, MapRect::square(256.0)) {
        println!(
            "  blit {} src=({:.3}, {:.3}) {:.3} -> dst=({:.1}, {:.1}) {:.1}",
            blit.bitmap.0,
            blit.source.origin.x,
            blit.source.origin.y,
            blit.source.width(),
            blit.destination.origin.x,
            blit.destination.origin.y,
            blit.destination.width()
        );
    }
    Ok(())
}

/// Cells per grid row at `zoom`, after checking the viewport arguments.
fn grid_side(zoom: usize, radius: i64) -> anyhow::Result<i64> {
    // Fails early on zoom levels a CellKey cannot address.
    CellKey::from_xyz(0, 0, zoom).context("invalid --zoom")?;
    let side = 1i64 << zoom;
    if !(0..=side).contains(&radius) {
        anyhow::bail!("invalid --radius {radius}: expected 0..={side} at zoom {zoom}");
    }
    Ok(side)
}

fn simulate(
    config: BasemapConfig,
    frames: u64,
    zoom: usize,
    radius: i64,
    fail_every: u64,
    render: bool,
) -> anyhow::Result<()> {
    let side = grid_side(zoom, radius)?;

    println!(
        "Simulate: frames={frames}, zoom={zoom}, radius={radius}, cache_limit={}",
        config.tile_cache_limit
    );
    let mut engine = BasemapEngine::new(config);
    let row = side / 2;
    let mut downloaded = 0u64;

    for frame in 0..frames {
        let column = i64::try_from(frame)?;
        let stats = engine.tick(cells_around(column, row, radius, zoom));
        println!("{stats}");

        // Stand-in downloader: answer everything requested this frame.
        let pending: Vec<FetchRequest> = engine
            .fetcher()
            .pending()
            .filter(|request| request.url.is_some())
            .cloned()
            .collect();
        for request in pending {
            downloaded += 1;
            if fail_every > 0 && downloaded % fail_every == 0 {
                engine.fail(&request);
            } else {
                engine.complete(&request, Tile::Snapshot(BitmapHandle(downloaded)));
            }
        }
    }

    println!(
        "Frame time: avg={:?} max={:?} over {} frames",
        engine.timer().average(),
        engine.timer().max(),
        engine.timer().count()
    );
    if render {
        print!(
            "{}",
            DebugTextRenderer::new().render(engine.store(), &RenderView::default())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_side_accepts_radius_up_to_side() {
        assert_eq!(grid_side(4, 1).unwrap(), 16);
        assert_eq!(grid_side(4, 16).unwrap(), 16);
        assert_eq!(grid_side(0, 0).unwrap(), 1);
    }

    #[test]
    fn grid_side_rejects_bad_arguments() {
        assert!(grid_side(4, 17).is_err());
        assert!(grid_side(4, -1).is_err());
        assert!(grid_side(2, i64::MAX).is_err());
        assert!(grid_side(basemap_common::MAX_ZOOM + 1, 1).is_err());
    }
}
