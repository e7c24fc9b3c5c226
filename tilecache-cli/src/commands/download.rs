//! Download command - download every tile of a region into its store.

use clap::Args;
use std::collections::HashMap;
use std::time::Instant;
use tilecache::coord::GeoPoint;
use tilecache::orchestrator::{SessionEvent, SessionReport};
use tilecache::region::RegionDescriptor;
use tilecache::tile::TileVariant;
use tilecache::TileCacheError;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the download command.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Region name; the store is <store directory>/<name>.<extension>
    #[arg(long)]
    pub name: String,

    /// Northern edge latitude
    #[arg(long, allow_hyphen_values = true)]
    pub north: f64,

    /// Western edge longitude
    #[arg(long, allow_hyphen_values = true)]
    pub west: f64,

    /// Southern edge latitude
    #[arg(long, allow_hyphen_values = true)]
    pub south: f64,

    /// Eastern edge longitude
    #[arg(long, allow_hyphen_values = true)]
    pub east: f64,

    /// Lowest zoom level to download
    #[arg(long)]
    pub min_zoom: u8,

    /// Highest zoom level to download
    #[arg(long)]
    pub max_zoom: u8,

    /// Only report what the store already holds
    #[arg(long, conflicts_with = "no_cache")]
    pub offline: bool,

    /// Download without reading or persisting payloads
    #[arg(long)]
    pub no_cache: bool,
}

/// Run the download command.
pub async fn run(args: DownloadArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("download");

    let mut config = runner.config().clone();
    if args.offline {
        config.session.online_enabled = false;
    }
    if args.no_cache {
        config.session.cache_enabled = false;
    }

    let region = RegionDescriptor::new(
        args.name.as_str(),
        GeoPoint::new(args.north, args.west),
        GeoPoint::new(args.south, args.east),
        args.min_zoom,
        args.max_zoom,
    )
    .map_err(TileCacheError::from)?;

    let service = runner.create_service(&config)?;
    let store_path = service.store_path(region.name())?;

    println!("Downloading region '{}':", region.name());
    println!("  Store: {}", store_path.display());
    println!(
        "  Zoom: {}-{} ({} tiles per variant)",
        region.min_zoom(),
        region.max_zoom(),
        region.total_tiles()
    );
    println!("  Log: {}", runner.log_path().display());
    println!();

    let start = Instant::now();
    let mut handle = service.download_region(region)?;

    let mut received: HashMap<(u8, TileVariant), usize> = HashMap::new();
    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::Tiles {
                variant,
                zoom,
                tiles,
            } => {
                *received.entry((zoom, variant)).or_default() += tiles.len();
            }
            SessionEvent::Chain { variant, state } => {
                println!("  [{}] {}", variant, state);
            }
            SessionEvent::Completed(_) => {}
        }
    }

    let report = handle
        .wait()
        .await
        .map_err(|e| CliError::Session(e.to_string()))?;
    service.shutdown().await;

    print_report(&report, &received);
    println!();
    println!("Done in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

fn print_report(report: &SessionReport, received: &HashMap<(u8, TileVariant), usize>) {
    println!();
    println!("Zoom   Expected   Rows   Plain   Labeled   Complete");
    for coverage in &report.coverage {
        let stats = report
            .final_stats
            .iter()
            .find(|s| s.zoom == coverage.zoom)
            .copied()
            .unwrap_or_default();
        println!(
            "{:>4}   {:>8}   {:>4}   {:>5}   {:>7}   {:>8}",
            coverage.zoom,
            coverage.expected,
            stats.rows,
            stats.plain,
            stats.labeled,
            stats.complete
        );
    }

    println!();
    for chain in &report.chains {
        let served: usize = received
            .iter()
            .filter(|((_, variant), _)| *variant == chain.variant)
            .map(|(_, count)| count)
            .sum();
        println!(
            "{:>8}: {} ({} downloaded, {} failed, {} delivered)",
            chain.variant,
            chain.state,
            chain.downloaded(),
            chain.failed(),
            served
        );
    }
}
