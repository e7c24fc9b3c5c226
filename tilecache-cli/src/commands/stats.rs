//! Stats command - per-zoom tile counts of a region store.

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the stats command.
pub async fn run(name: &str, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("stats");

    let service = runner.create_service(runner.config())?;
    let path = service.store_path(name)?;
    let stats = service.zoom_stats(name).await?;

    println!("Store: {}", path.display());
    if stats.is_empty() {
        println!("(no tiles)");
        return Ok(());
    }

    println!();
    println!("Zoom   Rows   Plain   Labeled   Complete");
    for zoom in &stats {
        println!(
            "{:>4}   {:>4}   {:>5}   {:>7}   {:>8}",
            zoom.zoom, zoom.rows, zoom.plain, zoom.labeled, zoom.complete
        );
    }

    let rows: u64 = stats.iter().map(|s| s.rows).sum();
    let complete: u64 = stats.iter().map(|s| s.complete).sum();
    println!();
    println!("Total: {} rows, {} complete", rows, complete);

    Ok(())
}
