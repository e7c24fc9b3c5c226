//! Dedupe command - merge duplicate rows in a region store.

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the dedupe command.
pub async fn run(name: &str, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("dedupe");

    let service = runner.create_service(runner.config())?;
    let path = service.store_path(name)?;
    if !path.exists() {
        return Err(CliError::Config(format!(
            "No store named '{}' at {}",
            name,
            path.display()
        )));
    }

    let result = service.deduplicate(name).await;
    if result.is_ok() {
        service.checkpoint(name).await?;
    }
    service.shutdown().await;
    let removed = result?;

    println!("Store: {}", path.display());
    println!("Removed {} duplicate rows", removed);

    Ok(())
}
