//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`. These run
//! without logging so they work before any config exists.

use clap::Subcommand;
use std::path::Path;
use tilecache::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a config file with default values if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, override_path: Option<&Path>) -> Result<(), CliError> {
    let path = override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init => run_init(&path),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "(defaults)".to_string()
    };

    println!("Configuration from {}", source);
    println!();
    println!("[store]");
    println!("directory = {}", config.store.directory.display());
    println!("extension = {}", config.store.extension);
    println!("queue_capacity = {}", config.store.queue_capacity);
    println!("enqueue_timeout_ms = {}", config.store.enqueue_timeout_ms);
    println!("busy_timeout_ms = {}", config.store.busy_timeout_ms);
    println!("shutdown_timeout_secs = {}", config.store.shutdown_timeout_secs);
    println!();
    println!("[download]");
    println!("plain_url = {}", config.download.plain_url);
    println!("labeled_url = {}", config.download.labeled_url);
    println!("user_agent = {}", config.download.user_agent);
    println!("referer = {}", config.download.referer);
    println!("timeout = {}", config.download.timeout);
    println!("max_concurrent = {}", config.download.max_concurrent);
    println!("max_retries = {}", config.download.max_retries);
    println!("progress_batch_size = {}", config.download.progress_batch_size);
    println!("progress_interval_ms = {}", config.download.progress_interval_ms);
    println!("persist_batch_size = {}", config.download.persist_batch_size);
    println!();
    println!("[session]");
    println!("cache_enabled = {}", config.session.cache_enabled);
    println!("online_enabled = {}", config.session.online_enabled);
    println!();
    println!("[logging]");
    println!("file = {}", config.logging.file.display());

    Ok(())
}

fn run_init(path: &Path) -> Result<(), CliError> {
    if ConfigFile::ensure_exists(path)? {
        println!("Created {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_loadable_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run(ConfigCommands::Init, Some(&path)).unwrap();
        assert!(path.exists());
        assert!(ConfigFile::load_from(&path).is_ok());

        // A second init leaves the file alone.
        std::fs::write(&path, "[session]\nonline_enabled = false\n").unwrap();
        run(ConfigCommands::Init, Some(&path)).unwrap();
        assert!(!ConfigFile::load_from(&path).unwrap().session.online_enabled);
    }

    #[test]
    fn test_show_invalid_file_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[download]\nmax_retries = lots\n").unwrap();

        assert!(matches!(
            run(ConfigCommands::Show, Some(&path)),
            Err(CliError::Config(_))
        ));
    }
}
