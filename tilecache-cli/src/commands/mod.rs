//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`dedupe`] - Duplicate row merge for a region store
//! - [`download`] - Region download
//! - [`stats`] - Per-zoom store counts

pub mod config;
pub mod dedupe;
pub mod download;
pub mod stats;
