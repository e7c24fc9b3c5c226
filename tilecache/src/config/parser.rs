//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::clamp_concurrent;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("extension") {
            config.store.extension = v.trim().trim_start_matches('.').to_string();
        }
        if let Some(v) = section.get("queue_capacity") {
            config.store.queue_capacity =
                parse_positive("store", "queue_capacity", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("enqueue_timeout_ms") {
            config.store.enqueue_timeout_ms = parse_number(
                "store",
                "enqueue_timeout_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("busy_timeout_ms") {
            config.store.busy_timeout_ms = parse_number(
                "store",
                "busy_timeout_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("shutdown_timeout_secs") {
            config.store.shutdown_timeout_secs = parse_number(
                "store",
                "shutdown_timeout_secs",
                v,
                "must be a non-negative integer (seconds)",
            )?;
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("plain_url") {
            config.download.plain_url = parse_template("plain_url", v)?;
        }
        if let Some(v) = section.get("labeled_url") {
            config.download.labeled_url = parse_template("labeled_url", v)?;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.download.user_agent = v.to_string();
            }
        }
        if let Some(v) = section.get("referer") {
            config.download.referer = v.trim().to_string();
        }
        if let Some(v) = section.get("timeout") {
            config.download.timeout =
                parse_positive("download", "timeout", v, "must be a positive integer (seconds)")?;
        }
        if let Some(v) = section.get("max_concurrent") {
            let requested: usize = parse_number(
                "download",
                "max_concurrent",
                v,
                "must be an integer between 1 and 64",
            )?;
            config.download.max_concurrent = clamp_concurrent(requested);
        }
        if let Some(v) = section.get("max_retries") {
            config.download.max_retries = parse_number(
                "download",
                "max_retries",
                v,
                "must be a non-negative integer",
            )?;
        }
        if let Some(v) = section.get("progress_batch_size") {
            config.download.progress_batch_size = parse_positive(
                "download",
                "progress_batch_size",
                v,
                "must be a positive integer",
            )?;
        }
        if let Some(v) = section.get("progress_interval_ms") {
            config.download.progress_interval_ms = parse_positive(
                "download",
                "progress_interval_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("persist_batch_size") {
            config.download.persist_batch_size = parse_positive(
                "download",
                "persist_batch_size",
                v,
                "must be a positive integer",
            )?;
        }
    }

    // [session] section
    if let Some(section) = ini.section(Some("session")) {
        if let Some(v) = section.get("cache_enabled") {
            config.session.cache_enabled = parse_bool("session", "cache_enabled", v)?;
        }
        if let Some(v) = section.get("online_enabled") {
            config.session.online_enabled = parse_bool("session", "online_enabled", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive<T: FromStr + Default + PartialEq>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    let parsed: T = parse_number(section, key, value, reason)?;
    if parsed == T::default() {
        return Err(invalid(section, key, value, reason));
    }
    Ok(parsed)
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "must be 'true' or 'false'")),
    }
}

fn parse_template(key: &str, value: &str) -> Result<String, ConfigFileError> {
    let v = value.trim();
    let has = |a: &str, b: &str| v.contains(a) || v.contains(b);
    if !(has("{x}", "{col}") && has("{y}", "{row}") && has("{z}", "{zoom}")) {
        return Err(invalid(
            "download",
            key,
            value,
            "must contain {x}, {y} and {z} placeholders",
        ));
    }
    Ok(v.to_string())
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
