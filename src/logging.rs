use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub const LOG_ENV: &str = "ZUTUBE_LOG";
const FALLBACK_LEVEL: &str = "info";

/// Installs the global subscriber writing to the configured log file. The
/// terminal belongs to the UI, so nothing is logged to stdout or stderr.
/// Returns `Ok(false)` when logging is switched off.
pub fn init(cfg: &LogConfig) -> Result<bool> {
    let Some(path) = cfg.file_path() else {
        return Ok(false);
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("logging: open {}", path.display()))?;

    let filter = build_env_filter(&cfg.level, std::env::var(LOG_ENV).ok().as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("logging: install subscriber: {err}"))?;
    Ok(true)
}

/// `ZUTUBE_LOG` wins over the configured level; invalid directives fall through.
fn build_env_filter(level: &str, env_override: Option<&str>) -> EnvFilter {
    if let Some(directives) = env_override {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_new(level) {
        return filter;
    }
    EnvFilter::new(FALLBACK_LEVEL)
}
