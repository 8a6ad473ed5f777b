//! One-time config bootstrap: ensures the config directory and default
//! settings files exist before any server starts.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the config directory (mainly for tests).
pub const CONFIG_DIR_ENV: &str = "TOOLHOST_CONFIG_DIR";

const ENV_TEMPLATE: &str = "\
# toolhost settings. This file is loaded on every toolhost invocation;
# CLI flags take precedence over values here.

# Filesystem tool server
#TOOLHOST_FILESYSTEM_ALLOWED_DIR=/path/to/workspace
#TOOLHOST_FILESYSTEM_HOST=127.0.0.1
#TOOLHOST_FILESYSTEM_PORT=8765

# Where PID records and server logs are kept (default: <tmp>/toolhost)
#TOOLHOST_RUNTIME_DIR=/tmp/toolhost

# External search adapters (proxied by separate processes, not this binary)
#BRAVE_SEARCH_API_KEY=
#SEARXNG_BASE_URL=http://localhost:8080
";

const SEARXNG_SETTINGS: &str = "\
use_default_settings: true

search:
  formats:
    - html
    - json

server:
  limiter: false
";

pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolhost")
}

pub struct InitReport {
    pub dir: PathBuf,
    /// Set when the example `.env` was (re)written this run.
    pub env_file: Option<PathBuf>,
    /// Set when the searxng settings file was (re)written this run.
    pub searxng_settings: Option<PathBuf>,
}

pub fn initialize(dir: &Path, force: bool) -> Result<InitReport> {
    if force && dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("failed to clear {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let env_path = dir.join(".env");
    let env_file = if env_path.exists() {
        None
    } else {
        fs::write(&env_path, ENV_TEMPLATE)
            .with_context(|| format!("failed to write {}", env_path.display()))?;
        Some(env_path)
    };

    let searxng_dir = dir.join("searxng_config");
    fs::create_dir_all(&searxng_dir)
        .with_context(|| format!("failed to create {}", searxng_dir.display()))?;
    let settings_path = searxng_dir.join("settings.yml");
    let searxng_settings = if settings_path.exists() {
        None
    } else {
        fs::write(&settings_path, SEARXNG_SETTINGS)
            .with_context(|| format!("failed to write {}", settings_path.display()))?;
        Some(settings_path)
    };

    Ok(InitReport {
        dir: dir.to_path_buf(),
        env_file,
        searxng_settings,
    })
}
