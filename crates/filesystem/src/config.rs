use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ALLOWED_DIR_ENV: &str = "TOOLHOST_FILESYSTEM_ALLOWED_DIR";
pub const HOST_ENV: &str = "TOOLHOST_FILESYSTEM_HOST";
pub const PORT_ENV: &str = "TOOLHOST_FILESYSTEM_PORT";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;

/// Startup configuration for the filesystem server. Sourced from the
/// environment with explicit overrides (CLI flags) taking precedence.
#[derive(Debug, Clone)]
pub struct FilesystemConfig {
    pub allowed_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Permit binding a non-loopback host. Off by default: these servers
    /// hand an agent unauthenticated filesystem access.
    pub public: bool,
}

/// CLI-level overrides; `None` falls through to the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub allowed_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public: bool,
}

impl FilesystemConfig {
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self> {
        let allowed_dir = match overrides.allowed_dir {
            Some(dir) => dir,
            None => match std::env::var_os(ALLOWED_DIR_ENV) {
                Some(dir) => PathBuf::from(dir),
                None => std::env::current_dir()
                    .context("no allowed directory configured and the working directory is unreadable")?,
            },
        };

        let host = overrides
            .host
            .or_else(|| std::env::var(HOST_ENV).ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match std::env::var(PORT_ENV) {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid {PORT_ENV} value: {raw:?}"))?,
                Err(_) => DEFAULT_PORT,
            },
        };

        Ok(Self {
            allowed_dir,
            host,
            port,
            public: overrides.public,
        })
    }

    /// Resolve the bind address, refusing non-loopback hosts unless
    /// `public` was requested explicitly.
    pub async fn guarded_bind_addr(&self) -> Result<SocketAddr> {
        let bind = format!("{}:{}", self.host, self.port);
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&bind)
            .await
            .with_context(|| format!("failed to resolve bind address: {bind}"))?
            .collect();

        let Some(addr) = addrs.iter().copied().find(SocketAddr::is_ipv4).or_else(|| addrs.first().copied())
        else {
            anyhow::bail!("bind address resolved to zero socket addrs: {bind}");
        };

        if addrs.iter().any(|addr| !addr.ip().is_loopback()) && !self.public {
            anyhow::bail!(
                "refusing to bind to non-loopback address without --public: {bind}"
            );
        }
        Ok(addr)
    }
}
