use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The family of tool servers the supervisor knows how to track.
///
/// Every kind gets uniform PID/log record handling; which kinds this binary
/// can actually *run* is decided by the caller wiring a launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Filesystem,
    BraveSearch,
    Searxng,
}

impl ServerKind {
    pub const ALL: [ServerKind; 3] = [
        ServerKind::Filesystem,
        ServerKind::BraveSearch,
        ServerKind::Searxng,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServerKind::Filesystem => "filesystem",
            ServerKind::BraveSearch => "brave_search",
            ServerKind::Searxng => "searxng",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown server type '{input}' (expected one of: filesystem, brave_search, searxng)")]
pub struct ParseServerKindError {
    input: String,
}

impl FromStr for ServerKind {
    type Err = ParseServerKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(ServerKind::Filesystem),
            "brave_search" => Ok(ServerKind::BraveSearch),
            "searxng" => Ok(ServerKind::Searxng),
            other => Err(ParseServerKindError {
                input: other.to_string(),
            }),
        }
    }
}
