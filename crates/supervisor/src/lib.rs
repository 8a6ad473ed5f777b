//! Server lifecycle supervision.
//!
//! Owns the mapping from server type to at most one live OS process.
//! The PID record on disk is the authoritative existence proof between
//! process restarts; stale records are self-healed the next time they are
//! consulted.

mod kind;
mod process;
mod record;
mod supervisor;

pub use kind::{ParseServerKindError, ServerKind};
pub use process::{
    process_alive, send_terminate, DetachedLauncher, InlineLauncher, LaunchContext, Launched,
    ProcessLauncher,
};
pub use record::{FsRecordStore, RecordGuard, RecordStore, ServerRecord, RUNTIME_DIR_ENV};
pub use supervisor::{StartOutcome, Supervisor};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(
        "a {kind} server is already running with PID {pid}; stop it first with 'toolhost stop --server {kind}'"
    )]
    AlreadyRunning { kind: ServerKind, pid: u32 },

    #[error("no running {kind} server found")]
    NotRunning { kind: ServerKind },

    #[error("no process found with PID {pid}; stale PID record removed")]
    StaleRecordRemoved { kind: ServerKind, pid: u32 },

    #[error("{kind} server exited during startup; see {}", .stderr_log.display())]
    StartFailed {
        kind: ServerKind,
        stderr_log: PathBuf,
    },

    #[error("{kind} server did not write its PID record in time")]
    StartTimeout { kind: ServerKind },

    #[error("failed to send SIGTERM to PID {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {kind} server: {source}")]
    Launch {
        kind: ServerKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("PID record I/O failed at {}: {source}", .path.display())]
    RecordIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
