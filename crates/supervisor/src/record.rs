use crate::{ServerKind, SupervisorError};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Overrides the directory holding PID records and server logs.
pub const RUNTIME_DIR_ENV: &str = "TOOLHOST_RUNTIME_DIR";

/// One record per running server type, persisted as JSON in the PID file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub server: ServerKind,
    pub pid: u32,
    pub host: String,
    pub port: u16,
    pub started_at_ms: u64,
}

/// Narrow contract over the one piece of cross-process shared state.
///
/// Everything the supervisor knows about liveness between restarts flows
/// through these three operations plus the deterministic file naming.
pub trait RecordStore {
    fn read(&self, kind: ServerKind) -> Result<Option<ServerRecord>, SupervisorError>;
    fn write(&self, record: &ServerRecord) -> Result<(), SupervisorError>;
    fn delete(&self, kind: ServerKind) -> Result<(), SupervisorError>;

    fn pid_path(&self, kind: ServerKind) -> PathBuf;
    fn stdout_path(&self, kind: ServerKind) -> PathBuf;
    fn stderr_path(&self, kind: ServerKind) -> PathBuf;

    /// Serialize concurrent start/stop for the same server type. The
    /// default is a no-op guard; the filesystem store backs it with an
    /// advisory lock.
    fn lock(&self, kind: ServerKind) -> Result<RecordGuard, SupervisorError> {
        let _ = kind;
        Ok(RecordGuard { file: None })
    }
}

/// Held for the duration of a start/stop critical section; unlocks on drop.
pub struct RecordGuard {
    file: Option<std::fs::File>,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.unlock();
        }
    }
}

/// PID records and logs as flat files in a runtime directory:
/// `<dir>/<server_type>.pid`, `.out`, `.err`, `.lock`.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$TOOLHOST_RUNTIME_DIR`, or `<system tmp>/toolhost`.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(RUNTIME_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("toolhost"));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, kind: ServerKind, extension: &str) -> PathBuf {
        self.dir.join(format!("{kind}.{extension}"))
    }

    fn ensure_dir(&self) -> Result<(), SupervisorError> {
        fs::create_dir_all(&self.dir).map_err(|source| SupervisorError::RecordIo {
            path: self.dir.clone(),
            source,
        })
    }
}

impl RecordStore for FsRecordStore {
    fn read(&self, kind: ServerKind) -> Result<Option<ServerRecord>, SupervisorError> {
        let path = self.pid_path(kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SupervisorError::RecordIo { path, source }),
        };
        match serde_json::from_slice::<ServerRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                // An unreadable record cannot prove a live instance; treat
                // it like a stale one and self-heal.
                log::warn!(
                    "removing unparseable PID record {}: {err}",
                    path.display()
                );
                self.delete(kind)?;
                Ok(None)
            }
        }
    }

    fn write(&self, record: &ServerRecord) -> Result<(), SupervisorError> {
        self.ensure_dir()?;
        let path = self.pid_path(record.server);
        let payload = serde_json::to_vec_pretty(record).map_err(|err| {
            SupervisorError::RecordIo {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, err),
            }
        })?;
        fs::write(&path, payload).map_err(|source| SupervisorError::RecordIo { path, source })
    }

    fn delete(&self, kind: ServerKind) -> Result<(), SupervisorError> {
        let path = self.pid_path(kind);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SupervisorError::RecordIo { path, source }),
        }
    }

    fn pid_path(&self, kind: ServerKind) -> PathBuf {
        self.path_for(kind, "pid")
    }

    fn stdout_path(&self, kind: ServerKind) -> PathBuf {
        self.path_for(kind, "out")
    }

    fn stderr_path(&self, kind: ServerKind) -> PathBuf {
        self.path_for(kind, "err")
    }

    fn lock(&self, kind: ServerKind) -> Result<RecordGuard, SupervisorError> {
        self.ensure_dir()?;
        let path = self.path_for(kind, "lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| SupervisorError::RecordIo {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive()
            .map_err(|source| SupervisorError::RecordIo { path, source })?;
        Ok(RecordGuard { file: Some(file) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(pid: u32) -> ServerRecord {
        ServerRecord {
            server: ServerKind::Filesystem,
            pid,
            host: "127.0.0.1".to_string(),
            port: 8765,
            started_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn read_write_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());

        assert!(store.read(ServerKind::Filesystem).unwrap().is_none());
        store.write(&record(4242)).unwrap();
        assert_eq!(store.read(ServerKind::Filesystem).unwrap(), Some(record(4242)));
        store.delete(ServerKind::Filesystem).unwrap();
        assert!(store.read(ServerKind::Filesystem).unwrap().is_none());
        // Deleting an absent record stays quiet.
        store.delete(ServerKind::Filesystem).unwrap();
    }

    #[test]
    fn unparseable_record_self_heals_to_none() {
        let dir = TempDir::new().unwrap();
        let store = FsRecordStore::new(dir.path());
        std::fs::write(store.pid_path(ServerKind::Filesystem), b"not json").unwrap();

        assert!(store.read(ServerKind::Filesystem).unwrap().is_none());
        assert!(!store.pid_path(ServerKind::Filesystem).exists());
    }

    #[test]
    fn paths_are_deterministic_per_kind() {
        let store = FsRecordStore::new("/tmp/toolhost-test");
        assert!(store
            .pid_path(ServerKind::BraveSearch)
            .ends_with("brave_search.pid"));
        assert!(store.stdout_path(ServerKind::Searxng).ends_with("searxng.out"));
        assert!(store
            .stderr_path(ServerKind::Filesystem)
            .ends_with("filesystem.err"));
    }
}
