use crate::process::{LaunchContext, Launched, ProcessLauncher};
use crate::record::{FsRecordStore, RecordStore, ServerRecord};
use crate::{process_alive, send_terminate, ServerKind, SupervisorError};
use std::time::Duration;

// Bounded wait for a detached child to bind and write its record. Kept
// short: operators expect `start --detach` to return promptly, and a child
// that needs longer than this has almost certainly failed to bind.
const STARTUP_WAIT: Duration = Duration::from_millis(50);
const STARTUP_RETRIES: usize = 60; // ~3s

#[derive(Debug)]
pub enum StartOutcome {
    /// Foreground run that already finished its graceful stop.
    Completed,
    /// Background instance up and recorded.
    Detached { record: ServerRecord },
}

/// Owns the server_type -> at-most-one-live-process mapping.
pub struct Supervisor<S: RecordStore> {
    store: S,
}

impl Supervisor<FsRecordStore> {
    pub fn with_default_store() -> Self {
        Self::new(FsRecordStore::from_env())
    }
}

impl<S: RecordStore> Supervisor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enforce at most one live instance per server type. A record whose
    /// process is gone is stale: it is removed and the start proceeds.
    pub fn ensure_not_running(&self, kind: ServerKind) -> Result<(), SupervisorError> {
        let _guard = self.store.lock(kind)?;
        if let Some(record) = self.store.read(kind)? {
            if process_alive(record.pid) {
                return Err(SupervisorError::AlreadyRunning {
                    kind,
                    pid: record.pid,
                });
            }
            log::warn!(
                "removing stale PID record for {kind} (PID {} is gone)",
                record.pid
            );
            self.store.delete(kind)?;
        }
        Ok(())
    }

    /// Start a server through the given launcher.
    ///
    /// Inline launchers block until the server has terminated gracefully;
    /// detached launchers return once the child has written its PID record
    /// (bounded wait), never waiting on the child's full lifetime.
    pub fn start(
        &self,
        kind: ServerKind,
        launcher: &mut dyn ProcessLauncher,
    ) -> Result<StartOutcome, SupervisorError> {
        self.ensure_not_running(kind)?;

        let ctx = LaunchContext {
            kind,
            stdout_log: self.store.stdout_path(kind),
            stderr_log: self.store.stderr_path(kind),
        };
        match launcher.launch(&ctx)? {
            Launched::Completed => Ok(StartOutcome::Completed),
            Launched::Detached { pid } => {
                let record = self.await_record(kind, pid)?;
                Ok(StartOutcome::Detached { record })
            }
        }
    }

    fn await_record(&self, kind: ServerKind, pid: u32) -> Result<ServerRecord, SupervisorError> {
        for _ in 0..STARTUP_RETRIES {
            if let Some(record) = self.store.read(kind)? {
                return Ok(record);
            }
            if !process_alive(pid) {
                return Err(SupervisorError::StartFailed {
                    kind,
                    stderr_log: self.store.stderr_path(kind),
                });
            }
            std::thread::sleep(STARTUP_WAIT);
        }
        Err(SupervisorError::StartTimeout { kind })
    }

    /// Signal the recorded process to stop. Success means the OS accepted
    /// the signal; the server removes its own record during graceful stop.
    pub fn stop(&self, kind: ServerKind) -> Result<ServerRecord, SupervisorError> {
        let _guard = self.store.lock(kind)?;
        let Some(record) = self.store.read(kind)? else {
            return Err(SupervisorError::NotRunning { kind });
        };
        if !process_alive(record.pid) {
            self.store.delete(kind)?;
            return Err(SupervisorError::StaleRecordRemoved {
                kind,
                pid: record.pid,
            });
        }
        send_terminate(record.pid).map_err(|source| SupervisorError::Signal {
            pid: record.pid,
            source,
        })?;
        log::info!("sent SIGTERM to {kind} server (PID {})", record.pid);
        Ok(record)
    }
}
