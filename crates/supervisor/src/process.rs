use crate::{ServerKind, SupervisorError};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Zero-signal liveness probe. EPERM means the process exists but belongs
/// to someone else, which still counts as alive.
pub fn process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    unsafe {
        if libc::kill(pid as i32, 0) == 0 {
            return true;
        }
        matches!(
            io::Error::last_os_error().raw_os_error(),
            Some(libc::EPERM)
        )
    }
}

/// Ask a process to shut down gracefully. Reports success once the signal
/// is accepted by the OS; does not wait for the process to exit.
pub fn send_terminate(pid: u32) -> io::Result<()> {
    let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Everything a launcher needs to know about the instance being started.
pub struct LaunchContext {
    pub kind: ServerKind,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

pub enum Launched {
    /// The server ran in-process and has already terminated gracefully.
    Completed,
    /// A background process was created; its record is expected to appear.
    Detached { pid: u32 },
}

/// Seam between the supervisor's start/stop logic and the OS process
/// model: one implementation runs the server inline, the other creates a
/// detached daemon.
pub trait ProcessLauncher {
    fn launch(&mut self, ctx: &LaunchContext) -> Result<Launched, SupervisorError>;
}

/// Runs the server in the current process until it terminates. The server
/// itself owns its PID record (written after bind, removed on graceful
/// stop), so the launcher only relays the outcome.
pub struct InlineLauncher<F>
where
    F: FnOnce() -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
{
    run: Option<F>,
}

impl<F> InlineLauncher<F>
where
    F: FnOnce() -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
{
    pub fn new(run: F) -> Self {
        Self { run: Some(run) }
    }
}

impl<F> ProcessLauncher for InlineLauncher<F>
where
    F: FnOnce() -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
{
    fn launch(&mut self, ctx: &LaunchContext) -> Result<Launched, SupervisorError> {
        let Some(run) = self.run.take() else {
            return Err(SupervisorError::Launch {
                kind: ctx.kind,
                source: "inline launcher already consumed".into(),
            });
        };
        run().map_err(|source| SupervisorError::Launch {
            kind: ctx.kind,
            source,
        })?;
        Ok(Launched::Completed)
    }
}

/// Creates the server as a background process: new session (detached from
/// the controlling terminal), stdin closed, stdout/stderr appended to the
/// per-type log files.
pub struct DetachedLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl DetachedLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn open_log(path: &PathBuf) -> io::Result<std::fs::File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl ProcessLauncher for DetachedLauncher {
    fn launch(&mut self, ctx: &LaunchContext) -> Result<Launched, SupervisorError> {
        let wrap = |source: io::Error| SupervisorError::Launch {
            kind: ctx.kind,
            source: Box::new(source),
        };

        let stdout = Self::open_log(&ctx.stdout_log).map_err(wrap)?;
        let stderr = Self::open_log(&ctx.stderr_log).map_err(wrap)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // New session: operator shell cleanup (SIGHUP, process-group kills)
        // must not take the daemon down with it.
        #[cfg(unix)]
        unsafe {
            use std::os::unix::process::CommandExt;
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(wrap)?;
        log::debug!("spawned detached {} server (PID {})", ctx.kind, child.id());
        Ok(Launched::Detached { pid: child.id() })
    }
}
