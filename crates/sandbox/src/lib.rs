//! Path resolution confined to a fixed allowed root.
//!
//! [`Sandbox::resolve`] maps a caller-supplied relative path to an absolute
//! path that is provably equal to or below the allowed root, or rejects it.
//! Nothing in a tool server may touch storage without going through
//! `resolve` first.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("allowed root does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("allowed root is not a directory: {}", .0.display())]
    RootNotADirectory(PathBuf),

    #[error("failed to canonicalize allowed root {}: {source}", .path.display())]
    RootCanonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path escapes the allowed root: {input}")]
    Escape { input: String },

    #[error("failed to inspect {}: {source}", .path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An allowed root directory, fixed for the lifetime of a server.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Pin a sandbox to `root`. The root must exist and be a directory; it
    /// is canonicalized up front so every later containment check compares
    /// canonical forms.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(SandboxError::RootMissing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(SandboxError::RootNotADirectory(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|source| SandboxError::RootCanonicalize {
                path: root.to_path_buf(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path against the root.
    ///
    /// The input is joined onto the root and lexically normalized
    /// (collapsing `.` and `..`), then the containment check is repeated on
    /// the canonical form: symlinks can smuggle a literally in-root path
    /// outside the root, so a link whose target resolves elsewhere is an
    /// escape even though the link itself sits inside.
    ///
    /// On success the *literal* normalized path is returned, not the fully
    /// canonical one, so operations address symlinks themselves (deleting a
    /// link removes the link, and metadata can report it as a link).
    pub fn resolve(&self, input: &str) -> Result<PathBuf, SandboxError> {
        let lexical = lexical_normalize(&self.root.join(input));
        // Component-wise prefix check: Path::starts_with never matches a
        // sibling like /root2 against /root.
        if !lexical.starts_with(&self.root) {
            return Err(SandboxError::Escape {
                input: input.to_string(),
            });
        }
        self.verify_canonical(&lexical, input)?;
        Ok(lexical)
    }

    /// Re-check containment after symlink resolution. The path may not
    /// exist yet (a write or mkdir target), in which case the deepest
    /// existing ancestor must canonicalize into the root.
    fn verify_canonical(&self, lexical: &Path, input: &str) -> Result<(), SandboxError> {
        let escape = || SandboxError::Escape {
            input: input.to_string(),
        };

        let mut candidate = lexical;
        loop {
            match candidate.canonicalize() {
                Ok(real) => {
                    if real.starts_with(&self.root) {
                        return Ok(());
                    }
                    return Err(escape());
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // lstat succeeding here means `candidate` is a dangling
                    // symlink: it cannot prove where a write through it
                    // would land, so it is treated as an escape.
                    if candidate.symlink_metadata().is_ok() {
                        return Err(escape());
                    }
                    match candidate.parent() {
                        Some(parent) => candidate = parent,
                        // Walked past the filesystem root without finding
                        // an existing ancestor; the allowed root itself
                        // must have been removed underneath us.
                        None => return Err(escape()),
                    }
                }
                Err(source) => {
                    return Err(SandboxError::Probe {
                        path: candidate.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
/// `..` at the filesystem root stays at the root, mirroring path
/// normalization in libc's realpath.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // pop() is a no-op at "/", which is exactly the behavior
                // we want for over-deep `..` chains.
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
