use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toolhost_protocol::{DirEntryInfo, ItemKind, ItemMetadata, ToolError};
use toolhost_sandbox::{Sandbox, SandboxError};

/// The filesystem operation set, bound to one sandbox.
///
/// Every method resolves its path arguments through the sandbox before
/// touching storage and returns failures as [`ToolError`] values. The only
/// cross-request state is the immutable allowed root; concurrent writes to
/// the same path are last-writer-wins.
#[derive(Clone)]
pub struct FilesystemService {
    sandbox: Arc<Sandbox>,
}

impl FilesystemService {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
        }
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    fn resolve(&self, input: &str) -> Result<PathBuf, ToolError> {
        self.sandbox.resolve(input).map_err(|err| match err {
            SandboxError::Escape { input } => ToolError::SandboxViolation { path: input },
            SandboxError::Probe { path, source } => ToolError::Io {
                path: path.display().to_string(),
                source,
            },
            // Root validity is checked at startup; losing it mid-flight is
            // an I/O-level surprise, not a caller mistake.
            other => ToolError::Io {
                path: input.to_string(),
                source: std::io::Error::other(other.to_string()),
            },
        })
    }

    /// Display form of an absolute path relative to the root.
    fn rel(&self, absolute: &Path) -> String {
        match absolute.strip_prefix(self.sandbox.root()) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => absolute.display().to_string(),
        }
    }

    /// The allowed root, as handed to callers.
    pub fn working_directory(&self) -> String {
        self.sandbox.root().display().to_string()
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirEntryInfo>, ToolError> {
        let dir = self.resolve(path)?;
        let meta = tokio::fs::metadata(&dir)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        if !meta.is_dir() {
            return Err(ToolError::NotADirectory {
                path: path.to_string(),
            });
        }

        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|err| ToolError::io(path, err))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| ToolError::io(path, err))?;
            let kind = if file_type.is_dir() {
                ItemKind::Directory
            } else if file_type.is_symlink() {
                // Report links by what they point at; a dangling link is
                // listed as a file.
                match tokio::fs::metadata(entry.path()).await {
                    Ok(target) if target.is_dir() => ItemKind::Directory,
                    _ => ItemKind::File,
                }
            } else {
                ItemKind::File
            };
            entries.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let file = self.resolve(path)?;
        let meta = tokio::fs::metadata(&file)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        if meta.is_dir() {
            return Err(ToolError::IsADirectory {
                path: path.to_string(),
            });
        }
        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        String::from_utf8(bytes).map_err(|_| ToolError::NotText {
            path: path.to_string(),
        })
    }

    /// Writes (always overwriting) and reports the byte count.
    pub async fn write_file(
        &self,
        path: &str,
        content: &str,
        create_parents: bool,
    ) -> Result<usize, ToolError> {
        let file = self.resolve(path)?;
        if let Ok(meta) = tokio::fs::metadata(&file).await {
            if meta.is_dir() {
                return Err(ToolError::IsADirectory {
                    path: path.to_string(),
                });
            }
        }

        if let Some(parent) = file.parent() {
            match tokio::fs::metadata(parent).await {
                Ok(meta) if !meta.is_dir() => {
                    return Err(ToolError::NotADirectory {
                        path: self.rel(parent),
                    })
                }
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    if !create_parents {
                        return Err(ToolError::ParentMissing {
                            path: path.to_string(),
                        });
                    }
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|err| ToolError::io(path, err))?;
                }
                Err(err) => return Err(ToolError::io(path, err)),
            }
        }

        tokio::fs::write(&file, content)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        Ok(content.len())
    }

    /// Moves a file or directory. A destination that is an existing
    /// directory receives the source *inside* it; an existing destination
    /// file is overwritten (plain rename semantics).
    pub async fn move_item(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<String, ToolError> {
        let src = self.resolve(source)?;
        if src == self.sandbox.root() {
            return Err(ToolError::RootProtected);
        }
        tokio::fs::symlink_metadata(&src)
            .await
            .map_err(|err| ToolError::io(source, err))?;

        let mut dst = self.resolve(destination)?;
        if let Ok(meta) = tokio::fs::metadata(&dst).await {
            if meta.is_dir() {
                let name = src.file_name().ok_or_else(|| ToolError::Io {
                    path: source.to_string(),
                    source: std::io::Error::other("source has no final component"),
                })?;
                dst = dst.join(name);
            }
        }
        if dst == self.sandbox.root() {
            return Err(ToolError::RootProtected);
        }

        tokio::fs::rename(&src, &dst).await.map_err(|err| {
            ToolError::io(format!("{source} -> {destination}"), err)
        })?;
        Ok(self.rel(&dst))
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), ToolError> {
        let file = self.resolve(path)?;
        let meta = tokio::fs::symlink_metadata(&file)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        if meta.is_dir() {
            return Err(ToolError::IsADirectory {
                path: path.to_string(),
            });
        }
        tokio::fs::remove_file(&file)
            .await
            .map_err(|err| ToolError::io(path, err))
    }

    /// Idempotent; returns false when the directory already existed.
    pub async fn create_directory(&self, path: &str) -> Result<bool, ToolError> {
        let dir = self.resolve(path)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => return Ok(false),
            Ok(_) => {
                return Err(ToolError::AlreadyExists {
                    path: path.to_string(),
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(ToolError::io(path, err)),
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        Ok(true)
    }

    pub async fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), ToolError> {
        let dir = self.resolve(path)?;
        // The allowed root itself is untouchable, recursive or not.
        if dir == self.sandbox.root() {
            return Err(ToolError::RootProtected);
        }
        let meta = tokio::fs::symlink_metadata(&dir)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        if !meta.is_dir() {
            return Err(ToolError::NotADirectory {
                path: path.to_string(),
            });
        }

        if recursive {
            return tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|err| ToolError::io(path, err));
        }

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        if reader
            .next_entry()
            .await
            .map_err(|err| ToolError::io(path, err))?
            .is_some()
        {
            return Err(ToolError::DirectoryNotEmpty {
                path: path.to_string(),
            });
        }
        tokio::fs::remove_dir(&dir)
            .await
            .map_err(|err| ToolError::io(path, err))
    }

    pub async fn item_metadata(&self, path: &str) -> Result<ItemMetadata, ToolError> {
        let item = self.resolve(path)?;
        let lmeta = tokio::fs::symlink_metadata(&item)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        let is_symlink = lmeta.file_type().is_symlink();
        let symlink_target = if is_symlink {
            tokio::fs::read_link(&item)
                .await
                .ok()
                .map(|target| target.display().to_string())
        } else {
            None
        };

        // Follow the link for kind/size/times; the sandbox already proved
        // the target stays inside the root.
        let meta = tokio::fs::metadata(&item)
            .await
            .map_err(|err| ToolError::io(path, err))?;
        let kind = if meta.is_dir() {
            ItemKind::Directory
        } else {
            ItemKind::File
        };

        let modified_at = meta
            .modified()
            .map(to_rfc3339)
            .map_err(|err| ToolError::io(path, err))?;
        let created_at = meta.created().ok().map(to_rfc3339);

        Ok(ItemMetadata {
            name: item
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| ".".to_string()),
            relative_path: self.rel(&item),
            absolute_path: item.display().to_string(),
            kind,
            size_bytes: meta.len(),
            modified_at,
            created_at,
            is_symlink,
            symlink_target,
        })
    }
}

fn to_rfc3339(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
