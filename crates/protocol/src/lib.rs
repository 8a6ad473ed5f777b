//! Wire types shared by toolhost tool servers.
//!
//! Every tool invocation produces a [`ToolResponse`]: a tagged envelope
//! carrying either a success payload or a typed error with a stable code.
//! Failures cross the protocol boundary as values; a tool server never
//! surfaces an invocation failure as a transport fault.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome tag of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Machine-readable error payload.
///
/// `code` is stable across releases so agents can branch on it; `message`
/// is human-readable and may change wording.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Envelope returned by every tool endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolResponse<T> {
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: ToolStatus::Ok,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(err: &ToolError) -> Self {
        Self {
            status: ToolStatus::Error,
            data: None,
            error: Some(ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Per-invocation failure taxonomy.
///
/// The variants distinguish "not found" from "wrong type" from "not empty"
/// so a calling agent can decide a corrective next step instead of
/// pattern-matching message text.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path escapes the allowed root: {path}")]
    SandboxViolation { path: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("{path} is a directory; use delete_directory or list_directory")]
    IsADirectory { path: String },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },

    #[error("directory not empty: {path}; pass recursive=true to delete its contents")]
    DirectoryNotEmpty { path: String },

    #[error("parent directory of {path} does not exist; pass create_parents=true to create it")]
    ParentMissing { path: String },

    #[error("{path} is not valid UTF-8 text")]
    NotText { path: String },

    #[error("{path} already exists and is not a directory")]
    AlreadyExists { path: String },

    #[error("refusing to touch the allowed root itself")]
    RootProtected,

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::SandboxViolation { .. } => "sandbox_violation",
            ToolError::NotFound { .. } => "not_found",
            ToolError::IsADirectory { .. } => "is_a_directory",
            ToolError::NotADirectory { .. } => "not_a_directory",
            ToolError::DirectoryNotEmpty { .. } => "directory_not_empty",
            ToolError::ParentMissing { .. } => "parent_missing",
            ToolError::NotText { .. } => "not_text",
            ToolError::AlreadyExists { .. } => "already_exists",
            ToolError::RootProtected => "root_protected",
            ToolError::Io { .. } => "io",
        }
    }

    /// Wrap an I/O error, folding the common "file is gone" case into the
    /// typed `not_found` variant.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound { path }
        } else {
            ToolError::Io { path, source }
        }
    }
}

/// Kind of a filesystem item as reported to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Directory,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: ItemKind,
}

/// Point-in-time snapshot of a filesystem item. Recomputed on every query,
/// never cached.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ItemMetadata {
    pub name: String,
    pub relative_path: String,
    pub absolute_path: String,
    pub kind: ItemKind,
    pub size_bytes: u64,
    /// Last modification time, RFC 3339 UTC.
    pub modified_at: String,
    /// Creation time, RFC 3339 UTC. Absent on filesystems that do not
    /// report a birth time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub is_symlink: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}
