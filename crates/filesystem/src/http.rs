//! HTTP surface of the filesystem server: one named endpoint per tool
//! operation, JSON in, envelope out.
//!
//! Tool-level failures are HTTP 200 with `status: error`: an invocation
//! failure is a value for the calling agent, not a transport fault. Only
//! malformed requests surface as 4xx through the extractor.

use crate::config::FilesystemConfig;
use crate::service::FilesystemService;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use toolhost_protocol::{DirEntryInfo, ItemMetadata, ToolError, ToolResponse};

#[derive(Clone)]
struct AppState {
    service: FilesystemService,
}

// ============================================================================
// Request / result schemas
// ============================================================================

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDirectoryRequest {
    /// Directory to list, relative to the allowed root
    #[serde(default = "default_path")]
    #[schemars(description = "Directory to list, relative to the allowed root")]
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileRequest {
    #[schemars(description = "File to read, relative to the allowed root")]
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileRequest {
    #[schemars(description = "File to write, relative to the allowed root")]
    pub path: String,

    #[schemars(description = "Full text content; an existing file is overwritten")]
    pub content: String,

    /// Create missing parent directories first
    #[serde(default)]
    #[schemars(description = "Create missing parent directories first")]
    pub create_parents: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveItemRequest {
    #[schemars(description = "Existing file or directory to move")]
    pub source_path: String,

    #[schemars(
        description = "Target path; an existing directory receives the source inside it"
    )]
    pub destination_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteFileRequest {
    #[schemars(description = "File to delete (directories need delete_directory)")]
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDirectoryRequest {
    #[schemars(description = "Directory to create; succeeds if it already exists")]
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteDirectoryRequest {
    #[schemars(description = "Directory to delete")]
    pub path: String,

    /// Delete contents as well
    #[serde(default)]
    #[schemars(description = "Delete contents as well")]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MetadataRequest {
    #[schemars(description = "Item to inspect, relative to the allowed root")]
    pub path: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct WorkingDirectory {
    pub path: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct WriteFileResult {
    pub path: String,
    pub bytes_written: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MoveItemResult {
    pub source_path: String,
    /// Where the item actually landed, relative to the allowed root.
    pub destination_path: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Confirmation {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

fn envelope<T>(result: Result<T, ToolError>) -> Json<ToolResponse<T>> {
    Json(match result {
        Ok(data) => ToolResponse::ok(data),
        Err(err) => ToolResponse::error(&err),
    })
}

async fn get_working_directory(
    State(state): State<AppState>,
) -> Json<ToolResponse<WorkingDirectory>> {
    envelope(Ok(WorkingDirectory {
        path: state.service.working_directory(),
    }))
}

async fn list_directory(
    State(state): State<AppState>,
    Json(req): Json<ListDirectoryRequest>,
) -> Json<ToolResponse<Vec<DirEntryInfo>>> {
    envelope(state.service.list_directory(&req.path).await)
}

async fn read_file(
    State(state): State<AppState>,
    Json(req): Json<ReadFileRequest>,
) -> Json<ToolResponse<String>> {
    envelope(state.service.read_file(&req.path).await)
}

async fn write_file(
    State(state): State<AppState>,
    Json(req): Json<WriteFileRequest>,
) -> Json<ToolResponse<WriteFileResult>> {
    let result = state
        .service
        .write_file(&req.path, &req.content, req.create_parents)
        .await
        .map(|bytes_written| WriteFileResult {
            path: req.path,
            bytes_written,
        });
    envelope(result)
}

async fn move_item(
    State(state): State<AppState>,
    Json(req): Json<MoveItemRequest>,
) -> Json<ToolResponse<MoveItemResult>> {
    let result = state
        .service
        .move_item(&req.source_path, &req.destination_path)
        .await
        .map(|destination_path| MoveItemResult {
            source_path: req.source_path,
            destination_path,
        });
    envelope(result)
}

async fn delete_file(
    State(state): State<AppState>,
    Json(req): Json<DeleteFileRequest>,
) -> Json<ToolResponse<Confirmation>> {
    let result = state.service.delete_file(&req.path).await.map(|()| {
        Confirmation {
            message: format!("deleted file {}", req.path),
        }
    });
    envelope(result)
}

async fn create_directory(
    State(state): State<AppState>,
    Json(req): Json<CreateDirectoryRequest>,
) -> Json<ToolResponse<Confirmation>> {
    let result = state.service.create_directory(&req.path).await.map(|created| {
        Confirmation {
            message: if created {
                format!("created directory {}", req.path)
            } else {
                format!("directory {} already exists", req.path)
            },
        }
    });
    envelope(result)
}

async fn delete_directory(
    State(state): State<AppState>,
    Json(req): Json<DeleteDirectoryRequest>,
) -> Json<ToolResponse<Confirmation>> {
    let result = state
        .service
        .delete_directory(&req.path, req.recursive)
        .await
        .map(|()| Confirmation {
            message: format!("deleted directory {}", req.path),
        });
    envelope(result)
}

async fn get_item_metadata(
    State(state): State<AppState>,
    Json(req): Json<MetadataRequest>,
) -> Json<ToolResponse<ItemMetadata>> {
    envelope(state.service.item_metadata(&req.path).await)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "toolhost-filesystem",
        "version": env!("CARGO_PKG_VERSION"),
        "allowed_dir": state.service.working_directory(),
    }))
}

// ============================================================================
// Router / serving
// ============================================================================

pub fn router(service: FilesystemService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools/get_working_directory", post(get_working_directory))
        .route("/tools/list_directory", post(list_directory))
        .route("/tools/read_file", post(read_file))
        .route("/tools/write_file", post(write_file))
        .route("/tools/move_item", post(move_item))
        .route("/tools/delete_file", post(delete_file))
        .route("/tools/create_directory", post(create_directory))
        .route("/tools/delete_directory", post(delete_directory))
        .route("/tools/get_item_metadata", post(get_item_metadata))
        .with_state(AppState { service })
}

/// Bind the configured address. Fails fatally (before any request is
/// accepted) on an unresolvable host, a guarded non-loopback bind, or a
/// port that is already taken.
pub async fn bind(config: &FilesystemConfig) -> Result<TcpListener> {
    let addr = config.guarded_bind_addr().await?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::debug!("filesystem server bound to {addr}");
    Ok(listener)
}

/// Serve until `shutdown` resolves, then drain in-flight requests and
/// release the listener.
pub async fn serve(
    listener: TcpListener,
    service: FilesystemService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("filesystem server failed")
}
