//! Sandboxed filesystem tool server.
//!
//! Exposes a closed set of named filesystem operations to LLM agents over
//! loopback HTTP. Every path argument passes through the sandbox before
//! touching storage; side effects are confined to the subtree under the
//! allowed root. That confinement is the server's entire security
//! contract.

pub mod config;
pub mod http;
pub mod service;

pub use config::FilesystemConfig;
pub use service::FilesystemService;
