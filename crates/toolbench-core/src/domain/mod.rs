//! Domain types for MCP server management.
//!
//! Pure data types with no I/O dependencies.

pub mod mcp;
pub mod resource;

pub use mcp::{
    InstallOptions, InstallTarget, LocalMcpServer, McpScope, McpServerConfig, McpServerDescriptor,
    McpServerType, TaggedMcpServer, UninstallOptions,
};
pub use resource::{ResourceMap, ResourceUri};
