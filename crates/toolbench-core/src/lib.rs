//! Core domain types and port contracts for toolbench MCP server management.
//!
//! This crate contains no I/O. It defines:
//!
//! - `domain` - MCP server records, scopes, install targets, resource identity
//! - `events` - the management event union and the broadcast channel wrapper
//! - `ports` - trait abstractions the management services are wired against

pub mod domain;
pub mod events;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    InstallOptions, InstallTarget, LocalMcpServer, McpScope, McpServerConfig, McpServerDescriptor,
    McpServerType, ResourceMap, ResourceUri, TaggedMcpServer, UninstallOptions,
};
pub use events::{InstallResult, McpEventChannel, McpManagementEvent};
pub use ports::{
    InMemoryConfigStore, McpConfigStore, McpManagementError, McpManagementService,
    NoRemoteEnvironment, ProfileService, RemoteEnvironmentService, StaticProfileService,
    UserProfile, WorkspaceFolder, WorkspaceFoldersChange, WorkspaceService,
};
