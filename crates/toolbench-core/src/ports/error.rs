//! Error types for MCP management operations.

use thiserror::Error;

use crate::domain::ResourceUri;

/// Domain-specific errors for management operations.
///
/// Configuration errors (`IllegalTarget`, `NoServiceForResource`) are
/// returned before any state is mutated and are never retried.
#[derive(Debug, Error)]
pub enum McpManagementError {
    /// The requested install/uninstall target cannot be served.
    #[error("Illegal MCP install target: {0}")]
    IllegalTarget(String),

    /// No management service is registered for the resource.
    #[error("No MCP management service found for resource: {0}")]
    NoServiceForResource(ResourceUri),

    /// The named server is not installed in the resource.
    #[error("MCP server not installed: {name} in {mcp_resource}")]
    NotInstalled {
        /// Server name.
        name: String,
        /// Resource the lookup ran against.
        mcp_resource: ResourceUri,
    },

    /// A server with this name already exists in the resource.
    #[error("MCP server already installed: {name} in {mcp_resource}")]
    AlreadyInstalled {
        /// Server name.
        name: String,
        /// Resource the install targeted.
        mcp_resource: ResourceUri,
    },

    /// Server configuration failed validation.
    #[error("Invalid MCP server configuration: {0}")]
    InvalidConfig(String),

    /// Persisted config store failure (I/O, parse).
    #[error("MCP config store error: {0}")]
    Store(String),

    /// Remote environment failure (no connection, channel error).
    #[error("MCP remote environment error: {0}")]
    Remote(String),
}

impl McpManagementError {
    /// Whether this is a configuration error: surfaced to the caller
    /// immediately, never logged-and-swallowed.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::IllegalTarget(_) | Self::NoServiceForResource(_) | Self::InvalidConfig(_)
        )
    }
}
