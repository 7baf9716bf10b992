//! MCP server domain types.
//!
//! A *descriptor* is the gallery form of a server (what can be installed);
//! a [`LocalMcpServer`] is a materialized installation owned by exactly one
//! configuration resource. Scope tags are attached only at the workbench
//! facade via [`TaggedMcpServer`] so the underlying per-scope services never
//! need to know about each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::resource::ResourceUri;

/// Type of MCP server connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpServerType {
    /// Stdio-based server - the host spawns and manages the process
    #[default]
    Stdio,
    /// SSE-based server - external process, reached via HTTP
    Sse,
}

/// Connection configuration for an MCP server.
///
/// For stdio servers `command` is required; for SSE servers `url` is.
/// The payload is otherwise opaque to the management layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to execute (e.g. "npx"). Required for stdio servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments to pass to the executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Working directory for the process (must be absolute if specified).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Environment variables for the process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    /// URL for SSE connection. Required for SSE servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl McpServerConfig {
    /// Create a stdio server configuration.
    #[must_use]
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some(command.into()),
            args: Some(args),
            working_dir: None,
            env: None,
            url: None,
        }
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Create an SSE server configuration.
    #[must_use]
    pub fn sse(url: impl Into<String>) -> Self {
        Self {
            command: None,
            args: None,
            working_dir: None,
            env: None,
            url: Some(url.into()),
        }
    }

    /// Validate configuration based on server type.
    pub fn validate(&self, server_type: McpServerType) -> Result<(), String> {
        match server_type {
            McpServerType::Stdio => {
                let command = self
                    .command
                    .as_ref()
                    .ok_or_else(|| "Stdio server requires command".to_string())?;

                if command.is_empty() {
                    return Err("Stdio server command cannot be empty".to_string());
                }

                if let Some(ref cwd) = self.working_dir {
                    if !cwd.is_empty() && !std::path::Path::new(cwd).is_absolute() {
                        return Err(format!("Stdio server working_dir must be absolute: {cwd}"));
                    }
                }

                Ok(())
            }
            McpServerType::Sse => {
                let url = self
                    .url
                    .as_ref()
                    .ok_or_else(|| "SSE server requires url".to_string())?;

                if url.is_empty() {
                    return Err("SSE server url cannot be empty".to_string());
                }

                Ok(())
            }
        }
    }
}

/// Gallery form of a server: identifies what can be installed.
///
/// Not locally materialized; installing one produces a [`LocalMcpServer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerDescriptor {
    /// Server name, unique within the resource it gets installed into.
    pub name: String,

    /// Connection type (stdio or SSE).
    pub server_type: McpServerType,

    /// Connection configuration.
    pub config: McpServerConfig,
}

impl McpServerDescriptor {
    /// Create a stdio-based descriptor.
    #[must_use]
    pub fn new_stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            server_type: McpServerType::Stdio,
            config: McpServerConfig::stdio(command, args),
        }
    }

    /// Create an SSE-based descriptor.
    #[must_use]
    pub fn new_sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_type: McpServerType::Sse,
            config: McpServerConfig::sse(url),
        }
    }
}

/// A materialized, installed MCP server record.
///
/// Owned by whichever per-scope service installed it; `mcp_resource`
/// identifies the persisted configuration location it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMcpServer {
    /// Server name, unique within its owning resource.
    pub name: String,

    /// The persisted configuration resource this installation belongs to.
    pub mcp_resource: ResourceUri,

    /// Connection type (stdio or SSE).
    pub server_type: McpServerType,

    /// Connection configuration.
    pub config: McpServerConfig,

    /// When the server was installed.
    pub installed_at: DateTime<Utc>,
}

impl LocalMcpServer {
    /// Materialize a descriptor into the given resource.
    #[must_use]
    pub fn from_descriptor(descriptor: &McpServerDescriptor, mcp_resource: ResourceUri) -> Self {
        Self {
            name: descriptor.name.clone(),
            mcp_resource,
            server_type: descriptor.server_type,
            config: descriptor.config.clone(),
            installed_at: Utc::now(),
        }
    }

    /// Whether two records denote the same installation, by
    /// `(mcp_resource identity, name)`.
    #[must_use]
    pub fn same_installation(&self, other: &Self) -> bool {
        self.name == other.name && self.mcp_resource.identity_eq(&other.mcp_resource)
    }
}

/// Scope a server population lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpScope {
    /// The local user profile.
    User,
    /// The remote user profile (requires a remote connection).
    RemoteUser,
    /// The workspace (a folder's or the multi-root configuration resource).
    Workspace,
}

impl std::fmt::Display for McpScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::RemoteUser => f.write_str("remote_user"),
            Self::Workspace => f.write_str("workspace"),
        }
    }
}

/// A [`LocalMcpServer`] tagged with the scope it came from.
///
/// The tag is attached only at the workbench facade so callers can
/// disambiguate where a server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedMcpServer {
    /// Originating scope.
    pub scope: McpScope,
    /// The installation record, unmodified.
    pub server: LocalMcpServer,
}

impl TaggedMcpServer {
    /// Tag a server with its originating scope.
    #[must_use]
    pub const fn new(scope: McpScope, server: LocalMcpServer) -> Self {
        Self { scope, server }
    }
}

/// Caller-specified installation target, routed by the workbench facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallTarget {
    /// The local user profile.
    User,
    /// The remote user profile.
    RemoteUser,
    /// The multi-root workspace configuration.
    Workspace,
    /// A specific workspace folder, addressed by its folder URI.
    WorkspaceFolder(ResourceUri),
}

/// Options for an install operation.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Explicit configuration resource to install into.
    pub mcp_resource: Option<ResourceUri>,
    /// Scope routing hint, interpreted by the workbench facade.
    pub target: Option<InstallTarget>,
}

impl InstallOptions {
    /// Target a specific configuration resource.
    #[must_use]
    pub fn for_resource(mcp_resource: ResourceUri) -> Self {
        Self {
            mcp_resource: Some(mcp_resource),
            target: None,
        }
    }

    /// Target a scope, leaving resource resolution to the facade.
    #[must_use]
    pub fn for_target(target: InstallTarget) -> Self {
        Self {
            mcp_resource: None,
            target: Some(target),
        }
    }
}

/// Options for an uninstall operation.
#[derive(Debug, Clone, Default)]
pub struct UninstallOptions {
    /// Explicit configuration resource to uninstall from. Defaults to the
    /// record's own `mcp_resource`.
    pub mcp_resource: Option<ResourceUri>,
}
