//! The per-scope management service contract.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{
    InstallOptions, LocalMcpServer, McpServerDescriptor, ResourceUri, UninstallOptions,
};
use crate::events::McpManagementEvent;

use super::McpManagementError;

/// Install/uninstall/list against one scope's persisted server population.
///
/// Implementations own a set of configuration resources and the records
/// installed under them. The workspace aggregator and the workbench facade
/// both implement this trait themselves, so callers can treat any scope as
/// an opaque capability.
#[async_trait]
pub trait McpManagementService: Send + Sync {
    /// List installed servers.
    ///
    /// `mcp_resource` narrows the result to one configuration resource;
    /// `None` means the implementation's default resource (or, for
    /// aggregators, every tracked resource).
    async fn get_installed(
        &self,
        mcp_resource: Option<&ResourceUri>,
    ) -> Result<Vec<LocalMcpServer>, McpManagementError>;

    /// Install a server from its gallery descriptor.
    async fn install(
        &self,
        descriptor: &McpServerDescriptor,
        options: InstallOptions,
    ) -> Result<LocalMcpServer, McpManagementError>;

    /// Uninstall an installed record.
    async fn uninstall(
        &self,
        server: &LocalMcpServer,
        options: UninstallOptions,
    ) -> Result<(), McpManagementError>;

    /// Subscribe to this service's lifecycle events
    /// (will/did install, will/did uninstall).
    fn subscribe(&self) -> broadcast::Receiver<McpManagementEvent>;
}
