//! Management event union and broadcast plumbing.
//!
//! Events are ephemeral payloads that exist only for the duration of
//! dispatch; nothing here is persisted. The wire format carries a `type`
//! tag for frontend compatibility:
//!
//! ```json
//! { "type": "did_uninstall", "name": "search", "mcpResource": "file:///..." }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::{LocalMcpServer, ResourceUri};

/// Broadcast channel capacity for management events
const CHANNEL_CAPACITY: usize = 64;

/// Outcome of one install inside a batched `DidInstall` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    /// Name of the server the install was attempted for.
    pub name: String,

    /// Resource the install targeted.
    #[serde(rename = "mcpResource")]
    pub mcp_resource: ResourceUri,

    /// The installed record, absent when the install failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalMcpServer>,
}

impl InstallResult {
    /// Result for a successful install.
    #[must_use]
    pub fn installed(server: LocalMcpServer) -> Self {
        Self {
            name: server.name.clone(),
            mcp_resource: server.mcp_resource.clone(),
            local: Some(server),
        }
    }

    /// Result for a failed install.
    pub fn failed(name: impl Into<String>, mcp_resource: ResourceUri) -> Self {
        Self {
            name: name.into(),
            mcp_resource,
            local: None,
        }
    }
}

/// Lifecycle events emitted by every management service.
///
/// `WillInstall`/`WillUninstall` fire before the persisted state changes,
/// the `Did*` variants after. `DidInstall` is batched: folder registration
/// surfaces all pre-existing servers of a resource in one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpManagementEvent {
    /// An install is about to run.
    WillInstall {
        /// Server name being installed.
        name: String,
        /// Resource the install targets.
        #[serde(rename = "mcpResource")]
        mcp_resource: ResourceUri,
    },

    /// One or more installs finished.
    DidInstall {
        /// Per-server outcomes.
        results: Vec<InstallResult>,
    },

    /// An uninstall is about to run.
    WillUninstall {
        /// Server name being uninstalled.
        name: String,
        /// Resource the uninstall targets.
        #[serde(rename = "mcpResource")]
        mcp_resource: ResourceUri,
    },

    /// An uninstall finished and the record is gone.
    DidUninstall {
        /// Name of the removed server.
        name: String,
        /// Resource the server was removed from.
        #[serde(rename = "mcpResource")]
        mcp_resource: ResourceUri,
    },
}

impl McpManagementEvent {
    /// `WillInstall` for a named server.
    pub fn will_install(name: impl Into<String>, mcp_resource: ResourceUri) -> Self {
        Self::WillInstall {
            name: name.into(),
            mcp_resource,
        }
    }

    /// `DidInstall` carrying a single successful result.
    #[must_use]
    pub fn did_install(server: LocalMcpServer) -> Self {
        Self::DidInstall {
            results: vec![InstallResult::installed(server)],
        }
    }

    /// `DidInstall` carrying a batch of successful results.
    #[must_use]
    pub fn did_install_batch(servers: Vec<LocalMcpServer>) -> Self {
        Self::DidInstall {
            results: servers.into_iter().map(InstallResult::installed).collect(),
        }
    }

    /// `WillUninstall` for an installed record.
    #[must_use]
    pub fn will_uninstall(server: &LocalMcpServer) -> Self {
        Self::WillUninstall {
            name: server.name.clone(),
            mcp_resource: server.mcp_resource.clone(),
        }
    }

    /// `DidUninstall` for an installed record.
    #[must_use]
    pub fn did_uninstall(server: &LocalMcpServer) -> Self {
        Self::DidUninstall {
            name: server.name.clone(),
            mcp_resource: server.mcp_resource.clone(),
        }
    }

    /// Whether any resource carried by this event satisfies the predicate.
    ///
    /// Batched `DidInstall` events match when any of their results do.
    pub fn touches_resource(&self, mut pred: impl FnMut(&ResourceUri) -> bool) -> bool {
        match self {
            Self::WillInstall { mcp_resource, .. }
            | Self::WillUninstall { mcp_resource, .. }
            | Self::DidUninstall { mcp_resource, .. } => pred(mcp_resource),
            Self::DidInstall { results } => results.iter().any(|r| pred(&r.mcp_resource)),
        }
    }
}

/// Broadcaster for management events.
///
/// Thin wrapper over a `tokio::sync::broadcast` channel so channel types
/// stay out of service signatures.
#[derive(Debug, Clone)]
pub struct McpEventChannel {
    sender: broadcast::Sender<McpManagementEvent>,
}

impl McpEventChannel {
    /// Create a new channel with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: McpManagementEvent) {
        // Only log when someone is listening (avoid spam in headless paths)
        if self.sender.receiver_count() > 0 {
            tracing::debug!(?event, "Broadcasting MCP management event");
            let _ = self.sender.send(event);
        }
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<McpManagementEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for McpEventChannel {
    fn default() -> Self {
        Self::new()
    }
}
