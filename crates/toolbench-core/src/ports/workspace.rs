//! Workspace folder model.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::ResourceUri;

/// A workspace folder and the MCP configuration resource that belongs to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    /// Folder display name.
    pub name: String,

    /// The folder's URI.
    pub uri: ResourceUri,

    /// The MCP configuration resource inside this folder.
    pub mcp_resource: ResourceUri,
}

impl WorkspaceFolder {
    /// Create a folder entry.
    pub fn new(name: impl Into<String>, uri: ResourceUri, mcp_resource: ResourceUri) -> Self {
        Self {
            name: name.into(),
            uri,
            mcp_resource,
        }
    }
}

/// One batch of folder-set changes.
///
/// A single-root to multi-root transition shows up here too: the
/// workspace-level configuration resource appears in `added`/`removed`
/// dressed as a folder, so consumers track it with the same bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFoldersChange {
    /// Folders that joined the workspace.
    pub added: Vec<WorkspaceFolder>,
    /// Folders that left the workspace.
    pub removed: Vec<WorkspaceFolder>,
}

impl WorkspaceFoldersChange {
    /// A change that only adds folders.
    #[must_use]
    pub fn added(folders: Vec<WorkspaceFolder>) -> Self {
        Self {
            added: folders,
            removed: Vec::new(),
        }
    }

    /// A change that only removes folders.
    #[must_use]
    pub fn removed(folders: Vec<WorkspaceFolder>) -> Self {
        Self {
            added: Vec::new(),
            removed: folders,
        }
    }

    /// Whether the batch carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The workspace's folder set and its change notifications.
pub trait WorkspaceService: Send + Sync {
    /// Folders currently in the workspace.
    fn folders(&self) -> Vec<WorkspaceFolder>;

    /// The workspace-level configuration resource, present only in
    /// multi-root state.
    fn workspace_config_resource(&self) -> Option<ResourceUri>;

    /// Subscribe to folder-set changes.
    fn subscribe(&self) -> broadcast::Receiver<WorkspaceFoldersChange>;
}
