//! JSON-file backed config store.
//!
//! Persists one JSON document per configuration resource under a root
//! directory. The document shape is stable and shared with frontends:
//!
//! ```json
//! { "servers": [ { "name": "search", "mcpResource": "...", ... } ] }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use toolbench_core::{LocalMcpServer, McpConfigStore, McpManagementError, ResourceUri};

/// Persisted document for one resource's server set.
#[derive(Debug, Default, Serialize, Deserialize)]
struct McpConfigDocument {
    #[serde(default)]
    servers: Vec<LocalMcpServer>,
}

/// Config store writing one pretty-printed JSON file per resource.
///
/// Files are named by the resource's identity key (sanitized), so two URIs
/// with the same identity share a file. A missing file loads as an empty
/// server set.
#[derive(Debug)]
pub struct JsonMcpConfigStore {
    root: PathBuf,
}

impl JsonMcpConfigStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, mcp_resource: &ResourceUri) -> PathBuf {
        let key = mcp_resource.identity_key();
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            })
            .collect();
        self.root.join(format!("{sanitized}.json"))
    }

    async fn read_document(path: &Path) -> Result<McpConfigDocument, McpManagementError> {
        match fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(McpConfigDocument::default()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| McpManagementError::Store(format!("parse {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(McpConfigDocument::default()),
            Err(e) => Err(McpManagementError::Store(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl McpConfigStore for JsonMcpConfigStore {
    async fn load(
        &self,
        mcp_resource: &ResourceUri,
    ) -> Result<Vec<LocalMcpServer>, McpManagementError> {
        let path = self.file_path(mcp_resource);
        let document = Self::read_document(&path).await?;
        Ok(document.servers)
    }

    async fn save(
        &self,
        mcp_resource: &ResourceUri,
        servers: &[LocalMcpServer],
    ) -> Result<(), McpManagementError> {
        let path = self.file_path(mcp_resource);

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| McpManagementError::Store(format!("mkdir {}: {e}", self.root.display())))?;

        let document = McpConfigDocument {
            servers: servers.to_vec(),
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| McpManagementError::Store(format!("serialize {mcp_resource}: {e}")))?;

        fs::write(&path, content)
            .await
            .map_err(|e| McpManagementError::Store(format!("write {}: {e}", path.display())))?;

        tracing::debug!(resource = %mcp_resource, count = servers.len(), "Saved MCP config");
        Ok(())
    }
}
