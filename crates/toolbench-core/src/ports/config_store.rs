//! Persisted config store contract.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{LocalMcpServer, ResourceUri};

use super::McpManagementError;

/// Read/write access to the server set persisted at one resource.
///
/// The on-disk (or remote) format is owned by the implementation; the
/// management layer only sees `Vec<LocalMcpServer>` snapshots. Loading a
/// resource that was never written must yield an empty list, not an error.
#[async_trait]
pub trait McpConfigStore: Send + Sync {
    /// Load the server set persisted at `mcp_resource`.
    async fn load(
        &self,
        mcp_resource: &ResourceUri,
    ) -> Result<Vec<LocalMcpServer>, McpManagementError>;

    /// Replace the server set persisted at `mcp_resource`.
    async fn save(
        &self,
        mcp_resource: &ResourceUri,
        servers: &[LocalMcpServer],
    ) -> Result<(), McpManagementError>;
}

/// In-memory store for tests and contexts without persistence.
///
/// Keyed by resource identity, so `file://HOST/a` and `file://host/a`
/// address the same set.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    sets: Mutex<HashMap<String, Vec<LocalMcpServer>>>,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource's server set directly, bypassing the service layer.
    pub fn seed(&self, mcp_resource: &ResourceUri, servers: Vec<LocalMcpServer>) {
        self.sets
            .lock()
            .expect("config store lock poisoned")
            .insert(mcp_resource.identity_key(), servers);
    }
}

#[async_trait]
impl McpConfigStore for InMemoryConfigStore {
    async fn load(
        &self,
        mcp_resource: &ResourceUri,
    ) -> Result<Vec<LocalMcpServer>, McpManagementError> {
        let sets = self.sets.lock().expect("config store lock poisoned");
        Ok(sets.get(&mcp_resource.identity_key()).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        mcp_resource: &ResourceUri,
        servers: &[LocalMcpServer],
    ) -> Result<(), McpManagementError> {
        let mut sets = self.sets.lock().expect("config store lock poisoned");
        sets.insert(mcp_resource.identity_key(), servers.to_vec());
        Ok(())
    }
}
