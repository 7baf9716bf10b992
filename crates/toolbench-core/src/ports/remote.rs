//! Remote environment access.

use async_trait::async_trait;

use super::{McpManagementError, UserProfile};

/// Connection state and profile lookup for the remote environment.
///
/// Remote-scope operations are only legal while a connection exists;
/// callers check `is_connected` before touching the remote service.
#[async_trait]
pub trait RemoteEnvironmentService: Send + Sync {
    /// Whether a remote connection currently exists.
    fn is_connected(&self) -> bool;

    /// Profiles known on the remote side.
    ///
    /// Fails when invoked without a connection.
    async fn remote_profiles(&self) -> Result<Vec<UserProfile>, McpManagementError>;
}

/// Remote environment of a purely local window: never connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemoteEnvironment;

impl NoRemoteEnvironment {
    /// Create the disconnected environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteEnvironmentService for NoRemoteEnvironment {
    fn is_connected(&self) -> bool {
        false
    }

    async fn remote_profiles(&self) -> Result<Vec<UserProfile>, McpManagementError> {
        Err(McpManagementError::Remote(
            "no remote connection".to_string(),
        ))
    }
}
