//! Per-scope management service.
//!
//! One instance serves one scope's persisted population: the local user
//! profile, the remote user profile, or a single workspace folder. The
//! scope variants differ only in their default configuration resource and
//! the store behind them, so the service is implemented once and
//! parameterized.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

use toolbench_core::{
    InstallOptions, LocalMcpServer, McpConfigStore, McpEventChannel, McpManagementError,
    McpManagementEvent, McpManagementService, McpServerDescriptor, ResourceUri, UninstallOptions,
};

/// Management service over one default configuration resource.
///
/// Callers may address a different resource explicitly via options; the
/// default applies whenever they don't.
pub struct ResourceMcpManagementService {
    store: Arc<dyn McpConfigStore>,
    default_resource: ResourceUri,
    // Serializes the load-mutate-save window of install/uninstall so
    // concurrent mutations of the same service never interleave.
    write_lock: Mutex<()>,
    events: McpEventChannel,
}

impl ResourceMcpManagementService {
    /// Create a service with the given store and default resource.
    pub fn new(store: Arc<dyn McpConfigStore>, default_resource: ResourceUri) -> Self {
        Self {
            store,
            default_resource,
            write_lock: Mutex::new(()),
            events: McpEventChannel::new(),
        }
    }

    /// The resource used when callers don't specify one.
    #[must_use]
    pub const fn default_resource(&self) -> &ResourceUri {
        &self.default_resource
    }

    fn resolve<'a>(&'a self, explicit: Option<&'a ResourceUri>) -> &'a ResourceUri {
        explicit.unwrap_or(&self.default_resource)
    }
}

#[async_trait]
impl McpManagementService for ResourceMcpManagementService {
    async fn get_installed(
        &self,
        mcp_resource: Option<&ResourceUri>,
    ) -> Result<Vec<LocalMcpServer>, McpManagementError> {
        self.store.load(self.resolve(mcp_resource)).await
    }

    async fn install(
        &self,
        descriptor: &McpServerDescriptor,
        options: InstallOptions,
    ) -> Result<LocalMcpServer, McpManagementError> {
        descriptor
            .config
            .validate(descriptor.server_type)
            .map_err(McpManagementError::InvalidConfig)?;

        let resource = self.resolve(options.mcp_resource.as_ref()).clone();

        let _guard = self.write_lock.lock().await;
        let mut servers = self.store.load(&resource).await?;

        if servers.iter().any(|s| s.name == descriptor.name) {
            return Err(McpManagementError::AlreadyInstalled {
                name: descriptor.name.clone(),
                mcp_resource: resource,
            });
        }

        self.events
            .emit(McpManagementEvent::will_install(&descriptor.name, resource.clone()));

        let server = LocalMcpServer::from_descriptor(descriptor, resource.clone());
        servers.push(server.clone());
        self.store.save(&resource, &servers).await?;

        self.events.emit(McpManagementEvent::did_install(server.clone()));

        tracing::info!(
            server_name = %server.name,
            resource = %resource,
            "Installed MCP server"
        );
        Ok(server)
    }

    async fn uninstall(
        &self,
        server: &LocalMcpServer,
        options: UninstallOptions,
    ) -> Result<(), McpManagementError> {
        let resource = options
            .mcp_resource
            .as_ref()
            .unwrap_or(&server.mcp_resource)
            .clone();

        let _guard = self.write_lock.lock().await;
        let mut servers = self.store.load(&resource).await?;
        if !servers.iter().any(|s| s.name == server.name) {
            return Err(McpManagementError::NotInstalled {
                name: server.name.clone(),
                mcp_resource: resource,
            });
        }

        self.events.emit(McpManagementEvent::will_uninstall(server));

        servers.retain(|s| s.name != server.name);
        self.store.save(&resource, &servers).await?;

        self.events.emit(McpManagementEvent::did_uninstall(server));

        tracing::info!(
            server_name = %server.name,
            resource = %resource,
            "Uninstalled MCP server"
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<McpManagementEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbench_core::{InMemoryConfigStore, McpServerConfig};

    fn service() -> ResourceMcpManagementService {
        ResourceMcpManagementService::new(
            Arc::new(InMemoryConfigStore::new()),
            ResourceUri::new("file:///user/mcp.json"),
        )
    }

    #[tokio::test]
    async fn test_install_and_list() {
        let service = service();
        let desc = McpServerDescriptor::new_stdio("search", "npx", vec!["-y".to_string()]);

        let installed = service.install(&desc, InstallOptions::default()).await.unwrap();
        assert_eq!(installed.name, "search");
        assert_eq!(
            installed.mcp_resource,
            ResourceUri::new("file:///user/mcp.json")
        );

        let servers = service.get_installed(None).await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "search");
    }

    #[tokio::test]
    async fn test_install_into_explicit_resource() {
        let service = service();
        let desc = McpServerDescriptor::new_sse("ext", "http://localhost:3001/sse");
        let other = ResourceUri::new("file:///other/mcp.json");

        service
            .install(&desc, InstallOptions::for_resource(other.clone()))
            .await
            .unwrap();

        assert!(service.get_installed(None).await.unwrap().is_empty());
        let servers = service.get_installed(Some(&other)).await.unwrap();
        assert_eq!(servers.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let service = service();
        let desc = McpServerDescriptor::new_stdio("search", "npx", vec![]);

        service.install(&desc, InstallOptions::default()).await.unwrap();
        let result = service.install(&desc, InstallOptions::default()).await;
        assert!(matches!(
            result,
            Err(McpManagementError::AlreadyInstalled { name, .. }) if name == "search"
        ));

        // No partial mutation
        assert_eq!(service.get_installed(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_events() {
        let service = service();
        let mut rx = service.subscribe();
        let desc = McpServerDescriptor {
            name: "broken".to_string(),
            server_type: toolbench_core::McpServerType::Stdio,
            config: McpServerConfig::default(),
        };

        let result = service.install(&desc, InstallOptions::default()).await;
        assert!(matches!(result, Err(McpManagementError::InvalidConfig(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_uninstall_removes_record() {
        let service = service();
        let desc = McpServerDescriptor::new_stdio("search", "npx", vec![]);
        let installed = service.install(&desc, InstallOptions::default()).await.unwrap();

        service
            .uninstall(&installed, UninstallOptions::default())
            .await
            .unwrap();

        assert!(service.get_installed(None).await.unwrap().is_empty());

        let again = service.uninstall(&installed, UninstallOptions::default()).await;
        assert!(matches!(again, Err(McpManagementError::NotInstalled { .. })));
    }

    #[tokio::test]
    async fn test_install_emits_will_then_did() {
        let service = service();
        let mut rx = service.subscribe();
        let desc = McpServerDescriptor::new_stdio("search", "npx", vec![]);

        service.install(&desc, InstallOptions::default()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, McpManagementEvent::WillInstall { name, .. } if name == "search"));

        let second = rx.recv().await.unwrap();
        match second {
            McpManagementEvent::DidInstall { results } => {
                assert_eq!(results.len(), 1);
                assert!(results[0].local.is_some());
            }
            other => panic!("expected DidInstall, got {other:?}"),
        }
    }

    /// Store whose `load` suspends long enough for a second mutation to
    /// reach its own load, surfacing any unserialized read-modify-write.
    #[derive(Default)]
    struct SlowLoadStore {
        inner: InMemoryConfigStore,
    }

    #[async_trait]
    impl McpConfigStore for SlowLoadStore {
        async fn load(
            &self,
            mcp_resource: &ResourceUri,
        ) -> Result<Vec<LocalMcpServer>, McpManagementError> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.inner.load(mcp_resource).await
        }

        async fn save(
            &self,
            mcp_resource: &ResourceUri,
            servers: &[LocalMcpServer],
        ) -> Result<(), McpManagementError> {
            self.inner.save(mcp_resource, servers).await
        }
    }

    fn slow_service() -> ResourceMcpManagementService {
        ResourceMcpManagementService::new(
            Arc::new(SlowLoadStore::default()),
            ResourceUri::new("file:///user/mcp.json"),
        )
    }

    #[tokio::test]
    async fn test_concurrent_installs_both_persist() {
        let service = slow_service();

        let desc_a = McpServerDescriptor::new_stdio("a", "npx", vec![]);
        let desc_b = McpServerDescriptor::new_stdio("b", "npx", vec![]);
        let (first, second) = tokio::join!(
            service.install(&desc_a, InstallOptions::default()),
            service.install(&desc_b, InstallOptions::default()),
        );
        first.unwrap();
        second.unwrap();

        let mut names: Vec<String> = service
            .get_installed(None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrent_same_name_installs_have_one_winner() {
        let service = slow_service();
        let desc = McpServerDescriptor::new_stdio("search", "npx", vec![]);

        let (first, second) = tokio::join!(
            service.install(&desc, InstallOptions::default()),
            service.install(&desc, InstallOptions::default()),
        );

        let successes = usize::from(first.is_ok()) + usize::from(second.is_ok());
        assert_eq!(successes, 1);

        let loser = if first.is_err() { first } else { second };
        assert!(matches!(
            loser,
            Err(McpManagementError::AlreadyInstalled { name, .. }) if name == "search"
        ));
        assert_eq!(service.get_installed(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_emits_will_then_did() {
        let service = service();
        let desc = McpServerDescriptor::new_stdio("search", "npx", vec![]);
        let installed = service.install(&desc, InstallOptions::default()).await.unwrap();

        let mut rx = service.subscribe();
        service
            .uninstall(&installed, UninstallOptions::default())
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, McpManagementEvent::WillUninstall { .. }));
        let second = rx.recv().await.unwrap();
        assert!(
            matches!(second, McpManagementEvent::DidUninstall { name, .. } if name == "search")
        );
    }
}
