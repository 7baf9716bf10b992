//! Workspace-scope aggregation.
//!
//! Presents a single management-service surface backed by N per-resource
//! services, one per workspace folder plus (in multi-root state) one for
//! the workspace-level configuration resource. The merged installed list
//! is kept in memory and reflects the last successfully synchronized state
//! of every registered resource.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

use toolbench_core::{
    InstallOptions, InstallResult, LocalMcpServer, McpConfigStore, McpEventChannel,
    McpManagementError, McpManagementEvent, McpManagementService, McpServerDescriptor,
    ResourceMap, ResourceUri, UninstallOptions, WorkspaceFolder, WorkspaceFoldersChange,
    WorkspaceService,
};

use crate::scoped::ResourceMcpManagementService;

/// Builds the per-resource service for a newly tracked resource.
pub type ServiceFactory =
    Arc<dyn Fn(&ResourceUri) -> Arc<dyn McpManagementService> + Send + Sync>;

/// Registry state guarded by one mutex.
///
/// The mutex is held across the store fetches of folder registration and
/// deregistration, so add/remove of any resource are strictly serialized
/// in arrival order and no resource is ever mid-registration and
/// mid-removal at once.
struct State {
    registry: ResourceMap<Arc<dyn McpManagementService>>,
    all_servers: Vec<LocalMcpServer>,
}

/// Management service aggregating all workspace folders.
pub struct WorkspaceMcpManagementService {
    state: Mutex<State>,
    events: McpEventChannel,
    factory: ServiceFactory,
}

impl WorkspaceMcpManagementService {
    /// Create an aggregator whose per-resource services persist through
    /// the given store.
    pub fn new(store: Arc<dyn McpConfigStore>) -> Self {
        let factory: ServiceFactory = Arc::new(move |resource: &ResourceUri| {
            Arc::new(ResourceMcpManagementService::new(
                Arc::clone(&store),
                resource.clone(),
            )) as Arc<dyn McpManagementService>
        });
        Self::with_factory(factory)
    }

    /// Create an aggregator with a custom per-resource service factory.
    pub fn with_factory(factory: ServiceFactory) -> Self {
        Self {
            state: Mutex::new(State {
                registry: ResourceMap::new(),
                all_servers: Vec::new(),
            }),
            events: McpEventChannel::new(),
            factory,
        }
    }

    /// Resources currently tracked.
    pub async fn tracked_resources(&self) -> Vec<ResourceUri> {
        let state = self.state.lock().await;
        state.registry.iter().map(|(r, _)| r.clone()).collect()
    }

    /// Apply one batch of folder-set changes.
    ///
    /// Removals settle first, then additions; a fetch failure for one
    /// resource is logged and degrades to an empty set without aborting
    /// the rest of the batch.
    pub async fn handle_folders_change(&self, change: &WorkspaceFoldersChange) {
        if change.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;

        for folder in &change.removed {
            self.deregister_resource(&mut state, &folder.mcp_resource)
                .await;
        }
        for folder in &change.added {
            self.register_resource(&mut state, &folder.mcp_resource)
                .await;
        }
    }

    /// Sync to the workspace's current folder set, then follow its change
    /// events until the workspace service goes away.
    pub fn watch(self: &Arc<Self>, workspace: Arc<dyn WorkspaceService>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = workspace.subscribe();

            let mut initial = WorkspaceFoldersChange::added(workspace.folders());
            if let Some(resource) = workspace.workspace_config_resource() {
                initial.added.push(WorkspaceFolder::new(
                    "workspace",
                    resource.clone(),
                    resource,
                ));
            }
            this.handle_folders_change(&initial).await;

            loop {
                match rx.recv().await {
                    Ok(change) => this.handle_folders_change(&change).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Lagged behind workspace folder changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Register a per-resource service and surface its pre-existing
    /// servers as one batched install event, so late-joining listeners see
    /// them without a separate initial-sync event type.
    async fn register_resource(&self, state: &mut State, resource: &ResourceUri) {
        if state.registry.contains(resource) {
            tracing::debug!(resource = %resource, "Resource already registered");
            return;
        }

        let service = (self.factory)(resource);
        let fetched = match service.get_installed(Some(resource)).await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!(
                    resource = %resource,
                    error = %e,
                    "Failed to fetch installed MCP servers for new workspace resource"
                );
                Vec::new()
            }
        };

        state.registry.insert(resource.clone(), service);

        let merged: Vec<LocalMcpServer> = fetched
            .into_iter()
            .filter(|s| !state.all_servers.iter().any(|known| known.same_installation(s)))
            .collect();

        if merged.is_empty() {
            return;
        }

        state.all_servers.extend(merged.iter().cloned());
        self.events
            .emit(McpManagementEvent::did_install_batch(merged.clone()));

        tracing::info!(
            resource = %resource,
            count = merged.len(),
            "Registered workspace MCP resource"
        );
    }

    /// Drop a per-resource service, draining its servers from the merged
    /// list with one synthetic uninstall event per drained record.
    async fn deregister_resource(&self, state: &mut State, resource: &ResourceUri) {
        let Some(service) = state.registry.remove(resource) else {
            tracing::debug!(resource = %resource, "Resource not registered, nothing to remove");
            return;
        };

        // One last fetch catches servers persisted since the previous sync.
        let fetched = match service.get_installed(Some(resource)).await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!(
                    resource = %resource,
                    error = %e,
                    "Failed to fetch installed MCP servers for removed workspace resource"
                );
                Vec::new()
            }
        };

        let mut drained = Vec::new();
        state.all_servers.retain(|s| {
            if s.mcp_resource.identity_eq(resource) {
                drained.push(s.clone());
                false
            } else {
                true
            }
        });
        for server in fetched {
            if !drained.iter().any(|d| d.name == server.name) {
                drained.push(server);
            }
        }

        for server in &drained {
            self.events.emit(McpManagementEvent::did_uninstall(server));
        }

        tracing::info!(
            resource = %resource,
            count = drained.len(),
            "Deregistered workspace MCP resource"
        );
    }
}

#[async_trait]
impl McpManagementService for WorkspaceMcpManagementService {
    async fn get_installed(
        &self,
        mcp_resource: Option<&ResourceUri>,
    ) -> Result<Vec<LocalMcpServer>, McpManagementError> {
        let state = self.state.lock().await;
        let servers = match mcp_resource {
            Some(resource) => state
                .all_servers
                .iter()
                .filter(|s| s.mcp_resource.identity_eq(resource))
                .cloned()
                .collect(),
            None => state.all_servers.clone(),
        };
        Ok(servers)
    }

    async fn install(
        &self,
        descriptor: &McpServerDescriptor,
        options: InstallOptions,
    ) -> Result<LocalMcpServer, McpManagementError> {
        let Some(resource) = options.mcp_resource else {
            return Err(McpManagementError::IllegalTarget(
                "workspace install requires a target configuration resource".to_string(),
            ));
        };

        let service = {
            let state = self.state.lock().await;
            state
                .registry
                .get(&resource)
                .cloned()
                .ok_or_else(|| McpManagementError::NoServiceForResource(resource.clone()))?
        };

        self.events
            .emit(McpManagementEvent::will_install(&descriptor.name, resource.clone()));

        match service
            .install(descriptor, InstallOptions::for_resource(resource.clone()))
            .await
        {
            Ok(server) => {
                let mut state = self.state.lock().await;
                // The resource may have been deregistered while we were
                // waiting on the delegate; its drain already emitted the
                // matching uninstall, so don't resurrect the record.
                if state.registry.contains(&resource) {
                    if !state
                        .all_servers
                        .iter()
                        .any(|known| known.same_installation(&server))
                    {
                        state.all_servers.push(server.clone());
                    }
                    self.events
                        .emit(McpManagementEvent::did_install(server.clone()));
                } else {
                    tracing::warn!(
                        resource = %resource,
                        server_name = %server.name,
                        "Workspace resource removed during install"
                    );
                }
                Ok(server)
            }
            Err(e) => {
                self.events.emit(McpManagementEvent::DidInstall {
                    results: vec![InstallResult::failed(&descriptor.name, resource)],
                });
                Err(e)
            }
        }
    }

    async fn uninstall(
        &self,
        server: &LocalMcpServer,
        options: UninstallOptions,
    ) -> Result<(), McpManagementError> {
        let resource = options
            .mcp_resource
            .unwrap_or_else(|| server.mcp_resource.clone());

        let service = {
            let state = self.state.lock().await;
            state
                .registry
                .get(&resource)
                .cloned()
                .ok_or_else(|| McpManagementError::NoServiceForResource(resource.clone()))?
        };

        self.events.emit(McpManagementEvent::will_uninstall(server));

        service
            .uninstall(
                server,
                UninstallOptions {
                    mcp_resource: Some(resource),
                },
            )
            .await?;

        let mut state = self.state.lock().await;
        state.all_servers.retain(|s| !s.same_installation(server));
        self.events.emit(McpManagementEvent::did_uninstall(server));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<McpManagementEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbench_core::InMemoryConfigStore;

    fn folder(name: &str, resource: &str) -> WorkspaceFolder {
        WorkspaceFolder::new(
            name,
            ResourceUri::new(format!("file:///{name}")),
            ResourceUri::new(resource),
        )
    }

    fn seeded_store(entries: &[(&str, &[&str])]) -> Arc<InMemoryConfigStore> {
        let store = Arc::new(InMemoryConfigStore::new());
        for (resource, names) in entries {
            let resource = ResourceUri::new(*resource);
            let servers = names
                .iter()
                .map(|name| {
                    LocalMcpServer::from_descriptor(
                        &McpServerDescriptor::new_stdio(*name, "npx", vec![]),
                        resource.clone(),
                    )
                })
                .collect();
            store.seed(&resource, servers);
        }
        store
    }

    #[tokio::test]
    async fn test_folder_add_merges_and_emits_batch() {
        let store = seeded_store(&[("file:///f/mcp.json", &["a"])]);
        let service = WorkspaceMcpManagementService::new(store);
        let mut rx = service.subscribe();

        service
            .handle_folders_change(&WorkspaceFoldersChange::added(vec![folder(
                "f",
                "file:///f/mcp.json",
            )]))
            .await;

        let servers = service.get_installed(None).await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "a");
        assert_eq!(servers[0].mcp_resource, ResourceUri::new("file:///f/mcp.json"));

        let event = rx.recv().await.unwrap();
        match event {
            McpManagementEvent::DidInstall { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].name, "a");
                assert!(results[0].local.is_some());
            }
            other => panic!("expected DidInstall, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_folder_remove_emits_one_uninstall_per_server() {
        let store = seeded_store(&[("file:///f/mcp.json", &["a", "b"])]);
        let service = WorkspaceMcpManagementService::new(store);

        let f = folder("f", "file:///f/mcp.json");
        service
            .handle_folders_change(&WorkspaceFoldersChange::added(vec![f.clone()]))
            .await;

        let mut rx = service.subscribe();
        service
            .handle_folders_change(&WorkspaceFoldersChange::removed(vec![f]))
            .await;

        let mut removed_names = Vec::new();
        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                McpManagementEvent::DidUninstall { name, .. } => removed_names.push(name),
                other => panic!("expected DidUninstall, got {other:?}"),
            }
        }
        removed_names.sort();
        assert_eq!(removed_names, vec!["a", "b"]);

        assert!(service.get_installed(None).await.unwrap().is_empty());
        assert!(service.tracked_resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_merged_list_is_union_without_duplicates() {
        let store = seeded_store(&[
            ("file:///one/mcp.json", &["a", "b"]),
            ("file:///two/mcp.json", &["a"]),
        ]);
        let service = WorkspaceMcpManagementService::new(store);

        service
            .handle_folders_change(&WorkspaceFoldersChange::added(vec![
                folder("one", "file:///one/mcp.json"),
                folder("two", "file:///two/mcp.json"),
            ]))
            .await;

        // Same resource re-added: no duplicate entries may appear.
        service
            .handle_folders_change(&WorkspaceFoldersChange::added(vec![folder(
                "one",
                "file:///one/mcp.json",
            )]))
            .await;

        let servers = service.get_installed(None).await.unwrap();
        assert_eq!(servers.len(), 3);

        let mut keys: Vec<(String, String)> = servers
            .iter()
            .map(|s| (s.mcp_resource.identity_key(), s.name.clone()))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_add_and_remove_settle_consistently() {
        let store = seeded_store(&[("file:///f/mcp.json", &["a"])]);
        let service = Arc::new(WorkspaceMcpManagementService::new(store));
        let mut rx = service.subscribe();

        let f = folder("f", "file:///f/mcp.json");
        let add = {
            let service = Arc::clone(&service);
            let change = WorkspaceFoldersChange::added(vec![f.clone()]);
            tokio::spawn(async move { service.handle_folders_change(&change).await })
        };
        let remove = {
            let service = Arc::clone(&service);
            let change = WorkspaceFoldersChange::removed(vec![f]);
            tokio::spawn(async move { service.handle_folders_change(&change).await })
        };
        add.await.unwrap();
        remove.await.unwrap();

        // Whichever batch settled second decides the final state; either
        // way the merged list agrees with the registry.
        let tracked = service.tracked_resources().await;
        let servers = service.get_installed(None).await.unwrap();
        if tracked.is_empty() {
            assert!(servers.is_empty());
        } else {
            assert_eq!(servers.len(), 1);
            assert_eq!(servers[0].name, "a");
        }

        // Events balance with the surviving list: no duplicate installs,
        // no orphaned uninstalls.
        let mut installs = 0usize;
        let mut uninstalls = 0usize;
        while let Ok(event) = rx.try_recv() {
            match event {
                McpManagementEvent::DidInstall { results } => installs += results.len(),
                McpManagementEvent::DidUninstall { .. } => uninstalls += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(installs, uninstalls + servers.len());
    }

    #[tokio::test]
    async fn test_install_requires_registered_resource() {
        let service = WorkspaceMcpManagementService::new(Arc::new(InMemoryConfigStore::new()));
        let desc = McpServerDescriptor::new_stdio("a", "npx", vec![]);

        let missing_resource = service.install(&desc, InstallOptions::default()).await;
        assert!(matches!(
            missing_resource,
            Err(McpManagementError::IllegalTarget(_))
        ));

        let unregistered = service
            .install(
                &desc,
                InstallOptions::for_resource(ResourceUri::new("file:///nowhere/mcp.json")),
            )
            .await;
        assert!(matches!(
            unregistered,
            Err(McpManagementError::NoServiceForResource(_))
        ));

        assert!(service.get_installed(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_then_uninstall_round_trip() {
        let store = seeded_store(&[]);
        let service = WorkspaceMcpManagementService::new(store);
        let resource = ResourceUri::new("file:///f/mcp.json");

        service
            .handle_folders_change(&WorkspaceFoldersChange::added(vec![folder(
                "f",
                "file:///f/mcp.json",
            )]))
            .await;

        let desc = McpServerDescriptor::new_stdio("a", "npx", vec![]);
        let installed = service
            .install(&desc, InstallOptions::for_resource(resource.clone()))
            .await
            .unwrap();
        assert_eq!(service.get_installed(None).await.unwrap().len(), 1);

        service
            .uninstall(&installed, UninstallOptions::default())
            .await
            .unwrap();
        assert!(service.get_installed(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_empty() {
        struct FailingService {
            events: McpEventChannel,
        }

        #[async_trait]
        impl McpManagementService for FailingService {
            async fn get_installed(
                &self,
                _mcp_resource: Option<&ResourceUri>,
            ) -> Result<Vec<LocalMcpServer>, McpManagementError> {
                Err(McpManagementError::Store("backend offline".to_string()))
            }

            async fn install(
                &self,
                _descriptor: &McpServerDescriptor,
                _options: InstallOptions,
            ) -> Result<LocalMcpServer, McpManagementError> {
                Err(McpManagementError::Store("backend offline".to_string()))
            }

            async fn uninstall(
                &self,
                _server: &LocalMcpServer,
                _options: UninstallOptions,
            ) -> Result<(), McpManagementError> {
                Err(McpManagementError::Store("backend offline".to_string()))
            }

            fn subscribe(&self) -> broadcast::Receiver<McpManagementEvent> {
                self.events.subscribe()
            }
        }

        let factory: ServiceFactory = Arc::new(|_resource: &ResourceUri| {
            Arc::new(FailingService {
                events: McpEventChannel::new(),
            }) as Arc<dyn McpManagementService>
        });
        let service = WorkspaceMcpManagementService::with_factory(factory);

        let f = folder("f", "file:///f/mcp.json");
        service
            .handle_folders_change(&WorkspaceFoldersChange::added(vec![f.clone()]))
            .await;

        // Registered despite the failed fetch; list stays empty.
        assert_eq!(service.tracked_resources().await.len(), 1);
        assert!(service.get_installed(None).await.unwrap().is_empty());

        // Removal with a failing final fetch still completes.
        service
            .handle_folders_change(&WorkspaceFoldersChange::removed(vec![f]))
            .await;
        assert!(service.tracked_resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_watch_performs_initial_sync() {
        use std::sync::Mutex as StdMutex;

        struct FixedWorkspace {
            folders: Vec<WorkspaceFolder>,
            config_resource: Option<ResourceUri>,
            sender: StdMutex<broadcast::Sender<WorkspaceFoldersChange>>,
        }

        impl WorkspaceService for FixedWorkspace {
            fn folders(&self) -> Vec<WorkspaceFolder> {
                self.folders.clone()
            }

            fn workspace_config_resource(&self) -> Option<ResourceUri> {
                self.config_resource.clone()
            }

            fn subscribe(&self) -> broadcast::Receiver<WorkspaceFoldersChange> {
                self.sender.lock().unwrap().subscribe()
            }
        }

        let store = seeded_store(&[
            ("file:///f/mcp.json", &["a"]),
            ("file:///ws/mcp.json", &["w"]),
        ]);
        let service = Arc::new(WorkspaceMcpManagementService::new(store));

        let (sender, _) = broadcast::channel(4);
        let workspace = Arc::new(FixedWorkspace {
            folders: vec![folder("f", "file:///f/mcp.json")],
            config_resource: Some(ResourceUri::new("file:///ws/mcp.json")),
            sender: StdMutex::new(sender),
        });

        let handle = service.watch(workspace);

        // Initial sync runs on the spawned task; poll until it lands.
        let mut servers = Vec::new();
        for _ in 0..50 {
            servers = service.get_installed(None).await.unwrap();
            if servers.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(servers.len(), 2);

        handle.abort();
    }
}
