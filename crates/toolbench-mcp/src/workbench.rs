//! Workbench facade over all MCP scopes.
//!
//! Unifies the user, remote-user, and workspace server populations behind
//! one API surface. Results are tagged with their originating scope;
//! install calls are routed by the caller's target, uninstalls purely by
//! the record's scope tag. Every underlying event is re-emitted on the
//! all-scopes stream and, when its resource belongs to the active profile,
//! on the current-profile stream.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use toolbench_core::{
    InstallOptions, InstallTarget, McpEventChannel, McpManagementError, McpManagementEvent,
    McpManagementService, McpScope, McpServerDescriptor, ProfileService, RemoteEnvironmentService,
    ResourceUri, TaggedMcpServer, UninstallOptions, UserProfile, WorkspaceService,
};

use crate::workspace::WorkspaceMcpManagementService;

/// The top-level MCP management service consumed by workbench UI.
pub struct WorkbenchMcpManagementService {
    user: Arc<dyn McpManagementService>,
    remote: Option<Arc<dyn McpManagementService>>,
    workspace_scope: Arc<WorkspaceMcpManagementService>,
    profiles: Arc<dyn ProfileService>,
    remote_env: Arc<dyn RemoteEnvironmentService>,
    workspace: Arc<dyn WorkspaceService>,
    all_events: McpEventChannel,
    profile_events: McpEventChannel,
}

impl WorkbenchMcpManagementService {
    /// Create the facade over the three scope services.
    ///
    /// `remote` is absent in purely local windows; remote-targeted calls
    /// then fail with an illegal-target error.
    pub fn new(
        user: Arc<dyn McpManagementService>,
        remote: Option<Arc<dyn McpManagementService>>,
        workspace_scope: Arc<WorkspaceMcpManagementService>,
        profiles: Arc<dyn ProfileService>,
        remote_env: Arc<dyn RemoteEnvironmentService>,
        workspace: Arc<dyn WorkspaceService>,
    ) -> Self {
        Self {
            user,
            remote,
            workspace_scope,
            profiles,
            remote_env,
            workspace,
            all_events: McpEventChannel::new(),
            profile_events: McpEventChannel::new(),
        }
    }

    /// Start the event forwarders.
    ///
    /// Events emitted by the underlying services before this call are not
    /// replayed.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            self.spawn_forwarder(McpScope::User, self.user.subscribe()),
            self.spawn_forwarder(McpScope::Workspace, self.workspace_scope.subscribe()),
        ];
        if let Some(remote) = &self.remote {
            handles.push(self.spawn_forwarder(McpScope::RemoteUser, remote.subscribe()));
        }
        handles
    }

    /// Subscribe to events from every scope.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<McpManagementEvent> {
        self.all_events.subscribe()
    }

    /// Subscribe to events whose resource belongs to the active profile.
    #[must_use]
    pub fn current_profile_events(&self) -> broadcast::Receiver<McpManagementEvent> {
        self.profile_events.subscribe()
    }

    /// List installed servers across all scopes, tagged with their origin.
    ///
    /// The three scope queries run concurrently; the remote scope reads as
    /// empty without a connection, but any failing query fails the whole
    /// call.
    pub async fn get_installed(&self) -> Result<Vec<TaggedMcpServer>, McpManagementError> {
        let user_fut = self.user.get_installed(None);
        let remote_fut = async {
            match (&self.remote, self.remote_env.is_connected()) {
                (Some(remote), true) => remote.get_installed(None).await,
                _ => Ok(Vec::new()),
            }
        };
        let workspace_fut = self.workspace_scope.get_installed(None);

        let (user, remote, workspace) = tokio::try_join!(user_fut, remote_fut, workspace_fut)?;

        Ok(user
            .into_iter()
            .map(|s| TaggedMcpServer::new(McpScope::User, s))
            .chain(
                remote
                    .into_iter()
                    .map(|s| TaggedMcpServer::new(McpScope::RemoteUser, s)),
            )
            .chain(
                workspace
                    .into_iter()
                    .map(|s| TaggedMcpServer::new(McpScope::Workspace, s)),
            )
            .collect())
    }

    /// Install a server, routed by `options.target`.
    pub async fn install(
        &self,
        descriptor: &McpServerDescriptor,
        options: InstallOptions,
    ) -> Result<TaggedMcpServer, McpManagementError> {
        match options.target.clone() {
            Some(InstallTarget::Workspace) => {
                let resource = self.workspace.workspace_config_resource().ok_or_else(|| {
                    McpManagementError::IllegalTarget(
                        "no multi-root workspace configuration to install into".to_string(),
                    )
                })?;
                let server = self
                    .workspace_scope
                    .install(descriptor, InstallOptions::for_resource(resource))
                    .await?;
                Ok(TaggedMcpServer::new(McpScope::Workspace, server))
            }
            Some(InstallTarget::WorkspaceFolder(folder_uri)) => {
                let folder = self
                    .workspace
                    .folders()
                    .into_iter()
                    .find(|f| {
                        f.uri.identity_eq(&folder_uri) || f.mcp_resource.identity_eq(&folder_uri)
                    })
                    .ok_or_else(|| {
                        McpManagementError::IllegalTarget(format!(
                            "no workspace folder for {folder_uri}"
                        ))
                    })?;
                let server = self
                    .workspace_scope
                    .install(descriptor, InstallOptions::for_resource(folder.mcp_resource))
                    .await?;
                Ok(TaggedMcpServer::new(McpScope::Workspace, server))
            }
            Some(InstallTarget::RemoteUser) => {
                let remote = self.remote_service()?;
                let local_profile = self.owning_profile(options.mcp_resource.as_ref());
                let remote_profiles = self.remote_env.remote_profiles().await?;
                let counterpart =
                    local_profile
                        .find_counterpart(&remote_profiles)
                        .ok_or_else(|| {
                            McpManagementError::IllegalTarget(format!(
                                "no remote counterpart for profile {}",
                                local_profile.name
                            ))
                        })?;
                let server = remote
                    .install(
                        descriptor,
                        InstallOptions::for_resource(counterpart.mcp_resource.clone()),
                    )
                    .await?;
                Ok(TaggedMcpServer::new(McpScope::RemoteUser, server))
            }
            Some(InstallTarget::User) | None => {
                let resource = options
                    .mcp_resource
                    .unwrap_or_else(|| self.profiles.current_profile().mcp_resource);
                let server = self
                    .user
                    .install(descriptor, InstallOptions::for_resource(resource))
                    .await?;
                Ok(TaggedMcpServer::new(McpScope::User, server))
            }
        }
    }

    /// Uninstall a server, routed purely by its scope tag.
    pub async fn uninstall(&self, tagged: &TaggedMcpServer) -> Result<(), McpManagementError> {
        match tagged.scope {
            McpScope::Workspace => {
                self.workspace_scope
                    .uninstall(&tagged.server, UninstallOptions::default())
                    .await
            }
            McpScope::RemoteUser => {
                let remote = self.remote_service()?;
                remote
                    .uninstall(&tagged.server, UninstallOptions::default())
                    .await
            }
            McpScope::User => {
                self.user
                    .uninstall(&tagged.server, UninstallOptions::default())
                    .await
            }
        }
    }

    fn remote_service(&self) -> Result<Arc<dyn McpManagementService>, McpManagementError> {
        match (&self.remote, self.remote_env.is_connected()) {
            (Some(remote), true) => Ok(Arc::clone(remote)),
            _ => Err(McpManagementError::IllegalTarget(
                "no remote connection".to_string(),
            )),
        }
    }

    /// The profile owning a resource, defaulting to the active profile.
    fn owning_profile(&self, resource: Option<&ResourceUri>) -> UserProfile {
        resource
            .and_then(|r| {
                self.profiles
                    .profiles()
                    .into_iter()
                    .find(|p| p.mcp_resource.identity_eq(r))
            })
            .unwrap_or_else(|| self.profiles.current_profile())
    }

    fn spawn_forwarder(
        &self,
        scope: McpScope,
        mut rx: broadcast::Receiver<McpManagementEvent>,
    ) -> JoinHandle<()> {
        let all = self.all_events.clone();
        let filtered = self.profile_events.clone();
        let profiles = Arc::clone(&self.profiles);
        let remote_env = Arc::clone(&self.remote_env);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        all.emit(event.clone());
                        if matches_current_profile(scope, &event, &*profiles, &*remote_env).await {
                            filtered.emit(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(%scope, missed, "Lagged behind MCP management events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Whether an event's resource belongs to the presently active profile.
///
/// Workspace servers are profile-independent and always match. Remote
/// events match against the active profile's remote counterpart resource;
/// when no counterpart resolves, only the default profile matches.
async fn matches_current_profile(
    scope: McpScope,
    event: &McpManagementEvent,
    profiles: &dyn ProfileService,
    remote_env: &dyn RemoteEnvironmentService,
) -> bool {
    match scope {
        McpScope::Workspace => true,
        McpScope::User => {
            let profile = profiles.current_profile();
            event.touches_resource(|r| r.identity_eq(&profile.mcp_resource))
        }
        McpScope::RemoteUser => {
            let profile = profiles.current_profile();
            match remote_env.remote_profiles().await {
                Ok(remote_profiles) => match profile.find_counterpart(&remote_profiles) {
                    Some(counterpart) => {
                        event.touches_resource(|r| r.identity_eq(&counterpart.mcp_resource))
                    }
                    None => profile.is_default,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve remote profiles for event filter");
                    profile.is_default
                }
            }
        }
    }
}
