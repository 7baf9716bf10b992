//! Port definitions (trait abstractions) for the management layer.
//!
//! Ports define what the aggregators expect from collaborators without
//! pinning an implementation: persisted config storage, profile lookup,
//! the remote environment, and the workspace folder model.
//!
//! # Design Rules
//!
//! - No filesystem or transport types in any signature
//! - Traits are minimal and CRUD-focused
//! - Events travel on broadcast receivers, never callbacks

pub mod config_store;
pub mod error;
pub mod management;
pub mod profile;
pub mod remote;
pub mod workspace;

pub use config_store::{InMemoryConfigStore, McpConfigStore};
pub use error::McpManagementError;
pub use management::McpManagementService;
pub use profile::{ProfileService, StaticProfileService, UserProfile};
pub use remote::{NoRemoteEnvironment, RemoteEnvironmentService};
pub use workspace::{WorkspaceFolder, WorkspaceFoldersChange, WorkspaceService};
