//! Multi-scope MCP server management.
//!
//! Four layers, composed bottom-up:
//!
//! - [`store`] - JSON-file persistence for per-resource server sets
//! - [`scoped`] - the per-scope management service, implemented once and
//!   parameterized by its default configuration resource
//! - [`workspace`] - aggregates one per-resource service per workspace
//!   folder into a single service-shaped surface
//! - [`workbench`] - the facade unifying user, remote-user, and workspace
//!   scopes with scope tagging and profile-aware event filtering

pub mod scoped;
pub mod store;
pub mod workbench;
pub mod workspace;

pub use scoped::ResourceMcpManagementService;
pub use store::JsonMcpConfigStore;
pub use workbench::WorkbenchMcpManagementService;
pub use workspace::WorkspaceMcpManagementService;
