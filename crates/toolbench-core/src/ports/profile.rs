//! User profile lookup.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::domain::ResourceUri;

/// A user profile, local or remote, with its MCP configuration resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable profile identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// The profile's MCP configuration resource.
    pub mcp_resource: ResourceUri,

    /// Whether this is the default profile.
    pub is_default: bool,
}

impl UserProfile {
    /// Create a profile.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mcp_resource: ResourceUri,
        is_default: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mcp_resource,
            is_default,
        }
    }

    /// Find this profile's counterpart in another environment's profile
    /// list: first by `id`, then by `name` when no id matches.
    #[must_use]
    pub fn find_counterpart<'a>(&self, others: &'a [Self]) -> Option<&'a Self> {
        others
            .iter()
            .find(|p| p.id == self.id)
            .or_else(|| others.iter().find(|p| p.name == self.name))
    }
}

/// Access to the active and known user profiles.
pub trait ProfileService: Send + Sync {
    /// The presently active profile.
    fn current_profile(&self) -> UserProfile;

    /// All known profiles.
    fn profiles(&self) -> Vec<UserProfile>;
}

/// Fixed-profile implementation for tests and single-profile contexts.
#[derive(Debug)]
pub struct StaticProfileService {
    current: Mutex<UserProfile>,
    all: Vec<UserProfile>,
}

impl StaticProfileService {
    /// Create a service with a single profile that is always current.
    #[must_use]
    pub fn single(profile: UserProfile) -> Self {
        Self {
            current: Mutex::new(profile.clone()),
            all: vec![profile],
        }
    }

    /// Create a service over a fixed profile list.
    #[must_use]
    pub fn new(current: UserProfile, all: Vec<UserProfile>) -> Self {
        Self {
            current: Mutex::new(current),
            all,
        }
    }

    /// Switch the active profile (tests exercising profile changes).
    pub fn set_current(&self, profile: UserProfile) {
        *self.current.lock().expect("profile lock poisoned") = profile;
    }
}

impl ProfileService for StaticProfileService {
    fn current_profile(&self) -> UserProfile {
        self.current.lock().expect("profile lock poisoned").clone()
    }

    fn profiles(&self) -> Vec<UserProfile> {
        self.all.clone()
    }
}
