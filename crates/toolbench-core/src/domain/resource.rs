//! Resource identity for persisted MCP configuration locations.
//!
//! Every installed server belongs to exactly one configuration resource
//! (a user profile's config file, its remote counterpart, or a workspace
//! folder's config file). Resources are compared by *value identity*, not
//! by the exact string a caller happened to pass in: scheme and authority
//! are case-insensitive and a trailing slash on the path is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// URI identifying a persisted MCP configuration location.
///
/// The raw string is preserved for display and round-tripping; identity
/// comparisons go through [`ResourceUri::identity_key`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUri(String);

impl ResourceUri {
    /// Create a resource URI from its string form.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The raw URI string as originally supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used for identity comparison and map keys.
    ///
    /// Lowercases the scheme and authority and strips a trailing slash
    /// from the path. The path itself stays case-sensitive.
    #[must_use]
    pub fn identity_key(&self) -> String {
        let raw = self.0.trim_end_matches('/');

        if let Some(rest) = raw.split_once("://").map(|(scheme, rest)| {
            let mut key = scheme.to_ascii_lowercase();
            key.push_str("://");
            match rest.split_once('/') {
                Some((authority, path)) => {
                    key.push_str(&authority.to_ascii_lowercase());
                    key.push('/');
                    key.push_str(path);
                }
                None => key.push_str(&rest.to_ascii_lowercase()),
            }
            key
        }) {
            return rest;
        }

        // Opaque URIs (e.g. "untitled:...") only normalize the scheme.
        match raw.split_once(':') {
            Some((scheme, rest)) => format!("{}:{rest}", scheme.to_ascii_lowercase()),
            None => raw.to_string(),
        }
    }

    /// Whether two URIs address the same resource.
    #[must_use]
    pub fn identity_eq(&self, other: &Self) -> bool {
        self.identity_key() == other.identity_key()
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceUri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Map keyed by resource identity rather than raw string equality.
///
/// Inserting under `file://HOST/a/` and looking up `file://host/a` hit the
/// same entry. The original URI of each entry is kept for iteration.
#[derive(Debug, Default)]
pub struct ResourceMap<V> {
    inner: HashMap<String, (ResourceUri, V)>,
}

impl<V> ResourceMap<V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Insert a value, replacing any entry with the same resource identity.
    pub fn insert(&mut self, resource: ResourceUri, value: V) -> Option<V> {
        self.inner
            .insert(resource.identity_key(), (resource, value))
            .map(|(_, v)| v)
    }

    /// Look up by resource identity.
    #[must_use]
    pub fn get(&self, resource: &ResourceUri) -> Option<&V> {
        self.inner.get(&resource.identity_key()).map(|(_, v)| v)
    }

    /// Whether an entry with this resource identity exists.
    #[must_use]
    pub fn contains(&self, resource: &ResourceUri) -> bool {
        self.inner.contains_key(&resource.identity_key())
    }

    /// Remove and return the entry with this resource identity.
    pub fn remove(&mut self, resource: &ResourceUri) -> Option<V> {
        self.inner
            .remove(&resource.identity_key())
            .map(|(_, v)| v)
    }

    /// Iterate over `(resource, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceUri, &V)> {
        self.inner.values().map(|(r, v)| (r, v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_scheme_and_authority_case() {
        let a = ResourceUri::new("FILE://Host/Users/me/mcp.json");
        let b = ResourceUri::new("file://host/Users/me/mcp.json");
        assert!(a.identity_eq(&b));
    }

    #[test]
    fn test_identity_preserves_path_case() {
        let a = ResourceUri::new("file://host/Users/me/mcp.json");
        let b = ResourceUri::new("file://host/users/me/mcp.json");
        assert!(!a.identity_eq(&b));
    }

    #[test]
    fn test_identity_ignores_trailing_slash() {
        let a = ResourceUri::new("file://host/workspace/");
        let b = ResourceUri::new("file://host/workspace");
        assert!(a.identity_eq(&b));
    }

    #[test]
    fn test_opaque_uri_normalizes_scheme_only() {
        let a = ResourceUri::new("Untitled:Workspace-1");
        let b = ResourceUri::new("untitled:Workspace-1");
        assert!(a.identity_eq(&b));

        let c = ResourceUri::new("untitled:workspace-1");
        assert!(!b.identity_eq(&c));
    }

    #[test]
    fn test_resource_map_identity_lookup() {
        let mut map = ResourceMap::new();
        map.insert(ResourceUri::new("file://HOST/a/"), 1);

        assert!(map.contains(&ResourceUri::new("file://host/a")));
        assert_eq!(map.get(&ResourceUri::new("file://host/a")), Some(&1));

        // Replacement by identity, not raw equality
        map.insert(ResourceUri::new("file://host/a"), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove(&ResourceUri::new("FILE://host/a/")), Some(2));
        assert!(map.is_empty());
    }
}
