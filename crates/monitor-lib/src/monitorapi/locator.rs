//! Locators identify the subject of an observation
//!
//! A locator is an ordered, space separated list of `key/value` tokens such as
//! `ns/foo pod/bar uid/123 container/baz`. Locators are only built through the
//! constructors here, so two locators for the same entity are textually equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Locator keys used across the crate
pub mod keys {
    pub const NAMESPACE: &str = "ns";
    pub const POD: &str = "pod";
    pub const UID: &str = "uid";
    pub const NODE: &str = "node";
    pub const CONTAINER: &str = "container";
    pub const BACKEND_DISRUPTION_NAME: &str = "backend-disruption-name";
    pub const CONNECTION: &str = "connection";
    pub const SOURCE: &str = "src";
}

/// Structured textual identifier for the subject of an observation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    /// Wrap a raw locator string as produced by an external watcher
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Locator for a pod including the node it was scheduled to
    pub fn pod(namespace: &str, name: &str, node: &str, uid: &str) -> Self {
        LocatorBuilder::new()
            .with(keys::NAMESPACE, namespace)
            .with(keys::POD, name)
            .with(keys::NODE, node)
            .with(keys::UID, uid)
            .build()
    }

    /// Locator for a container of a pod
    pub fn container(namespace: &str, name: &str, node: &str, uid: &str, container: &str) -> Self {
        LocatorBuilder::new()
            .with(keys::NAMESPACE, namespace)
            .with(keys::POD, name)
            .with(keys::NODE, node)
            .with(keys::UID, uid)
            .with(keys::CONTAINER, container)
            .build()
    }

    /// Locator for one backend probed over one connection type
    pub fn disruption(backend: &str, connection: &str) -> Self {
        LocatorBuilder::new()
            .with(keys::BACKEND_DISRUPTION_NAME, backend)
            .with(keys::CONNECTION, connection)
            .build()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the locator back into its key/value pairs.
    ///
    /// Tokens that are not exactly `key/value` are skipped.
    pub fn keys(&self) -> BTreeMap<&str, &str> {
        let mut parts = BTreeMap::new();
        for token in self.0.split(' ') {
            let mut pieces = token.split('/');
            if let (Some(key), Some(value), None) = (pieces.next(), pieces.next(), pieces.next()) {
                parts.insert(key, value);
            }
        }
        parts
    }

    /// Value for a single key, if present and non-empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys().get(key).copied().filter(|v| !v.is_empty())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.get(keys::NAMESPACE)
    }

    /// Locator that only identifies the pod by namespace and name, for events
    /// that do not carry a UID.
    pub fn non_unique_pod(&self) -> Locator {
        LocatorBuilder::new()
            .with(keys::NAMESPACE, self.namespace().unwrap_or_default())
            .with(keys::POD, self.get(keys::POD).unwrap_or_default())
            .build()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Builds locators in a fixed key order
#[derive(Debug, Default)]
pub struct LocatorBuilder {
    tokens: Vec<String>,
}

impl LocatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.tokens.push(format!("{}/{}", key, value));
        self
    }

    pub fn build(self) -> Locator {
        Locator(self.tokens.join(" "))
    }
}

/// A pod identified by namespace, name and UID
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PodReference {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl PodReference {
    /// Derive a pod reference from a locator.
    ///
    /// Returns the empty reference when any of namespace, name or uid is missing.
    pub fn from_locator(locator: &Locator) -> Self {
        let parts = locator.keys();
        let field = |key: &str| parts.get(key).copied().unwrap_or_default().to_string();
        let (namespace, name, uid) = (field(keys::NAMESPACE), field(keys::POD), field(keys::UID));
        if namespace.is_empty() || name.is_empty() || uid.is_empty() {
            return Self::default();
        }
        Self { namespace, name, uid }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Key used by the recorded resource snapshot
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Static locator without node, used to group pod events
    pub fn to_locator(&self) -> Locator {
        LocatorBuilder::new()
            .with(keys::NAMESPACE, &self.namespace)
            .with(keys::POD, &self.name)
            .with(keys::UID, &self.uid)
            .build()
    }
}

/// A container identified by its pod and container name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContainerReference {
    pub pod: PodReference,
    pub container_name: String,
}

impl ContainerReference {
    pub fn from_locator(locator: &Locator) -> Self {
        let pod = PodReference::from_locator(locator);
        let container_name = locator.get(keys::CONTAINER).unwrap_or_default().to_string();
        if container_name.is_empty() || pod.is_empty() {
            return Self::default();
        }
        Self { pod, container_name }
    }

    pub fn is_empty(&self) -> bool {
        self.container_name.is_empty()
    }

    pub fn to_locator(&self) -> Locator {
        LocatorBuilder::new()
            .with(keys::NAMESPACE, &self.pod.namespace)
            .with(keys::POD, &self.pod.name)
            .with(keys::UID, &self.pod.uid)
            .with(keys::CONTAINER, &self.container_name)
            .build()
    }
}
