//! Identifiers and hierarchy levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An opaque identifier assigned by the remote catalog.
///
/// Remote identifiers are unique only within their parent scope. Phase
/// identifiers in particular may be placeholder values shared by many
/// phases, so a `RemoteId` on its own never identifies an entity — the
/// pair `(RemoteId, parent)` does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a remote identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is a placeholder (empty or all-zero
    /// GUID), as emitted by the remote source for unnamed phases.
    pub fn is_placeholder(&self) -> bool {
        self.0.is_empty()
            || self
                .0
                .chars()
                .all(|c| c == '0' || c == '-' || c == '{' || c == '}')
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RemoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a fresh random run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The four levels of the mirrored hierarchy, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    /// Top-level directory tree.
    Directory,
    /// Projects owned by a directory.
    Project,
    /// Phases owned by a project.
    Phase,
    /// Elevations owned by a phase.
    Elevation,
}

impl HierarchyLevel {
    /// Returns the level name as used in logs and audit entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Directory => "directory",
            HierarchyLevel::Project => "project",
            HierarchyLevel::Phase => "phase",
            HierarchyLevel::Elevation => "elevation",
        }
    }

    /// Returns the child level, if any.
    pub fn child(&self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Directory => Some(HierarchyLevel::Project),
            HierarchyLevel::Project => Some(HierarchyLevel::Phase),
            HierarchyLevel::Phase => Some(HierarchyLevel::Elevation),
            HierarchyLevel::Elevation => None,
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection() {
        assert!(RemoteId::new("").is_placeholder());
        assert!(RemoteId::new("00000000-0000-0000-0000-000000000000").is_placeholder());
        assert!(!RemoteId::new("4f2a").is_placeholder());
    }

    #[test]
    fn level_chain() {
        assert_eq!(
            HierarchyLevel::Directory.child(),
            Some(HierarchyLevel::Project)
        );
        assert_eq!(HierarchyLevel::Elevation.child(), None);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
