//! Remote record DTOs as returned by the catalog API.

use crate::ids::{HierarchyLevel, RemoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A navigation scope on the remote session.
///
/// The remote API is stateful: listing children requires first selecting
/// the parent scope, which sets the session's navigation context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The catalog root; listing here returns the directory tree.
    Root,
    /// A directory; children are projects.
    Directory(RemoteId),
    /// A project; children are phases.
    Project(RemoteId),
    /// A phase; children are elevations.
    Phase(RemoteId),
}

impl Scope {
    /// Returns the identifier to select, or `None` for the root.
    pub fn select_id(&self) -> Option<&RemoteId> {
        match self {
            Scope::Root => None,
            Scope::Directory(id) | Scope::Project(id) | Scope::Phase(id) => Some(id),
        }
    }

    /// Returns the hierarchy level of this scope's children.
    pub fn child_level(&self) -> HierarchyLevel {
        match self {
            Scope::Root => HierarchyLevel::Directory,
            Scope::Directory(_) => HierarchyLevel::Project,
            Scope::Project(_) => HierarchyLevel::Phase,
            Scope::Phase(_) => HierarchyLevel::Elevation,
        }
    }
}

/// A directory record as reported by the remote catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDirectory {
    /// Remote identifier.
    pub id: RemoteId,
    /// Display name.
    pub name: String,
    /// Full hierarchical path.
    pub path: String,
    /// Parent directory identifier, `None` for roots.
    #[serde(default)]
    pub parent_id: Option<RemoteId>,
    /// Remote change marker.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
}

/// A project record as reported by the remote catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProject {
    /// Remote identifier, unique within the selected directory.
    pub id: RemoteId,
    /// Display name.
    pub name: String,
    /// Remote status string.
    #[serde(default)]
    pub status: String,
    /// Remote change marker.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
}

/// A phase record as reported by the remote catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePhase {
    /// Remote identifier; may be a placeholder shared by many phases.
    pub id: RemoteId,
    /// Display name.
    pub name: String,
    /// Remote status string.
    #[serde(default)]
    pub status: String,
    /// Remote change marker.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
}

/// An elevation record as reported by the remote catalog, including the
/// raw parts payload when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteElevation {
    /// Remote identifier, unique within the selected phase.
    pub id: RemoteId,
    /// Display name.
    pub name: String,
    /// Width in millimetres.
    #[serde(default)]
    pub width_mm: Option<f64>,
    /// Height in millimetres.
    #[serde(default)]
    pub height_mm: Option<f64>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Remote change marker.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
    /// Raw parts/glass payload, parsed by the engine after reconcile.
    #[serde(default)]
    pub parts: Option<serde_json::Value>,
}

/// One page of records from a `list` call, typed by level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteRecordSet {
    /// Directory records.
    Directories(Vec<RemoteDirectory>),
    /// Project records.
    Projects(Vec<RemoteProject>),
    /// Phase records.
    Phases(Vec<RemotePhase>),
    /// Elevation records.
    Elevations(Vec<RemoteElevation>),
}

impl RemoteRecordSet {
    /// Returns the level the records belong to.
    pub fn level(&self) -> HierarchyLevel {
        match self {
            RemoteRecordSet::Directories(_) => HierarchyLevel::Directory,
            RemoteRecordSet::Projects(_) => HierarchyLevel::Project,
            RemoteRecordSet::Phases(_) => HierarchyLevel::Phase,
            RemoteRecordSet::Elevations(_) => HierarchyLevel::Elevation,
        }
    }

    /// Returns the number of records in the set.
    pub fn len(&self) -> usize {
        match self {
            RemoteRecordSet::Directories(r) => r.len(),
            RemoteRecordSet::Projects(r) => r.len(),
            RemoteRecordSet::Phases(r) => r.len(),
            RemoteRecordSet::Elevations(r) => r.len(),
        }
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_child_levels() {
        assert_eq!(Scope::Root.child_level(), HierarchyLevel::Directory);
        assert_eq!(
            Scope::Project(RemoteId::new("p1")).child_level(),
            HierarchyLevel::Phase
        );
        assert_eq!(Scope::Root.select_id(), None);
    }

    #[test]
    fn record_set_level_and_len() {
        let set = RemoteRecordSet::Projects(vec![RemoteProject {
            id: RemoteId::new("p1"),
            name: "North wing".into(),
            status: "open".into(),
            changed_at: None,
        }]);
        assert_eq!(set.level(), HierarchyLevel::Project);
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn remote_directory_deserializes_with_defaults() {
        let dir: RemoteDirectory =
            serde_json::from_str(r#"{"id":"d1","name":"Plant","path":"/Plant"}"#).unwrap();
        assert_eq!(dir.parent_id, None);
        assert_eq!(dir.changed_at, None);
    }
}
