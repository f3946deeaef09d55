//! Catalog fixtures and client helpers.
//!
//! A [`CatalogFixture`] scripts a whole remote hierarchy and installs it
//! into a [`MockTransport`], so engine tests describe the catalog once
//! and get a consistent transport from it.

use catmirror_client::{CatalogClient, ClientConfig, MockTransport};
use catmirror_model::{
    RemoteDirectory, RemoteElevation, RemoteId, RemotePhase, RemoteProject, RemoteRecordSet, Scope,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;

/// A deterministic fixture timestamp, `hour` hours into 2026-03-01.
pub fn fixture_time(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// A small well-formed parts payload: one frame article and one pane.
pub fn simple_parts() -> serde_json::Value {
    json!([
        { "article": "F-100", "description": "frame profile", "quantity": 4 },
        { "article": "G-200", "quantity": 1,
          "glass": { "width_mm": 1200.0, "height_mm": 900.0, "structure": "4/16/4" } }
    ])
}

/// A scripted remote catalog, installable into a [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub struct CatalogFixture {
    directories: Vec<RemoteDirectory>,
    projects: HashMap<RemoteId, Vec<RemoteProject>>,
    phases: HashMap<RemoteId, Vec<RemotePhase>>,
    elevations: HashMap<RemoteId, Vec<RemoteElevation>>,
}

impl CatalogFixture {
    /// Creates an empty fixture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory. The path is derived from the identifier.
    pub fn directory(
        mut self,
        id: &str,
        parent: Option<&str>,
        changed_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.directories.push(RemoteDirectory {
            id: RemoteId::new(id),
            name: id.to_string(),
            path: format!("/{id}"),
            parent_id: parent.map(RemoteId::new),
            changed_at,
        });
        self
    }

    /// Adds a project under a directory.
    pub fn project(mut self, directory: &str, id: &str, changed_at: Option<DateTime<Utc>>) -> Self {
        self.projects
            .entry(RemoteId::new(directory))
            .or_default()
            .push(RemoteProject {
                id: RemoteId::new(id),
                name: format!("project {id}"),
                status: "open".into(),
                changed_at,
            });
        self
    }

    /// Adds a phase under a project.
    pub fn phase(mut self, project: &str, id: &str, changed_at: Option<DateTime<Utc>>) -> Self {
        self.phases
            .entry(RemoteId::new(project))
            .or_default()
            .push(RemotePhase {
                id: RemoteId::new(id),
                name: format!("phase {id}"),
                status: "open".into(),
                changed_at,
            });
        self
    }

    /// Adds an elevation under a phase, with an optional parts payload.
    pub fn elevation(
        mut self,
        phase: &str,
        id: &str,
        changed_at: Option<DateTime<Utc>>,
        parts: Option<serde_json::Value>,
    ) -> Self {
        self.elevations
            .entry(RemoteId::new(phase))
            .or_default()
            .push(RemoteElevation {
                id: RemoteId::new(id),
                name: format!("elevation {id}"),
                width_mm: Some(2400.0),
                height_mm: Some(2100.0),
                description: None,
                changed_at,
                parts,
            });
        self
    }

    /// Installs the fixture's record sets into a transport, replacing any
    /// previously installed scopes it covers.
    pub fn install(&self, transport: &MockTransport) {
        transport.set_records(
            Scope::Root,
            RemoteRecordSet::Directories(self.directories.clone()),
        );
        for (directory, projects) in &self.projects {
            transport.set_records(
                Scope::Directory(directory.clone()),
                RemoteRecordSet::Projects(projects.clone()),
            );
        }
        for (project, phases) in &self.phases {
            transport.set_records(
                Scope::Project(project.clone()),
                RemoteRecordSet::Phases(phases.clone()),
            );
        }
        for (phase, elevations) in &self.elevations {
            transport.set_records(
                Scope::Phase(phase.clone()),
                RemoteRecordSet::Elevations(elevations.clone()),
            );
        }
    }

    /// Builds a fresh transport with the fixture installed.
    pub fn into_transport(self) -> MockTransport {
        let transport = MockTransport::new();
        self.install(&transport);
        transport
    }
}

/// A three-level catalog used across engine tests: two root directories,
/// one project, one phase, and two elevations (one with parts).
pub fn standard_catalog() -> CatalogFixture {
    CatalogFixture::new()
        .directory("d1", None, Some(fixture_time(0)))
        .directory("d2", None, Some(fixture_time(0)))
        .project("d1", "p1", Some(fixture_time(0)))
        .phase("p1", "ph1", Some(fixture_time(0)))
        .elevation("ph1", "e1", Some(fixture_time(0)), Some(simple_parts()))
        .elevation("ph1", "e2", Some(fixture_time(0)), None)
}

/// Builds a client over the transport with rate limits high enough to be
/// invisible under a paused test clock.
pub fn fast_client(transport: MockTransport) -> CatalogClient<MockTransport> {
    let config = ClientConfig::new("https://catalog.example.com", "svc", "secret")
        .with_auth_rate(1000.0)
        .with_data_rate(1000.0);
    CatalogClient::new(config, transport).expect("valid test client config")
}
