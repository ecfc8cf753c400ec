//! Resource declarations and provisioning outcomes

use crate::naming::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource the stack declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// What the resource is
    pub kind: ResourceKind,

    /// Derived platform name
    pub name: String,

    /// Resources that must exist before this one
    pub depends_on: Vec<ResourceKind>,

    /// Failure of an optional resource is logged, not fatal
    pub optional: bool,
}

impl ResourceSpec {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            depends_on: Vec::new(),
            optional: false,
        }
    }

    pub fn depends_on(mut self, deps: &[ResourceKind]) -> Self {
        self.depends_on.extend_from_slice(deps);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Outcome of provisioning one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    /// Created by this run
    Created,
    /// Already existed and was confirmed usable
    Reused,
    /// The platform rejected the resource
    Failed,
    /// Not attempted because a dependency is unavailable
    Skipped,
}

impl ProvisionStatus {
    pub fn is_available(self) -> bool {
        matches!(self, ProvisionStatus::Created | ProvisionStatus::Reused)
    }
}

impl std::fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionStatus::Created => write!(f, "created"),
            ProvisionStatus::Reused => write!(f, "reused"),
            ProvisionStatus::Failed => write!(f, "failed"),
            ProvisionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A resource after the provisioning attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedResource {
    pub spec: ResourceSpec,

    /// Platform identifier (ARN, API id or subscription id)
    pub identifier: Option<String>,

    pub status: ProvisionStatus,

    /// Error message or skip reason
    pub detail: Option<String>,
}

impl ProvisionedResource {
    pub fn created(spec: ResourceSpec, identifier: impl Into<String>) -> Self {
        Self {
            spec,
            identifier: Some(identifier.into()),
            status: ProvisionStatus::Created,
            detail: None,
        }
    }

    pub fn reused(spec: ResourceSpec, identifier: impl Into<String>) -> Self {
        Self {
            spec,
            identifier: Some(identifier.into()),
            status: ProvisionStatus::Reused,
            detail: None,
        }
    }

    pub fn failed(spec: ResourceSpec, error: impl Into<String>) -> Self {
        Self {
            spec,
            identifier: None,
            status: ProvisionStatus::Failed,
            detail: Some(error.into()),
        }
    }

    pub fn skipped(spec: ResourceSpec, reason: impl Into<String>) -> Self {
        Self {
            spec,
            identifier: None,
            status: ProvisionStatus::Skipped,
            detail: Some(reason.into()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind
    }
}

/// Result of a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Outcomes in the order they were attempted
    pub resources: Vec<ProvisionedResource>,

    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ProvisionReport {
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn push(&mut self, resource: ProvisionedResource) {
        self.resources.push(resource);
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ProvisionedResource> {
        self.resources.iter().find(|r| r.kind() == kind)
    }

    /// Identifier of a resource that is available
    pub fn identifier(&self, kind: ResourceKind) -> Option<&str> {
        self.get(kind)
            .filter(|r| r.status.is_available())
            .and_then(|r| r.identifier.as_deref())
    }

    pub fn is_available(&self, kind: ResourceKind) -> bool {
        self.get(kind).is_some_and(|r| r.status.is_available())
    }

    /// Mandatory resources that failed
    pub fn mandatory_failures(&self) -> Vec<&ProvisionedResource> {
        self.resources
            .iter()
            .filter(|r| r.status == ProvisionStatus::Failed && !r.spec.optional)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.mandatory_failures().is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        let count = |status| self.resources.iter().filter(|r| r.status == status).count();
        ReportSummary {
            created: count(ProvisionStatus::Created),
            reused: count(ProvisionStatus::Reused),
            failed: count(ProvisionStatus::Failed),
            skipped: count(ProvisionStatus::Skipped),
        }
    }
}

impl Default for ProvisionReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts per status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub created: usize,
    pub reused: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} reused, {} failed, {} skipped",
            self.created, self.reused, self.failed, self.skipped
        )
    }
}
