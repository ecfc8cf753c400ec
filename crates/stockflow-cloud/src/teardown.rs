//! Teardown engine
//!
//! Deletes every resource the prefix addresses, in reverse dependency order:
//! the HTTP API and bucket contents first, then functions and their stream
//! bindings, then the topic, then the table. Nothing here depends on the
//! manifest. Each deletion is attempted regardless of earlier failures.

use crate::confirm::Confirmation;
use crate::error::{CloudError, Result};
use crate::manifest::ManifestStore;
use crate::naming::ResourceKind;
use crate::plan::StackIdentity;
use crate::provider::Services;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum DeletionStatus {
    Deleted,
    /// Did not exist
    AlreadyGone,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deletion {
    pub kind: ResourceKind,
    pub name: String,
    pub status: DeletionStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeardownReport {
    /// The operator did not confirm; nothing was touched
    pub aborted: bool,

    pub deletions: Vec<Deletion>,

    pub manifest_removed: bool,
}

impl TeardownReport {
    pub fn failures(&self) -> Vec<&Deletion> {
        self.deletions
            .iter()
            .filter(|d| matches!(d.status, DeletionStatus::Failed(_)))
            .collect()
    }

    pub fn deleted(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| d.status == DeletionStatus::Deleted)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

pub struct TeardownEngine<'a> {
    services: &'a Services,
    confirmation: &'a dyn Confirmation,
    manifest: &'a ManifestStore,
}

impl<'a> TeardownEngine<'a> {
    pub fn new(
        services: &'a Services,
        confirmation: &'a dyn Confirmation,
        manifest: &'a ManifestStore,
    ) -> Self {
        Self {
            services,
            confirmation,
            manifest,
        }
    }

    /// Ask for confirmation, then delete everything
    pub async fn run(&self, identity: &StackIdentity) -> TeardownReport {
        let mut report = TeardownReport::default();

        if !self.confirmation.confirm(identity.prefix.as_str()) {
            tracing::info!("Teardown aborted: confirmation did not match '{}'", identity.prefix);
            report.aborted = true;
            return report;
        }

        tracing::info!("Tearing down stack '{}'", identity.prefix);

        let api = self.delete_api(identity).await;
        report.deletions.push(api);

        for kind in [ResourceKind::UploadBucket, ResourceKind::WebBucket] {
            let name = identity.name(kind);
            let status = self.delete_bucket(&name).await;
            report.deletions.push(record(kind, name, status));
        }

        let stream = self.delete_stream_bindings(identity).await;
        report.deletions.push(stream);

        for kind in [
            ResourceKind::LoaderFunction,
            ResourceKind::QueryFunction,
            ResourceKind::NotifyFunction,
        ] {
            let name = identity.name(kind);
            let status = classify(self.services.functions.delete_function(&name).await);
            report.deletions.push(record(kind, name, status));
        }

        let topic_arn = identity.topic_arn();
        let status = classify(self.services.topics.delete_topic(&topic_arn).await);
        report.deletions.push(record(ResourceKind::NoStockTopic, topic_arn, status));

        let table = identity.name(ResourceKind::InventoryTable);
        let status = classify(self.services.tables.delete_table(&table).await);
        report
            .deletions
            .push(record(ResourceKind::InventoryTable, table, status));

        report.manifest_removed = match self.manifest.remove().await {
            Ok(removed) => {
                if removed {
                    tracing::info!("Removed {}", self.manifest.path().display());
                }
                removed
            }
            Err(e) => {
                tracing::warn!("Could not remove {}: {}", self.manifest.path().display(), e);
                false
            }
        };

        tracing::info!(
            "Teardown finished: {} deleted, {} failed",
            report.deleted(),
            report.failures().len()
        );
        report
    }

    async fn delete_api(&self, identity: &StackIdentity) -> Deletion {
        let kind = ResourceKind::InventoryApi;
        let name = identity.name(kind);
        let gateway = &self.services.gateway;

        let status = match gateway.find_api(&name).await {
            Ok(Some(api)) => classify(gateway.delete_api(&api.id).await),
            Ok(None) => classify(Err(CloudError::NotFound(name.clone()))),
            Err(e) => classify(Err(e)),
        };
        record(kind, name, status)
    }

    /// Empty then delete; a bucket with objects cannot be removed
    async fn delete_bucket(&self, name: &str) -> DeletionStatus {
        let storage = &self.services.storage;
        match storage.empty_bucket(name).await {
            Ok(removed) => tracing::debug!("Emptied {} ({} entries)", name, removed),
            Err(e) if e.is_not_found() => return classify(Err(e)),
            // Try the delete anyway and report whatever it says
            Err(e) => tracing::warn!("Could not empty {}: {}", name, e),
        }
        classify(storage.delete_bucket(name).await)
    }

    async fn delete_stream_bindings(&self, identity: &StackIdentity) -> Deletion {
        let kind = ResourceKind::StreamTrigger;
        let function = identity.name(ResourceKind::NotifyFunction);
        let functions = &self.services.functions;

        let result = async {
            let mappings = functions.list_event_source_mappings(&function).await?;
            if mappings.is_empty() {
                return Err(CloudError::NotFound(format!("no bindings on {}", function)));
            }
            for uuid in &mappings {
                functions.delete_event_source_mapping(uuid).await?;
            }
            Ok::<(), CloudError>(())
        }
        .await;

        record(kind, identity.name(kind), classify(result))
    }
}

fn classify(result: Result<()>) -> DeletionStatus {
    match result {
        Ok(()) => DeletionStatus::Deleted,
        Err(e) if e.is_not_found() => DeletionStatus::AlreadyGone,
        Err(e) => DeletionStatus::Failed(e.to_string()),
    }
}

fn record(kind: ResourceKind, name: String, status: DeletionStatus) -> Deletion {
    match &status {
        DeletionStatus::Deleted => tracing::info!("Deleted {} {}", kind, name),
        DeletionStatus::AlreadyGone => tracing::warn!("{} {} does not exist", kind, name),
        DeletionStatus::Failed(e) => tracing::error!("Failed to delete {} {}: {}", kind, name, e),
    }
    Deletion { kind, name, status }
}
