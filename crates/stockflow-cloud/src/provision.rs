//! Provisioning engine
//!
//! Brings every declared resource into existence, or confirms it already
//! exists, in dependency order. A conflict on create switches to the reuse
//! path. A resource whose dependency is unavailable is skipped, so one failed
//! branch never stops independent branches.

use crate::error::{CloudError, Result};
use crate::naming::ResourceKind;
use crate::plan::StackPlan;
use crate::provider::{
    FunctionConfig, FunctionDescriptor, FunctionSource, FunctionState, Services, TableDescriptor,
    TableSchema, TableStatus,
};
use crate::resource::{ProvisionReport, ProvisionedResource, ResourceSpec};
use crate::retry::{RetryConfig, wait_until};
use std::collections::BTreeMap;
use std::time::Instant;

/// Deployable archive per function
pub type FunctionArchives = BTreeMap<ResourceKind, Vec<u8>>;

pub const TABLE_NAME_ENV: &str = "DYNAMO_TABLE_NAME";
pub const TOPIC_ARN_ENV: &str = "SNS_TOPIC_ARN";

/// Build every function archive up front, before anything is created
pub fn package_functions(plan: &StackPlan, source: &dyn FunctionSource) -> Result<FunctionArchives> {
    let mut archives = FunctionArchives::new();
    for spec in plan.functions() {
        let archive = source.archive(spec.kind, &spec.name)?;
        tracing::debug!("Packaged {} ({} bytes)", spec.name, archive.len());
        archives.insert(spec.kind, archive);
    }
    Ok(archives)
}

pub struct Provisioner<'a> {
    services: &'a Services,
    retry: RetryConfig,
}

impl<'a> Provisioner<'a> {
    pub fn new(services: &'a Services, retry: RetryConfig) -> Self {
        Self { services, retry }
    }

    /// Provision the whole plan
    pub async fn provision_all(&self, plan: &StackPlan, archives: &FunctionArchives) -> ProvisionReport {
        let started = Instant::now();
        let mut report = ProvisionReport::new();

        for spec in plan.resources() {
            let outcome = match unavailable_dependency(spec, &report) {
                Some(dep) => {
                    let reason = format!("{} is unavailable", dep);
                    tracing::warn!("Skipping {} ({}): {}", spec.kind, spec.name, reason);
                    ProvisionedResource::skipped(spec.clone(), reason)
                }
                None => self.provision(plan, spec, archives, &report).await,
            };
            report.push(outcome);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Provisioning finished: {}", report.summary());
        report
    }

    /// Create or reuse one resource
    pub async fn provision(
        &self,
        plan: &StackPlan,
        spec: &ResourceSpec,
        archives: &FunctionArchives,
        report: &ProvisionReport,
    ) -> ProvisionedResource {
        tracing::info!(
            category = %spec.kind.category(),
            "Provisioning {} ({})",
            spec.kind,
            spec.name
        );

        let result = match spec.kind {
            ResourceKind::UploadBucket => self.ensure_bucket(&spec.name, false).await,
            ResourceKind::WebBucket => self.ensure_bucket(&spec.name, true).await,
            ResourceKind::InventoryTable => self.ensure_table(&spec.name).await,
            ResourceKind::NoStockTopic => self.ensure_topic(&spec.name).await,
            ResourceKind::EmailSubscription => self.ensure_subscription(plan, report).await,
            ResourceKind::LoaderFunction
            | ResourceKind::QueryFunction
            | ResourceKind::NotifyFunction => {
                match function_config(plan, spec, archives, report) {
                    Ok(config) => self.ensure_function(&config).await,
                    Err(e) => Err(e),
                }
            }
            other => Err(CloudError::InvalidConfig(format!(
                "{} is wired, not provisioned",
                other
            ))),
        };

        match result {
            Ok(Ensured::Created(id)) => {
                tracing::info!("Created {}: {}", spec.kind, id);
                ProvisionedResource::created(spec.clone(), id)
            }
            Ok(Ensured::Reused(id)) => {
                tracing::info!("Reusing existing {}: {}", spec.kind, id);
                ProvisionedResource::reused(spec.clone(), id)
            }
            Err(e) if spec.optional => {
                tracing::warn!("Optional {} ({}) failed: {}", spec.kind, spec.name, e);
                ProvisionedResource::failed(spec.clone(), e.to_string())
            }
            Err(e) => {
                tracing::error!("Failed to provision {} ({}): {}", spec.kind, spec.name, e);
                ProvisionedResource::failed(spec.clone(), e.to_string())
            }
        }
    }

    async fn ensure_bucket(&self, name: &str, website: bool) -> Result<Ensured> {
        let storage = &self.services.storage;

        // Some regions accept a repeated create for a bucket the caller owns
        let ensured = match storage.describe_bucket(name).await {
            Ok(bucket) => Ensured::Reused(bucket.arn),
            Err(_) => match storage.create_bucket(name).await {
                Ok(bucket) => Ensured::Created(bucket.arn),
                Err(e) if e.is_already_exists() => {
                    Ensured::Reused(storage.describe_bucket(name).await?.arn)
                }
                Err(e) => return Err(e),
            },
        };

        if website {
            let url = storage.configure_website(name).await?;
            tracing::info!("Website hosting enabled: {}", url);
        }

        Ok(ensured)
    }

    async fn ensure_table(&self, name: &str) -> Result<Ensured> {
        let tables = &self.services.tables;

        let created = match tables.create_table(name, &TableSchema::inventory()).await {
            Ok(_) => true,
            Err(e) if e.is_already_exists() => false,
            Err(e) => return Err(e),
        };

        let table = wait_until(&self.retry, name, move || async move {
            let table = tables.describe_table(name).await?;
            table_ready(table)
        })
        .await?;

        Ok(if created {
            Ensured::Created(table.arn)
        } else {
            Ensured::Reused(table.arn)
        })
    }

    async fn ensure_topic(&self, name: &str) -> Result<Ensured> {
        let topics = &self.services.topics;
        match topics.create_topic(name).await {
            Ok(arn) => Ok(Ensured::Created(arn)),
            Err(e) if e.is_already_exists() => Ok(Ensured::Reused(topics.describe_topic(name).await?)),
            Err(e) => Err(e),
        }
    }

    async fn ensure_subscription(&self, plan: &StackPlan, report: &ProvisionReport) -> Result<Ensured> {
        let topic_arn = available(report, ResourceKind::NoStockTopic)?;
        let email = &plan.settings().notification_email;

        match self.services.topics.subscribe_email(topic_arn, email).await {
            Ok(id) => {
                tracing::info!("Subscribed {} (confirmation email sent)", email);
                Ok(Ensured::Created(id))
            }
            Err(e) if e.is_already_exists() => Ok(Ensured::Reused(format!("{}:{}", topic_arn, email))),
            Err(e) => Err(e),
        }
    }

    async fn ensure_function(&self, config: &FunctionConfig) -> Result<Ensured> {
        let functions = &self.services.functions;

        let created = match functions.create_function(config).await {
            Ok(_) => true,
            Err(e) if e.is_already_exists() => {
                tracing::info!("Function {} exists, updating code and configuration", config.name);
                functions.update_function(config).await?;
                false
            }
            Err(e) => return Err(e),
        };

        let name = config.name.as_str();
        let function = wait_until(&self.retry, name, move || async move {
            let function = functions.get_function(name).await?;
            function_ready(function)
        })
        .await?;

        Ok(if created {
            Ensured::Created(function.arn)
        } else {
            Ensured::Reused(function.arn)
        })
    }
}

enum Ensured {
    Created(String),
    Reused(String),
}

fn unavailable_dependency(spec: &ResourceSpec, report: &ProvisionReport) -> Option<ResourceKind> {
    spec.depends_on
        .iter()
        .copied()
        .find(|dep| !report.is_available(*dep))
}

fn available(report: &ProvisionReport, kind: ResourceKind) -> Result<&str> {
    report
        .identifier(kind)
        .ok_or_else(|| CloudError::DependencyUnmet(format!("{} is unavailable", kind)))
}

fn function_config(
    plan: &StackPlan,
    spec: &ResourceSpec,
    archives: &FunctionArchives,
    report: &ProvisionReport,
) -> Result<FunctionConfig> {
    let role = plan
        .settings()
        .roles
        .for_kind(spec.kind)
        .ok_or_else(|| CloudError::InvalidConfig(format!("no execution role for {}", spec.kind)))?;
    let archive = archives
        .get(&spec.kind)
        .cloned()
        .ok_or_else(|| CloudError::PackagingFailed(format!("no archive for {}", spec.name)))?;

    let config = FunctionConfig::new(&spec.name, role, archive);
    Ok(match spec.kind {
        ResourceKind::NotifyFunction => {
            config.with_env(TOPIC_ARN_ENV, available(report, ResourceKind::NoStockTopic)?)
        }
        _ => config.with_env(TABLE_NAME_ENV, plan.name(ResourceKind::InventoryTable)),
    })
}

fn table_ready(table: TableDescriptor) -> Result<Option<TableDescriptor>> {
    match &table.status {
        TableStatus::Active => Ok(Some(table)),
        TableStatus::Deleting => Err(CloudError::ApiError(format!(
            "table {} is being deleted",
            table.name
        ))),
        _ => Ok(None),
    }
}

fn function_ready(function: FunctionDescriptor) -> Result<Option<FunctionDescriptor>> {
    match &function.state {
        FunctionState::Active | FunctionState::Inactive => Ok(Some(function)),
        FunctionState::Pending | FunctionState::Updating => Ok(None),
        FunctionState::Failed(reason) => Err(CloudError::ApiError(format!(
            "function {} failed to activate: {}",
            function.name, reason
        ))),
    }
}
