//! Integration wiring
//!
//! Connects provisioned resources: the upload trigger, the change-stream
//! trigger, the HTTP API and the invoke grants behind them. Every binding
//! treats a conflict as "already bound". A failed binding is reported and
//! nothing already bound is rolled back.

use crate::error::{CloudError, Result};
use crate::naming::ResourceKind;
use crate::plan::{
    API_ROUTES, DEFAULT_STAGE, GATEWAY_PRINCIPAL, STORAGE_PRINCIPAL, StackPlan, UPLOAD_SUFFIX,
};
use crate::provider::{ApiDescriptor, CorsPolicy, PermissionGrant, Services, StreamSettings};
use crate::resource::ProvisionReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum BindingStatus {
    Bound,
    /// An identical binding existed already
    AlreadyBound,
    Failed(String),
    /// Not attempted because an endpoint is unavailable
    Skipped(String),
}

impl std::fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingStatus::Bound => write!(f, "bound"),
            BindingStatus::AlreadyBound => write!(f, "already bound"),
            BindingStatus::Failed(e) => write!(f, "failed: {}", e),
            BindingStatus::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingOutcome {
    pub kind: ResourceKind,
    pub name: String,
    pub status: BindingStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WiringReport {
    pub bindings: Vec<BindingOutcome>,

    /// Base URL of the HTTP API, once its surface is complete
    pub api_url: Option<String>,
}

impl WiringReport {
    pub fn get(&self, kind: ResourceKind) -> Option<&BindingOutcome> {
        self.bindings.iter().find(|b| b.kind == kind)
    }

    pub fn failures(&self) -> Vec<&BindingOutcome> {
        self.bindings
            .iter()
            .filter(|b| matches!(b.status, BindingStatus::Failed(_)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

pub struct Wiring<'a> {
    services: &'a Services,
}

impl<'a> Wiring<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    /// Wire everything the provisioning report makes possible
    pub async fn wire_all(&self, plan: &StackPlan, report: &ProvisionReport) -> WiringReport {
        let mut wiring = WiringReport::default();

        let outcome = self.bind_upload_trigger(plan, report).await;
        wiring.bindings.push(outcome);

        let outcome = self.bind_stream_trigger(plan, report).await;
        wiring.bindings.push(outcome);

        let (outcome, api) = self.ensure_http_surface(plan, report).await;
        wiring.bindings.push(outcome);

        let outcome = self.grant_api_invoke(plan, report, api.as_ref()).await;
        let granted = !matches!(
            outcome.status,
            BindingStatus::Failed(_) | BindingStatus::Skipped(_)
        );
        wiring.bindings.push(outcome);

        if let Some(api) = api
            && granted
        {
            wiring.api_url = Some(api.endpoint);
        }

        wiring
    }

    /// Object uploads with a `.csv` suffix invoke the loader
    pub async fn bind_upload_trigger(&self, plan: &StackPlan, report: &ProvisionReport) -> BindingOutcome {
        let kind = ResourceKind::UploadTrigger;
        let status = match endpoints(
            report,
            ResourceKind::UploadBucket,
            ResourceKind::LoaderFunction,
        ) {
            Err(reason) => BindingStatus::Skipped(reason),
            Ok((bucket_arn, function_arn)) => {
                let identity = plan.identity();
                let bucket = plan.name(ResourceKind::UploadBucket);
                let grant = PermissionGrant {
                    function_name: plan.name(ResourceKind::LoaderFunction),
                    statement_id: plan.name(kind),
                    principal: STORAGE_PRINCIPAL.to_string(),
                    source_arn: bucket_arn.to_string(),
                    source_account: Some(identity.account_id.clone()),
                };

                status_from(self.upload_trigger(&grant, &bucket, function_arn).await)
            }
        };
        log_outcome(kind, &status);
        BindingOutcome {
            kind,
            name: plan.name(kind),
            status,
        }
    }

    /// Post-change images of the table invoke the notifier
    pub async fn bind_stream_trigger(&self, plan: &StackPlan, report: &ProvisionReport) -> BindingOutcome {
        let kind = ResourceKind::StreamTrigger;
        let status = match endpoints(
            report,
            ResourceKind::InventoryTable,
            ResourceKind::NotifyFunction,
        ) {
            Err(reason) => BindingStatus::Skipped(reason),
            Ok(_) => {
                let table_name = plan.name(ResourceKind::InventoryTable);
                let function_name = plan.name(ResourceKind::NotifyFunction);
                status_from(self.stream_trigger(&table_name, &function_name).await)
            }
        };
        log_outcome(kind, &status);
        BindingOutcome {
            kind,
            name: plan.name(kind),
            status,
        }
    }

    async fn upload_trigger(
        &self,
        grant: &PermissionGrant,
        bucket: &str,
        function_arn: &str,
    ) -> Result<bool> {
        // The storage service checks the grant when the notification is set
        let granted = self.grant(grant).await?;
        self.services
            .storage
            .set_upload_notification(bucket, function_arn, UPLOAD_SUFFIX)
            .await?;
        Ok(granted)
    }

    async fn stream_trigger(&self, table_name: &str, function_name: &str) -> Result<bool> {
        let table = self.services.tables.describe_table(table_name).await?;
        let stream_arn = table.stream_arn.ok_or_else(|| {
            CloudError::InvalidConfig(format!("table {} has no change stream", table_name))
        })?;

        match self
            .services
            .functions
            .create_event_source_mapping(function_name, &stream_arn, &StreamSettings::default())
            .await
        {
            Ok(uuid) => {
                tracing::debug!("Event source mapping {}", uuid);
                Ok(true)
            }
            Err(e) if e.is_already_exists() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create or find the API, then its integration, routes and stage
    pub async fn ensure_http_surface(
        &self,
        plan: &StackPlan,
        report: &ProvisionReport,
    ) -> (BindingOutcome, Option<ApiDescriptor>) {
        let kind = ResourceKind::InventoryApi;
        let name = plan.name(kind);

        let (status, api) = match report.identifier(ResourceKind::QueryFunction) {
            None => (
                BindingStatus::Skipped(format!("{} is unavailable", ResourceKind::QueryFunction)),
                None,
            ),
            Some(function_arn) => match self.http_surface(&name, function_arn).await {
                Ok((created, api)) => {
                    let status = if created {
                        BindingStatus::Bound
                    } else {
                        BindingStatus::AlreadyBound
                    };
                    (status, Some(api))
                }
                Err(e) => (BindingStatus::Failed(e.to_string()), None),
            },
        };

        log_outcome(kind, &status);
        (BindingOutcome { kind, name, status }, api)
    }

    async fn http_surface(&self, name: &str, function_arn: &str) -> Result<(bool, ApiDescriptor)> {
        let gateway = &self.services.gateway;

        let (created, api) = match gateway.create_api(name, &CorsPolicy::default()).await {
            Ok(api) => (true, api),
            Err(e) if e.is_already_exists() => {
                let api = gateway.find_api(name).await?.ok_or_else(|| {
                    CloudError::NotFound(format!("API {} reported as existing but not listed", name))
                })?;
                (false, api)
            }
            Err(e) => return Err(e),
        };
        tracing::info!("API {} ({})", api.name, api.id);

        let integration_id = match gateway.find_integration(&api.id, function_arn).await? {
            Some(id) => {
                tracing::debug!("Reusing integration {}", id);
                id
            }
            None => gateway.create_integration(&api.id, function_arn).await?,
        };

        for route in API_ROUTES {
            match gateway.create_route(&api.id, route, &integration_id).await {
                Ok(()) => tracing::info!("Route {} created", route),
                Err(e) if e.is_already_exists() => tracing::debug!("Route {} exists", route),
                Err(e) => return Err(e),
            }
        }

        match gateway.create_stage(&api.id, DEFAULT_STAGE, true).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                gateway.update_stage(&api.id, DEFAULT_STAGE, true).await?;
            }
            Err(e) => return Err(e),
        }

        Ok((created, api))
    }

    /// Let the gateway invoke the query function through this API only
    pub async fn grant_api_invoke(
        &self,
        plan: &StackPlan,
        report: &ProvisionReport,
        api: Option<&ApiDescriptor>,
    ) -> BindingOutcome {
        let kind = ResourceKind::ApiInvokeGrant;
        let status = match (api, report.is_available(ResourceKind::QueryFunction)) {
            (Some(api), true) => {
                let grant = PermissionGrant {
                    function_name: plan.name(ResourceKind::QueryFunction),
                    statement_id: plan.name(kind),
                    principal: GATEWAY_PRINCIPAL.to_string(),
                    source_arn: plan.identity().api_invoke_source(&api.id),
                    source_account: None,
                };
                status_from(self.grant(&grant).await)
            }
            _ => BindingStatus::Skipped(format!("{} is unavailable", ResourceKind::InventoryApi)),
        };
        log_outcome(kind, &status);
        BindingOutcome {
            kind,
            name: plan.name(kind),
            status,
        }
    }

    /// Returns false when the statement already existed
    async fn grant(&self, grant: &PermissionGrant) -> Result<bool> {
        match self.services.functions.add_permission(grant).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_already_exists() => {
                tracing::debug!("Permission {} already granted", grant.statement_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn endpoints(
    report: &ProvisionReport,
    source: ResourceKind,
    target: ResourceKind,
) -> std::result::Result<(&str, &str), String> {
    let source_id = report
        .identifier(source)
        .ok_or_else(|| format!("{} is unavailable", source))?;
    let target_id = report
        .identifier(target)
        .ok_or_else(|| format!("{} is unavailable", target))?;
    Ok((source_id, target_id))
}

fn status_from(result: Result<bool>) -> BindingStatus {
    match result {
        Ok(true) => BindingStatus::Bound,
        Ok(false) => BindingStatus::AlreadyBound,
        Err(e) => BindingStatus::Failed(e.to_string()),
    }
}

fn log_outcome(kind: ResourceKind, status: &BindingStatus) {
    match status {
        BindingStatus::Bound | BindingStatus::AlreadyBound => {
            tracing::info!("Wired {}: {}", kind, status)
        }
        BindingStatus::Skipped(_) => tracing::warn!("Wiring {}: {}", kind, status),
        BindingStatus::Failed(_) => tracing::error!("Wiring {}: {}", kind, status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_result() {
        assert_eq!(status_from(Ok(true)), BindingStatus::Bound);
        assert_eq!(status_from(Ok(false)), BindingStatus::AlreadyBound);
        assert!(matches!(
            status_from(Err(CloudError::ApiError("denied".into()))),
            BindingStatus::Failed(_)
        ));
    }

    #[test]
    fn test_report_failures() {
        let report = WiringReport {
            bindings: vec![
                BindingOutcome {
                    kind: ResourceKind::UploadTrigger,
                    name: "t-upload-trigger".into(),
                    status: BindingStatus::AlreadyBound,
                },
                BindingOutcome {
                    kind: ResourceKind::InventoryApi,
                    name: "t-InventoryAPI".into(),
                    status: BindingStatus::Failed("TooManyRequests".into()),
                },
            ],
            api_url: None,
        };
        assert!(!report.is_success());
        assert_eq!(report.failures()[0].kind, ResourceKind::InventoryApi);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BindingStatus::AlreadyBound.to_string(), "already bound");
        assert_eq!(
            BindingStatus::Skipped("loader function is unavailable".into()).to_string(),
            "skipped: loader function is unavailable"
        );
    }
}
