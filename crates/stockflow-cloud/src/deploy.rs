//! Deploy pipeline
//!
//! provision → wire → publish → manifest. Provisioning failures of mandatory
//! resources stop the pipeline before wiring. Wiring and publishing failures
//! are reported but the manifest is still written.

use crate::error::Result;
use crate::manifest::{DeploymentManifest, ManifestStore};
use crate::naming::ResourceKind;
use crate::plan::StackPlan;
use crate::provider::Services;
use crate::provision::{FunctionArchives, Provisioner};
use crate::publish::{PublishedSite, Publisher, SiteTemplate};
use crate::resource::ProvisionReport;
use crate::retry::RetryConfig;
use crate::wiring::{Wiring, WiringReport};

/// Everything a deploy produced
#[derive(Debug)]
pub struct DeployOutcome {
    pub provision: ProvisionReport,

    /// Absent when provisioning failed
    pub wiring: Option<WiringReport>,

    pub site: Option<std::result::Result<PublishedSite, String>>,

    /// Written manifest, absent when provisioning failed
    pub manifest: Option<DeploymentManifest>,
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        self.provision.is_success()
            && self.wiring.as_ref().is_some_and(WiringReport::is_success)
            && matches!(self.site, Some(Ok(_)))
    }

    /// Human-readable reasons the deploy is incomplete
    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .provision
            .mandatory_failures()
            .iter()
            .map(|r| {
                format!(
                    "{} ({}): {}",
                    r.spec.kind,
                    r.spec.name,
                    r.detail.as_deref().unwrap_or("failed")
                )
            })
            .collect();

        if let Some(wiring) = &self.wiring {
            problems.extend(
                wiring
                    .failures()
                    .iter()
                    .map(|b| format!("{} ({}): {}", b.kind, b.name, b.status)),
            );
        }

        if let Some(Err(e)) = &self.site {
            problems.push(format!("site: {}", e));
        }

        problems
    }
}

pub struct Deployer<'a> {
    services: &'a Services,
    manifest: &'a ManifestStore,
    retry: RetryConfig,
}

impl<'a> Deployer<'a> {
    pub fn new(services: &'a Services, manifest: &'a ManifestStore) -> Self {
        Self {
            services,
            manifest,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run the pipeline. The error path is only the manifest write; every
    /// platform failure is captured in the outcome.
    pub async fn deploy(
        &self,
        plan: &StackPlan,
        archives: &FunctionArchives,
        template: &SiteTemplate,
    ) -> Result<DeployOutcome> {
        let provisioner = Provisioner::new(self.services, self.retry.clone());
        let provision = provisioner.provision_all(plan, archives).await;

        if !provision.is_success() {
            tracing::error!(
                "Provisioning failed for {} mandatory resource(s); skipping wiring",
                provision.mandatory_failures().len()
            );
            return Ok(DeployOutcome {
                provision,
                wiring: None,
                site: None,
                manifest: None,
            });
        }

        let wiring = Wiring::new(self.services).wire_all(plan, &provision).await;

        let web_bucket = plan.name(ResourceKind::WebBucket);
        let site = Publisher::new(self.services.storage.as_ref())
            .publish(template, &web_bucket, wiring.api_url.as_deref())
            .await
            .map_err(|e| {
                tracing::error!("Site not published: {}", e);
                e.to_string()
            });

        let manifest = manifest_for(plan, &provision, &wiring);
        self.manifest.save(&manifest).await?;
        tracing::info!("Wrote {}", self.manifest.path().display());

        Ok(DeployOutcome {
            provision,
            wiring: Some(wiring),
            site: Some(site),
            manifest: Some(manifest),
        })
    }
}

fn manifest_for(plan: &StackPlan, provision: &ProvisionReport, wiring: &WiringReport) -> DeploymentManifest {
    let web_url = provision
        .is_available(ResourceKind::WebBucket)
        .then(|| plan.identity().site_url());

    DeploymentManifest {
        web_url,
        api_url: wiring.api_url.clone(),
        upload_bucket: plan.name(ResourceKind::UploadBucket),
        web_bucket: plan.name(ResourceKind::WebBucket),
        dynamo_table: plan.name(ResourceKind::InventoryTable),
        sns_topic_arn: provision
            .identifier(ResourceKind::NoStockTopic)
            .map(str::to_string),
    }
}
