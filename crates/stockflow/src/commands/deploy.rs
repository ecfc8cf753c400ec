use anyhow::Context;
use colored::Colorize;
use stockflow_cloud::{
    BindingStatus, DeployOutcome, Deployer, MANIFEST_FILE, ManifestStore, ProvisionStatus,
    ResourceKind, SiteTemplate, StackPlan, package_functions,
};
use stockflow_cloud_aws::{AwsServices, ZipPackager};
use stockflow_config::DeployConfig;

pub async fn handle() -> anyhow::Result<()> {
    let config = DeployConfig::from_env().context("deploy configuration")?;
    let identity = config.settings.identity.clone();

    println!("{}", "Deploying the inventory stack...".blue().bold());
    println!("Prefix:  {}", identity.prefix.as_str().cyan());
    println!("Region:  {}", identity.region.cyan());
    println!("Account: {}", identity.account_id.cyan());

    // Everything that can be checked locally is checked before any call
    let plan = StackPlan::new(config.settings)?;
    let template = SiteTemplate::load(&config.paths.web_template).await?;
    let packager = ZipPackager::new(&config.paths.artifact_dir, &config.paths.build_dir);
    let archives = package_functions(&plan, &packager)?;
    for (kind, archive) in &archives {
        tracing::debug!("{} archive: {} bytes", kind, archive.len());
    }
    println!(
        "{} {} function archives in {}",
        "✓".green(),
        archives.len(),
        config.paths.build_dir.display()
    );

    let services = AwsServices::load(&identity.region, &identity.account_id).await;
    let store = ManifestStore::new(MANIFEST_FILE);
    let outcome = Deployer::new(&services, &store)
        .deploy(&plan, &archives, &template)
        .await?;

    print_resources(&outcome);

    if outcome.is_success() {
        print_summary(&plan, &outcome, &store);
        Ok(())
    } else {
        print_failure(&outcome, &store);
        anyhow::bail!("deploy did not complete")
    }
}

fn print_resources(outcome: &DeployOutcome) {
    println!();
    println!("{}", "Resources:".bold());
    for resource in &outcome.provision.resources {
        let status = match resource.status {
            ProvisionStatus::Created => "created".green(),
            ProvisionStatus::Reused => "reused".cyan(),
            ProvisionStatus::Failed => "failed".red(),
            ProvisionStatus::Skipped => "skipped".yellow(),
        };
        println!("  {:<8} {} ({})", status, resource.spec.name, resource.spec.kind);
    }

    if let Some(wiring) = &outcome.wiring {
        println!();
        println!("{}", "Bindings:".bold());
        for binding in &wiring.bindings {
            let status = match &binding.status {
                BindingStatus::Bound => "bound".green(),
                BindingStatus::AlreadyBound => "present".cyan(),
                BindingStatus::Failed(_) => "failed".red(),
                BindingStatus::Skipped(_) => "skipped".yellow(),
            };
            println!("  {:<8} {} ({})", status, binding.name, binding.kind);
        }
    }

    let summary = outcome.provision.summary();
    println!();
    println!(
        "{} created, {} reused, {} failed, {} skipped in {:.1}s",
        summary.created,
        summary.reused,
        summary.failed,
        summary.skipped,
        outcome.provision.duration_ms as f64 / 1000.0
    );
}

fn print_summary(plan: &StackPlan, outcome: &DeployOutcome, store: &ManifestStore) {
    let manifest = outcome.manifest.as_ref();
    let web_url = manifest.and_then(|m| m.web_url.clone()).unwrap_or_default();
    let api_url = manifest.and_then(|m| m.api_url.clone()).unwrap_or_default();

    println!();
    println!("{}", "✓ Deploy complete".green().bold());
    println!("  Site:     {}", web_url.cyan());
    println!("  API:      {}", api_url.cyan());
    println!(
        "  Uploads:  {}",
        format!("s3://{}/", plan.name(ResourceKind::UploadBucket)).cyan()
    );
    println!("  Manifest: {}", store.path().display());
    println!();
    println!(
        "Confirm the subscription email sent to {} to receive low-stock alerts.",
        plan.settings().notification_email
    );
}

fn print_failure(outcome: &DeployOutcome, store: &ManifestStore) {
    println!();
    println!("{}", "✗ Deploy incomplete".red().bold());
    for problem in outcome.problems() {
        println!("  {} {}", "•".red(), problem);
    }
    if outcome.manifest.is_some() {
        println!("  Partial outputs written to {}", store.path().display());
    }
    println!();
    println!(
        "{}",
        "Run `stockflow teardown` to remove what was created before retrying.".yellow()
    );
}
