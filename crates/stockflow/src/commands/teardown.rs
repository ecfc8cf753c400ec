use anyhow::Context;
use colored::Colorize;
use stockflow_cloud::{
    DeletionStatus, MANIFEST_FILE, ManifestStore, StdinConfirmation, TeardownEngine,
};
use stockflow_cloud_aws::AwsServices;
use stockflow_config::TeardownConfig;

pub async fn handle() -> anyhow::Result<()> {
    let config = TeardownConfig::from_env().context("teardown configuration")?;
    let identity = config.identity;

    println!("{}", "⚠ Teardown".red().bold());
    println!(
        "Every resource of stack '{}' in {} will be deleted. This cannot be undone.",
        identity.prefix.as_str().cyan(),
        identity.region.cyan()
    );

    let services = AwsServices::load(&identity.region, &identity.account_id).await;
    let store = ManifestStore::new(MANIFEST_FILE);
    let confirmation = StdinConfirmation;
    let report = TeardownEngine::new(&services, &confirmation, &store)
        .run(&identity)
        .await;

    if report.aborted {
        println!("{}", "Confirmation did not match; nothing was deleted.".yellow());
        return Ok(());
    }

    println!();
    for deletion in &report.deletions {
        match &deletion.status {
            DeletionStatus::Deleted => {
                println!("  {} {} ({})", "✓".green(), deletion.name, deletion.kind)
            }
            DeletionStatus::AlreadyGone => println!(
                "  {} {} ({}) did not exist",
                "·".dimmed(),
                deletion.name,
                deletion.kind
            ),
            DeletionStatus::Failed(e) => println!(
                "  {} {} ({}): {}",
                "⚠".yellow(),
                deletion.name,
                deletion.kind,
                e
            ),
        }
    }
    if report.manifest_removed {
        println!("  {} {}", "✓".green(), store.path().display());
    }

    println!();
    let failures = report.failures();
    if failures.is_empty() {
        println!(
            "{} ({} deleted)",
            "✓ Teardown complete".green().bold(),
            report.deleted()
        );
    } else {
        println!(
            "{}",
            format!(
                "Teardown finished with {} warning(s); check the resources above in the console.",
                failures.len()
            )
            .yellow()
            .bold()
        );
    }
    Ok(())
}
