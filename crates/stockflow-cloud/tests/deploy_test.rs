//! Deploy pipeline against the in-memory platform

mod common;

use common::{FakePlatform, StaticArchives, plan};
use stockflow_cloud::publish::API_URL_PLACEHOLDER;
use stockflow_cloud::{
    BindingStatus, Deployer, ManifestStore, ProvisionStatus, ResourceKind, RetryConfig,
    SiteTemplate, package_functions,
};
use tempfile::tempdir;

fn template() -> SiteTemplate {
    SiteTemplate::new(format!(
        "<html><script>const API_URL = '{}';</script></html>",
        API_URL_PLACEHOLDER
    ))
    .unwrap()
}

fn statuses(outcome: &stockflow_cloud::DeployOutcome) -> Vec<(ResourceKind, ProvisionStatus)> {
    outcome
        .provision
        .resources
        .iter()
        .map(|r| (r.kind(), r.status))
        .collect()
}

#[tokio::test]
async fn test_fresh_deploy_creates_everything() {
    let platform = FakePlatform::new();
    let services = platform.services();
    let dir = tempdir().unwrap();
    let store = ManifestStore::in_dir(dir.path());
    let plan = plan("test1");
    let archives = package_functions(&plan, &StaticArchives::complete()).unwrap();

    let outcome = Deployer::new(&services, &store)
        .with_retry(RetryConfig::immediate(10))
        .deploy(&plan, &archives, &template())
        .await
        .unwrap();

    assert!(outcome.is_success(), "{:?}", outcome.problems());
    for (kind, status) in statuses(&outcome) {
        assert_eq!(status, ProvisionStatus::Created, "{}", kind);
    }

    let wiring = outcome.wiring.as_ref().unwrap();
    for binding in &wiring.bindings {
        assert_eq!(binding.status, BindingStatus::Bound, "{}", binding.kind);
    }

    let manifest = store.load().await.unwrap().unwrap();
    assert_eq!(
        manifest.web_url.as_deref(),
        Some("http://test1-inventory-web.s3-website.eu-west-1.amazonaws.com")
    );
    let api_url = manifest.api_url.clone().unwrap();
    assert!(api_url.starts_with("https://"));
    assert_eq!(manifest.upload_bucket, "test1-inventory-uploads");
    assert_eq!(manifest.web_bucket, "test1-inventory-web");
    assert_eq!(manifest.dynamo_table, "test1-Inventory");
    assert_eq!(
        manifest.sns_topic_arn.as_deref(),
        Some("arn:aws:sns:eu-west-1:111122223333:test1-NoStock")
    );

    let state = platform.state.lock().unwrap();
    let web = &state.buckets["test1-inventory-web"];
    assert!(web.website);
    let (page, content_type) = &web.objects["index.html"];
    let page = String::from_utf8(page.clone()).unwrap();
    assert!(page.contains(&api_url));
    assert!(!page.contains(API_URL_PLACEHOLDER));
    assert_eq!(content_type, "text/html");

    let uploads = &state.buckets["test1-inventory-uploads"];
    let (target, suffix) = uploads.notification.clone().unwrap();
    assert!(target.ends_with(":function:test1-load_inventory"));
    assert_eq!(suffix, ".csv");

    let notify = &state.functions["test1-notify_low_stock"];
    assert_eq!(
        notify.config.environment.get("SNS_TOPIC_ARN").map(String::as_str),
        Some("arn:aws:sns:eu-west-1:111122223333:test1-NoStock")
    );
    let loader = &state.functions["test1-load_inventory"];
    assert_eq!(
        loader.config.environment.get("DYNAMO_TABLE_NAME").map(String::as_str),
        Some("test1-Inventory")
    );
}

#[tokio::test]
async fn test_second_deploy_reuses_everything() {
    let platform = FakePlatform::new();
    let services = platform.services();
    let dir = tempdir().unwrap();
    let store = ManifestStore::in_dir(dir.path());
    let plan = plan("test1");
    let archives = package_functions(&plan, &StaticArchives::complete()).unwrap();
    let deployer = Deployer::new(&services, &store).with_retry(RetryConfig::immediate(10));

    let first = deployer.deploy(&plan, &archives, &template()).await.unwrap();
    let second = deployer.deploy(&plan, &archives, &template()).await.unwrap();

    assert!(second.is_success(), "{:?}", second.problems());
    for (kind, status) in statuses(&second) {
        assert_eq!(status, ProvisionStatus::Reused, "{}", kind);
    }
    for binding in &second.wiring.as_ref().unwrap().bindings {
        assert_eq!(binding.status, BindingStatus::AlreadyBound, "{}", binding.kind);
    }
    assert_eq!(first.manifest, second.manifest);

    let state = platform.state.lock().unwrap();
    assert_eq!(state.buckets.len(), 2);
    assert_eq!(state.tables.len(), 1);
    assert_eq!(state.topics.len(), 1);
    assert_eq!(state.functions.len(), 3);
    assert_eq!(state.mappings.len(), 1);
    assert_eq!(state.apis.len(), 1);
    let api = state.apis.values().next().unwrap();
    assert_eq!(api.integrations.len(), 1);
    assert_eq!(api.routes.len(), 2);

    // Reused functions get the new code
    assert!(state.functions.values().all(|f| f.updates == 1));
}

#[tokio::test]
async fn test_existing_buckets_are_reused_when_create_succeeds_again() {
    let platform = FakePlatform::new();
    platform.accept_repeated_bucket_creates();
    let services = platform.services();
    let dir = tempdir().unwrap();
    let store = ManifestStore::in_dir(dir.path());
    let plan = plan("test1");
    let archives = package_functions(&plan, &StaticArchives::complete()).unwrap();
    let deployer = Deployer::new(&services, &store).with_retry(RetryConfig::immediate(10));

    deployer.deploy(&plan, &archives, &template()).await.unwrap();
    let creates = platform.calls("create_bucket");
    let second = deployer.deploy(&plan, &archives, &template()).await.unwrap();

    for kind in [ResourceKind::UploadBucket, ResourceKind::WebBucket] {
        let status = second.provision.get(kind).unwrap().status;
        assert_eq!(status, ProvisionStatus::Reused, "{}", kind);
    }
    assert_eq!(platform.calls("create_bucket"), creates);
    assert_eq!(platform.state.lock().unwrap().buckets.len(), 2);
}

#[tokio::test]
async fn test_optional_topic_failure_skips_notifier() {
    let platform = FakePlatform::new();
    platform.fail("create_topic");
    let services = platform.services();
    let dir = tempdir().unwrap();
    let store = ManifestStore::in_dir(dir.path());
    let plan = plan("test1");
    let archives = package_functions(&plan, &StaticArchives::complete()).unwrap();

    let outcome = Deployer::new(&services, &store)
        .with_retry(RetryConfig::immediate(10))
        .deploy(&plan, &archives, &template())
        .await
        .unwrap();

    let provision = &outcome.provision;
    assert!(provision.is_success());
    assert_eq!(
        provision.get(ResourceKind::NoStockTopic).unwrap().status,
        ProvisionStatus::Failed
    );
    assert_eq!(
        provision.get(ResourceKind::EmailSubscription).unwrap().status,
        ProvisionStatus::Skipped
    );
    assert_eq!(
        provision.get(ResourceKind::NotifyFunction).unwrap().status,
        ProvisionStatus::Skipped
    );
    assert!(provision.is_available(ResourceKind::LoaderFunction));

    let wiring = outcome.wiring.as_ref().unwrap();
    assert!(matches!(
        wiring.get(ResourceKind::StreamTrigger).unwrap().status,
        BindingStatus::Skipped(_)
    ));
    assert_eq!(
        wiring.get(ResourceKind::UploadTrigger).unwrap().status,
        BindingStatus::Bound
    );

    let manifest = store.load().await.unwrap().unwrap();
    assert_eq!(manifest.sns_topic_arn, None);
    assert!(manifest.api_url.is_some());
}

#[tokio::test]
async fn test_mandatory_failure_still_attempts_independent_branches() {
    let platform = FakePlatform::new();
    platform.fail("create_table");
    let services = platform.services();
    let dir = tempdir().unwrap();
    let store = ManifestStore::in_dir(dir.path());
    let plan = plan("test1");
    let archives = package_functions(&plan, &StaticArchives::complete()).unwrap();

    let outcome = Deployer::new(&services, &store)
        .with_retry(RetryConfig::immediate(10))
        .deploy(&plan, &archives, &template())
        .await
        .unwrap();

    assert!(!outcome.is_success());
    let provision = &outcome.provision;
    assert_eq!(provision.mandatory_failures().len(), 1);
    assert!(provision.is_available(ResourceKind::UploadBucket));
    assert!(provision.is_available(ResourceKind::WebBucket));
    assert!(provision.is_available(ResourceKind::NoStockTopic));
    for kind in [
        ResourceKind::LoaderFunction,
        ResourceKind::QueryFunction,
        ResourceKind::NotifyFunction,
    ] {
        assert_eq!(provision.get(kind).unwrap().status, ProvisionStatus::Skipped);
    }

    assert!(outcome.wiring.is_none());
    assert!(outcome.manifest.is_none());
    assert!(!store.path().exists());
    assert_eq!(platform.calls("create_function"), 0);
    assert!(outcome.problems()[0].contains("test1-Inventory"));
}

#[tokio::test]
async fn test_http_failure_keeps_triggers_and_skips_publish() {
    let platform = FakePlatform::new();
    platform.fail("create_api");
    let services = platform.services();
    let dir = tempdir().unwrap();
    let store = ManifestStore::in_dir(dir.path());
    let plan = plan("test1");
    let archives = package_functions(&plan, &StaticArchives::complete()).unwrap();

    let outcome = Deployer::new(&services, &store)
        .with_retry(RetryConfig::immediate(10))
        .deploy(&plan, &archives, &template())
        .await
        .unwrap();

    assert!(!outcome.is_success());
    let wiring = outcome.wiring.as_ref().unwrap();
    assert!(matches!(
        wiring.get(ResourceKind::InventoryApi).unwrap().status,
        BindingStatus::Failed(_)
    ));
    assert_eq!(
        wiring.get(ResourceKind::UploadTrigger).unwrap().status,
        BindingStatus::Bound
    );
    assert_eq!(
        wiring.get(ResourceKind::StreamTrigger).unwrap().status,
        BindingStatus::Bound
    );
    assert_eq!(wiring.api_url, None);

    let site_error = outcome.site.clone().unwrap().unwrap_err();
    assert!(site_error.contains("Dependency unmet"));
    assert_eq!(platform.calls("put_object"), 0);

    let manifest = store.load().await.unwrap().unwrap();
    assert_eq!(manifest.api_url, None);
}

#[tokio::test]
async fn test_missing_binary_fails_before_any_side_effect() {
    let platform = FakePlatform::new();
    let plan = plan("test1");

    let result = package_functions(
        &plan,
        &StaticArchives {
            missing: Some(ResourceKind::QueryFunction),
        },
    );

    assert!(result.is_err());
    assert!(platform.all_calls().is_empty());
}
