//! Stack declaration
//!
//! The stack is a fixed set of resources. [`StackPlan`] derives their names
//! from the prefix, records their dependencies and orders them so every
//! resource comes after the resources it needs.

use crate::error::{CloudError, Result};
use crate::naming::{Prefix, ResourceKind};
use crate::resource::ResourceSpec;
use std::collections::{BTreeMap, HashSet};

/// Routes served by the query function
pub const API_ROUTES: [&str; 2] = ["GET /items", "GET /items/{store}"];

/// Stage that serves the API root URL
pub const DEFAULT_STAGE: &str = "$default";

/// Only objects with this suffix trigger the loader
pub const UPLOAD_SUFFIX: &str = ".csv";

pub const STORAGE_PRINCIPAL: &str = "s3.amazonaws.com";
pub const GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// Where the stack lives. Enough to address every resource, so teardown
/// needs nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackIdentity {
    pub prefix: Prefix,
    pub region: String,
    pub account_id: String,
}

impl StackIdentity {
    pub fn new(prefix: Prefix, region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            prefix,
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    pub fn name(&self, kind: ResourceKind) -> String {
        self.prefix.name(kind)
    }

    /// Topic identifiers are deterministic, so they can be derived
    pub fn topic_arn(&self) -> String {
        format!(
            "arn:aws:sns:{}:{}:{}",
            self.region,
            self.account_id,
            self.name(ResourceKind::NoStockTopic)
        )
    }

    /// Public URL of the static site
    pub fn site_url(&self) -> String {
        format!(
            "http://{}.s3-website.{}.amazonaws.com",
            self.name(ResourceKind::WebBucket),
            self.region
        )
    }

    /// Source pattern covering every stage and route of an API
    pub fn api_invoke_source(&self, api_id: &str) -> String {
        format!(
            "arn:aws:execute-api:{}:{}:{}/*/*",
            self.region, self.account_id, api_id
        )
    }
}

/// Execution role of each function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRoles {
    pub loader: String,
    pub query: String,
    pub notify: String,
}

impl FunctionRoles {
    /// One role for every function
    pub fn shared(role_arn: impl Into<String>) -> Self {
        let role_arn = role_arn.into();
        Self {
            loader: role_arn.clone(),
            query: role_arn.clone(),
            notify: role_arn,
        }
    }

    pub fn for_kind(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::LoaderFunction => Some(&self.loader),
            ResourceKind::QueryFunction => Some(&self.query),
            ResourceKind::NotifyFunction => Some(&self.notify),
            _ => None,
        }
    }
}

/// Everything a deploy needs to know
#[derive(Debug, Clone)]
pub struct StackSettings {
    pub identity: StackIdentity,
    pub notification_email: String,
    pub roles: FunctionRoles,
}

/// Ordered resource declarations of the inventory stack
#[derive(Debug, Clone)]
pub struct StackPlan {
    settings: StackSettings,
    resources: Vec<ResourceSpec>,
}

impl StackPlan {
    pub fn new(settings: StackSettings) -> Result<Self> {
        let declared = declare(&settings.identity);
        let resources = order_by_dependencies(declared)?;
        Ok(Self {
            settings,
            resources,
        })
    }

    pub fn settings(&self) -> &StackSettings {
        &self.settings
    }

    pub fn identity(&self) -> &StackIdentity {
        &self.settings.identity
    }

    pub fn name(&self, kind: ResourceKind) -> String {
        self.settings.identity.name(kind)
    }

    /// Provisioned resources in dependency order
    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    pub fn spec(&self, kind: ResourceKind) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    /// Function resources, in provisioning order
    pub fn functions(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources
            .iter()
            .filter(|r| self.settings.roles.for_kind(r.kind).is_some())
    }
}

fn declare(identity: &StackIdentity) -> Vec<ResourceSpec> {
    use ResourceKind::*;

    let spec = |kind| ResourceSpec::new(kind, identity.name(kind));

    vec![
        spec(UploadBucket),
        spec(WebBucket),
        spec(InventoryTable),
        spec(NoStockTopic).optional(),
        spec(EmailSubscription)
            .depends_on(&[NoStockTopic])
            .optional(),
        spec(LoaderFunction).depends_on(&[InventoryTable]),
        spec(QueryFunction).depends_on(&[InventoryTable]),
        spec(NotifyFunction).depends_on(&[InventoryTable, NoStockTopic]),
    ]
}

/// Stable topological sort. Declaration order breaks ties.
fn order_by_dependencies(declared: Vec<ResourceSpec>) -> Result<Vec<ResourceSpec>> {
    let known: HashSet<ResourceKind> = declared.iter().map(|r| r.kind).collect();
    for spec in &declared {
        if let Some(missing) = spec.depends_on.iter().find(|d| !known.contains(d)) {
            return Err(CloudError::InvalidConfig(format!(
                "{} depends on undeclared {}",
                spec.kind, missing
            )));
        }
    }

    let mut pending: BTreeMap<usize, ResourceSpec> = declared.into_iter().enumerate().collect();
    let mut placed: HashSet<ResourceKind> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .find(|(_, spec)| spec.depends_on.iter().all(|d| placed.contains(d)))
            .map(|(index, _)| *index);

        let Some(index) = ready else {
            let stuck: Vec<String> = pending.values().map(|s| s.kind.to_string()).collect();
            return Err(CloudError::InvalidConfig(format!(
                "dependency cycle between: {}",
                stuck.join(", ")
            )));
        };

        if let Some(spec) = pending.remove(&index) {
            placed.insert(spec.kind);
            ordered.push(spec);
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StackSettings {
        StackSettings {
            identity: StackIdentity::new(Prefix::parse("test1").unwrap(), "eu-west-1", "111122223333"),
            notification_email: "ops@example.com".into(),
            roles: FunctionRoles::shared("arn:aws:iam::111122223333:role/lambda"),
        }
    }

    fn position(plan: &StackPlan, kind: ResourceKind) -> usize {
        plan.resources().iter().position(|r| r.kind == kind).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let plan = StackPlan::new(settings()).unwrap();
        for spec in plan.resources() {
            for dep in &spec.depends_on {
                assert!(position(&plan, *dep) < position(&plan, spec.kind));
            }
        }
        assert!(position(&plan, ResourceKind::UploadBucket) < position(&plan, ResourceKind::LoaderFunction));
    }

    #[test]
    fn test_optional_resources() {
        let plan = StackPlan::new(settings()).unwrap();
        let optional: Vec<ResourceKind> = plan
            .resources()
            .iter()
            .filter(|r| r.optional)
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            optional,
            vec![ResourceKind::NoStockTopic, ResourceKind::EmailSubscription]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = ResourceSpec::new(ResourceKind::LoaderFunction, "a")
            .depends_on(&[ResourceKind::QueryFunction]);
        let b = ResourceSpec::new(ResourceKind::QueryFunction, "b")
            .depends_on(&[ResourceKind::LoaderFunction]);
        let err = order_by_dependencies(vec![a, b]).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_undeclared_dependency_is_rejected() {
        let a = ResourceSpec::new(ResourceKind::NotifyFunction, "a")
            .depends_on(&[ResourceKind::NoStockTopic]);
        assert!(order_by_dependencies(vec![a]).is_err());
    }

    #[test]
    fn test_derived_addresses() {
        let identity = settings().identity;
        assert_eq!(
            identity.topic_arn(),
            "arn:aws:sns:eu-west-1:111122223333:test1-NoStock"
        );
        assert_eq!(
            identity.site_url(),
            "http://test1-inventory-web.s3-website.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            identity.api_invoke_source("abc123"),
            "arn:aws:execute-api:eu-west-1:111122223333:abc123/*/*"
        );
    }

    #[test]
    fn test_functions_in_order() {
        let plan = StackPlan::new(settings()).unwrap();
        let kinds: Vec<ResourceKind> = plan.functions().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::LoaderFunction,
                ResourceKind::QueryFunction,
                ResourceKind::NotifyFunction
            ]
        );
    }
}
