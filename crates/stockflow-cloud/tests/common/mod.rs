//! In-memory platform for engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use stockflow_cloud::provider::{
    ApiDescriptor, BucketDescriptor, CorsPolicy, FunctionConfig, FunctionDescriptor,
    FunctionSource, FunctionState, Functions, HttpGateway, KeyValueTables, ObjectStorage,
    PermissionGrant, StreamSettings, TableDescriptor, TableSchema, TableStatus, Topics,
};
use stockflow_cloud::{
    CloudError, FunctionRoles, Prefix, ResourceKind, Result, Services, StackIdentity, StackPlan,
    StackSettings,
};

pub const REGION: &str = "eu-west-1";
pub const ACCOUNT: &str = "111122223333";

pub fn plan(prefix: &str) -> StackPlan {
    StackPlan::new(StackSettings {
        identity: identity(prefix),
        notification_email: "ops@example.com".to_string(),
        roles: FunctionRoles::shared(format!("arn:aws:iam::{}:role/inventory-lambda", ACCOUNT)),
    })
    .unwrap()
}

pub fn identity(prefix: &str) -> StackIdentity {
    StackIdentity::new(Prefix::parse(prefix).unwrap(), REGION, ACCOUNT)
}

#[derive(Debug, Default)]
pub struct Bucket {
    pub objects: BTreeMap<String, (Vec<u8>, String)>,
    pub website: bool,
    pub notification: Option<(String, String)>,
}

#[derive(Debug)]
pub struct Table {
    pub descriptor: TableDescriptor,
    pub polls_until_active: u32,
}

#[derive(Debug)]
pub struct Function {
    pub config: FunctionConfig,
    pub arn: String,
    pub state: FunctionState,
    pub updates: u32,
}

#[derive(Debug, Default)]
pub struct Api {
    pub name: String,
    pub integrations: Vec<(String, String)>,
    pub routes: BTreeMap<String, String>,
    pub stages: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct State {
    pub buckets: BTreeMap<String, Bucket>,
    pub tables: BTreeMap<String, Table>,
    pub topics: BTreeMap<String, String>,
    pub subscriptions: BTreeSet<(String, String)>,
    pub functions: BTreeMap<String, Function>,
    pub permissions: BTreeSet<(String, String)>,
    pub mappings: BTreeMap<String, (String, String)>,
    pub apis: BTreeMap<String, Api>,
    /// Operations that fail with a platform error
    pub failing: BTreeSet<String>,
    /// Create succeeds on a bucket that already exists, as in us-east-1
    pub lenient_buckets: bool,
    /// Every operation invoked, in order
    pub calls: Vec<String>,
    next_id: u32,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:04}", prefix, self.next_id)
    }
}

/// Fake implementation of every collaborator
#[derive(Default)]
pub struct FakePlatform {
    pub state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            storage: self.clone(),
            tables: self.clone(),
            topics: self.clone(),
            functions: self.clone(),
            gateway: self.clone(),
        }
    }

    /// Make `op` fail with an access-denied error
    pub fn fail(&self, op: &str) {
        self.state.lock().unwrap().failing.insert(op.to_string());
    }

    pub fn accept_repeated_bucket_creates(&self) {
        self.state.lock().unwrap().lenient_buckets = true;
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == op)
            .count()
    }

    pub fn all_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn enter(&self, op: &str) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        if state.failing.contains(op) {
            return Err(CloudError::ApiError(format!("AccessDenied: {}", op)));
        }
        Ok(state)
    }
}

#[async_trait]
impl ObjectStorage for FakePlatform {
    async fn create_bucket(&self, name: &str) -> Result<BucketDescriptor> {
        let mut state = self.enter("create_bucket")?;
        if state.buckets.contains_key(name) {
            if state.lenient_buckets {
                return Ok(BucketDescriptor::new(name));
            }
            return Err(CloudError::AlreadyExists(name.to_string()));
        }
        state.buckets.insert(name.to_string(), Bucket::default());
        Ok(BucketDescriptor::new(name))
    }

    async fn describe_bucket(&self, name: &str) -> Result<BucketDescriptor> {
        let state = self.enter("describe_bucket")?;
        if !state.buckets.contains_key(name) {
            return Err(CloudError::NotFound(name.to_string()));
        }
        Ok(BucketDescriptor::new(name))
    }

    async fn configure_website(&self, name: &str) -> Result<String> {
        let mut state = self.enter("configure_website")?;
        let bucket = state
            .buckets
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        bucket.website = true;
        Ok(format!("http://{}.s3-website.{}.amazonaws.com", name, REGION))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let mut state = self.enter("put_object")?;
        let bucket = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| CloudError::NotFound(bucket.to_string()))?;
        bucket
            .objects
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn set_upload_notification(&self, bucket: &str, function_arn: &str, suffix: &str) -> Result<()> {
        let mut state = self.enter("set_upload_notification")?;
        let bucket = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| CloudError::NotFound(bucket.to_string()))?;
        bucket.notification = Some((function_arn.to_string(), suffix.to_string()));
        Ok(())
    }

    async fn empty_bucket(&self, name: &str) -> Result<usize> {
        let mut state = self.enter("empty_bucket")?;
        let bucket = state
            .buckets
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        let removed = bucket.objects.len();
        bucket.objects.clear();
        Ok(removed)
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket")?;
        match state.buckets.get(name) {
            None => Err(CloudError::NotFound(name.to_string())),
            Some(bucket) if !bucket.objects.is_empty() => {
                Err(CloudError::ApiError(format!("BucketNotEmpty: {}", name)))
            }
            Some(_) => {
                state.buckets.remove(name);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl KeyValueTables for FakePlatform {
    async fn create_table(&self, name: &str, schema: &TableSchema) -> Result<TableDescriptor> {
        let mut state = self.enter("create_table")?;
        if state.tables.contains_key(name) {
            return Err(CloudError::AlreadyExists(name.to_string()));
        }
        let arn = format!("arn:aws:dynamodb:{}:{}:table/{}", REGION, ACCOUNT, name);
        let descriptor = TableDescriptor {
            name: name.to_string(),
            stream_arn: schema
                .stream_new_images
                .then(|| format!("{}/stream/2024-01-01T00:00:00.000", arn)),
            arn,
            status: TableStatus::Creating,
        };
        state.tables.insert(
            name.to_string(),
            Table {
                descriptor: descriptor.clone(),
                polls_until_active: 2,
            },
        );
        Ok(descriptor)
    }

    async fn describe_table(&self, name: &str) -> Result<TableDescriptor> {
        let mut state = self.enter("describe_table")?;
        let table = state
            .tables
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        if table.polls_until_active > 0 {
            table.polls_until_active -= 1;
        } else {
            table.descriptor.status = TableStatus::Active;
        }
        Ok(table.descriptor.clone())
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        let mut state = self.enter("delete_table")?;
        state
            .tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl Topics for FakePlatform {
    async fn create_topic(&self, name: &str) -> Result<String> {
        let mut state = self.enter("create_topic")?;
        if state.topics.contains_key(name) {
            return Err(CloudError::AlreadyExists(name.to_string()));
        }
        let arn = format!("arn:aws:sns:{}:{}:{}", REGION, ACCOUNT, name);
        state.topics.insert(name.to_string(), arn.clone());
        Ok(arn)
    }

    async fn describe_topic(&self, name: &str) -> Result<String> {
        let state = self.enter("describe_topic")?;
        state
            .topics
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(name.to_string()))
    }

    async fn subscribe_email(&self, topic_arn: &str, email: &str) -> Result<String> {
        let mut state = self.enter("subscribe_email")?;
        let key = (topic_arn.to_string(), email.to_string());
        if state.subscriptions.contains(&key) {
            return Err(CloudError::AlreadyExists(email.to_string()));
        }
        state.subscriptions.insert(key);
        Ok("pending confirmation".to_string())
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<()> {
        let mut state = self.enter("delete_topic")?;
        let name = state
            .topics
            .iter()
            .find(|(_, arn)| arn.as_str() == topic_arn)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| CloudError::NotFound(topic_arn.to_string()))?;
        state.topics.remove(&name);
        state.subscriptions.retain(|(arn, _)| arn != topic_arn);
        Ok(())
    }
}

#[async_trait]
impl Functions for FakePlatform {
    async fn create_function(&self, config: &FunctionConfig) -> Result<FunctionDescriptor> {
        let mut state = self.enter("create_function")?;
        if state.functions.contains_key(&config.name) {
            return Err(CloudError::AlreadyExists(config.name.clone()));
        }
        let arn = format!("arn:aws:lambda:{}:{}:function:{}", REGION, ACCOUNT, config.name);
        state.functions.insert(
            config.name.clone(),
            Function {
                config: config.clone(),
                arn: arn.clone(),
                state: FunctionState::Pending,
                updates: 0,
            },
        );
        Ok(FunctionDescriptor {
            name: config.name.clone(),
            arn,
            state: FunctionState::Pending,
        })
    }

    async fn update_function(&self, config: &FunctionConfig) -> Result<FunctionDescriptor> {
        let mut state = self.enter("update_function")?;
        let function = state
            .functions
            .get_mut(&config.name)
            .ok_or_else(|| CloudError::NotFound(config.name.clone()))?;
        function.config = config.clone();
        function.state = FunctionState::Updating;
        function.updates += 1;
        Ok(FunctionDescriptor {
            name: config.name.clone(),
            arn: function.arn.clone(),
            state: FunctionState::Updating,
        })
    }

    async fn get_function(&self, name: &str) -> Result<FunctionDescriptor> {
        let mut state = self.enter("get_function")?;
        let function = state
            .functions
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        let observed = function.state.clone();
        // Settles after one observation
        function.state = FunctionState::Active;
        Ok(FunctionDescriptor {
            name: name.to_string(),
            arn: function.arn.clone(),
            state: observed,
        })
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        let mut state = self.enter("delete_function")?;
        state
            .functions
            .remove(name)
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        state.permissions.retain(|(function, _)| function != name);
        Ok(())
    }

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<()> {
        let mut state = self.enter("add_permission")?;
        if !state.functions.contains_key(&grant.function_name) {
            return Err(CloudError::NotFound(grant.function_name.clone()));
        }
        let key = (grant.function_name.clone(), grant.statement_id.clone());
        if !state.permissions.insert(key) {
            return Err(CloudError::AlreadyExists(grant.statement_id.clone()));
        }
        Ok(())
    }

    async fn create_event_source_mapping(
        &self,
        function_name: &str,
        source_arn: &str,
        _settings: &StreamSettings,
    ) -> Result<String> {
        let mut state = self.enter("create_event_source_mapping")?;
        let binding = (function_name.to_string(), source_arn.to_string());
        if state.mappings.values().any(|m| *m == binding) {
            return Err(CloudError::AlreadyExists(source_arn.to_string()));
        }
        let uuid = state.id("esm-");
        state.mappings.insert(uuid.clone(), binding);
        Ok(uuid)
    }

    async fn list_event_source_mappings(&self, function_name: &str) -> Result<Vec<String>> {
        let state = self.enter("list_event_source_mappings")?;
        Ok(state
            .mappings
            .iter()
            .filter(|(_, (function, _))| function == function_name)
            .map(|(uuid, _)| uuid.clone())
            .collect())
    }

    async fn delete_event_source_mapping(&self, mapping_id: &str) -> Result<()> {
        let mut state = self.enter("delete_event_source_mapping")?;
        state
            .mappings
            .remove(mapping_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(mapping_id.to_string()))
    }
}

#[async_trait]
impl HttpGateway for FakePlatform {
    async fn create_api(&self, name: &str, _cors: &CorsPolicy) -> Result<ApiDescriptor> {
        let mut state = self.enter("create_api")?;
        if state.apis.values().any(|api| api.name == name) {
            return Err(CloudError::AlreadyExists(name.to_string()));
        }
        let id = state.id("api");
        state.apis.insert(
            id.clone(),
            Api {
                name: name.to_string(),
                ..Default::default()
            },
        );
        Ok(descriptor(&id, name))
    }

    async fn find_api(&self, name: &str) -> Result<Option<ApiDescriptor>> {
        let state = self.enter("find_api")?;
        Ok(state
            .apis
            .iter()
            .find(|(_, api)| api.name == name)
            .map(|(id, api)| descriptor(id, &api.name)))
    }

    async fn find_integration(&self, api_id: &str, function_arn: &str) -> Result<Option<String>> {
        let state = self.enter("find_integration")?;
        let api = state
            .apis
            .get(api_id)
            .ok_or_else(|| CloudError::NotFound(api_id.to_string()))?;
        Ok(api
            .integrations
            .iter()
            .find(|(_, target)| target == function_arn)
            .map(|(id, _)| id.clone()))
    }

    async fn create_integration(&self, api_id: &str, function_arn: &str) -> Result<String> {
        let mut state = self.enter("create_integration")?;
        let id = state.id("int");
        let api = state
            .apis
            .get_mut(api_id)
            .ok_or_else(|| CloudError::NotFound(api_id.to_string()))?;
        api.integrations.push((id.clone(), function_arn.to_string()));
        Ok(id)
    }

    async fn create_route(&self, api_id: &str, route_key: &str, integration_id: &str) -> Result<()> {
        let mut state = self.enter("create_route")?;
        let api = state
            .apis
            .get_mut(api_id)
            .ok_or_else(|| CloudError::NotFound(api_id.to_string()))?;
        if api.routes.contains_key(route_key) {
            return Err(CloudError::AlreadyExists(route_key.to_string()));
        }
        api.routes
            .insert(route_key.to_string(), integration_id.to_string());
        Ok(())
    }

    async fn create_stage(&self, api_id: &str, stage: &str, _auto_deploy: bool) -> Result<()> {
        let mut state = self.enter("create_stage")?;
        let api = state
            .apis
            .get_mut(api_id)
            .ok_or_else(|| CloudError::NotFound(api_id.to_string()))?;
        if !api.stages.insert(stage.to_string()) {
            return Err(CloudError::AlreadyExists(stage.to_string()));
        }
        Ok(())
    }

    async fn update_stage(&self, api_id: &str, stage: &str, _auto_deploy: bool) -> Result<()> {
        let state = self.enter("update_stage")?;
        let api = state
            .apis
            .get(api_id)
            .ok_or_else(|| CloudError::NotFound(api_id.to_string()))?;
        if !api.stages.contains(stage) {
            return Err(CloudError::NotFound(stage.to_string()));
        }
        Ok(())
    }

    async fn delete_api(&self, api_id: &str) -> Result<()> {
        let mut state = self.enter("delete_api")?;
        state
            .apis
            .remove(api_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(api_id.to_string()))
    }
}

fn descriptor(id: &str, name: &str) -> ApiDescriptor {
    ApiDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        endpoint: format!("https://{}.execute-api.{}.amazonaws.com", id, REGION),
    }
}

/// Archives with fixed content, optionally missing one function
pub struct StaticArchives {
    pub missing: Option<ResourceKind>,
}

impl StaticArchives {
    pub fn complete() -> Self {
        Self { missing: None }
    }
}

impl FunctionSource for StaticArchives {
    fn archive(&self, kind: ResourceKind, function_name: &str) -> Result<Vec<u8>> {
        if self.missing == Some(kind) {
            return Err(CloudError::PackagingFailed(format!(
                "no binary for {}",
                function_name
            )));
        }
        Ok(format!("zip:{}", function_name).into_bytes())
    }
}
