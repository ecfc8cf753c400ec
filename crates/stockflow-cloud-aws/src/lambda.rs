//! Functions, permissions and event-source mappings on Lambda

use crate::error::{AwsError, classify};
use async_trait::async_trait;
use aws_sdk_lambda::Client;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    Environment, EventSourcePosition, FunctionCode, FunctionConfiguration, LastUpdateStatus,
    Runtime, State,
};
use stockflow_cloud::provider::{
    FunctionConfig, FunctionDescriptor, FunctionState, Functions, PermissionGrant, StreamSettings,
};
use stockflow_cloud::{CloudError, Result, RetryConfig, wait_until};

const INVOKE_ACTION: &str = "lambda:InvokeFunction";

pub struct LambdaFunctions {
    client: Client,
    retry: RetryConfig,
}

impl LambdaFunctions {
    pub fn new(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    fn environment(config: &FunctionConfig) -> Environment {
        Environment::builder()
            .set_variables(Some(config.environment.clone().into_iter().collect()))
            .build()
    }

    /// Code updates must finish before the configuration can change
    async fn wait_for_update(&self, name: &str) -> Result<()> {
        wait_until(&self.retry, name, move || async move {
            let function = self.get_function(name).await?;
            Ok(match function.state {
                FunctionState::Updating | FunctionState::Pending => None,
                _ => Some(()),
            })
        })
        .await
    }
}

#[async_trait]
impl Functions for LambdaFunctions {
    async fn create_function(&self, config: &FunctionConfig) -> Result<FunctionDescriptor> {
        let name = config.name.as_str();

        // A freshly created role can take a few seconds to become assumable
        let output = wait_until(&self.retry, name, move || async move {
            let result = self
                .client
                .create_function()
                .function_name(name)
                .role(&config.role_arn)
                .runtime(Runtime::from(config.runtime.as_str()))
                .handler(&config.handler)
                .timeout(config.timeout_secs)
                .memory_size(config.memory_mb)
                .environment(Self::environment(config))
                .code(
                    FunctionCode::builder()
                        .zip_file(Blob::new(config.archive.clone()))
                        .build(),
                )
                .send()
                .await;
            match result {
                Ok(output) => Ok(Some(output)),
                Err(e) => {
                    let err = AwsError::from_sdk(e);
                    if err.code() == Some("InvalidParameterValueException")
                        && err.to_string().contains("cannot be assumed")
                    {
                        Err(CloudError::Pending(err.to_string()))
                    } else {
                        Err(err.into_cloud(name))
                    }
                }
            }
        })
        .await?;

        Ok(FunctionDescriptor {
            name: name.to_string(),
            arn: output.function_arn().unwrap_or_default().to_string(),
            state: function_state(output.state(), output.state_reason(), output.last_update_status()),
        })
    }

    async fn update_function(&self, config: &FunctionConfig) -> Result<FunctionDescriptor> {
        let name = config.name.as_str();

        self.client
            .update_function_code()
            .function_name(name)
            .zip_file(Blob::new(config.archive.clone()))
            .send()
            .await
            .map_err(|e| classify(e, name))?;
        self.wait_for_update(name).await?;

        // A conflict here means an earlier update is still being applied
        wait_until(&self.retry, name, move || async move {
            let result = self
                .client
                .update_function_configuration()
                .function_name(name)
                .role(&config.role_arn)
                .runtime(Runtime::from(config.runtime.as_str()))
                .handler(&config.handler)
                .timeout(config.timeout_secs)
                .memory_size(config.memory_mb)
                .environment(Self::environment(config))
                .send()
                .await;
            match result {
                Ok(_) => Ok(Some(())),
                Err(e) => match classify(e, name) {
                    CloudError::AlreadyExists(_) => {
                        Err(CloudError::Pending(format!("{} update in progress", name)))
                    }
                    other => Err(other),
                },
            }
        })
        .await?;

        self.get_function(name).await
    }

    async fn get_function(&self, name: &str) -> Result<FunctionDescriptor> {
        let output = self
            .client
            .get_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        let configuration = output
            .configuration()
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        Ok(descriptor(name, configuration))
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        self.client
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;
        Ok(())
    }

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<()> {
        self.client
            .add_permission()
            .function_name(&grant.function_name)
            .statement_id(&grant.statement_id)
            .action(INVOKE_ACTION)
            .principal(&grant.principal)
            .source_arn(&grant.source_arn)
            .set_source_account(grant.source_account.clone())
            .send()
            .await
            .map_err(|e| classify(e, &grant.statement_id))?;
        Ok(())
    }

    async fn create_event_source_mapping(
        &self,
        function_name: &str,
        source_arn: &str,
        settings: &StreamSettings,
    ) -> Result<String> {
        let position = if settings.start_at_latest {
            EventSourcePosition::Latest
        } else {
            EventSourcePosition::TrimHorizon
        };

        let output = self
            .client
            .create_event_source_mapping()
            .function_name(function_name)
            .event_source_arn(source_arn)
            .batch_size(settings.batch_size)
            .starting_position(position)
            .send()
            .await
            .map_err(|e| classify(e, function_name))?;
        Ok(output.uuid().unwrap_or_default().to_string())
    }

    async fn list_event_source_mappings(&self, function_name: &str) -> Result<Vec<String>> {
        let mut uuids = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_event_source_mappings()
                .function_name(function_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify(e, function_name))?;

            uuids.extend(
                output
                    .event_source_mappings()
                    .iter()
                    .filter_map(|m| m.uuid().map(str::to_string)),
            );

            match output.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        Ok(uuids)
    }

    async fn delete_event_source_mapping(&self, mapping_id: &str) -> Result<()> {
        self.client
            .delete_event_source_mapping()
            .uuid(mapping_id)
            .send()
            .await
            .map_err(|e| classify(e, mapping_id))?;
        Ok(())
    }
}

fn descriptor(name: &str, configuration: &FunctionConfiguration) -> FunctionDescriptor {
    FunctionDescriptor {
        name: configuration.function_name().unwrap_or(name).to_string(),
        arn: configuration.function_arn().unwrap_or_default().to_string(),
        state: function_state(
            configuration.state(),
            configuration.state_reason(),
            configuration.last_update_status(),
        ),
    }
}

fn function_state(
    state: Option<&State>,
    reason: Option<&str>,
    last_update: Option<&LastUpdateStatus>,
) -> FunctionState {
    if last_update == Some(&LastUpdateStatus::InProgress) {
        return FunctionState::Updating;
    }
    match state {
        Some(State::Active) => FunctionState::Active,
        Some(State::Inactive) => FunctionState::Inactive,
        Some(State::Failed) => FunctionState::Failed(reason.unwrap_or("unknown").to_string()),
        _ => FunctionState::Pending,
    }
}
