//! HTTP APIs on API Gateway v2
//!
//! API names are not unique on the platform, so `create_api` looks the name
//! up first and reports a conflict instead of creating a second API.

use crate::error::classify;
use async_trait::async_trait;
use aws_sdk_apigatewayv2::Client;
use aws_sdk_apigatewayv2::types::{Cors, IntegrationType, ProtocolType};
use stockflow_cloud::provider::{ApiDescriptor, CorsPolicy, HttpGateway};
use stockflow_cloud::{CloudError, Result};

const PAYLOAD_FORMAT_VERSION: &str = "2.0";

pub struct ApiGateway {
    client: Client,
    region: String,
}

impl ApiGateway {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn descriptor(&self, id: &str, name: &str, endpoint: Option<&str>) -> ApiDescriptor {
        ApiDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            endpoint: endpoint.map(str::to_string).unwrap_or_else(|| {
                format!("https://{}.execute-api.{}.amazonaws.com", id, self.region)
            }),
        }
    }
}

#[async_trait]
impl HttpGateway for ApiGateway {
    async fn create_api(&self, name: &str, cors: &CorsPolicy) -> Result<ApiDescriptor> {
        if self.find_api(name).await?.is_some() {
            return Err(CloudError::AlreadyExists(name.to_string()));
        }

        let output = self
            .client
            .create_api()
            .name(name)
            .protocol_type(ProtocolType::Http)
            .cors_configuration(
                Cors::builder()
                    .set_allow_origins(Some(cors.allow_origins.clone()))
                    .set_allow_methods(Some(cors.allow_methods.clone()))
                    .set_allow_headers(Some(cors.allow_headers.clone()))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        let id = output
            .api_id()
            .ok_or_else(|| CloudError::ApiError(format!("no id returned for API {}", name)))?;
        Ok(self.descriptor(id, name, output.api_endpoint()))
    }

    async fn find_api(&self, name: &str) -> Result<Option<ApiDescriptor>> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .get_apis()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify(e, name))?;

            for api in output.items() {
                let api_name: Option<&str> = api.name().into();
                let api_id: Option<&str> = api.api_id().into();
                if let (Some(id), Some(api_name)) = (api_id, api_name)
                    && api_name == name
                {
                    return Ok(Some(self.descriptor(id, api_name, api.api_endpoint())));
                }
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn find_integration(&self, api_id: &str, function_arn: &str) -> Result<Option<String>> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .get_integrations()
                .api_id(api_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify(e, api_id))?;

            let found = output
                .items()
                .iter()
                .find(|i| i.integration_uri() == Some(function_arn))
                .and_then(|i| i.integration_id());
            if let Some(id) = found {
                return Ok(Some(id.to_string()));
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn create_integration(&self, api_id: &str, function_arn: &str) -> Result<String> {
        let output = self
            .client
            .create_integration()
            .api_id(api_id)
            .integration_type(IntegrationType::AwsProxy)
            .integration_uri(function_arn)
            .payload_format_version(PAYLOAD_FORMAT_VERSION)
            .send()
            .await
            .map_err(|e| classify(e, api_id))?;
        output
            .integration_id()
            .map(str::to_string)
            .ok_or_else(|| CloudError::ApiError(format!("no integration id returned for {}", api_id)))
    }

    async fn create_route(&self, api_id: &str, route_key: &str, integration_id: &str) -> Result<()> {
        self.client
            .create_route()
            .api_id(api_id)
            .route_key(route_key)
            .target(format!("integrations/{}", integration_id))
            .send()
            .await
            .map_err(|e| classify(e, route_key))?;
        Ok(())
    }

    async fn create_stage(&self, api_id: &str, stage: &str, auto_deploy: bool) -> Result<()> {
        self.client
            .create_stage()
            .api_id(api_id)
            .stage_name(stage)
            .auto_deploy(auto_deploy)
            .send()
            .await
            .map_err(|e| classify(e, stage))?;
        Ok(())
    }

    async fn update_stage(&self, api_id: &str, stage: &str, auto_deploy: bool) -> Result<()> {
        self.client
            .update_stage()
            .api_id(api_id)
            .stage_name(stage)
            .auto_deploy(auto_deploy)
            .send()
            .await
            .map_err(|e| classify(e, stage))?;
        Ok(())
    }

    async fn delete_api(&self, api_id: &str) -> Result<()> {
        self.client
            .delete_api()
            .api_id(api_id)
            .send()
            .await
            .map_err(|e| classify(e, api_id))?;
        Ok(())
    }
}
