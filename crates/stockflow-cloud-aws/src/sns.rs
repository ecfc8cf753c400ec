//! Notification topics on SNS
//!
//! `CreateTopic` and `Subscribe` are idempotent on SNS, so existence is
//! checked first to report conflicts like every other service.

use crate::error::classify;
use async_trait::async_trait;
use aws_sdk_sns::Client;
use stockflow_cloud::provider::Topics;
use stockflow_cloud::{CloudError, Result};

const EMAIL_PROTOCOL: &str = "email";

pub struct SnsTopics {
    client: Client,
    region: String,
    account_id: String,
}

impl SnsTopics {
    pub fn new(client: Client, region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    fn topic_arn(&self, name: &str) -> String {
        format!("arn:aws:sns:{}:{}:{}", self.region, self.account_id, name)
    }

    async fn exists(&self, topic_arn: &str) -> Result<bool> {
        match self
            .client
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match classify(e, topic_arn) {
                CloudError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn is_subscribed(&self, topic_arn: &str, email: &str) -> Result<bool> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify(e, topic_arn))?;

            let found = output.subscriptions().iter().any(|s| {
                s.protocol() == Some(EMAIL_PROTOCOL) && s.endpoint() == Some(email)
            });
            if found {
                return Ok(true);
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(false),
            }
        }
    }
}

#[async_trait]
impl Topics for SnsTopics {
    async fn create_topic(&self, name: &str) -> Result<String> {
        if self.exists(&self.topic_arn(name)).await? {
            return Err(CloudError::AlreadyExists(name.to_string()));
        }

        let output = self
            .client
            .create_topic()
            .name(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;
        output
            .topic_arn()
            .map(str::to_string)
            .ok_or_else(|| CloudError::ApiError(format!("no ARN returned for topic {}", name)))
    }

    async fn describe_topic(&self, name: &str) -> Result<String> {
        let arn = self.topic_arn(name);
        if self.exists(&arn).await? {
            Ok(arn)
        } else {
            Err(CloudError::NotFound(name.to_string()))
        }
    }

    async fn subscribe_email(&self, topic_arn: &str, email: &str) -> Result<String> {
        if self.is_subscribed(topic_arn, email).await? {
            return Err(CloudError::AlreadyExists(format!("{} on {}", email, topic_arn)));
        }

        let output = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(EMAIL_PROTOCOL)
            .endpoint(email)
            .send()
            .await
            .map_err(|e| classify(e, topic_arn))?;
        Ok(output
            .subscription_arn()
            .unwrap_or("pending confirmation")
            .to_string())
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<()> {
        if !self.exists(topic_arn).await? {
            return Err(CloudError::NotFound(topic_arn.to_string()));
        }
        self.client
            .delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| classify(e, topic_arn))?;
        Ok(())
    }
}
