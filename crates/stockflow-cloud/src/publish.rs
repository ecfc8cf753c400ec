//! Static site publisher
//!
//! Injects the API URL into the site template and uploads it to the web
//! bucket.

use crate::error::{CloudError, Result};
use crate::provider::ObjectStorage;
use std::path::Path;

/// Replaced by the API base URL
pub const API_URL_PLACEHOLDER: &str = "%%API_URL%%";

pub const INDEX_KEY: &str = "index.html";
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Site template with a verified placeholder
#[derive(Debug, Clone)]
pub struct SiteTemplate {
    content: String,
}

impl SiteTemplate {
    pub fn new(content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if !content.contains(API_URL_PLACEHOLDER) {
            return Err(CloudError::InvalidConfig(format!(
                "site template has no {} placeholder",
                API_URL_PLACEHOLDER
            )));
        }
        Ok(Self { content })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            CloudError::InvalidConfig(format!("cannot read site template {}: {}", path.display(), e))
        })?;
        Self::new(content)
    }

    pub fn render(&self, api_url: &str) -> String {
        self.content.replace(API_URL_PLACEHOLDER, api_url)
    }
}

/// Where the page went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSite {
    pub bucket: String,
    pub key: String,
    pub bytes: usize,
}

pub struct Publisher<'a> {
    storage: &'a dyn ObjectStorage,
}

impl<'a> Publisher<'a> {
    pub fn new(storage: &'a dyn ObjectStorage) -> Self {
        Self { storage }
    }

    /// Render and upload the page. Refuses to run without an API URL.
    pub async fn publish(
        &self,
        template: &SiteTemplate,
        bucket: &str,
        api_url: Option<&str>,
    ) -> Result<PublishedSite> {
        let api_url = api_url.ok_or_else(|| {
            CloudError::DependencyUnmet("API URL is unknown; the site was not published".to_string())
        })?;

        let page = template.render(api_url);
        let bytes = page.len();
        self.storage
            .put_object(bucket, INDEX_KEY, page.into_bytes(), HTML_CONTENT_TYPE)
            .await?;

        tracing::info!("Published {} to {} ({} bytes)", INDEX_KEY, bucket, bytes);
        Ok(PublishedSite {
            bucket: bucket.to_string(),
            key: INDEX_KEY.to_string(),
            bytes,
        })
    }
}
