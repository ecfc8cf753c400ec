//! Deployment manifest
//!
//! Manages the `deployment-outputs.json` file which records the addresses of
//! the last successful deploy.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MANIFEST_FILE: &str = "deployment-outputs.json";

/// Durable record of a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    /// Static site URL
    pub web_url: Option<String>,

    /// HTTP API endpoint, `null` when the API could not be set up
    pub api_url: Option<String>,

    pub upload_bucket: String,

    pub web_bucket: String,

    pub dynamo_table: String,

    /// Notification topic, `null` when the optional topic failed
    pub sns_topic_arn: Option<String>,
}

/// Reads and writes the manifest file
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store for [`MANIFEST_FILE`] inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(MANIFEST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, `None` if no deploy has been recorded
    pub async fn load(&self) -> Result<Option<DeploymentManifest>> {
        if !self.path.exists() {
            tracing::debug!("Manifest not found at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let manifest = serde_json::from_str(&content)?;
        Ok(Some(manifest))
    }

    /// Write the manifest, replacing any previous one
    pub async fn save(&self, manifest: &DeploymentManifest) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }

        // serde_json pretty output indents with two spaces
        let content = serde_json::to_string_pretty(manifest)?;
        fs::write(&self.path, content).await?;

        tracing::debug!("Saved manifest to {}", self.path.display());
        Ok(())
    }

    /// Delete the manifest. Returns whether a file was removed.
    pub async fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
