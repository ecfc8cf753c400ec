//! StockFlow Cloud Provisioning
//!
//! This crate provisions and tears down the serverless inventory stack:
//! an upload bucket, a website bucket, an inventory table with a change
//! stream, a low-stock topic and three functions wired behind an HTTP API.
//!
//! The engines talk to the platform only through the collaborator traits in
//! [`provider`]; `stockflow-cloud-aws` implements them on the AWS SDK.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StockFlow CLI                   │
//! │            (stockflow deploy/teardown)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stockflow-cloud                    │
//! │  ┌────────────┐ ┌──────────┐ ┌──────────────┐   │
//! │  │ Provisioner│→│  Wiring  │→│  Publisher   │   │
//! │  └────────────┘ └──────────┘ └──────────────┘   │
//! │  ┌────────────┐ ┌──────────┐ ┌──────────────┐   │
//! │  │  Teardown  │ │ Manifest │ │ Naming/Plan  │   │
//! │  └────────────┘ └──────────┘ └──────────────┘   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Collaborator traits (Services)         │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │     AWS       │
//!           │   adapters    │
//!           └───────────────┘
//! ```

pub mod confirm;
pub mod deploy;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod plan;
pub mod provider;
pub mod provision;
pub mod publish;
pub mod resource;
pub mod retry;
pub mod teardown;
pub mod wiring;

// Re-exports
pub use confirm::{Confirmation, FixedConfirmation, StdinConfirmation};
pub use deploy::{DeployOutcome, Deployer};
pub use error::{CloudError, ErrorKind, Result};
pub use manifest::{DeploymentManifest, MANIFEST_FILE, ManifestStore};
pub use naming::{Prefix, ResourceCategory, ResourceKind};
pub use plan::{FunctionRoles, StackIdentity, StackPlan, StackSettings};
pub use provider::{FunctionSource, Services};
pub use provision::{FunctionArchives, Provisioner, package_functions};
pub use publish::{Publisher, SiteTemplate};
pub use resource::{ProvisionReport, ProvisionStatus, ProvisionedResource, ResourceSpec};
pub use retry::{RetryConfig, wait_until};
pub use teardown::{DeletionStatus, TeardownEngine, TeardownReport};
pub use wiring::{BindingStatus, Wiring, WiringReport};
