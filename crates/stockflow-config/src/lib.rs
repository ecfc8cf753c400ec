//! Environment configuration for StockFlow
//!
//! Both commands are configured only through environment variables, with an
//! optional `.env` file in the working directory. Every value is checked
//! here so that a misconfiguration is reported before anything is created.

pub mod error;
pub mod roles;

pub use error::*;
pub use roles::validate_role_arn;

use std::path::PathBuf;

use stockflow_cloud::{FunctionRoles, Prefix, StackIdentity, StackSettings};

pub const UNIQUE_PREFIX: &str = "UNIQUE_PREFIX";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
pub const NOTIFICATION_EMAIL: &str = "NOTIFICATION_EMAIL";
pub const EXECUTION_ROLE_ARN: &str = "EXECUTION_ROLE_ARN";
pub const LOADER_ROLE_ARN: &str = "LOADER_ROLE_ARN";
pub const QUERY_ROLE_ARN: &str = "QUERY_ROLE_ARN";
pub const NOTIFY_ROLE_ARN: &str = "NOTIFY_ROLE_ARN";

pub const ARTIFACT_DIR: &str = "STOCKFLOW_ARTIFACT_DIR";
pub const BUILD_DIR: &str = "STOCKFLOW_BUILD_DIR";
pub const WEB_TEMPLATE: &str = "STOCKFLOW_WEB_TEMPLATE";

/// Load `.env` from the working directory if there is one
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded {}", path.display());
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn prefix_from_env() -> Result<Prefix> {
    Prefix::parse(required(UNIQUE_PREFIX)?)
        .map_err(|e| ConfigError::invalid(UNIQUE_PREFIX, e.to_string()))
}

fn account_from_env() -> Result<String> {
    let account = required(AWS_ACCOUNT_ID)?;
    if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::invalid(
            AWS_ACCOUNT_ID,
            format!("'{}' is not a 12-digit account id", account),
        ));
    }
    Ok(account)
}

fn identity_from_env() -> Result<StackIdentity> {
    let prefix = prefix_from_env()?;
    let region = required(AWS_REGION)?;
    let account = account_from_env()?;
    Ok(StackIdentity::new(prefix, region, account))
}

fn email_from_env() -> Result<String> {
    let email = required(NOTIFICATION_EMAIL)?;
    if !email.contains('@') {
        return Err(ConfigError::invalid(
            NOTIFICATION_EMAIL,
            format!("'{}' is not an email address", email),
        ));
    }
    Ok(email)
}

/// Resolve each function's role, falling back to the shared role
fn roles_from_env() -> Result<FunctionRoles> {
    let shared = optional(EXECUTION_ROLE_ARN);
    let resolve = |var: &str| -> Result<String> {
        let (source, arn) = match optional(var) {
            Some(arn) => (var, arn),
            None => match &shared {
                Some(arn) => (EXECUTION_ROLE_ARN, arn.clone()),
                None => {
                    return Err(ConfigError::MissingVar(format!(
                        "{} (or {})",
                        EXECUTION_ROLE_ARN, var
                    )));
                }
            },
        };
        validate_role_arn(source, &arn)?;
        Ok(arn)
    };

    Ok(FunctionRoles {
        loader: resolve(LOADER_ROLE_ARN)?,
        query: resolve(QUERY_ROLE_ARN)?,
        notify: resolve(NOTIFY_ROLE_ARN)?,
    })
}

/// Local paths used by a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Compiled function binaries
    pub artifact_dir: PathBuf,
    /// Where function archives are written
    pub build_dir: PathBuf,
    pub web_template: PathBuf,
}

impl Paths {
    pub fn from_env() -> Self {
        let path = |var: &str, default: &str| {
            PathBuf::from(optional(var).unwrap_or_else(|| default.to_string()))
        };
        Self {
            artifact_dir: path(ARTIFACT_DIR, "target/lambda"),
            build_dir: path(BUILD_DIR, "build"),
            web_template: path(WEB_TEMPLATE, "web/index.html"),
        }
    }
}

/// Configuration of `stockflow deploy`
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub settings: StackSettings,
    pub paths: Paths,
}

impl DeployConfig {
    pub fn from_env() -> Result<Self> {
        let identity = identity_from_env()?;
        let notification_email = email_from_env()?;
        let roles = roles_from_env()?;
        Ok(Self {
            settings: StackSettings {
                identity,
                notification_email,
                roles,
            },
            paths: Paths::from_env(),
        })
    }
}

/// Configuration of `stockflow teardown`
#[derive(Debug, Clone)]
pub struct TeardownConfig {
    pub identity: StackIdentity,
}

impl TeardownConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            identity: identity_from_env()?,
        })
    }
}
