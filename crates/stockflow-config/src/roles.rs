//! Execution role checks

use crate::error::{ConfigError, Result};
use regex::Regex;

const ROLE_ARN_PATTERN: &str = r"^arn:aws[a-zA-Z-]*:iam::(\d{12}):role/[\w+=,.@/-]+$";

/// Account id used throughout the AWS documentation
const PLACEHOLDER_ACCOUNT: &str = "123456789012";

/// Check that `arn` (read from `var`) names a usable IAM role
pub fn validate_role_arn(var: &str, arn: &str) -> Result<()> {
    let pattern = Regex::new(ROLE_ARN_PATTERN).map_err(|e| ConfigError::invalid(var, e.to_string()))?;

    let captures = pattern
        .captures(arn)
        .ok_or_else(|| ConfigError::invalid(var, format!("'{}' is not an IAM role ARN", arn)))?;

    if &captures[1] == PLACEHOLDER_ACCOUNT {
        return Err(ConfigError::invalid(
            var,
            format!("'{}' still uses the placeholder account {}", arn, PLACEHOLDER_ACCOUNT),
        ));
    }
    Ok(())
}
