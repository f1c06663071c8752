//! Input validation utilities
//!
//! Instance-type names from the query spec become local file names, and the
//! Athena output location has to split cleanly into a bucket and key prefix,
//! so both are checked before anything is submitted.

use crate::error::{FleetCostError, Result};

/// Validate an EC2 instance type name taken from the query spec file.
///
/// Names like `m5.large` or `r6g.16xlarge` are accepted. The name is used as
/// the local result file name, so separators and traversal are rejected.
pub fn validate_instance_type(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FleetCostError::Validation {
            field: "instance_type".to_string(),
            reason: "Instance type cannot be empty".to_string(),
        });
    }

    if name.len() > 64 {
        return Err(FleetCostError::Validation {
            field: "instance_type".to_string(),
            reason: format!(
                "Instance type must be <= 64 characters, got: {} (len: {})",
                name,
                name.len()
            ),
        });
    }

    if name.contains("..") {
        return Err(FleetCostError::Validation {
            field: "instance_type".to_string(),
            reason: format!("Instance type cannot contain '..', got: {}", name),
        });
    }

    // Allow alphanumeric, hyphens, underscores, dots
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(FleetCostError::Validation {
            field: "instance_type".to_string(),
            reason: format!("Instance type can only contain alphanumeric characters, hyphens, underscores, and dots, got: {}", name),
        });
    }

    Ok(())
}

/// An `s3://bucket[/prefix]` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Key prefix without leading or trailing slashes, possibly empty
    pub prefix: String,
}

impl S3Location {
    /// Key of an object directly under this location.
    pub fn object_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

/// Parse and validate an S3 location (s3://bucket/prefix)
pub fn parse_s3_location(s3_path: &str) -> Result<S3Location> {
    let without_prefix = s3_path.strip_prefix("s3://").ok_or_else(|| FleetCostError::Validation {
        field: "s3_path".to_string(),
        reason: format!("S3 path must start with 's3://', got: {}", s3_path),
    })?;

    let (bucket, prefix) = match without_prefix.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
        None => (without_prefix, ""),
    };

    if bucket.is_empty() {
        return Err(FleetCostError::Validation {
            field: "s3_path".to_string(),
            reason: "S3 bucket name cannot be empty".to_string(),
        });
    }

    // Validate bucket name (simplified - AWS has more complex rules)
    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(FleetCostError::Validation {
            field: "s3_path".to_string(),
            reason: format!(
                "S3 bucket name must be 3-63 characters, got: {} (len: {})",
                bucket,
                bucket.len()
            ),
        });
    }

    Ok(S3Location {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
    })
}
