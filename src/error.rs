//! Error types for fleetcost
//!
//! Library code uses `crate::error::Result<T>` which returns `FleetCostError`.
//! The binary uses `anyhow::Result<T>` at the top level and maps errors back
//! to an exit code through `exit_codes::exit_code_for_error`.
//!
//! ## Fatal vs. recovered conditions
//!
//! - A spec line without a `:` delimiter, a price row shorter than the
//!   configured column layout, and (by default) a non-integer disk cell
//!   abort the run. Partial reports are never produced silently.
//! - A missing price for an instance type is not an error at all: the
//!   cost calculator treats it as zero.
//! - Failing to delete a temporary result object is logged and the run
//!   continues, so there is no variant for it here.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for fleetcost
#[derive(Error, Debug)]
pub enum FleetCostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed query spec line {line}: expected '<instance-type>:<query>', got {content:?}")]
    MalformedSpecLine { line: usize, content: String },

    #[error("Malformed price list row {row}: needs at least {expected} columns, found {found}")]
    MalformedPriceRow {
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("Invalid price {value:?} for instance type {instance_type} (row {row})")]
    InvalidPrice {
        row: u64,
        instance_type: String,
        value: String,
    },

    #[error("Malformed result row {row} in {}: needs at least {expected} columns, found {found}", .path.display())]
    MalformedResultRow {
        path: PathBuf,
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("Invalid disk size {value:?} in {} (row {row})", .path.display())]
    DiskParse {
        path: PathBuf,
        row: u64,
        value: String,
    },

    #[error("Negative disk size {value} in {} (row {row})", .path.display())]
    NegativeDiskSize { path: PathBuf, row: u64, value: i64 },

    #[error("Total {total} overflowed {context}")]
    TotalOverflow { total: &'static str, context: String },

    #[error("Column {column:?} not found in header of {source_name}")]
    UnknownColumn { column: String, source_name: String },

    #[error("Athena error: {0}")]
    Athena(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Query {execution_id} for {instance_type} ended in state {state}: {reason}")]
    QueryFailed {
        instance_type: String,
        execution_id: String,
        state: String,
        reason: String,
    },

    #[error("Query {execution_id} did not finish within {waited:?}")]
    QueryTimeout {
        execution_id: String,
        waited: Duration,
    },

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FleetCostError>;

impl FleetCostError {
    /// True for failures the query service reported about one query, as
    /// opposed to failures talking to the service at all.
    pub fn is_query_outcome(&self) -> bool {
        matches!(
            self,
            FleetCostError::QueryFailed { .. } | FleetCostError::QueryTimeout { .. }
        )
    }
}
