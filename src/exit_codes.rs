//! Exit code standardization for fleetcost
//!
//! ## Exit Code Convention
//!
//! - `0` = Success (normal return from `main`)
//! - `1` = User error (bad arguments, malformed spec file, price list or result data)
//! - `2` = System error (Athena/S3 failure, I/O error, failed or timed-out query)
//! - `3` = Configuration error (config parse error, invalid config value)

use crate::error::FleetCostError;

/// Standard exit codes for fleetcost
pub mod codes {
    /// User error (invalid input, validation failure)
    pub const USER_ERROR: i32 = 1;
    /// System error (AWS API failure, I/O failure)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map a FleetCostError to an appropriate exit code
pub fn exit_code_for_error(error: &FleetCostError) -> i32 {
    use FleetCostError::*;
    match error {
        Config(_) => codes::CONFIG_ERROR,

        // Bad input data
        MalformedSpecLine { .. } => codes::USER_ERROR,
        MalformedPriceRow { .. } => codes::USER_ERROR,
        InvalidPrice { .. } => codes::USER_ERROR,
        MalformedResultRow { .. } => codes::USER_ERROR,
        DiskParse { .. } => codes::USER_ERROR,
        NegativeDiskSize { .. } => codes::USER_ERROR,
        TotalOverflow { .. } => codes::USER_ERROR,
        UnknownColumn { .. } => codes::USER_ERROR,
        Validation { .. } => codes::USER_ERROR,
        Csv(_) => codes::USER_ERROR,

        // Service and environment failures
        Athena(_) => codes::SYSTEM_ERROR,
        S3(_) => codes::SYSTEM_ERROR,
        QueryFailed { .. } => codes::SYSTEM_ERROR,
        QueryTimeout { .. } => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
    }
}

/// Exit code for an error that reached `main` through `anyhow`.
///
/// Errors that did not originate in the library (for example a config file
/// that failed to read) count as configuration errors.
pub fn exit_code_for_anyhow(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<FleetCostError>() {
        Some(e) => exit_code_for_error(e),
        None => codes::CONFIG_ERROR,
    }
}
