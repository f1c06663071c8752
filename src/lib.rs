//! fleetcost library
//!
//! Sizes an on-premise server inventory against EC2 instance types with
//! Athena queries and prices the result with 3-year reserved instances plus
//! gp2 storage.

pub mod aggregate;
pub mod athena;
pub mod columns;
pub mod config;
pub mod cost;
pub mod error;
pub mod exit_codes;
pub mod pipeline;
pub mod pricing;
pub mod query_spec;
pub mod report;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use cost::{RunningTotals, SummaryRow};
pub use pipeline::{Pipeline, PipelineOptions, RunOutcome};
pub use pricing::PriceTable;
pub use query_spec::QuerySpec;
