//! Column references for CSV inputs
//!
//! Both the price list and the query results are read by column. A column is
//! configured either by zero-based position or by header name; names are
//! resolved to positions once, from the header row, before any data row is
//! looked at.

use crate::error::{FleetCostError, Result};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured column: `9` or `"PricePerUnit"` in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    /// Resolve against a header row. Name matching ignores surrounding
    /// whitespace and ASCII case.
    pub fn resolve(&self, header: &StringRecord, source_name: &str) -> Result<usize> {
        match self {
            ColumnRef::Index(i) => Ok(*i),
            ColumnRef::Name(name) => header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| FleetCostError::UnknownColumn {
                    column: name.clone(),
                    source_name: source_name.to_string(),
                }),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{}", i),
            ColumnRef::Name(n) => write!(f, "{:?}", n),
        }
    }
}

impl From<usize> for ColumnRef {
    fn from(i: usize) -> Self {
        ColumnRef::Index(i)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}
