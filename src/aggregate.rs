//! Disk and server counts for one downloaded query result

use crate::columns::ColumnRef;
use crate::config::DiskValuePolicy;
use crate::error::{FleetCostError, Result};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// What one result set contributes to the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultMeasure {
    /// Data rows, header excluded
    pub data_rows: u64,
    /// Sum of the disk column in GB
    pub disk_total_gb: u64,
}

impl ResultMeasure {
    /// Servers scaled by average utilization: `factor * data_rows`.
    pub fn instance_count(&self, utilization_factor: Decimal) -> Decimal {
        utilization_factor * Decimal::from(self.data_rows)
    }
}

/// Measure a result file on disk.
pub fn measure_result(
    path: &Path,
    disk_column: &ColumnRef,
    policy: DiskValuePolicy,
) -> Result<ResultMeasure> {
    let file = File::open(path)?;
    measure_reader(file, path, disk_column, policy)
}

/// Measure a result set from any reader. `path` is only used in messages.
///
/// The first row is the header. Empty disk cells count as 0 GB; a header-only
/// (or empty) result is a valid outcome with zero rows.
pub fn measure_reader<R: Read>(
    reader: R,
    path: &Path,
    disk_column: &ColumnRef,
    policy: DiskValuePolicy,
) -> Result<ResultMeasure> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = csv_reader.headers()?.clone();
    if header.is_empty() {
        return Ok(ResultMeasure::default());
    }
    let disk_index = disk_column.resolve(&header, &path.display().to_string())?;

    let mut measure = ResultMeasure::default();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index as u64 + 2;

        let cell = record.get(disk_index).ok_or_else(|| FleetCostError::MalformedResultRow {
            path: path.to_path_buf(),
            row,
            expected: disk_index + 1,
            found: record.len(),
        })?;

        let size = parse_disk_cell(cell, path, row, policy)?;
        measure.data_rows += 1;
        measure.disk_total_gb = measure.disk_total_gb.checked_add(size).ok_or_else(|| {
            FleetCostError::TotalOverflow {
                total: "disk size",
                context: format!("at row {} of {}", row, path.display()),
            }
        })?;
    }

    Ok(measure)
}

fn parse_disk_cell(cell: &str, path: &Path, row: u64, policy: DiskValuePolicy) -> Result<u64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(0);
    }

    if let Ok(size) = cell.parse::<u64>() {
        return Ok(size);
    }

    let err = match cell.parse::<i64>() {
        Ok(value) => FleetCostError::NegativeDiskSize {
            path: path.to_path_buf(),
            row,
            value,
        },
        Err(_) => FleetCostError::DiskParse {
            path: path.to_path_buf(),
            row,
            value: cell.to_string(),
        },
    };

    match policy {
        DiskValuePolicy::Abort => Err(err),
        DiskValuePolicy::Zero => {
            warn!("{}, counting as 0", err);
            Ok(0)
        }
    }
}
