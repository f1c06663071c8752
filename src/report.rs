//! Report output
//!
//! The CSV report is written row by row as each instance type finishes, so
//! an aborted run leaves every completed row on disk. The totals row is only
//! written by `finish`.

use crate::cost::{RunningTotals, SummaryRow};
use crate::error::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use csv::{Writer, WriterBuilder};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const REPORT_HEADER: [&str; 6] = [
    "EC2-InstanceType",
    "EC2-TotalInstance",
    "EC2-UnitPrice(USD)",
    "EC2-TotalPrice(USD)",
    "EBS-TotalSize(G)",
    "EBS-TotalPrice(USD)",
];

/// Streaming CSV writer for the summary report
pub struct ReportWriter<W: Write> {
    writer: Writer<W>,
}

impl ReportWriter<File> {
    /// Create (truncate) the report file and write the header line.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(REPORT_HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Append one instance-type row and flush it.
    pub fn write_row(&mut self, row: &SummaryRow) -> Result<()> {
        self.writer.write_record(format_row(row))?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write the totals row and hand back the underlying writer.
    pub fn finish(mut self, totals: &RunningTotals) -> Result<W> {
        self.write_row(&totals.total_row())?;
        self.writer
            .into_inner()
            .map_err(|e| crate::error::FleetCostError::Io(e.into_error()))
    }
}

/// Report fields for one row. The unit price keeps the precision it had in
/// the price list; computed amounts drop trailing zeros.
pub fn format_row(row: &SummaryRow) -> [String; 6] {
    [
        row.instance_type.clone(),
        format_amount(row.instance_count),
        row.unit_price.to_string(),
        format_amount(row.ec2_total_price),
        row.disk_total_gb.to_string(),
        format_amount(row.ebs_total_price),
    ]
}

fn format_amount(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Rows plus totals, for `--output json`
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub report_path: String,
    pub rows: &'a [SummaryRow],
    pub skipped: &'a [String],
    pub total: SummaryRow,
}

/// Render the run's rows as a console table.
pub fn summary_table(rows: &[SummaryRow], totals: &RunningTotals) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(REPORT_HEADER.iter().map(Cell::new));
    for row in rows.iter().chain(std::iter::once(&totals.total_row())) {
        table.add_row(format_row(row).iter().map(Cell::new));
    }
    table
}
