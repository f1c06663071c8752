//! Sizing pipeline
//!
//! For every entry of the query spec, in file order:
//!
//! 1. render the query template and submit it
//! 2. wait for the result (poll, or fixed delay)
//! 3. download `<execution-id>.csv` to `<results_dir>/<instance-type>.csv`
//! 4. delete the result and its `.metadata` companion from S3 (best effort,
//!    also done for queries that failed or timed out)
//! 5. measure rows and disk, price them, append the row to the report
//!
//! One entry finishes all five steps before the next one is submitted.
//! Totals are carried through the loop as a `RunningTotals` value and the
//! `TOTAL(EC2)` row is written once the last entry is done.

use crate::aggregate::{measure_result, ResultMeasure};
use crate::athena::{wait_for_result, QueryService, WaitStrategy};
use crate::columns::ColumnRef;
use crate::config::{Config, DiskValuePolicy, QueryFailurePolicy};
use crate::cost::{cost_row_for_measure, EbsRate, RunningTotals, SummaryRow};
use crate::error::{FleetCostError, Result};
use crate::pricing::PriceTable;
use crate::query_spec::{Placeholders, QueryEntry, QuerySpec};
use crate::report::ReportWriter;
use crate::storage::{download_to_file, ObjectStore, METADATA_SUFFIX, RESULT_SUFFIX};
use crate::validation::{parse_s3_location, S3Location};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Everything the pipeline needs from the configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub placeholders: Placeholders,
    pub output_location: S3Location,
    pub wait: WaitStrategy,
    pub on_query_failure: QueryFailurePolicy,
    pub disk_column: ColumnRef,
    pub disk_policy: DiskValuePolicy,
    pub utilization_factor: Decimal,
    pub ebs_rate: EbsRate,
    pub results_dir: PathBuf,
    pub keep_result_files: bool,
    /// Print per-type progress and show the polling spinner
    pub show_progress: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            placeholders: Placeholders::from(&config.athena),
            output_location: parse_s3_location(&config.athena.output_location)?,
            wait: WaitStrategy::from(&config.athena.wait),
            on_query_failure: config.athena.on_query_failure,
            disk_column: config.sizing.disk_column.clone(),
            disk_policy: config.sizing.on_bad_disk_value,
            utilization_factor: config.sizing.utilization_factor,
            ebs_rate: EbsRate::from(&config.sizing),
            results_dir: config.report.results_dir.clone(),
            keep_result_files: config.report.keep_result_files,
            show_progress: true,
        })
    }

    /// Local file a result for `instance_type` is downloaded to
    pub fn result_path(&self, instance_type: &str) -> PathBuf {
        self.results_dir
            .join(format!("{}{}", instance_type, RESULT_SUFFIX))
    }

    /// Reject a spec whose downloads would overwrite the report file.
    pub fn check_report_path(&self, spec: &QuerySpec, report_path: &Path) -> Result<()> {
        let report = without_cur_dir(report_path);
        for entry in spec.entries() {
            let result_path = self.result_path(&entry.instance_type);
            if without_cur_dir(&result_path) == report {
                return Err(FleetCostError::Validation {
                    field: "instance type".to_string(),
                    reason: format!(
                        "result file for {} would overwrite the report {}",
                        entry.instance_type,
                        report_path.display()
                    ),
                });
            }
        }
        Ok(())
    }

    /// `s3://` URI handed to the query service as its output location
    fn output_uri(&self) -> String {
        let loc = &self.output_location;
        if loc.prefix.is_empty() {
            format!("s3://{}/", loc.bucket)
        } else {
            format!("s3://{}/{}/", loc.bucket, loc.prefix)
        }
    }
}

/// Result of a complete run
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Rows in report order
    pub rows: Vec<SummaryRow>,
    /// Instance types left out because their query failed (skip policy)
    pub skipped: Vec<String>,
    pub totals: RunningTotals,
}

/// Service handles and options for one run
pub struct Pipeline<'a> {
    queries: &'a dyn QueryService,
    store: &'a dyn ObjectStore,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        queries: &'a dyn QueryService,
        store: &'a dyn ObjectStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            queries,
            store,
            options,
        }
    }

    /// Process every spec entry and finish the report with the totals row.
    pub async fn run<W: Write>(
        &self,
        spec: &QuerySpec,
        prices: &PriceTable,
        mut report: ReportWriter<W>,
    ) -> Result<RunOutcome> {
        let mut outcome = RunOutcome::default();

        for entry in spec.entries() {
            if self.options.show_progress {
                println!("fleetcost: Working {} ...", entry.instance_type);
            }

            let row = match self.process_entry(entry, prices).await {
                Ok(row) => row,
                Err(e)
                    if e.is_query_outcome()
                        && self.options.on_query_failure == QueryFailurePolicy::Skip =>
                {
                    warn!("Skipping {}: {}", entry.instance_type, e);
                    outcome.skipped.push(entry.instance_type.clone());
                    continue;
                }
                Err(e) => return Err(e),
            };

            outcome.totals = outcome.totals.accumulate(&row)?;
            report.write_row(&row)?;
            outcome.rows.push(row);
        }

        report.finish(&outcome.totals)?;
        Ok(outcome)
    }

    /// Query, download, clean up, measure and price one instance type.
    pub async fn process_entry(&self, entry: &QueryEntry, prices: &PriceTable) -> Result<SummaryRow> {
        let measure = self.fetch_and_measure(entry).await?;

        let unit_price = prices.get(&entry.instance_type);
        if unit_price.is_none() {
            info!("No reserved price for {}, pricing it at 0", entry.instance_type);
        }

        Ok(cost_row_for_measure(
            &entry.instance_type,
            &measure,
            self.options.utilization_factor,
            unit_price,
            self.options.ebs_rate,
        ))
    }

    async fn fetch_and_measure(&self, entry: &QueryEntry) -> Result<ResultMeasure> {
        let query = entry.render(&self.options.placeholders);
        info!("Submitting query for {}: {}", entry.instance_type, query);

        let execution_id = self
            .queries
            .start_query(&query, &self.options.output_uri())
            .await?;
        info!("Query for {} started: {}", entry.instance_type, execution_id);

        if let Err(e) = wait_for_result(
            self.queries,
            &entry.instance_type,
            &execution_id,
            self.options.wait,
            self.options.show_progress,
        )
        .await
        {
            // Failed, cancelled and stopped queries can still leave objects behind
            if e.is_query_outcome() {
                self.remove_remote_artifacts(&execution_id).await;
            }
            return Err(e);
        }

        let local_path = self.options.result_path(&entry.instance_type);
        let bucket = &self.options.output_location.bucket;
        let result_key = self
            .options
            .output_location
            .object_key(&format!("{}{}", execution_id, RESULT_SUFFIX));

        download_to_file(self.store, bucket, &result_key, &local_path).await?;
        self.remove_remote_artifacts(&execution_id).await;

        let measure = measure_result(&local_path, &self.options.disk_column, self.options.disk_policy)?;
        info!(
            "{}: {} servers, {} GB",
            entry.instance_type, measure.data_rows, measure.disk_total_gb
        );

        if !self.options.keep_result_files {
            if let Err(e) = std::fs::remove_file(&local_path) {
                warn!("Failed to remove {}: {}", local_path.display(), e);
            }
        }

        Ok(measure)
    }

    /// Delete the result object and its metadata companion. Failures are
    /// logged and otherwise ignored.
    async fn remove_remote_artifacts(&self, execution_id: &str) {
        let bucket = &self.options.output_location.bucket;
        for suffix in [RESULT_SUFFIX, METADATA_SUFFIX] {
            let key = self
                .options
                .output_location
                .object_key(&format!("{}{}", execution_id, suffix));
            if let Err(e) = self.store.delete_object(bucket, &key).await {
                warn!("Failed to clean up s3://{}/{}: {}", bucket, key, e);
            }
        }
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
