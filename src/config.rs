use crate::columns::ColumnRef;
use crate::error::{ConfigError, FleetCostError};
use crate::validation::parse_s3_location;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub aws: AwsConfig,
    pub athena: AthenaConfig,
    pub pricing: PricingConfig,
    pub sizing: SizingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// Where Athena writes result sets, `s3://bucket[/prefix]`
    pub output_location: String,
    pub workgroup: Option<String>,
    /// Substituted for `DB_NAME` in query templates
    pub database_table: String,
    /// Substituted for `CPU_CORE`
    pub cpu_column: String,
    /// Substituted for `MEM_SIZE`
    pub memory_column: String,
    pub wait: WaitConfig,
    pub on_query_failure: QueryFailurePolicy,
}

/// How to wait for a submitted query before downloading its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WaitConfig {
    /// Poll the query status until it reaches a terminal state.
    Poll {
        poll_interval_ms: u64,
        timeout_secs: u64,
    },
    /// Sleep a fixed time and assume the result is ready.
    Fixed { delay_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFailurePolicy {
    /// Stop the whole run on the first failed or timed-out query
    Abort,
    /// Log it, leave the instance type out of the report, keep going
    Skip,
}

/// Which price-list rows count, and where their fields live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Metadata lines before the header row (the published offer files carry 5)
    #[serde(default)]
    pub preamble_lines: usize,
    pub term_type: String,
    pub location: String,
    pub lease_contract_length: String,
    pub purchase_option: String,
    pub tenancy: String,
    pub offering_class: String,
    pub unit: String,
    pub operating_system: String,
    pub columns: PriceColumns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceColumns {
    pub term_type: ColumnRef,
    pub location: ColumnRef,
    pub lease_contract_length: ColumnRef,
    pub purchase_option: ColumnRef,
    pub tenancy: ColumnRef,
    pub offering_class: ColumnRef,
    pub unit: ColumnRef,
    pub operating_system: ColumnRef,
    pub price: ColumnRef,
    pub instance_type: ColumnRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Disk size (GB) column in the query results
    pub disk_column: ColumnRef,
    /// Average CPU usage, 0.0-1.0
    pub utilization_factor: Decimal,
    /// gp2 price per GB-month (USD)
    pub ebs_gb_month_rate: Decimal,
    pub term_months: u32,
    pub on_bad_disk_value: DiskValuePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskValuePolicy {
    /// A non-integer or negative disk cell aborts the run
    Abort,
    /// A non-integer or negative disk cell counts as 0 GB and is logged
    Zero,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub path: PathBuf,
    /// Directory for the per-instance-type result downloads
    pub results_dir: PathBuf,
    pub keep_result_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws: AwsConfig {
                region: "ap-northeast-1".to_string(),
            },
            athena: AthenaConfig {
                output_location: "s3://amqa-sample".to_string(),
                workgroup: None,
                database_table: "\"amqa-sample\".\"amqa_sample\"".to_string(),
                cpu_column: "vcpu".to_string(),
                memory_column: "memory".to_string(),
                wait: WaitConfig::Poll {
                    poll_interval_ms: 1000,
                    timeout_secs: 300,
                },
                on_query_failure: QueryFailurePolicy::Abort,
            },
            pricing: PricingConfig {
                preamble_lines: 0,
                term_type: "Reserved".to_string(),
                location: "Asia Pacific (Tokyo)".to_string(),
                lease_contract_length: "3yr".to_string(),
                purchase_option: "All Upfront".to_string(),
                tenancy: "Shared".to_string(),
                offering_class: "standard".to_string(),
                unit: "Quantity".to_string(),
                operating_system: "Linux".to_string(),
                // Column layout of the EC2 offer file CSV
                columns: PriceColumns {
                    term_type: ColumnRef::Index(3),
                    location: ColumnRef::Index(16),
                    lease_contract_length: ColumnRef::Index(11),
                    purchase_option: ColumnRef::Index(12),
                    tenancy: ColumnRef::Index(35),
                    offering_class: ColumnRef::Index(13),
                    unit: ColumnRef::Index(8),
                    operating_system: ColumnRef::Index(37),
                    price: ColumnRef::Index(9),
                    instance_type: ColumnRef::Index(18),
                },
            },
            sizing: SizingConfig {
                disk_column: ColumnRef::Index(9),
                utilization_factor: Decimal::ONE,
                ebs_gb_month_rate: Decimal::new(12, 2),
                term_months: 36,
                on_bad_disk_value: DiskValuePolicy::Abort,
            },
            report: ReportConfig {
                path: PathBuf::from("amqa-3year.csv"),
                results_dir: PathBuf::from("."),
                keep_result_files: true,
            },
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .fleetcost.toml in current dir, then ~/.config/fleetcost/config.toml
            let local = PathBuf::from(".fleetcost.toml");
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("fleetcost").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from(".fleetcost.toml"))
            }
        };

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .map_err(|e| FleetCostError::Config(ConfigError::ParseError(e.to_string())))
                .with_context(|| {
                    let mut err = format!("Failed to parse config: {}", config_path.display());
                    err.push_str("\n  Common issues:");
                    err.push_str("\n    - Invalid TOML syntax");
                    err.push_str("\n    - Missing required sections or fields");
                    err.push_str("\n    - Column given as something other than a number or a header name");
                    err.push_str("\n  Tip: Run 'fleetcost --init-config <path>' to create a new config file");
                    err
                })?
        } else {
            // Use defaults but warn if user explicitly provided a path
            if path.is_some() {
                eprintln!("WARNING: Config file not found: {}", config_path.display());
                eprintln!("   Using default configuration. Run 'fleetcost --init-config <path>' to create a config file.");
            }
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Reject values that would produce a meaningless report.
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |field: &str, reason: String| {
            FleetCostError::Config(ConfigError::InvalidValue {
                field: field.to_string(),
                reason,
            })
        };

        if self.aws.region.trim().is_empty() {
            return Err(FleetCostError::Config(ConfigError::MissingField(
                "aws.region".to_string(),
            )));
        }

        parse_s3_location(&self.athena.output_location)
            .map_err(|e| invalid("athena.output_location", e.to_string()))?;

        match self.athena.wait {
            WaitConfig::Poll {
                poll_interval_ms,
                timeout_secs,
            } => {
                if poll_interval_ms == 0 {
                    return Err(invalid("athena.wait.poll_interval_ms", "must be > 0".to_string()));
                }
                if timeout_secs == 0 {
                    return Err(invalid("athena.wait.timeout_secs", "must be > 0".to_string()));
                }
            }
            WaitConfig::Fixed { .. } => {}
        }

        let util = self.sizing.utilization_factor;
        if util < Decimal::ZERO || util > Decimal::ONE {
            return Err(invalid(
                "sizing.utilization_factor",
                format!("must be between 0.0 and 1.0, got {}", util),
            ));
        }
        if self.sizing.ebs_gb_month_rate < Decimal::ZERO {
            return Err(invalid(
                "sizing.ebs_gb_month_rate",
                format!("must not be negative, got {}", self.sizing.ebs_gb_month_rate),
            ));
        }
        if self.sizing.term_months == 0 {
            return Err(invalid("sizing.term_months", "must be > 0".to_string()));
        }

        Ok(())
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
