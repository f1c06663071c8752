use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use console::style;
use fleetcost::athena::AthenaQueryService;
use fleetcost::config::{self, Config, WaitConfig};
use fleetcost::exit_codes::{codes, exit_code_for_anyhow};
use fleetcost::pipeline::{Pipeline, PipelineOptions};
use fleetcost::pricing::PriceTable;
use fleetcost::query_spec::QuerySpec;
use fleetcost::report::{summary_table, ReportSummary, ReportWriter};
use fleetcost::storage::S3ObjectStore;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "fleetcost: ERROR: Usage: fleetcost <QUERY_SPEC> <PRICE_LIST> (e.g. fleetcost ec2-queries.txt price.csv)";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "fleetcost")]
#[command(
    about = "Estimate EC2 reserved-instance and EBS cost for an on-premise server inventory",
    long_about = "fleetcost runs one Athena query per EC2 instance type against a server inventory,\ncounts the matching servers and their disk, and prices them with 3-year reserved\ninstances (all upfront) plus gp2 storage.\n\nQUERY_SPEC has one '<instance-type>:<query>' per line. Queries may use DB_NAME,\nCPU_CORE and MEM_SIZE, which are replaced from the [athena] config section."
)]
#[command(version)]
struct Cli {
    /// Query spec file, one '<instance-type>:<query>' per line
    #[arg(value_name = "QUERY_SPEC", required_unless_present = "init_config")]
    query_spec: Option<PathBuf>,

    /// EC2 price list CSV (offer file)
    #[arg(value_name = "PRICE_LIST", required_unless_present = "init_config")]
    price_list: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Report file (overrides report.path)
    #[arg(long, value_name = "PATH")]
    output_file: Option<PathBuf>,

    /// AWS region (overrides aws.region)
    #[arg(long)]
    region: Option<String>,

    /// Sleep this many seconds after each submit instead of polling
    #[arg(long, value_name = "SECS")]
    fixed_wait: Option<u64>,

    /// Average utilization factor 0.0-1.0 (overrides sizing.utilization_factor)
    #[arg(long, value_name = "FACTOR")]
    utilization: Option<Decimal>,

    /// Write a default config file to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["query_spec", "price_list"])]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            println!("{}", USAGE);
            eprintln!("{}", e);
            std::process::exit(codes::USER_ERROR);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("fleetcost: ERROR: {:#}", e);
        std::process::exit(exit_code_for_anyhow(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Setup logging - suppress INFO by default, only show warnings and errors
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(path) = cli.init_config.as_deref() {
        return config::init_config(path);
    }

    let (query_spec, price_list) = match (cli.query_spec.as_deref(), cli.price_list.as_deref()) {
        (Some(q), Some(p)) => (q.to_path_buf(), p.to_path_buf()),
        _ => anyhow::bail!("{}", USAGE),
    };

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let json = cli.output == OutputFormat::Json;
    if !json {
        println!("fleetcost: EC2 migration sizing - STARTING...\n");
    }

    let prices = PriceTable::load(&price_list, &config.pricing)
        .with_context(|| format!("Failed to build price table from {}", price_list.display()))?;
    let spec = QuerySpec::load(&query_spec)
        .with_context(|| format!("Failed to read query spec {}", query_spec.display()))?;
    info!("{} instance types to size", spec.len());

    let mut options = PipelineOptions::from_config(&config)?;
    options.show_progress = !json;
    options.check_report_path(&spec, &config.report.path)?;

    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws.region.clone()))
        .load()
        .await;
    let queries = AthenaQueryService::new(&aws_config, config.athena.workgroup.clone());
    let store = S3ObjectStore::new(&aws_config);

    let report = ReportWriter::create(&config.report.path)
        .with_context(|| format!("Failed to create report {}", config.report.path.display()))?;

    let outcome = Pipeline::new(&queries, &store, options)
        .run(&spec, &prices, report)
        .await?;

    if json {
        let summary = ReportSummary {
            report_path: config.report.path.display().to_string(),
            rows: &outcome.rows,
            skipped: &outcome.skipped,
            total: outcome.totals.total_row(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n{}", summary_table(&outcome.rows, &outcome.totals));
        if !outcome.skipped.is_empty() {
            println!(
                "{} {}",
                style("Skipped (query failed):").yellow(),
                outcome.skipped.join(", ")
            );
        }
        println!(
            "fleetcost: Check the file = {}\n",
            style(config.report.path.display()).bold()
        );
        println!("fleetcost: END Successfully.");
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(path) = &cli.output_file {
        config.report.path = path.clone();
    }
    if let Some(region) = &cli.region {
        config.aws.region = region.clone();
    }
    if let Some(delay_secs) = cli.fixed_wait {
        config.athena.wait = WaitConfig::Fixed { delay_secs };
    }
    if let Some(factor) = cli.utilization {
        config.sizing.utilization_factor = factor;
    }
}
