//! Athena query submission and completion tracking
//!
//! The pipeline talks to the query service through the `QueryService` trait
//! so a run can be driven against Athena or against an in-memory fake.
//!
//! Waiting for a result has two modes:
//! - `Poll`: ask for the execution state until it is terminal, with a
//!   timeout. `FAILED` and `CANCELLED` are reported as `QueryFailed`; a
//!   query that runs past the timeout is stopped and reported as
//!   `QueryTimeout`.
//! - `Fixed`: sleep a set time and assume the result object exists. A query
//!   that is still running when the sleep ends yields a truncated or missing
//!   download, and nothing reports it.

use crate::config::WaitConfig;
use crate::error::{FleetCostError, Result};
use async_trait::async_trait;
use aws_sdk_athena::types::{QueryExecutionState, ResultConfiguration};
use aws_sdk_athena::Client as AthenaClient;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Execution state of a submitted query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed(String),
    Cancelled(String),
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Queued => write!(f, "QUEUED"),
            QueryState::Running => write!(f, "RUNNING"),
            QueryState::Succeeded => write!(f, "SUCCEEDED"),
            QueryState::Failed(_) => write!(f, "FAILED"),
            QueryState::Cancelled(_) => write!(f, "CANCELLED"),
        }
    }
}

/// Analytical query service: submit a query, then ask how it is doing.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submit `query`, writing results under `output_location`. Returns the
    /// execution id without waiting for the query to finish.
    async fn start_query(&self, query: &str, output_location: &str) -> Result<String>;

    /// Current state of a submitted query
    async fn query_state(&self, execution_id: &str) -> Result<QueryState>;

    /// Ask the service to cancel a query that is still queued or running.
    async fn stop_query(&self, execution_id: &str) -> Result<()>;
}

/// How `wait_for_result` decides a result is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    Poll { interval: Duration, timeout: Duration },
    Fixed(Duration),
}

impl From<&WaitConfig> for WaitStrategy {
    fn from(config: &WaitConfig) -> Self {
        match *config {
            WaitConfig::Poll {
                poll_interval_ms,
                timeout_secs,
            } => WaitStrategy::Poll {
                interval: Duration::from_millis(poll_interval_ms),
                timeout: Duration::from_secs(timeout_secs),
            },
            WaitConfig::Fixed { delay_secs } => {
                WaitStrategy::Fixed(Duration::from_secs(delay_secs))
            }
        }
    }
}

/// Athena-backed `QueryService`
pub struct AthenaQueryService {
    client: AthenaClient,
    workgroup: Option<String>,
}

impl AthenaQueryService {
    pub fn new(aws_config: &aws_config::SdkConfig, workgroup: Option<String>) -> Self {
        Self {
            client: AthenaClient::new(aws_config),
            workgroup,
        }
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(&self, query: &str, output_location: &str) -> Result<String> {
        let response = self
            .client
            .start_query_execution()
            .query_string(query)
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            )
            .set_work_group(self.workgroup.clone())
            .send()
            .await
            .map_err(|e| FleetCostError::Athena(format!("Failed to start query: {}", e)))?;

        response
            .query_execution_id()
            .map(|id| id.to_string())
            .ok_or_else(|| FleetCostError::Athena("No query execution ID in response".to_string()))
    }

    async fn query_state(&self, execution_id: &str) -> Result<QueryState> {
        let response = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| {
                FleetCostError::Athena(format!(
                    "Failed to get status of query {}: {}",
                    execution_id, e
                ))
            })?;

        let status = response.query_execution().and_then(|q| q.status());
        let reason = status
            .and_then(|s| s.state_change_reason())
            .unwrap_or("no reason given")
            .to_string();

        let state = match status.and_then(|s| s.state()) {
            Some(QueryExecutionState::Queued) => QueryState::Queued,
            Some(QueryExecutionState::Running) => QueryState::Running,
            Some(QueryExecutionState::Succeeded) => QueryState::Succeeded,
            Some(QueryExecutionState::Failed) => QueryState::Failed(reason),
            Some(QueryExecutionState::Cancelled) => QueryState::Cancelled(reason),
            Some(other) => {
                warn!("Unknown query state for {}: {}", execution_id, other.as_str());
                QueryState::Running
            }
            None => QueryState::Queued,
        };
        Ok(state)
    }

    async fn stop_query(&self, execution_id: &str) -> Result<()> {
        self.client
            .stop_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| {
                FleetCostError::Athena(format!("Failed to stop query {}: {}", execution_id, e))
            })?;
        Ok(())
    }
}

/// Block until the result of `execution_id` can be downloaded.
pub async fn wait_for_result(
    service: &dyn QueryService,
    instance_type: &str,
    execution_id: &str,
    strategy: WaitStrategy,
    show_progress: bool,
) -> Result<()> {
    match strategy {
        WaitStrategy::Fixed(delay) => {
            debug!("Sleeping {:?} before fetching result of {}", delay, execution_id);
            sleep(delay).await;
            Ok(())
        }
        WaitStrategy::Poll { interval, timeout } => {
            poll_until_terminal(service, instance_type, execution_id, interval, timeout, show_progress)
                .await
        }
    }
}

async fn poll_until_terminal(
    service: &dyn QueryService,
    instance_type: &str,
    execution_id: &str,
    interval: Duration,
    timeout: Duration,
    show_progress: bool,
) -> Result<()> {
    let pb = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .map_err(|e| FleetCostError::Athena(format!("Invalid progress template: {}", e)))?,
        );
        pb.set_message(format!("{}: waiting for query {}...", instance_type, execution_id));
        Some(pb)
    } else {
        None
    };

    let started = Instant::now();
    loop {
        let state = service.query_state(execution_id).await?;
        if let Some(ref p) = pb {
            p.set_message(format!("{}: query {} {}", instance_type, execution_id, state));
            p.tick();
        }

        match state {
            QueryState::Succeeded => {
                if let Some(p) = pb {
                    p.finish_and_clear();
                }
                info!("Query {} for {} succeeded", execution_id, instance_type);
                return Ok(());
            }
            QueryState::Failed(ref reason) | QueryState::Cancelled(ref reason) => {
                if let Some(p) = pb {
                    p.finish_with_message(format!("{}: query {}", instance_type, state));
                }
                return Err(FleetCostError::QueryFailed {
                    instance_type: instance_type.to_string(),
                    execution_id: execution_id.to_string(),
                    state: state.to_string(),
                    reason: reason.clone(),
                });
            }
            QueryState::Queued | QueryState::Running => {}
        }

        let waited = started.elapsed();
        if waited >= timeout {
            if let Some(p) = pb {
                p.finish_with_message(format!("{}: query timed out", instance_type));
            }
            // A query left running keeps scanning and later writes its result
            if let Err(e) = service.stop_query(execution_id).await {
                warn!("Failed to stop timed-out query {}: {}", execution_id, e);
            }
            return Err(FleetCostError::QueryTimeout {
                execution_id: execution_id.to_string(),
                waited,
            });
        }

        sleep(interval.min(timeout - waited)).await;
    }
}
