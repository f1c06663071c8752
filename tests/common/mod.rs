//! In-memory stand-ins for Athena and S3
//!
//! `FakeAthena` "runs" a query by looking up a canned result for it and
//! writing `<id>.csv` and `<id>.csv.metadata` into the shared `MemoryStore`,
//! the same objects Athena leaves under its output location.

#![allow(dead_code)]

use async_trait::async_trait;
use fleetcost::athena::{QueryService, QueryState, WaitStrategy};
use fleetcost::columns::ColumnRef;
use fleetcost::config::{DiskValuePolicy, QueryFailurePolicy};
use fleetcost::cost::EbsRate;
use fleetcost::error::{FleetCostError, Result};
use fleetcost::pipeline::PipelineOptions;
use fleetcost::query_spec::Placeholders;
use fleetcost::storage::ObjectStore;
use fleetcost::validation::parse_s3_location;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    /// Keys whose deletion fails
    pub undeletable: Mutex<HashSet<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| FleetCostError::S3(format!("NoSuchKey: s3://{}/{}", bucket, key)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        if self.undeletable.lock().unwrap().contains(key) {
            return Err(FleetCostError::S3(format!("AccessDenied: {}", key)));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Canned outcome for queries containing `needle`
pub struct CannedQuery {
    pub needle: String,
    pub result_csv: String,
    pub final_state: QueryState,
}

pub struct FakeAthena {
    store: Arc<MemoryStore>,
    canned: Vec<CannedQuery>,
    pub submitted: Mutex<Vec<(String, String)>>,
    pub polls: Mutex<u32>,
    pub stopped: Mutex<Vec<String>>,
    states: Mutex<BTreeMap<String, QueryState>>,
}

impl FakeAthena {
    pub fn new(store: Arc<MemoryStore>, canned: Vec<CannedQuery>) -> Self {
        Self {
            store,
            canned,
            submitted: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
            stopped: Mutex::new(Vec::new()),
            states: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }
}

#[async_trait]
impl QueryService for FakeAthena {
    async fn start_query(&self, query: &str, output_location: &str) -> Result<String> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((query.to_string(), output_location.to_string()));
        let execution_id = format!("exec-{}", submitted.len());

        let canned = self
            .canned
            .iter()
            .find(|c| query.contains(&c.needle))
            .ok_or_else(|| FleetCostError::Athena(format!("no canned result for {}", query)))?;

        if canned.final_state == QueryState::Succeeded {
            let loc = parse_s3_location(output_location.trim_end_matches('/'))?;
            let key = loc.object_key(&format!("{}.csv", execution_id));
            self.store.put(&loc.bucket, &key, canned.result_csv.as_bytes());
            self.store
                .put(&loc.bucket, &format!("{}.metadata", key), b"metadata");
        }

        self.states
            .lock()
            .unwrap()
            .insert(execution_id.clone(), canned.final_state.clone());
        Ok(execution_id)
    }

    async fn query_state(&self, execution_id: &str) -> Result<QueryState> {
        *self.polls.lock().unwrap() += 1;
        self.states
            .lock()
            .unwrap()
            .get(execution_id)
            .cloned()
            .ok_or_else(|| FleetCostError::Athena(format!("unknown execution {}", execution_id)))
    }

    async fn stop_query(&self, execution_id: &str) -> Result<()> {
        self.stopped.lock().unwrap().push(execution_id.to_string());
        self.states
            .lock()
            .unwrap()
            .insert(execution_id.to_string(), QueryState::Cancelled("stopped".to_string()));
        Ok(())
    }
}

/// Inventory result in Athena's quoted CSV layout with the disk size in
/// column 9.
pub fn inventory_csv(disks: &[&str]) -> String {
    let mut csv = String::from(
        "\"host\",\"os\",\"vcpu\",\"memory\",\"site\",\"rack\",\"role\",\"owner\",\"env\",\"disk\"\n",
    );
    for (i, disk) in disks.iter().enumerate() {
        csv.push_str(&format!(
            "\"srv{:03}\",\"linux\",\"2\",\"8\",\"tokyo\",\"r1\",\"web\",\"ops\",\"prod\",\"{}\"\n",
            i, disk
        ));
    }
    csv
}

pub fn options(results_dir: &Path) -> PipelineOptions {
    PipelineOptions {
        placeholders: Placeholders {
            database_table: "\"amqa-sample\".\"amqa_sample\"".to_string(),
            cpu_column: "vcpu".to_string(),
            memory_column: "memory".to_string(),
        },
        output_location: parse_s3_location("s3://amqa-sample").unwrap(),
        wait: WaitStrategy::Poll {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        },
        on_query_failure: QueryFailurePolicy::Abort,
        disk_column: ColumnRef::Index(9),
        disk_policy: DiskValuePolicy::Abort,
        utilization_factor: Decimal::ONE,
        ebs_rate: EbsRate {
            per_gb_month: Decimal::new(12, 2),
            term_months: 36,
        },
        results_dir: results_dir.to_path_buf(),
        keep_result_files: true,
        show_progress: false,
    }
}
