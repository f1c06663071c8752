//! Object storage access for query results
//!
//! Athena writes `<execution-id>.csv` plus a `<execution-id>.csv.metadata`
//! companion under the output location. Both are temporary: the pipeline
//! downloads the CSV, then removes both objects.

use crate::error::{FleetCostError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use tracing::{debug, info};

/// Suffix Athena appends to the execution id for the result object
pub const RESULT_SUFFIX: &str = ".csv";
/// Suffix of the metadata object written next to each result
pub const METADATA_SUFFIX: &str = ".csv.metadata";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// S3-backed `ObjectStore`
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(aws_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: S3Client::new(aws_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FleetCostError::S3(format!("Failed to download s3://{}/{}: {}", bucket, key, e)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| FleetCostError::S3(format!("Failed to read response body: {}", e)))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FleetCostError::S3(format!("Failed to delete s3://{}/{}: {}", bucket, key, e)))?;
        debug!("Deleted s3://{}/{}", bucket, key);
        Ok(())
    }
}

/// Download one object into a local file, creating parent directories.
pub async fn download_to_file(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    destination: &Path,
) -> Result<u64> {
    let data = store.get_object(bucket, key).await?;

    // Ensure parent directory exists
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(destination, &data)?;
    info!(
        "Downloaded s3://{}/{} to {} ({} bytes)",
        bucket,
        key,
        destination.display(),
        data.len()
    );
    Ok(data.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MemoryStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| FleetCostError::S3(format!("NoSuchKey: {}", key)))
        }

        async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
            self.objects
                .lock()
                .unwrap()
                .remove(&(bucket.to_string(), key.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_download_creates_parent_dirs() {
        let mut objects = HashMap::new();
        objects.insert(
            ("bucket".to_string(), "abc.csv".to_string()),
            b"\"a\",\"b\"\n".to_vec(),
        );
        let store = MemoryStore {
            objects: Mutex::new(objects),
        };

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("results").join("m5.large.csv");
        let bytes = download_to_file(&store, "bucket", "abc.csv", &dest).await.unwrap();

        assert_eq!(bytes, 8);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "\"a\",\"b\"\n");
    }

    #[tokio::test]
    async fn test_download_missing_object_fails() {
        let store = MemoryStore {
            objects: Mutex::new(HashMap::new()),
        };
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("m5.large.csv");
        let err = download_to_file(&store, "bucket", "missing.csv", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetCostError::S3(_)));
        assert!(!dest.exists());
    }
}
