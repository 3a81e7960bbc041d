use async_trait::async_trait;
use aws_sdk_s3 as s3;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// 1. StorageService Contract
/// StorageService
///
/// Defines the abstract contract for all interactions with the blob storage
/// layer. This trait allows us to swap the concrete implementation, from the
/// real S3 client (S3StorageClient) in production to the in-memory Mock
/// (MockStorageService) during testing, without affecting callers.
///
/// The core only needs addressable blobs: store bytes under a key, read them
/// back, delete them. Attachment upload treats store-then-record-insert as a
/// single logical unit, so `delete` is also the rollback path when the record
/// write fails after a successful store.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used primarily in the `Env::Local`
    /// setup to automatically provision the bucket in MinIO. No-op in production.
    async fn ensure_bucket_exists(&self);

    /// Persists `bytes` under `key`. Overwrites silently, which is fine because
    /// keys are freshly generated UUIDs.
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), String>;

    /// Reads the blob stored under `key`.
    async fn retrieve(&self, key: &str) -> Result<Vec<u8>, String>;

    /// Removes the blob stored under `key`. Removing a missing key is not an
    /// error.
    async fn delete(&self, key: &str) -> Result<(), String>;
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// The concrete implementation using the AWS SDK for S3. Due to S3
/// compatibility, this client transparently handles connections to a local
/// Dockerized MinIO instance as well as production object stores.
///
/// The `force_path_style(true)` is critical for MinIO compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // CRITICAL: Forces path-style addressing (http://endpoint/bucket/key),
            // required for MinIO-style gateways.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// Calls the S3 CreateBucket API. Since S3 APIs are idempotent, this only
    /// creates the bucket if it does not already exist. Safe to call at startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), String> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Vec<u8>, String> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let data = output.body.collect().await.map_err(|e| e.to_string())?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// sanitize_key
///
/// Utility function to prevent path traversal attacks by removing directory
/// navigation components (e.g., `..`, `.`) from a user-provided key segment.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// An in-memory implementation of `StorageService` used exclusively for unit
/// and integration testing. Blobs live in a shared map so tests can assert on
/// what was stored and on what was rolled back.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// The keys currently held, for test assertions.
    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        let sanitized_key = sanitize_key(key);
        self.blobs.lock().unwrap().insert(sanitized_key, bytes);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Vec<u8>, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        self.blobs
            .lock()
            .unwrap()
            .get(&sanitize_key(key))
            .cloned()
            .ok_or_else(|| format!("no blob stored under '{}'", key))
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        self.blobs.lock().unwrap().remove(&sanitize_key(key));
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service access across the
/// application state.
pub type StorageState = Arc<dyn StorageService>;
