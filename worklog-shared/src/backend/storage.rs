//! Hosted object storage client
//!
//! Uploads go to `POST {base}/storage/v1/object/{bucket}/{path}` as the
//! signed-in user, so the bucket's row-level policies apply. Public buckets
//! serve objects at `{base}/storage/v1/object/public/{bucket}/{path}`.

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use tracing::{debug, info};

use super::identity::{ensure_success, parse_base_url};
use super::{BackendError, BackendResult, ObjectStorage, UploadObject};

/// Client for the hosted storage service
#[derive(Debug, Clone)]
pub struct HostedStorage {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl HostedStorage {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> BackendResult<Self> {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> BackendResult<Self> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            api_key: api_key.into(),
        })
    }

    /// `{base}/storage/v1/object/{prefix...}/{bucket}/{path}` with each path
    /// segment percent-encoded
    fn object_url(&self, public: bool, bucket: &str, path: &str) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::new("Backend URL cannot be a base"))?;
            segments.pop_if_empty().extend(["storage", "v1", "object"]);
            if public {
                segments.push("public");
            }
            segments.push(bucket);
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    /// Public URL of an object
    pub fn public_url(&self, bucket: &str, path: &str) -> BackendResult<String> {
        Ok(self.object_url(true, bucket, path)?.to_string())
    }
}

#[async_trait]
impl ObjectStorage for HostedStorage {
    async fn upload(&self, access_token: &str, object: UploadObject) -> BackendResult<String> {
        let url = self.object_url(false, &object.bucket, &object.path)?;
        let content_type = object
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        debug!(bucket = %object.bucket, path = %object.path, size = object.bytes.len(), "Uploading object");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .header(header::CONTENT_TYPE, content_type)
            .bearer_auth(access_token)
            .body(object.bytes)
            .send()
            .await?;

        ensure_success(response).await?;

        info!(bucket = %object.bucket, path = %object.path, "Object uploaded");
        self.public_url(&object.bucket, &object.path)
    }
}
