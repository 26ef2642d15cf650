use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Object storage for listing photos and voice notes.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores `bytes` under `path` and returns the public URL of the object.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
    ) -> Result<String, MediaError>;
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503)
}

/// Path of a listing photo: `{dealer_id}/{file_name}`.
pub fn image_path(dealer_id: uuid::Uuid, file_name: &str) -> String {
    format!("{}/{}", dealer_id, file_name.trim_start_matches('/'))
}

/// Path of a repairs voice note: `{dealer_id}/{listing_id}/{kind}.m4a`.
pub fn audio_path(dealer_id: uuid::Uuid, listing_id: uuid::Uuid, kind: &str) -> String {
    format!("{}/{}/{}.m4a", dealer_id, listing_id, kind)
}

/// Bucket-style object store reached over HTTP (`PUT {base}/object/{bucket}/{path}`).
pub struct HttpMediaStorage {
    client: Client,
    base_url: String,
    bucket: String,
}

impl HttpMediaStorage {
    pub fn new(base_url: String, bucket: String, token: &str) -> Result<Self, MediaError> {
        let mut headers = header::HeaderMap::new();
        if !token.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| MediaError::InvalidConfig(format!("Invalid media token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| MediaError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, self.bucket, path)
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

#[async_trait]
impl MediaStorage for HttpMediaStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
    ) -> Result<String, MediaError> {
        let url = self.object_url(path);
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            let response = self
                .client
                .put(&url)
                .header(header::CONTENT_TYPE, content_type)
                .header("x-upsert", "true")
                .body(bytes.clone())
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 429 {
                        return Err(MediaError::RateLimited);
                    }

                    if is_retryable_status(status) && attempt < MAX_RETRIES - 1 {
                        warn!(path = %path, status, attempt, "Media upload failed, retrying");
                        sleep(Duration::from_millis(INITIAL_BACKOFF_MS * 2_u64.pow(attempt))).await;
                        continue;
                    }

                    if !resp.status().is_success() {
                        let text = resp.text().await.unwrap_or_default();
                        return Err(MediaError::UploadFailed(format!("{}: {}", status, text)));
                    }

                    return Ok(self.public_url(path));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < MAX_RETRIES - 1 {
                        sleep(Duration::from_millis(INITIAL_BACKOFF_MS * 2_u64.pow(attempt))).await;
                    }
                }
            }
        }

        Err(MediaError::UploadFailed(
            last_error.unwrap_or_else(|| "Max retries exceeded".to_string()),
        ))
    }
}
