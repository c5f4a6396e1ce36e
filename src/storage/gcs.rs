use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{http_client, Health, StorageBackend, StorageError};
use crate::config::GcsConfig;

/// Snapshot stored as a Google Cloud Storage object, via the JSON API.
///
/// Uploads replace the whole object in one request, so readers never observe
/// a partial payload. With object versioning enabled on the bucket, earlier
/// snapshots stay recoverable out of band.
#[derive(Debug, Clone)]
pub struct GcsBackend {
    config: GcsConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct BucketMetadata {
    #[serde(default)]
    versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize)]
struct Versioning {
    #[serde(default)]
    enabled: bool,
}

impl GcsBackend {
    pub fn new(config: GcsConfig, timeout: Duration) -> Result<Self, StorageError> {
        if config.bucket.is_empty() || config.object.is_empty() {
            return Err(StorageError::Config(
                "GCS bucket and object name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            client: http_client(timeout)?,
            config,
        })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}",
            self.config.endpoint,
            urlencoding::encode(&self.config.bucket)
        )
    }

    fn object_url(&self) -> String {
        // The whole object name is one path segment, slashes encoded.
        format!(
            "{}/o/{}",
            self.bucket_url(),
            urlencoding::encode(&self.config.object)
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.config.endpoint,
            urlencoding::encode(&self.config.bucket)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn location(&self) -> String {
        format!("gs://{}/{}", self.config.bucket, self.config.object)
    }
}

#[async_trait]
impl StorageBackend for GcsBackend {
    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .authorize(self.client.get(self.object_url()).query(&[("alt", "media")]))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to load from {}: {}", self.location(), e);
                StorageError::Unavailable(format!("GCS request failed: {}", e))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!("No existing object at {}", self.location());
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("GCS load returned {}: {}", status, body);
            return Err(StorageError::Unavailable(format!(
                "GCS returned {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Unavailable(format!("failed to read GCS body: {}", e)))?;
        tracing::debug!("Loaded {} bytes from {}", bytes.len(), self.location());
        Ok(Some(bytes.to_vec()))
    }

    async fn save(&self, payload: &[u8]) -> Result<(), StorageError> {
        let request = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", self.config.object.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec());

        let response = self.authorize(request).send().await.map_err(|e| {
            tracing::error!("Failed to save to {}: {}", self.location(), e);
            StorageError::Save(format!("GCS request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("GCS save returned {}: {}", status, body);
            return Err(StorageError::Save(format!("GCS returned {}: {}", status, body)));
        }

        tracing::debug!("Saved snapshot to {}", self.location());
        Ok(())
    }

    async fn health(&self) -> Health {
        let response = match self
            .authorize(self.client.get(self.bucket_url()))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("GCS health check failed: {}", e);
                return Health::unhealthy(format!("GCS unreachable: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Health::unhealthy(format!(
                "bucket {} returned {}",
                self.config.bucket, status
            ));
        }

        let versioned = response
            .json::<BucketMetadata>()
            .await
            .ok()
            .and_then(|m| m.versioning)
            .is_some_and(|v| v.enabled);
        Health::healthy(format!(
            "bucket {} reachable, versioning {}",
            self.config.bucket,
            if versioned { "enabled" } else { "disabled" }
        ))
    }
}
