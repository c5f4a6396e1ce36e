use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use sha2::{Digest, Sha256};

use super::{encode_path, http_client, Health, StorageBackend, StorageError};
use crate::config::{S3Config, S3Credentials};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Snapshot stored as an S3 object, addressed path-style.
///
/// A PUT replaces the whole object atomically. With bucket versioning turned
/// on, overwritten snapshots stay recoverable out of band.
#[derive(Debug, Clone)]
pub struct S3Backend {
    config: S3Config,
    endpoint: String,
    client: Client,
}

impl S3Backend {
    pub fn new(config: S3Config, timeout: Duration) -> Result<Self, StorageError> {
        if config.bucket.is_empty() || config.key.is_empty() {
            return Err(StorageError::Config(
                "S3 bucket and object key must not be empty".to_string(),
            ));
        }
        let endpoint = config.endpoint_url();
        Url::parse(&endpoint)
            .map_err(|e| StorageError::Config(format!("invalid S3 endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            config,
        })
    }

    fn bucket_url(&self) -> Result<Url, StorageError> {
        self.parse_url(format!(
            "{}/{}",
            self.endpoint,
            urlencoding::encode(&self.config.bucket)
        ))
    }

    fn object_url(&self) -> Result<Url, StorageError> {
        self.parse_url(format!(
            "{}/{}/{}",
            self.endpoint,
            urlencoding::encode(&self.config.bucket),
            encode_path(self.config.key.trim_start_matches('/'))
        ))
    }

    fn parse_url(&self, url: String) -> Result<Url, StorageError> {
        Url::parse(&url).map_err(|e| StorageError::Config(format!("invalid S3 URL {}: {}", url, e)))
    }

    /// Build a request, signed when credentials are configured.
    fn request(
        &self,
        method: Method,
        url: Url,
        payload: &[u8],
    ) -> Result<RequestBuilder, StorageError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(credentials) = &self.config.credentials {
            let signer = Signer {
                credentials,
                region: &self.config.region,
            };
            for (name, value) in signer.sign(method.as_str(), &url, payload, Utc::now())? {
                request = request.header(name, value);
            }
        }
        Ok(request)
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.config.bucket, self.config.key)
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let url = self.object_url()?;
        let response = self
            .request(Method::GET, url, &[])?
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to load from {}: {}", self.location(), e);
                StorageError::Unavailable(format!("S3 request failed: {}", e))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!("No existing object at {}", self.location());
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("S3 load returned {}: {}", status, body);
            return Err(StorageError::Unavailable(format!(
                "S3 returned {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Unavailable(format!("failed to read S3 body: {}", e)))?;
        tracing::debug!("Loaded {} bytes from {}", bytes.len(), self.location());
        Ok(Some(bytes.to_vec()))
    }

    async fn save(&self, payload: &[u8]) -> Result<(), StorageError> {
        let url = self
            .object_url()
            .map_err(|e| StorageError::Save(e.to_string()))?;
        let response = self
            .request(Method::PUT, url, payload)
            .map_err(|e| StorageError::Save(e.to_string()))?
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to save to {}: {}", self.location(), e);
                StorageError::Save(format!("S3 request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("S3 save returned {}: {}", status, body);
            return Err(StorageError::Save(format!("S3 returned {}: {}", status, body)));
        }

        tracing::debug!("Saved snapshot to {}", self.location());
        Ok(())
    }

    async fn health(&self) -> Health {
        let url = match self.bucket_url() {
            Ok(url) => url,
            Err(e) => return Health::unhealthy(e.to_string()),
        };

        let request = match self.request(Method::HEAD, url, &[]) {
            Ok(request) => request,
            Err(e) => return Health::unhealthy(e.to_string()),
        };

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                Health::healthy(format!("bucket {} reachable", self.config.bucket))
            }
            Ok(response) => Health::unhealthy(format!(
                "bucket {} returned {}",
                self.config.bucket,
                response.status()
            )),
            Err(e) => {
                tracing::warn!("S3 health check failed: {}", e);
                Health::unhealthy(format!("S3 unreachable: {}", e))
            }
        }
    }
}

/// AWS Signature Version 4 for a single request.
struct Signer<'a> {
    credentials: &'a S3Credentials,
    region: &'a str,
}

impl Signer<'_> {
    /// Headers to attach to the request, `Authorization` included.
    fn sign(
        &self,
        method: &str,
        url: &Url,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>, StorageError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(payload));

        let mut headers = vec![
            ("host", host_header(url)),
            ("x-amz-content-sha256", payload_hash.clone()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let query = canonical_query(url);
        let canonical_request = [
            method,
            url.path(),
            query.as_str(),
            canonical_headers.as_str(),
            signed_headers.as_str(),
            payload_hash.as_str(),
        ]
        .join("\n");

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = [
            ALGORITHM,
            amz_date.as_str(),
            scope.as_str(),
            request_hash.as_str(),
        ]
        .join("\n");

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            self.region,
            SERVICE,
        )?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        headers.retain(|(name, _)| *name != "host");
        headers.push((
            "authorization",
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
            ),
        ));
        Ok(headers)
    }
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (urlencoding::encode(&k).into_owned(), urlencoding::encode(&v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Config(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
